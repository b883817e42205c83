//! Integration tests for the connectivity controller.
//!
//! These run the controller task against a recording radio (which never
//! reports outcomes by itself) and against the simulated radio, with tokio's
//! paused clock standing in for the reconnect delay.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::timeout;

use sensorlink_core::hal::{Radio, RadioError};
use sensorlink_core::{
    ConnectivityMachine, ConnectivityState, DisconnectReason, FileStore, IpConfig, IpMode,
    KeyValueStore, LinkEvent, MacAddress, NetworkConfig, NetworkCredentials, RadioMode,
};
use sensorlink_server::sim::SimulatedRadio;
use sensorlink_server::{ConnectivityController, ControllerHandle};

const RECONNECT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    StartAp(String),
    StopAp,
    Join(String),
    ApplyIp(IpConfig),
}

/// Records every primitive call; outcomes are injected by the test.
#[derive(Default)]
struct RecordingRadio {
    calls: Mutex<Vec<Call>>,
    fail_joins: bool,
}

impl RecordingRadio {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn joins(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Join(_)))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Radio for RecordingRadio {
    fn start_access_point(&self, credentials: &NetworkCredentials) -> Result<(), RadioError> {
        self.record(Call::StartAp(credentials.ssid().to_string()));
        Ok(())
    }
    fn stop_access_point(&self) -> Result<(), RadioError> {
        self.record(Call::StopAp);
        Ok(())
    }
    fn join(&self, credentials: &NetworkCredentials) -> Result<(), RadioError> {
        self.record(Call::Join(credentials.ssid().to_string()));
        if self.fail_joins {
            return Err(RadioError::Driver("station interface down".to_string()));
        }
        Ok(())
    }
    fn apply_ip_config(&self, config: &IpConfig) -> Result<(), RadioError> {
        self.record(Call::ApplyIp(*config));
        Ok(())
    }
    fn mode(&self) -> RadioMode {
        RadioMode::Off
    }
    fn station_ip(&self) -> Option<Ipv4Addr> {
        None
    }
    fn access_point_ip(&self) -> Option<Ipv4Addr> {
        None
    }
    fn mac_address(&self) -> MacAddress {
        MacAddress::default()
    }
    fn scan(&self) -> Result<Vec<String>, RadioError> {
        Ok(Vec::new())
    }
}

fn creds(ssid: &str, pass: &str) -> NetworkCredentials {
    NetworkCredentials::new(ssid, pass).unwrap()
}

fn default_ap() -> NetworkCredentials {
    creds("SensorLink", "sensorlink")
}

fn temp_dir() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("sensorlink-it-{}", uuid::Uuid::new_v4()))
}

/// Boot a controller the way the binary does: from the persisted config.
fn boot(
    config: &NetworkConfig,
    radio: Arc<dyn Radio>,
    channel: (
        sensorlink_server::LinkEventSender,
        sensorlink_server::LinkEventReceiver,
    ),
) -> (ControllerHandle, tokio::task::JoinHandle<()>) {
    let machine =
        ConnectivityMachine::new(config.access_point_credentials(), config.ip_config(), RECONNECT);
    let controller = ConnectivityController::new(machine, radio, channel);
    let handle = controller.handle();
    let task = tokio::spawn(controller.run(config.station_credentials()));
    (handle, task)
}

async fn wait_for(handle: &ControllerHandle, state: ConnectivityState) {
    let mut rx = handle.subscribe();
    timeout(Duration::from_secs(60), rx.wait_for(|s| s.state == state))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {state}"))
        .expect("controller stopped");
}

fn memory_config() -> NetworkConfig {
    NetworkConfig::new(Arc::new(sensorlink_core::MemoryStore::new()), default_ap())
}

#[tokio::test(start_paused = true)]
async fn test_boot_without_credentials_never_joins() {
    let config = memory_config();
    let radio = Arc::new(RecordingRadio::default());
    let (handle, task) = boot(&config, radio.clone(), ConnectivityController::channel());

    wait_for(&handle, ConnectivityState::ApOnly).await;

    // Nothing happens however long we wait or whatever the driver reports.
    handle.post(LinkEvent::LinkLost(DisconnectReason::Other));
    tokio::time::sleep(RECONNECT * 3).await;

    assert_eq!(handle.state(), ConnectivityState::ApOnly);
    assert_eq!(radio.calls(), vec![Call::StartAp("SensorLink".to_string())]);
    assert_eq!(radio.joins(), 0);
    task.abort();
}

#[tokio::test(start_paused = true)]
async fn test_saved_credentials_survive_restart() {
    let dir = temp_dir();

    // First boot: nothing stored, then credentials are saved.
    {
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&dir).unwrap());
        let config = NetworkConfig::new(store, default_ap());
        assert_eq!(config.station_credentials(), None);
        config
            .save_station_credentials(&creds("home", "correct horse"))
            .unwrap();
    }

    // Second boot reads them back from disk.
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&dir).unwrap());
    let config = NetworkConfig::new(store, default_ap());
    let radio = Arc::new(RecordingRadio::default());
    let (handle, task) = boot(&config, radio.clone(), ConnectivityController::channel());

    wait_for(&handle, ConnectivityState::StaConnecting).await;
    assert_eq!(
        radio.calls(),
        vec![
            Call::StartAp("SensorLink".to_string()),
            Call::Join("home".to_string())
        ]
    );

    task.abort();
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test(start_paused = true)]
async fn test_association_applies_static_ip_then_stops_ap() {
    let config = memory_config();
    config.save_station_credentials(&creds("home", "secret")).unwrap();
    let fixed = IpConfig::from_parts(IpMode::Static, "10.0.0.5", "10.0.0.1", "255.255.255.0")
        .unwrap();
    config.save_ip_config(&fixed).unwrap();

    let radio = Arc::new(RecordingRadio::default());
    let (handle, task) = boot(&config, radio.clone(), ConnectivityController::channel());
    wait_for(&handle, ConnectivityState::StaConnecting).await;

    handle.post(LinkEvent::Associated);
    wait_for(&handle, ConnectivityState::StaConnected).await;

    assert_eq!(
        radio.calls()[2..],
        [Call::ApplyIp(fixed), Call::StopAp]
    );
    task.abort();
}

#[tokio::test(start_paused = true)]
async fn test_link_lost_restores_ap_before_reconnect() {
    let config = memory_config();
    config.save_station_credentials(&creds("home", "secret")).unwrap();

    let radio = Arc::new(RecordingRadio::default());
    let (handle, task) = boot(&config, radio.clone(), ConnectivityController::channel());
    handle.post(LinkEvent::Associated);
    wait_for(&handle, ConnectivityState::StaConnected).await;
    let before = radio.calls().len();

    handle.post(LinkEvent::LinkLost(DisconnectReason::BeaconTimeout));
    wait_for(&handle, ConnectivityState::DualFallback).await;

    // The access point is back immediately; the retry waits for the delay.
    assert_eq!(
        radio.calls()[before..],
        [Call::StartAp("SensorLink".to_string())]
    );
    tokio::time::sleep(RECONNECT / 2).await;
    assert_eq!(radio.joins(), 1);

    tokio::time::sleep(RECONNECT).await;
    assert_eq!(
        radio.calls()[before..],
        [
            Call::StartAp("SensorLink".to_string()),
            Call::Join("home".to_string())
        ]
    );
    assert_eq!(handle.state(), ConnectivityState::DualFallback);
    task.abort();
}

#[tokio::test(start_paused = true)]
async fn test_join_driver_error_retries() {
    let config = memory_config();
    config.save_station_credentials(&creds("home", "secret")).unwrap();

    let radio = Arc::new(RecordingRadio {
        fail_joins: true,
        ..Default::default()
    });
    let (handle, task) = boot(&config, radio.clone(), ConnectivityController::channel());
    wait_for(&handle, ConnectivityState::DualFallback).await;

    // Boot join plus one retry per elapsed delay.
    tokio::time::sleep(RECONNECT * 3 + Duration::from_secs(1)).await;
    assert_eq!(radio.joins(), 4);
    assert_eq!(handle.state(), ConnectivityState::DualFallback);
    task.abort();
}

#[tokio::test(start_paused = true)]
async fn test_simulated_radio_recovers_when_network_returns() {
    let config = memory_config();
    let home = creds("home", "secret");
    config.save_station_credentials(&home).unwrap();

    let channel = ConnectivityController::channel();
    let radio = Arc::new(SimulatedRadio::new(channel.0.clone(), &[home.clone()]));
    let (handle, task) = boot(&config, radio.clone(), channel);

    wait_for(&handle, ConnectivityState::StaConnected).await;
    assert_eq!(radio.mode(), RadioMode::Station);
    assert_eq!(radio.access_point_ssid(), None);

    // Network vanishes: fallback brings the AP back and retries keep failing.
    radio.remove_network("home");
    wait_for(&handle, ConnectivityState::DualFallback).await;
    assert_eq!(radio.mode(), RadioMode::AccessPoint);
    tokio::time::sleep(RECONNECT * 2 + Duration::from_secs(1)).await;
    assert_eq!(handle.state(), ConnectivityState::DualFallback);

    // Network returns: the next retry associates and the AP goes away.
    radio.add_network(&home);
    wait_for(&handle, ConnectivityState::StaConnected).await;
    assert_eq!(radio.mode(), RadioMode::Station);
    assert_eq!(radio.station_ssid().as_deref(), Some("home"));
    task.abort();
}

#[tokio::test(start_paused = true)]
async fn test_wrong_passphrase_falls_back() {
    let config = memory_config();
    config.save_station_credentials(&creds("home", "wrong")).unwrap();

    let channel = ConnectivityController::channel();
    let radio = Arc::new(SimulatedRadio::new(
        channel.0.clone(),
        &[creds("home", "secret")],
    ));
    let (handle, task) = boot(&config, radio.clone(), channel);

    wait_for(&handle, ConnectivityState::DualFallback).await;
    assert_eq!(radio.access_point_ssid().as_deref(), Some("SensorLink"));

    // Client traffic on the AP does not disturb the state.
    radio.client_event(MacAddress([2, 0, 0, 0, 0, 1]), true);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(handle.state(), ConnectivityState::DualFallback);
    task.abort();
}
