//! Simulated collaborators for running the device on a host.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use sensorlink_core::hal::{
    DigitalPins, GpioError, Radio, RadioError, Rgb, SensorError, SensorSource, StatusLed,
};
use sensorlink_core::{
    DisconnectReason, IpConfig, LinkEvent, MacAddress, NetworkCredentials, RadioMode,
};

use crate::controller::LinkEventSender;

const ACCESS_POINT_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);
const DHCP_LEASE: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 50);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct RadioState {
    access_point: Option<String>,
    station: Option<String>,
    ip_config: IpConfig,
    /// Visible networks: SSID to passphrase.
    networks: HashMap<String, String>,
    scan_fails: bool,
}

/// A radio that "joins" networks from a fixed table.
///
/// Join outcomes are posted to the link event queue the way a driver event
/// callback would: a matching passphrase associates, a wrong one fails
/// authentication, an unknown SSID is not found.
pub struct SimulatedRadio {
    events: LinkEventSender,
    mac: MacAddress,
    state: Mutex<RadioState>,
}

impl SimulatedRadio {
    pub fn new(events: LinkEventSender, networks: &[NetworkCredentials]) -> Self {
        let networks = networks
            .iter()
            .map(|n| (n.ssid().to_string(), n.passphrase().to_string()))
            .collect();
        Self {
            events,
            mac: MacAddress([0x24, 0x0a, 0xc4, 0x5e, 0x4c, 0x01]),
            state: Mutex::new(RadioState {
                networks,
                ..Default::default()
            }),
        }
    }

    fn post(&self, event: LinkEvent) {
        if self.events.send(event).is_err() {
            debug!("Link event dropped, controller stopped");
        }
    }

    /// Make a network visible (or change its passphrase).
    pub fn add_network(&self, network: &NetworkCredentials) {
        lock(&self.state)
            .networks
            .insert(network.ssid().to_string(), network.passphrase().to_string());
    }

    /// Make a network disappear. An association with it is lost.
    pub fn remove_network(&self, ssid: &str) {
        let lost = {
            let mut state = lock(&self.state);
            state.networks.remove(ssid);
            if state.station.as_deref() == Some(ssid) {
                state.station = None;
                true
            } else {
                false
            }
        };
        if lost {
            self.post(LinkEvent::LinkLost(DisconnectReason::BeaconTimeout));
        }
    }

    /// Drop the current association, as a driver reports a disconnect.
    pub fn drop_link(&self, reason: DisconnectReason) {
        let was_associated = lock(&self.state).station.take().is_some();
        if was_associated {
            self.post(LinkEvent::LinkLost(reason));
        }
    }

    /// Report a client on the access point.
    pub fn client_event(&self, mac: MacAddress, joined: bool) {
        self.post(if joined {
            LinkEvent::ApClientJoined(mac)
        } else {
            LinkEvent::ApClientLeft(mac)
        });
    }

    pub fn fail_scans(&self, fail: bool) {
        lock(&self.state).scan_fails = fail;
    }

    pub fn access_point_ssid(&self) -> Option<String> {
        lock(&self.state).access_point.clone()
    }

    pub fn station_ssid(&self) -> Option<String> {
        lock(&self.state).station.clone()
    }
}

impl Radio for SimulatedRadio {
    fn start_access_point(&self, credentials: &NetworkCredentials) -> Result<(), RadioError> {
        lock(&self.state).access_point = Some(credentials.ssid().to_string());
        info!("[sim] Access point {:?} up on {}", credentials.ssid(), ACCESS_POINT_IP);
        Ok(())
    }

    fn stop_access_point(&self) -> Result<(), RadioError> {
        lock(&self.state).access_point = None;
        info!("[sim] Access point down");
        Ok(())
    }

    fn join(&self, credentials: &NetworkCredentials) -> Result<(), RadioError> {
        let outcome = {
            let mut state = lock(&self.state);
            let known = state.networks.get(credentials.ssid()).cloned();
            match known {
                None => Err(DisconnectReason::NoNetworkFound),
                Some(passphrase) if passphrase != credentials.passphrase() => {
                    Err(DisconnectReason::AuthFailed)
                }
                Some(_) => {
                    state.station = Some(credentials.ssid().to_string());
                    Ok(())
                }
            }
        };

        match outcome {
            Ok(()) => {
                info!("[sim] Associated with {:?}", credentials.ssid());
                self.post(LinkEvent::Associated);
            }
            Err(reason) => {
                info!("[sim] Join {:?} failed: {:?}", credentials.ssid(), reason);
                self.post(LinkEvent::LinkLost(reason));
            }
        }
        Ok(())
    }

    fn apply_ip_config(&self, config: &IpConfig) -> Result<(), RadioError> {
        lock(&self.state).ip_config = *config;
        debug!("[sim] IP configuration {:?}", config);
        Ok(())
    }

    fn mode(&self) -> RadioMode {
        let state = lock(&self.state);
        match (state.access_point.is_some(), state.station.is_some()) {
            (true, true) => RadioMode::Dual,
            (true, false) => RadioMode::AccessPoint,
            (false, true) => RadioMode::Station,
            (false, false) => RadioMode::Off,
        }
    }

    fn station_ip(&self) -> Option<Ipv4Addr> {
        let state = lock(&self.state);
        state.station.as_ref()?;
        Some(match state.ip_config {
            IpConfig::Static(fixed) => fixed.address,
            IpConfig::Dhcp => DHCP_LEASE,
        })
    }

    fn access_point_ip(&self) -> Option<Ipv4Addr> {
        lock(&self.state)
            .access_point
            .as_ref()
            .map(|_| ACCESS_POINT_IP)
    }

    fn mac_address(&self) -> MacAddress {
        self.mac
    }

    fn scan(&self) -> Result<Vec<String>, RadioError> {
        let state = lock(&self.state);
        if state.scan_fails {
            return Err(RadioError::Scan("scan timed out".to_string()));
        }
        let mut ssids: Vec<String> = state.networks.keys().cloned().collect();
        ssids.sort();
        Ok(ssids)
    }
}

/// Samples averaged per reading.
const MULTISAMPLES: u32 = 64;

/// 12-bit ADC producing a slow triangle wave, calibrated to millivolts.
#[derive(Debug, Default)]
pub struct SimulatedAdc {
    step: AtomicU32,
}

impl SimulatedAdc {
    pub fn new() -> Self {
        Self::default()
    }

    fn raw(step: u32) -> u32 {
        // 0..=4095 and back over 8190 steps.
        let phase = step % 8190;
        if phase < 4096 {
            phase
        } else {
            8190 - phase
        }
    }

    /// Linear calibration of a raw 12-bit value at 11 dB attenuation.
    fn to_millivolts(raw: u32) -> i32 {
        (raw as i64 * 3100 / 4095 + 142) as i32
    }
}

impl SensorSource for SimulatedAdc {
    fn read(&self) -> Result<i32, SensorError> {
        let start = self.step.fetch_add(MULTISAMPLES, Ordering::Relaxed);
        let sum: u64 = (0..MULTISAMPLES)
            .map(|i| Self::raw(start.wrapping_add(i)) as u64)
            .sum();
        Ok(Self::to_millivolts((sum / MULTISAMPLES as u64) as u32))
    }
}

/// In-memory digital pins.
#[derive(Debug, Default)]
pub struct MemoryPins {
    levels: Mutex<HashMap<u32, bool>>,
}

/// GPIO numbers above this do not exist on the target.
const MAX_GPIO: u32 = 39;

impl MemoryPins {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DigitalPins for MemoryPins {
    fn set_level(&self, pin: u32, high: bool) -> Result<(), GpioError> {
        if pin > MAX_GPIO {
            return Err(GpioError::InvalidPin(pin));
        }
        lock(&self.levels).insert(pin, high);
        info!("[sim] GPIO {} -> {}", pin, u8::from(high));
        Ok(())
    }

    fn level(&self, pin: u32) -> Result<bool, GpioError> {
        if pin > MAX_GPIO {
            return Err(GpioError::InvalidPin(pin));
        }
        Ok(lock(&self.levels).get(&pin).copied().unwrap_or(false))
    }
}

/// Status LED that logs color changes.
#[derive(Debug, Default)]
pub struct LoggingLed {
    last: Mutex<Option<Rgb>>,
}

impl LoggingLed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn color(&self) -> Option<Rgb> {
        *lock(&self.last)
    }
}

impl StatusLed for LoggingLed {
    fn show(&self, color: Rgb) {
        let mut last = lock(&self.last);
        if *last != Some(color) {
            info!("[sim] Status LED #{:02x}{:02x}{:02x}", color.r, color.g, color.b);
            *last = Some(color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ConnectivityController;

    fn creds(ssid: &str, pass: &str) -> NetworkCredentials {
        NetworkCredentials::new(ssid, pass).unwrap()
    }

    #[test]
    fn test_join_outcomes() {
        let (tx, mut rx) = ConnectivityController::channel();
        let radio = SimulatedRadio::new(tx, &[creds("home", "secret")]);

        radio.join(&creds("home", "wrong")).unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            LinkEvent::LinkLost(DisconnectReason::AuthFailed)
        );

        radio.join(&creds("cafe", "secret")).unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            LinkEvent::LinkLost(DisconnectReason::NoNetworkFound)
        );

        radio.join(&creds("home", "secret")).unwrap();
        assert_eq!(rx.try_recv().unwrap(), LinkEvent::Associated);
        assert_eq!(radio.station_ip(), Some(DHCP_LEASE));
        assert_eq!(radio.mode(), RadioMode::Station);
    }

    #[test]
    fn test_mode_tracks_radios() {
        let (tx, _rx) = ConnectivityController::channel();
        let radio = SimulatedRadio::new(tx, &[creds("home", "secret")]);
        assert_eq!(radio.mode(), RadioMode::Off);

        radio.start_access_point(&creds("SensorLink", "sensorlink")).unwrap();
        assert_eq!(radio.mode(), RadioMode::AccessPoint);
        assert_eq!(radio.access_point_ip(), Some(ACCESS_POINT_IP));

        radio.join(&creds("home", "secret")).unwrap();
        assert_eq!(radio.mode(), RadioMode::Dual);

        radio.drop_link(DisconnectReason::BeaconTimeout);
        assert_eq!(radio.mode(), RadioMode::AccessPoint);
        assert_eq!(radio.station_ip(), None);
    }

    #[test]
    fn test_scan_sorted_and_failable() {
        let (tx, _rx) = ConnectivityController::channel();
        let radio = SimulatedRadio::new(tx, &[creds("zeta", "password"), creds("alpha", "password")]);
        assert_eq!(radio.scan().unwrap(), vec!["alpha", "zeta"]);

        radio.fail_scans(true);
        assert!(matches!(radio.scan(), Err(RadioError::Scan(_))));
    }

    #[test]
    fn test_adc_stays_in_calibrated_range() {
        let adc = SimulatedAdc::new();
        for _ in 0..500 {
            let mv = adc.read().unwrap();
            assert!((142..=3242).contains(&mv), "{mv} out of range");
        }
    }

    #[test]
    fn test_pins() {
        let pins = MemoryPins::new();
        assert!(!pins.level(22).unwrap());
        pins.set_level(22, true).unwrap();
        assert!(pins.level(22).unwrap());
        assert_eq!(pins.set_level(99, true), Err(GpioError::InvalidPin(99)));
    }
}
