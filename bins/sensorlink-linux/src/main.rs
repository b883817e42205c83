use std::sync::Arc;
use std::time::Duration;

use futures::future::select_all;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sensorlink_core::{
    ConnectivityMachine, DeviceSettings, DirectoryAssets, FileStore, KeyValueStore, MemoryStore,
    NetworkConfig, NetworkCredentials,
};
use sensorlink_server::sim::{LoggingLed, MemoryPins, SimulatedAdc, SimulatedRadio};
use sensorlink_server::{
    run_status_led, BroadcasterConfig, ClientRegistry, ConnectivityController, RestartSignal,
    TelemetryBroadcaster,
};
use sensorlink_web::{create_router, HttpServer, ServerState};

const BUILD_ID: &str = env!("SENSORLINK_BUILD_ID");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,sensorlink_server=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("SensorLink {} starting...", BUILD_ID);

    let settings = DeviceSettings::from_env()?;
    let (restart, mut restarts) = RestartSignal::new();

    // Every pass is one "power cycle": state is rebuilt from the store.
    let mut boots = 0u64;
    loop {
        boots += 1;
        tracing::info!("Boot #{}", boots);
        let mut device = boot(&settings, &restart).await?;

        let restart_requested = tokio::select! {
            requested = restarts.requested() => requested,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down...");
                false
            }
            name = device.any_stopped() => {
                tracing::error!("{} task stopped unexpectedly", name);
                false
            }
        };

        device.shutdown().await;
        if !restart_requested {
            break;
        }
        tracing::info!("Restarting...");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Tasks making up one running device.
struct Device {
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    http: HttpServer,
    registry: Arc<ClientRegistry>,
    /// How long in-flight requests may run once shutdown starts.
    grace: Duration,
}

impl Device {
    /// Resolve with the name of the first task that ends. The finished
    /// task is removed so it is not awaited twice.
    async fn any_stopped(&mut self) -> &'static str {
        let index = tokio::select! {
            (_, index, _) = select_all(self.tasks.iter_mut().map(|(_, task)| task)) => index,
            _ = self.http.stopped() => return "HTTP",
        };
        self.tasks.remove(index).0
    }

    async fn shutdown(self) {
        // Open WebSocket connections outlive the listener; closing their
        // queues ends them.
        let dropped = self.registry.clear();
        if dropped > 0 {
            tracing::info!("Disconnected {} telemetry client(s)", dropped);
        }
        // Keep-alive connections must not outlive the boot that owns their
        // state, and the listener must be free before the next boot binds it.
        self.http.shutdown(self.grace).await;

        for (_, task) in &self.tasks {
            task.abort();
        }
        for (name, task) in self.tasks {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::warn!("{} task failed: {}", name, e);
                }
            }
        }
    }
}

/// Run the boot sequence from the persisted configuration.
async fn boot(settings: &DeviceSettings, restart: &RestartSignal) -> anyhow::Result<Device> {
    let store: Arc<dyn KeyValueStore> = match FileStore::open(&settings.store_dir) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::warn!("Config store unavailable, running on defaults: {}", e);
            Arc::new(MemoryStore::new())
        }
    };
    let config = NetworkConfig::new(store, settings.default_access_point()?);

    let networks: Vec<NetworkCredentials> = settings
        .simulated_networks
        .iter()
        .filter_map(|entry| match entry.credentials() {
            Ok(creds) => Some(creds),
            Err(e) => {
                tracing::warn!("Ignoring simulated network {:?}: {}", entry.ssid, e);
                None
            }
        })
        .collect();

    let channel = ConnectivityController::channel();
    let radio = Arc::new(SimulatedRadio::new(channel.0.clone(), &networks));
    let machine = ConnectivityMachine::new(
        config.access_point_credentials(),
        config.ip_config(),
        settings.reconnect_delay(),
    );
    let controller = ConnectivityController::new(machine, radio.clone(), channel);
    let handle = controller.handle();

    let registry = Arc::new(ClientRegistry::new());
    let pins = Arc::new(MemoryPins::new());
    let broadcaster = TelemetryBroadcaster::new(
        BroadcasterConfig {
            interval: settings.sample_interval(),
            monitored_pin: settings.monitored_pin,
        },
        registry.clone(),
        Arc::new(SimulatedAdc::new()),
        pins.clone(),
    );

    let state = Arc::new(ServerState {
        build_id: BUILD_ID.to_string(),
        config: config.clone(),
        controller: handle.clone(),
        radio,
        pins,
        assets: Arc::new(DirectoryAssets::new(&settings.assets_dir)),
        registry: registry.clone(),
        restarter: Arc::new(restart.clone()),
        restart_delay: settings.restart_delay(),
        client_queue_depth: settings.client_queue_depth,
        client_send_timeout: settings.request_timeout(),
    });
    let app = create_router(state, settings.request_timeout());

    let listener = tokio::net::TcpListener::bind(settings.http_addr).await?;
    let http = HttpServer::spawn(listener, app)?;
    tracing::info!("HTTP server listening on {}", http.local_addr());

    let station = config.station_credentials();
    let tasks = vec![
        ("Connectivity", tokio::spawn(controller.run(station))),
        (
            "Status LED",
            tokio::spawn(run_status_led(Arc::new(LoggingLed::new()), handle.subscribe())),
        ),
        ("Telemetry", tokio::spawn(broadcaster.run())),
    ];

    tracing::info!("SensorLink ready!");
    tracing::info!("   Pages:     http://{}/", settings.http_addr);
    tracing::info!("   Telemetry: ws://{}/ws", settings.http_addr);

    Ok(Device {
        tasks,
        http,
        registry,
        grace: settings.request_timeout(),
    })
}
