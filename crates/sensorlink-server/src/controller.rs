//! Connectivity controller.
//!
//! Owns the [`ConnectivityMachine`] and serializes every link event through
//! one queue, so only one transition is in flight at a time. Effects run
//! against the radio in the order the machine lists them. Reconnect timers
//! post `ReconnectDue` back into the same queue.
//!
//! Readers never touch the machine: they watch a [`StateSnapshot`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use sensorlink_core::hal::Radio;
use sensorlink_core::{
    ConnectivityMachine, ConnectivityState, DisconnectReason, Effect, LinkEvent,
    NetworkCredentials, Transition,
};

/// Sending half of the link event queue. Safe to use from driver callbacks:
/// posting never blocks.
pub type LinkEventSender = mpsc::UnboundedSender<LinkEvent>;
pub type LinkEventReceiver = mpsc::UnboundedReceiver<LinkEvent>;

/// Current connectivity state and when it was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSnapshot {
    pub state: ConnectivityState,
    pub since: DateTime<Utc>,
}

/// Cheap, cloneable view of a running controller.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    events: LinkEventSender,
    state: watch::Receiver<StateSnapshot>,
}

impl ControllerHandle {
    pub fn state(&self) -> ConnectivityState {
        self.state.borrow().state
    }

    pub fn snapshot(&self) -> StateSnapshot {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.state.clone()
    }

    /// Post a link event. Returns false once the controller has stopped.
    pub fn post(&self, event: LinkEvent) -> bool {
        self.events.send(event).is_ok()
    }
}

/// Drives the radio from link events.
pub struct ConnectivityController {
    machine: ConnectivityMachine,
    radio: Arc<dyn Radio>,
    events_tx: LinkEventSender,
    events_rx: LinkEventReceiver,
    state_tx: watch::Sender<StateSnapshot>,
}

impl ConnectivityController {
    /// Create the event queue. The sender can be handed to the radio driver
    /// before the controller exists.
    pub fn channel() -> (LinkEventSender, LinkEventReceiver) {
        mpsc::unbounded_channel()
    }

    pub fn new(
        machine: ConnectivityMachine,
        radio: Arc<dyn Radio>,
        (events_tx, events_rx): (LinkEventSender, LinkEventReceiver),
    ) -> Self {
        let (state_tx, _) = watch::channel(StateSnapshot {
            state: machine.state(),
            since: Utc::now(),
        });
        Self {
            machine,
            radio,
            events_tx,
            events_rx,
            state_tx,
        }
    }

    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            events: self.events_tx.clone(),
            state: self.state_tx.subscribe(),
        }
    }

    /// Make the boot decision, then process link events until every sender
    /// is gone. The controller keeps one sender for its own timers, so in
    /// practice this runs until the task is aborted.
    pub async fn run(mut self, station: Option<NetworkCredentials>) {
        match &station {
            Some(creds) => info!("Station credentials found for {:?}, joining", creds.ssid()),
            None => info!("No station credentials, starting access point only"),
        }
        let boot = self.machine.boot(station);
        self.apply(boot);

        while let Some(event) = self.events_rx.recv().await {
            log_event(&event);
            let transition = self.machine.on_event(event);
            self.apply(transition);
        }
        debug!("Link event queue closed");
    }

    fn apply(&mut self, transition: Transition) {
        for effect in transition.effects {
            self.execute(effect);
        }
        if transition.from != transition.to {
            info!("Connectivity {} -> {}", transition.from, transition.to);
            self.state_tx.send_replace(StateSnapshot {
                state: transition.to,
                since: Utc::now(),
            });
        }
    }

    fn execute(&self, effect: Effect) {
        match effect {
            Effect::StartAccessPoint(creds) => {
                info!("Starting access point {:?}", creds.ssid());
                if let Err(e) = self.radio.start_access_point(&creds) {
                    warn!("Failed to start access point: {}", e);
                }
            }
            Effect::StopAccessPoint => {
                info!("Stopping access point");
                if let Err(e) = self.radio.stop_access_point() {
                    warn!("Failed to stop access point: {}", e);
                }
            }
            Effect::Join(creds) => {
                info!("Joining {:?}", creds.ssid());
                if let Err(e) = self.radio.join(&creds) {
                    warn!("Join failed to start: {}", e);
                    let _ = self
                        .events_tx
                        .send(LinkEvent::LinkLost(DisconnectReason::Other));
                }
            }
            Effect::ApplyIpConfig(config) => {
                debug!("Applying IP configuration {:?}", config);
                if let Err(e) = self.radio.apply_ip_config(&config) {
                    warn!("Failed to apply IP configuration: {}", e);
                }
            }
            Effect::ScheduleReconnect { attempt, delay } => {
                info!("Reconnect attempt {} in {:?}", attempt, delay);
                let events = self.events_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = events.send(LinkEvent::ReconnectDue { attempt });
                });
            }
        }
    }
}

fn log_event(event: &LinkEvent) {
    match event {
        LinkEvent::Associated => info!("Station associated"),
        LinkEvent::LinkLost(reason) => warn!("Station link lost ({:?})", reason),
        LinkEvent::ReconnectDue { attempt } => debug!("Reconnect attempt {} due", attempt),
        LinkEvent::ApClientJoined(mac) => info!("Client {} joined access point", mac),
        LinkEvent::ApClientLeft(mac) => info!("Client {} left access point", mac),
    }
}
