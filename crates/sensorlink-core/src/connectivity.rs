//! Connectivity state machine.
//!
//! The machine decides which radios should be up and when to (re)join the
//! configured network. It performs no I/O: each call returns a
//! [`Transition`] listing the [`Effect`]s the caller must execute, in order.
//!
//! ```text
//!                 boot, no creds
//!  UNCONFIGURED ─────────────────▶ AP_ONLY
//!       │
//!       │ boot, creds
//!       ▼          associated                    link lost
//!  STA_CONNECTING ───────────▶ STA_CONNECTED ─────────────▶ DUAL_FALLBACK
//!       │                            ▲                          │  ▲
//!       │ link lost                  └──────── associated ──────┘  │
//!       └──────────────────────────────────────────────────────────┘
//!                                     reconnect due / link lost ⟲
//! ```
//!
//! Saving new station credentials is handled by persisting them and
//! restarting; the machine is rebuilt from the store on the next boot.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::{ConnectivityState, IpConfig, MacAddress, NetworkCredentials};

/// Why the station link went down. Informational only: every reason gets the
/// same fallback and retry treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DisconnectReason {
    AuthFailed,
    NoNetworkFound,
    BeaconTimeout,
    Other,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Station associated with the configured network.
    Associated,
    /// Station link dropped, or a join attempt failed.
    LinkLost(DisconnectReason),
    /// A reconnect timer scheduled by [`Effect::ScheduleReconnect`] expired.
    ReconnectDue { attempt: u64 },
    /// A client joined the device's access point.
    ApClientJoined(MacAddress),
    /// A client left the device's access point.
    ApClientLeft(MacAddress),
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartAccessPoint(NetworkCredentials),
    StopAccessPoint,
    Join(NetworkCredentials),
    ApplyIpConfig(IpConfig),
    /// Deliver `LinkEvent::ReconnectDue { attempt }` after `delay`.
    ScheduleReconnect { attempt: u64, delay: Duration },
}

/// Result of feeding the machine one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: ConnectivityState,
    pub to: ConnectivityState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(state: ConnectivityState) -> Self {
        Self {
            from: state,
            to: state,
            effects: Vec::new(),
        }
    }

    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// The connectivity state machine.
#[derive(Debug, Clone)]
pub struct ConnectivityMachine {
    state: ConnectivityState,
    station: Option<NetworkCredentials>,
    access_point: NetworkCredentials,
    ip_config: IpConfig,
    reconnect_delay: Duration,
    access_point_up: bool,
    /// Attempt number of the only reconnect timer that is still honored.
    pending_attempt: Option<u64>,
    attempts_scheduled: u64,
}

impl ConnectivityMachine {
    pub fn new(
        access_point: NetworkCredentials,
        ip_config: IpConfig,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            state: ConnectivityState::Unconfigured,
            station: None,
            access_point,
            ip_config,
            reconnect_delay,
            access_point_up: false,
            pending_attempt: None,
            attempts_scheduled: 0,
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    pub fn access_point_up(&self) -> bool {
        self.access_point_up
    }

    /// Number of reconnect attempts scheduled since boot.
    pub fn attempts_scheduled(&self) -> u64 {
        self.attempts_scheduled
    }

    /// Make the boot decision from the stored station credentials.
    /// A no-op once booted.
    pub fn boot(&mut self, station: Option<NetworkCredentials>) -> Transition {
        if self.state != ConnectivityState::Unconfigured {
            return Transition::stay(self.state);
        }
        self.station = station;

        let mut effects = vec![self.start_access_point()];
        let to = match &self.station {
            Some(station) => {
                effects.push(Effect::Join(station.clone()));
                ConnectivityState::StaConnecting
            }
            None => ConnectivityState::ApOnly,
        };
        self.move_to(to, effects)
    }

    /// Feed one link event.
    pub fn on_event(&mut self, event: LinkEvent) -> Transition {
        use ConnectivityState::*;

        match (self.state, event) {
            (StaConnecting | DualFallback, LinkEvent::Associated) => {
                self.pending_attempt = None;
                let mut effects = vec![Effect::ApplyIpConfig(self.ip_config)];
                if self.access_point_up {
                    self.access_point_up = false;
                    effects.push(Effect::StopAccessPoint);
                }
                self.move_to(StaConnected, effects)
            }

            (StaConnecting | StaConnected | DualFallback, LinkEvent::LinkLost(_)) => {
                let mut effects = Vec::new();
                if !self.access_point_up {
                    effects.push(self.start_access_point());
                }
                effects.push(self.schedule_reconnect());
                self.move_to(DualFallback, effects)
            }

            (DualFallback, LinkEvent::ReconnectDue { attempt })
                if self.pending_attempt == Some(attempt) =>
            {
                self.pending_attempt = None;
                match &self.station {
                    Some(station) => {
                        let effects = vec![Effect::Join(station.clone())];
                        self.move_to(DualFallback, effects)
                    }
                    None => Transition::stay(self.state),
                }
            }

            // Duplicates, stale timers, events for radios that are not in use,
            // and access point client traffic leave the state alone.
            _ => Transition::stay(self.state),
        }
    }

    fn start_access_point(&mut self) -> Effect {
        self.access_point_up = true;
        Effect::StartAccessPoint(self.access_point.clone())
    }

    fn schedule_reconnect(&mut self) -> Effect {
        self.attempts_scheduled += 1;
        let attempt = self.attempts_scheduled;
        self.pending_attempt = Some(attempt);
        Effect::ScheduleReconnect {
            attempt,
            delay: self.reconnect_delay,
        }
    }

    fn move_to(&mut self, to: ConnectivityState, effects: Vec<Effect>) -> Transition {
        let from = self.state;
        self.state = to;
        Transition { from, to, effects }
    }
}
