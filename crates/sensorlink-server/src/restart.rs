//! In-process restart.
//!
//! On the host a "device restart" tears down every task and re-runs the boot
//! sequence from the persisted config store. Request handlers trigger it
//! through the [`Restarter`] trait; the boot loop waits on a
//! [`RestartListener`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use sensorlink_core::hal::Restarter;

/// Restart trigger shared with request handlers.
#[derive(Debug, Clone)]
pub struct RestartSignal {
    tx: Arc<watch::Sender<u64>>,
}

/// Waits for restart requests.
#[derive(Debug)]
pub struct RestartListener {
    rx: watch::Receiver<u64>,
}

impl RestartSignal {
    pub fn new() -> (Self, RestartListener) {
        let (tx, rx) = watch::channel(0);
        (Self { tx: Arc::new(tx) }, RestartListener { rx })
    }

    /// Request a restart now.
    pub fn trigger(&self) {
        self.tx.send_modify(|generation| *generation += 1);
    }
}

impl Restarter for RestartSignal {
    fn restart_after(&self, delay: Duration) {
        info!("Restart requested in {:?}", delay);
        let signal = self.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    signal.trigger();
                });
            }
            Err(_) => {
                warn!("No runtime for delayed restart, restarting now");
                signal.trigger();
            }
        }
    }
}

impl RestartListener {
    /// Resolve on the next restart request. Returns false if every
    /// [`RestartSignal`] was dropped.
    pub async fn requested(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_restart_fires_after_delay() {
        let (signal, mut listener) = RestartSignal::new();
        signal.restart_after(Duration::from_millis(1000));

        let early = tokio::time::timeout(Duration::from_millis(900), listener.requested()).await;
        assert!(early.is_err());

        let fired = tokio::time::timeout(Duration::from_millis(200), listener.requested()).await;
        assert_eq!(fired, Ok(true));
    }

    #[tokio::test]
    async fn test_listener_sees_dropped_signal() {
        let (signal, mut listener) = RestartSignal::new();
        drop(signal);
        assert!(!listener.requested().await);
    }
}
