//! Status LED task.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use sensorlink_core::hal::{Rgb, StatusLed};
use sensorlink_core::ConnectivityState;

use crate::controller::StateSnapshot;

/// Red while booting, green when joined, blue whenever the access point is
/// the way in.
pub fn color_for(state: ConnectivityState) -> Rgb {
    match state {
        ConnectivityState::Unconfigured => Rgb::RED,
        ConnectivityState::StaConnected => Rgb::GREEN,
        ConnectivityState::ApOnly
        | ConnectivityState::StaConnecting
        | ConnectivityState::DualFallback => Rgb::BLUE,
    }
}

/// Mirror the connectivity state on the LED until the controller goes away.
pub async fn run_status_led(led: Arc<dyn StatusLed>, mut state: watch::Receiver<StateSnapshot>) {
    loop {
        let current = state.borrow_and_update().state;
        led.show(color_for(current));
        if state.changed().await.is_err() {
            debug!("Status LED task stopping");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingLed {
        shown: Mutex<Vec<Rgb>>,
    }

    impl StatusLed for RecordingLed {
        fn show(&self, color: Rgb) {
            self.shown.lock().unwrap().push(color);
        }
    }

    #[test]
    fn test_colors() {
        assert_eq!(color_for(ConnectivityState::Unconfigured), Rgb::RED);
        assert_eq!(color_for(ConnectivityState::StaConnected), Rgb::GREEN);
        assert_eq!(color_for(ConnectivityState::DualFallback), Rgb::BLUE);
        assert_eq!(color_for(ConnectivityState::ApOnly), Rgb::BLUE);
    }

    #[tokio::test]
    async fn test_led_follows_state() {
        let (tx, rx) = watch::channel(StateSnapshot {
            state: ConnectivityState::Unconfigured,
            since: Utc::now(),
        });
        let led = Arc::new(RecordingLed::default());
        let task = tokio::spawn(run_status_led(led.clone(), rx));

        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send_replace(StateSnapshot {
            state: ConnectivityState::StaConnected,
            since: Utc::now(),
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(tx);
        task.await.unwrap();

        assert_eq!(*led.shown.lock().unwrap(), vec![Rgb::RED, Rgb::GREEN]);
    }
}
