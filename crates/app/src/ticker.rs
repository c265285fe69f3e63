//! Cooldown ticker
//!
//! Recomputes the dice cooldown from the mirror once a second and
//! publishes it, so the console can show a countdown and announce when
//! rolling is allowed again.

use std::time::Duration;

use chrono::Utc;
use nightcap_core::{CooldownState, CooldownStatus, SessionMirror};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// True when a tick moves the cooldown from Cooling back to Idle
pub fn became_ready(previous: CooldownStatus, next: CooldownStatus) -> bool {
    previous.state == CooldownState::Cooling && next.state == CooldownState::Idle
}

/// Start the ticker on `runtime`. It stops when `shutdown` fires.
pub fn spawn(
    runtime: &Handle,
    mirror: SessionMirror,
    shutdown: broadcast::Receiver<()>,
) -> (watch::Receiver<CooldownStatus>, JoinHandle<()>) {
    let initial = CooldownStatus::evaluate(mirror.last_roll_time(), Utc::now());
    let (status_tx, status_rx) = watch::channel(initial);
    let handle = runtime.spawn(ticker_task(mirror, status_tx, shutdown));
    (status_rx, handle)
}

async fn ticker_task(
    mirror: SessionMirror,
    status_tx: watch::Sender<CooldownStatus>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(TICK_INTERVAL);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let next = CooldownStatus::evaluate(mirror.last_roll_time(), Utc::now());
                let previous = *status_tx.borrow();
                if became_ready(previous, next) {
                    info!("Roll cooldown over");
                    println!("\nThe dice are ready to roll again.");
                }
                status_tx.send_replace(next);
            }
            _ = shutdown.recv() => {
                debug!("Ticker shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightcap_core::Session;

    #[test]
    fn test_only_cooling_to_idle_is_announced() {
        let cooling = CooldownStatus {
            state: CooldownState::Cooling,
            remaining: Duration::from_secs(30),
        };
        assert!(became_ready(cooling, CooldownStatus::IDLE));
        assert!(!became_ready(CooldownStatus::IDLE, CooldownStatus::IDLE));
        assert!(!became_ready(CooldownStatus::IDLE, cooling));
        assert!(!became_ready(cooling, cooling));
    }

    #[tokio::test]
    async fn test_ticker_tracks_mirror_and_stops() {
        let mirror = SessionMirror::new();
        let (shutdown_tx, _) = broadcast::channel(1);
        let (mut status, handle) = spawn(
            &Handle::current(),
            mirror.clone(),
            shutdown_tx.subscribe(),
        );
        assert!(status.borrow().can_roll());

        mirror.replace(Session::new_current(Vec::new(), Some(Utc::now())));
        status.changed().await.unwrap();
        while status.borrow_and_update().can_roll() {
            status.changed().await.unwrap();
        }
        assert_eq!(status.borrow().state, CooldownState::Cooling);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
