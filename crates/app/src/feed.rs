//! Change feed listener
//!
//! Keeps the local mirror in step with every write any client makes.

use nightcap_core::{SessionEvent, SessionMirror};
use nightcap_net::Subscription;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Apply feed events to `mirror` until the feed ends or `shutdown` fires
pub async fn follow(
    mut feed: Subscription,
    mirror: SessionMirror,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            event = feed.next() => {
                let Some(event) = event else {
                    warn!("Change feed ended, the view will no longer update");
                    break;
                };
                let changed = mirror.apply(&event);
                match &event {
                    SessionEvent::Archived { id, .. } if changed => {
                        info!(session_id = %id, "Current session was archived");
                    }
                    _ => debug!(changed, "Feed event applied"),
                }
            }
            _ = shutdown.recv() => {
                debug!("Feed listener shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightcap_core::{SessionRepository, Tracker};
    use nightcap_net::Hub;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_other_clients_writes_reach_the_mirror() {
        let hub = Arc::new(Hub::open_in_memory().unwrap());
        let mirror = SessionMirror::new();
        let (shutdown_tx, _) = broadcast::channel(1);
        let listener = tokio::spawn(follow(
            hub.subscribe(),
            mirror.clone(),
            shutdown_tx.subscribe(),
        ));

        let other = Tracker::new(hub.clone(), SessionMirror::new());
        other.add_person("Ann").unwrap();

        while mirror.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(mirror.people()[0].name, "Ann");

        other.end_session().unwrap();
        while !mirror.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(hub.current_session().unwrap().is_none());

        shutdown_tx.send(()).unwrap();
        listener.await.unwrap();
    }
}
