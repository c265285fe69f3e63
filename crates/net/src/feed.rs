//! Change feed subscriptions
//!
//! A subscription yields session events in the order the hub applied the
//! writes. It is either attached directly to an in-process hub or fed by a
//! client connection.

use nightcap_core::SessionEvent;
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

enum Source {
    Local(broadcast::Receiver<SessionEvent>),
    Remote(mpsc::Receiver<SessionEvent>),
}

/// Live change feed. Dropping it unsubscribes.
pub struct Subscription {
    source: Source,
}

impl Subscription {
    pub(crate) fn local(rx: broadcast::Receiver<SessionEvent>) -> Self {
        Self {
            source: Source::Local(rx),
        }
    }

    pub(crate) fn remote(rx: mpsc::Receiver<SessionEvent>) -> Self {
        Self {
            source: Source::Remote(rx),
        }
    }

    /// Next event, or `None` once the feed has ended
    pub async fn next(&mut self) -> Option<SessionEvent> {
        match &mut self.source {
            Source::Local(rx) => loop {
                match rx.recv().await {
                    Ok(event) => return Some(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Every event carries the full record, so the next
                        // one brings the view up to date again
                        warn!(skipped, "Change feed lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            },
            Source::Remote(rx) => rx.recv().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightcap_core::Session;

    #[tokio::test]
    async fn test_lagging_subscriber_keeps_receiving() {
        let (tx, rx) = broadcast::channel(2);
        let mut sub = Subscription::local(rx);

        let sessions: Vec<_> = (0..4)
            .map(|_| Session::new_current(Vec::new(), None))
            .collect();
        for s in &sessions {
            tx.send(SessionEvent::Changed(s.clone())).unwrap();
        }

        match sub.next().await {
            Some(SessionEvent::Changed(s)) => assert_eq!(s.id, sessions[2].id),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_feed_ends_when_source_closes() {
        let (tx, rx) = mpsc::channel(1);
        let mut sub = Subscription::remote(rx);
        drop(tx);
        assert!(sub.next().await.is_none());
    }
}
