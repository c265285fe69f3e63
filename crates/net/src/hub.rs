//! Session hub: the shared repository plus its change feed
//!
//! The hub owns the one database every client writes to. Each successful
//! write to the current session is published to all subscribers, in write
//! order, as a full record. Writes are applied exactly as sent: nothing here
//! compares what a client last saw with what is stored.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use nightcap_core::invariants::assert_single_current;
use nightcap_core::{
    Database, Error as CoreError, IdentityRepository, Result as CoreResult, Session,
    SessionEvent, SessionRepository, SessionUpdate, UserIdentity,
};
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use crate::feed::Subscription;
use crate::protocol::{Reply, Request};

/// Events buffered per subscriber before it starts lagging
const FEED_CAPACITY: usize = 256;

pub struct Hub {
    db: Mutex<Database>,
    events: broadcast::Sender<SessionEvent>,
}

impl Hub {
    pub fn new(db: Database) -> Self {
        let (events, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            db: Mutex::new(db),
            events,
        }
    }

    /// Hub over a database file
    pub fn open<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    /// Hub over an in-memory database (for testing)
    pub fn open_in_memory() -> CoreResult<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Subscribe to changes of the current session. Dropping the
    /// subscription unsubscribes.
    pub fn subscribe(&self) -> Subscription {
        Subscription::local(self.events.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is not an error
        let delivered = self.events.send(event).unwrap_or(0);
        debug!(subscribers = delivered, "Published session event");
    }

    /// Execute a wire request
    pub fn handle(&self, request: Request) -> CoreResult<Reply> {
        match request {
            Request::CurrentSession => self.current_session().map(Reply::Session),
            Request::ArchivedSessions { limit } => {
                self.archived_sessions(limit).map(Reply::Sessions)
            }
            Request::AllArchivedSessions => self.all_archived_sessions().map(Reply::Sessions),
            Request::InsertSession { session } => {
                self.insert_session(&session).map(Reply::Inserted)
            }
            Request::UpdateSession { id, update } => {
                self.update_session(id, &update).map(|()| Reply::Done)
            }
            Request::ArchiveSession { id, archived_at } => {
                self.archive_session(id, archived_at).map(|()| Reply::Done)
            }
            Request::FindUser { username } => self.find_user(&username).map(Reply::User),
            Request::CreateUser { user } => self.create_user(&user).map(|()| Reply::Done),
        }
    }
}

impl SessionRepository for Hub {
    fn current_session(&self) -> CoreResult<Option<Session>> {
        self.db().current_session()
    }

    fn archived_sessions(&self, limit: u32) -> CoreResult<Vec<Session>> {
        self.db().archived_sessions(limit)
    }

    fn all_archived_sessions(&self) -> CoreResult<Vec<Session>> {
        self.db().all_archived_sessions()
    }

    fn insert_session(&self, session: &Session) -> CoreResult<Session> {
        let db = self.db();
        let stored = db.insert_session(session)?;
        assert_single_current(db.sessions().count_current()?);
        info!(session_id = %stored.id, "Session created");
        if stored.is_current {
            self.publish(SessionEvent::Changed(stored.clone()));
        }
        Ok(stored)
    }

    fn update_session(&self, id: Uuid, update: &SessionUpdate) -> CoreResult<()> {
        let db = self.db();
        db.update_session(id, update)?;
        let stored = db
            .sessions()
            .find_by_id(id)?
            .ok_or_else(|| CoreError::NotFound(format!("session {}", id)))?;
        self.publish(SessionEvent::Changed(stored));
        Ok(())
    }

    fn archive_session(&self, id: Uuid, archived_at: DateTime<Utc>) -> CoreResult<()> {
        let db = self.db();
        db.archive_session(id, archived_at)?;
        info!(session_id = %id, "Session archived");
        self.publish(SessionEvent::Archived { id, archived_at });
        Ok(())
    }
}

impl IdentityRepository for Hub {
    fn find_user(&self, username: &str) -> CoreResult<Option<UserIdentity>> {
        self.db().find_user(username)
    }

    fn create_user(&self, user: &UserIdentity) -> CoreResult<()> {
        self.db().create_user(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightcap_core::{Participant, SessionMirror, Tracker};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_every_write_is_published() {
        let hub = Arc::new(Hub::open_in_memory().unwrap());
        let mut sub = hub.subscribe();

        let tracker = Tracker::new(hub.clone(), SessionMirror::new());
        let created = tracker.add_person("Ann").unwrap();
        tracker.add_person("Ben").unwrap();
        tracker.end_session().unwrap();

        match sub.next().await {
            Some(SessionEvent::Changed(s)) => {
                assert_eq!(s.id, created.id);
                assert_eq!(s.people.len(), 1);
            }
            other => panic!("expected insert event, got {:?}", other),
        }
        match sub.next().await {
            Some(SessionEvent::Changed(s)) => assert_eq!(s.people.len(), 2),
            other => panic!("expected update event, got {:?}", other),
        }
        match sub.next().await {
            Some(SessionEvent::Archived { id, .. }) => assert_eq!(id, created.id),
            other => panic!("expected archive event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_write_publishes_nothing() {
        let hub = Arc::new(Hub::open_in_memory().unwrap());
        let session = hub
            .insert_session(&Session::new_current(Vec::new(), None))
            .unwrap();
        hub.archive_session(session.id, Utc::now()).unwrap();

        let mut sub = hub.subscribe();
        let update = SessionUpdate {
            people: vec![Participant::guest("late".into())],
            last_updated: Utc::now(),
            last_roll_time: None,
        };
        assert!(hub.update_session(session.id, &update).is_err());

        hub.insert_session(&Session::new_current(Vec::new(), None))
            .unwrap();
        // The first thing seen is the later insert, not the failed update
        match sub.next().await {
            Some(SessionEvent::Changed(s)) => assert_ne!(s.id, session.id),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_lost_update_is_visible_on_the_feed() {
        let hub = Arc::new(Hub::open_in_memory().unwrap());
        let seed = Tracker::new(hub.clone(), SessionMirror::new());
        seed.add_person("p1").unwrap();
        seed.add_person("p2").unwrap();
        seed.add_person("p3").unwrap();

        let client1 = Tracker::new(hub.clone(), SessionMirror::new());
        let client2 = Tracker::new(hub.clone(), SessionMirror::new());
        client1.load().unwrap();
        client2.load().unwrap();

        let mut observer = hub.subscribe();
        let observer_mirror = SessionMirror::new();

        client1.add_person("x").unwrap();
        client2.add_person("y").unwrap();

        // Both writes reach the feed...
        let first = observer.next().await.unwrap();
        observer_mirror.apply(&first);
        assert!(observer_mirror.people().iter().any(|p| p.name == "x"));

        let second = observer.next().await.unwrap();
        observer_mirror.apply(&second);

        // ...but the stored state and every view end with only y's addition
        let names: Vec<_> = observer_mirror.people().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["p1", "p2", "p3", "y"]);
        let stored = hub.current_session().unwrap().unwrap();
        assert_eq!(stored.people.len(), 4);
        assert!(!stored.people.iter().any(|p| p.name == "x"));
    }

    #[test]
    fn test_handle_routes_requests() {
        let hub = Hub::open_in_memory().unwrap();
        let user = UserIdentity::new("dora", "Dora");
        assert!(matches!(
            hub.handle(Request::CreateUser { user: user.clone() }),
            Ok(Reply::Done)
        ));
        match hub.handle(Request::FindUser {
            username: "DORA".into(),
        }) {
            Ok(Reply::User(Some(found))) => assert_eq!(found, user),
            other => panic!("unexpected reply {:?}", other),
        }
        assert!(matches!(
            hub.handle(Request::CurrentSession),
            Ok(Reply::Session(None))
        ));
    }
}
