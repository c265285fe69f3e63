//! TCP client for a remote session hub
//!
//! One connection task owns the socket. Repository calls from synchronous
//! code are queued to it and wait on a per-request reply channel with a
//! deadline; change feed events are forwarded to the subscriber.

use std::collections::HashMap;
use std::sync::mpsc::{sync_channel, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use nightcap_core::{
    Error as CoreError, IdentityRepository, Result as CoreResult, Session, SessionEvent,
    SessionRepository, SessionUpdate, UserIdentity,
};
use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::feed::Subscription;
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Message, Reply, Request};

/// Events buffered for the subscriber
const EVENT_CAPACITY: usize = 64;

/// How often requests whose caller gave up are dropped
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

type ReplySender = SyncSender<Result<Reply>>;

enum ClientCommand {
    Request {
        request: Request,
        reply_tx: ReplySender,
        timeout: Duration,
    },
    Subscribe(mpsc::Sender<SessionEvent>),
    Send(Message),
    Disconnect,
}

/// Client handle for network operations
pub struct Client {
    state: Arc<RwLock<ConnectionState>>,
    cmd_tx: mpsc::Sender<ClientCommand>,
}

impl Client {
    /// Connect to a hub server (`host:port`)
    pub async fn connect(addr: &str) -> Result<Self> {
        info!(addr = %addr, "Connecting to server");

        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = tokio::io::split(stream);

        let state = Arc::new(RwLock::new(ConnectionState::Connected));
        let (cmd_tx, cmd_rx) = mpsc::channel(64);

        tokio::spawn(connection_task(reader, writer, state.clone(), cmd_rx));

        info!(addr = %addr, "Connected");
        Ok(Client { state, cmd_tx })
    }

    /// Repository handle for synchronous callers. Each call waits at most
    /// `timeout` for the hub's answer.
    ///
    /// The handle blocks the calling thread, so it must not be used from
    /// inside the async runtime.
    pub fn repository(&self, timeout: Duration) -> RemoteRepository {
        RemoteRepository {
            cmd_tx: self.cmd_tx.clone(),
            timeout,
        }
    }

    /// Subscribe to the hub's change feed. A later subscription replaces
    /// this one.
    pub async fn subscribe(&self) -> Result<Subscription> {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);
        self.cmd_tx
            .send(ClientCommand::Subscribe(event_tx))
            .await
            .map_err(|_| Error::NotConnected)?;
        Ok(Subscription::remote(event_rx))
    }

    /// Send a ping
    pub async fn ping(&self) -> Result<()> {
        self.cmd_tx
            .send(ClientCommand::Send(Message::Ping))
            .await
            .map_err(|_| Error::NotConnected)
    }

    /// Disconnect from the server
    pub async fn disconnect(&self) {
        let _ = self.cmd_tx.send(ClientCommand::Disconnect).await;
    }

    /// Get current connection state
    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }
}

/// A request waiting for the hub's answer
struct Pending {
    reply_tx: ReplySender,
    deadline: Instant,
}

/// Per-connection bookkeeping owned by the connection task
struct Connection {
    next_request_id: u64,
    pending: HashMap<u64, Pending>,
    events: Option<mpsc::Sender<SessionEvent>>,
}

impl Connection {
    fn new() -> Self {
        Connection {
            next_request_id: 1,
            pending: HashMap::new(),
            events: None,
        }
    }

    /// Drop requests past their deadline. Their callers have already
    /// reported a timeout, so a late answer has nowhere to go.
    fn expire_pending(&mut self, now: Instant) {
        self.pending.retain(|request_id, pending| {
            let live = pending.deadline > now;
            if !live {
                debug!(request_id, "Expiring unanswered request");
            }
            live
        });
    }

    /// Fail every request still waiting for an answer
    fn fail_pending(&mut self) {
        for (request_id, pending) in self.pending.drain() {
            debug!(request_id, "Dropping pending request");
            let _ = pending.reply_tx.try_send(Err(Error::ConnectionClosed));
        }
    }
}

/// Read frames off the socket and hand them to the connection task
async fn reader_task(mut reader: ReadHalf<TcpStream>, frame_tx: mpsc::Sender<Result<Message>>) {
    loop {
        let result = read_frame(&mut reader).await;
        let stop = result.is_err();
        if frame_tx.send(result).await.is_err() || stop {
            break;
        }
    }
}

/// Main connection task
async fn connection_task(
    reader: ReadHalf<TcpStream>,
    mut writer: WriteHalf<TcpStream>,
    state: Arc<RwLock<ConnectionState>>,
    mut cmd_rx: mpsc::Receiver<ClientCommand>,
) {
    let (frame_tx, mut frame_rx) = mpsc::channel(64);
    let reader_handle = tokio::spawn(reader_task(reader, frame_tx));

    let mut conn = Connection::new();
    let mut sweep = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = sweep.tick() => conn.expire_pending(Instant::now()),

            // Incoming message from server
            frame = frame_rx.recv() => {
                match frame {
                    Some(Ok(msg)) => {
                        if !handle_server_message(msg, &mut conn, &mut writer).await {
                            break;
                        }
                    }
                    Some(Err(Error::ConnectionClosed)) | None => {
                        debug!("Server closed connection");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Read error");
                        break;
                    }
                }
            }

            // Outgoing command
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ClientCommand::Request { request, reply_tx, timeout }) => {
                        let request_id = conn.next_request_id;
                        conn.next_request_id += 1;
                        let msg = Message::Request { request_id, request };
                        if let Err(e) = write_frame(&mut writer, &msg).await {
                            warn!(error = %e, "Write error");
                            let _ = reply_tx.try_send(Err(e));
                            break;
                        }
                        conn.pending.insert(request_id, Pending {
                            reply_tx,
                            deadline: Instant::now() + timeout,
                        });
                    }
                    Some(ClientCommand::Subscribe(event_tx)) => {
                        conn.events = Some(event_tx);
                        if let Err(e) = write_frame(&mut writer, &Message::Subscribe).await {
                            warn!(error = %e, "Write error");
                            break;
                        }
                    }
                    Some(ClientCommand::Send(msg)) => {
                        if let Err(e) = write_frame(&mut writer, &msg).await {
                            warn!(error = %e, "Write error");
                            break;
                        }
                    }
                    Some(ClientCommand::Disconnect) | None => {
                        debug!("Disconnect requested");
                        break;
                    }
                }
            }
        }
    }

    // Cleanup
    reader_handle.abort();
    *state.write().await = ConnectionState::Disconnected;
    conn.fail_pending();
    info!("Disconnected from server");
}

/// Handle a message from the server. Returns false when the connection
/// should end.
async fn handle_server_message(
    msg: Message,
    conn: &mut Connection,
    writer: &mut WriteHalf<TcpStream>,
) -> bool {
    match msg {
        Message::Response { request_id, result } => {
            match conn.pending.remove(&request_id) {
                // The caller may have given up already
                Some(pending) => {
                    let _ = pending.reply_tx.try_send(result.map_err(Error::from));
                }
                None => debug!(request_id, "Response for unknown request"),
            }
            true
        }
        Message::Event(event) => {
            let Some(events) = &conn.events else {
                return true;
            };
            if events.send(event).await.is_err() {
                debug!("Subscriber gone, unsubscribing");
                conn.events = None;
                return write_frame(writer, &Message::Unsubscribe).await.is_ok();
            }
            true
        }
        Message::ServerShutdown => {
            info!("Server is shutting down");
            false
        }
        Message::Pong => {
            debug!("Received pong");
            true
        }
        _ => {
            debug!("Ignoring unexpected message");
            true
        }
    }
}

/// Session and identity repository backed by a remote hub
#[derive(Clone)]
pub struct RemoteRepository {
    cmd_tx: mpsc::Sender<ClientCommand>,
    timeout: Duration,
}

impl RemoteRepository {
    fn call(&self, request: Request) -> CoreResult<Reply> {
        let (reply_tx, reply_rx) = sync_channel(1);
        self.cmd_tx
            .blocking_send(ClientCommand::Request {
                request,
                reply_tx,
                timeout: self.timeout,
            })
            .map_err(|_| Error::NotConnected)?;

        match reply_rx.recv_timeout(self.timeout) {
            Ok(result) => result.map_err(CoreError::from),
            Err(RecvTimeoutError::Timeout) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Request timed out");
                Err(Error::Timeout.into())
            }
            Err(RecvTimeoutError::Disconnected) => Err(Error::ConnectionClosed.into()),
        }
    }
}

fn unexpected(reply: Reply) -> CoreError {
    Error::Protocol(format!("unexpected reply {:?}", reply)).into()
}

impl SessionRepository for RemoteRepository {
    fn current_session(&self) -> CoreResult<Option<Session>> {
        match self.call(Request::CurrentSession)? {
            Reply::Session(session) => Ok(session),
            other => Err(unexpected(other)),
        }
    }

    fn archived_sessions(&self, limit: u32) -> CoreResult<Vec<Session>> {
        match self.call(Request::ArchivedSessions { limit })? {
            Reply::Sessions(sessions) => Ok(sessions),
            other => Err(unexpected(other)),
        }
    }

    fn all_archived_sessions(&self) -> CoreResult<Vec<Session>> {
        match self.call(Request::AllArchivedSessions)? {
            Reply::Sessions(sessions) => Ok(sessions),
            other => Err(unexpected(other)),
        }
    }

    fn insert_session(&self, session: &Session) -> CoreResult<Session> {
        match self.call(Request::InsertSession {
            session: session.clone(),
        })? {
            Reply::Inserted(stored) => Ok(stored),
            other => Err(unexpected(other)),
        }
    }

    fn update_session(&self, id: Uuid, update: &SessionUpdate) -> CoreResult<()> {
        match self.call(Request::UpdateSession {
            id,
            update: update.clone(),
        })? {
            Reply::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    fn archive_session(&self, id: Uuid, archived_at: DateTime<Utc>) -> CoreResult<()> {
        match self.call(Request::ArchiveSession { id, archived_at })? {
            Reply::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

impl IdentityRepository for RemoteRepository {
    fn find_user(&self, username: &str) -> CoreResult<Option<UserIdentity>> {
        match self.call(Request::FindUser {
            username: username.to_string(),
        })? {
            Reply::User(user) => Ok(user),
            other => Err(unexpected(other)),
        }
    }

    fn create_user(&self, user: &UserIdentity) -> CoreResult<()> {
        match self.call(Request::CreateUser { user: user.clone() })? {
            Reply::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::Hub;
    use crate::server::Server;
    use nightcap_core::{identity, SessionMirror, Tracker};
    use std::net::SocketAddr;

    async fn start_hub() -> Server {
        let hub = Arc::new(Hub::open_in_memory().unwrap());
        Server::start(SocketAddr::from(([127, 0, 0, 1], 0)), hub)
            .await
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remote_tracker_sees_feed_events() {
        let server = start_hub().await;
        let addr = server.addr().to_string();

        let writer = Client::connect(&addr).await.unwrap();
        let observer = Client::connect(&addr).await.unwrap();
        let mut feed = observer.subscribe().await.unwrap();
        observer.ping().await.unwrap();
        while server.hub().subscriber_count() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let repo = writer.repository(Duration::from_secs(5));
        let created = tokio::task::spawn_blocking(move || {
            let user = identity::register(&repo, "Ann", "Ann A").unwrap();
            let mut tracker = Tracker::new(repo, SessionMirror::new());
            tracker.load().unwrap();
            tracker.set_identity(Some(user));
            tracker.join().unwrap()
        })
        .await
        .unwrap();

        let mirror = SessionMirror::new();
        let event = feed.next().await.unwrap();
        assert!(mirror.apply(&event));
        assert_eq!(mirror.snapshot().map(|s| s.id), Some(created.id));
        assert_eq!(mirror.people()[0].username.as_deref(), Some("ann"));

        writer.disconnect().await;
        observer.disconnect().await;
        server.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remote_rejection_keeps_category() {
        let server = start_hub().await;
        let client = Client::connect(&server.addr().to_string()).await.unwrap();
        let repo = client.repository(Duration::from_secs(5));

        let result = tokio::task::spawn_blocking(move || identity::login(&repo, "nobody"))
            .await
            .unwrap();
        assert!(matches!(result, Err(CoreError::NotFound(_))));

        server.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_silent_hub_times_out_as_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        // Accept and hold the socket without ever answering
        let holder = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let client = Client::connect(&addr).await.unwrap();
        let repo = client.repository(Duration::from_millis(100));
        let result = tokio::task::spawn_blocking(move || repo.current_session())
            .await
            .unwrap();
        match result {
            Err(e) => assert!(e.is_repository_failure()),
            Ok(_) => panic!("expected a timeout"),
        }

        holder.abort();
    }

    #[test]
    fn test_unanswered_requests_expire() {
        let mut conn = Connection::new();
        let now = Instant::now();
        let (stale_tx, stale_rx) = sync_channel(1);
        let (live_tx, _live_rx) = sync_channel(1);
        conn.pending.insert(1, Pending {
            reply_tx: stale_tx,
            deadline: now - Duration::from_millis(1),
        });
        conn.pending.insert(2, Pending {
            reply_tx: live_tx,
            deadline: now + Duration::from_secs(5),
        });

        conn.expire_pending(now);
        assert_eq!(conn.pending.keys().copied().collect::<Vec<_>>(), vec![2]);
        assert!(stale_rx.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_requests_fail_after_disconnect() {
        let server = start_hub().await;
        let client = Client::connect(&server.addr().to_string()).await.unwrap();
        let repo = client.repository(Duration::from_secs(5));

        client.disconnect().await;
        while client.connection_state().await == ConnectionState::Connected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let result = tokio::task::spawn_blocking(move || repo.current_session())
            .await
            .unwrap();
        assert!(matches!(result, Err(CoreError::Unavailable(_))));

        server.shutdown();
    }
}
