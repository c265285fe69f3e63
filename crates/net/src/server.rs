//! TCP server exposing a session hub
//!
//! The hosting process runs this server. Clients connect, send repository
//! requests and may subscribe to the change feed.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::WriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::hub::Hub;
use crate::protocol::{Message, RemoteError};

/// Outgoing frames queued per connection
const OUTBOX_CAPACITY: usize = 64;

/// Hub server handle
pub struct Server {
    addr: SocketAddr,
    hub: Arc<Hub>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Bind and start accepting connections
    pub async fn start(addr: SocketAddr, hub: Arc<Hub>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, "Server started");

        let (shutdown_tx, _) = broadcast::channel(1);
        tokio::spawn(accept_loop(listener, hub.clone(), shutdown_tx.clone()));

        Ok(Server {
            addr: bound_addr,
            hub,
            shutdown_tx,
        })
    }

    /// Get the server's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        info!("Server shutdown initiated");
    }
}

/// Accept incoming connections
async fn accept_loop(listener: TcpListener, hub: Arc<Hub>, shutdown_tx: broadcast::Sender<()>) {
    let mut shutdown_rx = shutdown_tx.subscribe();
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        debug!(addr = %addr, "New connection");
                        tokio::spawn(handle_connection(
                            stream,
                            addr,
                            hub.clone(),
                            shutdown_tx.subscribe(),
                        ));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Handle a single client connection
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    hub: Arc<Hub>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let (mut reader, writer) = tokio::io::split(stream);
    let (out_tx, out_rx) = mpsc::channel(OUTBOX_CAPACITY);
    let writer_handle = tokio::spawn(writer_task(writer, out_rx));

    info!(addr = %addr, "Client connected");

    let mut forwarder: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            result = read_frame(&mut reader) => {
                match result {
                    Ok(msg) => {
                        if handle_message(msg, &hub, &out_tx, &mut forwarder).await.is_err() {
                            break;
                        }
                    }
                    Err(Error::ConnectionClosed) => {
                        debug!(addr = %addr, "Connection closed");
                        break;
                    }
                    Err(e) => {
                        warn!(addr = %addr, error = %e, "Read error");
                        break;
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                let _ = out_tx.send(Message::ServerShutdown).await;
                break;
            }
        }
    }

    // Cleanup
    if let Some(handle) = forwarder.take() {
        handle.abort();
    }
    drop(out_tx);
    // Let queued frames (ServerShutdown included) drain before closing
    let _ = writer_handle.await;

    info!(addr = %addr, "Client disconnected");
}

/// Handle an incoming message. Errors mean the outbox is gone.
async fn handle_message(
    msg: Message,
    hub: &Arc<Hub>,
    out_tx: &mpsc::Sender<Message>,
    forwarder: &mut Option<JoinHandle<()>>,
) -> std::result::Result<(), ()> {
    match msg {
        Message::Request {
            request_id,
            request,
        } => {
            // Requests from one connection run one at a time, in order
            let hub = hub.clone();
            let result = match tokio::task::spawn_blocking(move || hub.handle(request)).await {
                Ok(result) => result.map_err(|e| {
                    debug!(request_id, error = %e, "Request rejected");
                    RemoteError::from(&e)
                }),
                Err(e) => {
                    error!(request_id, error = %e, "Request task failed");
                    Err(RemoteError::from(&nightcap_core::Error::Unavailable(
                        "request task failed".into(),
                    )))
                }
            };
            out_tx
                .send(Message::Response { request_id, result })
                .await
                .map_err(|_| ())
        }
        Message::Subscribe => {
            if forwarder.is_none() {
                let sub = hub.subscribe();
                *forwarder = Some(tokio::spawn(forward_events(sub, out_tx.clone())));
                debug!("Client subscribed to change feed");
            }
            Ok(())
        }
        Message::Unsubscribe => {
            if let Some(handle) = forwarder.take() {
                handle.abort();
                debug!("Client unsubscribed from change feed");
            }
            Ok(())
        }
        Message::Ping => out_tx.send(Message::Pong).await.map_err(|_| ()),
        _ => {
            debug!("Ignoring unexpected message type");
            Ok(())
        }
    }
}

/// Push change feed events to one connection
async fn forward_events(mut sub: crate::feed::Subscription, out_tx: mpsc::Sender<Message>) {
    while let Some(event) = sub.next().await {
        if out_tx.send(Message::Event(event)).await.is_err() {
            break;
        }
    }
}

/// Writer task - sends messages to the client
async fn writer_task(mut writer: WriteHalf<TcpStream>, mut rx: mpsc::Receiver<Message>) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &msg).await {
            debug!(error = %e, "Write failed");
            break;
        }
    }
}
