//! Nightcap Network Library
//!
//! Shares one session store between clients over TCP.
//!
//! # Architecture
//!
//! - **Hub**: the authoritative repository plus its change feed
//! - **Server**: run by the host, exposes the hub to clients
//! - **Client**: connects to a host and provides a blocking repository handle
//! - **Protocol**: Length-prefixed JSON messages
//!
//! # Usage
//!
//! ```ignore
//! // Host starts a server over a hub
//! let hub = Arc::new(Hub::open("nightcap.db")?);
//! let server = Server::start(addr, hub).await?;
//!
//! // Client connects, subscribes and hands a repository to the tracker
//! let client = Client::connect("host:7440").await?;
//! let mut feed = client.subscribe().await?;
//! let tracker = Tracker::new(client.repository(timeout), mirror.clone());
//!
//! while let Some(event) = feed.next().await {
//!     mirror.apply(&event);
//! }
//! ```

pub mod client;
pub mod error;
pub mod feed;
mod frame;
pub mod hub;
pub mod protocol;
pub mod server;

pub use client::{Client, ConnectionState, RemoteRepository};
pub use error::{Error, Result};
pub use feed::Subscription;
pub use hub::Hub;
pub use protocol::{Message, Reply, Request};
pub use server::Server;

/// Default port for Nightcap hubs
pub const DEFAULT_PORT: u16 = 7440;
