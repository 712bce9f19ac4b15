//! Transport abstraction layer for datalink.
//!
//! Provides the [`Transport`] and [`Connection`] traits that the RPC and
//! broker layers build on, a WebSocket implementation for production, and an
//! in-memory implementation used by the test suites of every downstream
//! crate.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

mod error;
mod memory;
mod query;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::MemoryConnection;
pub use query::QueryParams;
#[cfg(feature = "websocket")]
pub use websocket::{connect, WebSocketConnection, WebSocketListener};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter backing [`ConnectionId::next`]. Shared by every transport
/// implementation so ids stay unique across them.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocates a fresh, process-unique id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new inbound connections on one listening endpoint.
///
/// Accepting yields the connection together with the [`QueryParams`] of the
/// request URL: the broker demultiplexes player logins from userdata
/// handoffs purely on those parameters.
///
/// Methods return explicit `impl Future + Send` (rather than `async fn`)
/// so generic callers can drive them from spawned tasks.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next inbound connection.
    fn accept(
        &mut self,
    ) -> impl std::future::Future<Output = Result<(Self::Connection, QueryParams), Self::Error>> + Send;
}

/// A single connection that can send and receive byte frames.
///
/// Same `Send` convention as [`Transport`]: the RPC read pump dispatches
/// requests on their own tasks, and those tasks send replies through the
/// connection.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends one frame to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<(), Self::Error>> + Send;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl std::future::Future<Output = Result<(), Self::Error>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
