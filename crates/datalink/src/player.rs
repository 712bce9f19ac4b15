//! The `Player` trait: the extension point for the embedding game.
//!
//! The broker knows how to get a player authenticated and wired to their
//! storage; everything after that is game logic. The embedder implements
//! this one trait; the broker calls it at the right moments.

use std::sync::Arc;

use serde_json::Value;

use datalink_protocol::Kwargs;
use datalink_rpc::RpcError;
use datalink_transport::Connection;

use crate::broker::Broker;
use crate::session::Session;

/// The embedding game's player type.
///
/// One value is created per completed login and dropped when the player's
/// websocket closes (or on logout). Method calls arriving from the player's
/// client that the broker does not handle itself are routed through
/// [`dispatch`](Player::dispatch).
pub trait Player: Sized + Send + Sync + 'static {
    /// The connection type the broker runs on. Production embedders use
    /// `WebSocketConnection`; tests substitute the in-memory transport.
    type Conn: Connection;

    /// Creates the game's player object for a freshly authenticated
    /// session. The session already carries the player's name, managed
    /// name, language, the storage [`Access`](datalink_rpc::Access) handle,
    /// and the RPC peer for the player's own client.
    ///
    /// Returning `Err` aborts the login: the broker closes the player's
    /// websocket and the normal disconnect cleanup runs.
    fn create(
        session: &Arc<Session<Self>>,
    ) -> impl std::future::Future<Output = Result<Self, String>> + Send;

    /// Called once the broker is logged in to the game-data service and
    /// ready to accept players. Default: no-op.
    fn started(_broker: &Arc<Broker<Self>>) -> impl std::future::Future<Output = ()> + Send {
        async {}
    }

    /// Routes a method call from this player's client.
    ///
    /// This covers both the game's published table and any fallback the
    /// game wants to apply to unknown names; return
    /// [`RpcError::UndefinedMethod`] for a method the game does not
    /// recognise and the client sees the standard `undefined function`
    /// failure.
    fn dispatch(
        &self,
        method: &str,
        args: Vec<Value>,
        kwargs: Kwargs,
    ) -> impl std::future::Future<Output = Result<Value, RpcError>> + Send;

    /// Called exactly once when a logged-in player's websocket closes.
    /// Not called for sessions that never completed a login. Default: no-op.
    fn disconnected(&self) -> impl std::future::Future<Output = ()> + Send {
        async {}
    }
}
