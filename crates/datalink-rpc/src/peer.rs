//! The RPC peer: one per connection, in either direction.
//!
//! An [`RpcPeer`] owns the transport connection and the table of in-flight
//! calls. The read pump ([`run_peer`]) decodes inbound messages: replies are
//! routed to their waiters inline, requests are dispatched on their own
//! tasks so a handler that awaits a call (possibly on this very transport)
//! can never wedge the pump. When the stream ends, every in-flight call
//! fails with [`RpcError::Disconnected`] and the handler's `closed` hook
//! runs exactly once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::oneshot;

use datalink_protocol::{CallId, Codec, JsonCodec, Kwargs, RpcMessage};
use datalink_transport::Connection;

use crate::RpcError;

/// How a reply to an in-flight call is delivered.
enum PendingReply {
    /// A `call` coroutine is suspended on this.
    Waiter(oneshot::Sender<Result<Value, RpcError>>),
    /// A `post_with_reply` callback, invoked on the read pump.
    Callback(Box<dyn FnOnce(Result<Value, RpcError>) + Send + 'static>),
}

/// One side of an RPC conversation over a single connection.
///
/// Shared as `Arc<RpcPeer<C>>` between the read pump, any number of
/// [`Access`](crate::Access) handles, and the broker.
pub struct RpcPeer<C: Connection> {
    conn: C,
    codec: JsonCodec,
    name: String,
    next_id: AtomicU64,
    /// `None` once the connection is down; further calls fail fast.
    pending: Mutex<Option<HashMap<CallId, PendingReply>>>,
}

impl<C: Connection> RpcPeer<C> {
    /// Wraps a connection. `name` shows up in log lines, nothing else.
    pub fn new(conn: C, name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            conn,
            codec: JsonCodec,
            name: name.into(),
            next_id: AtomicU64::new(1),
            pending: Mutex::new(Some(HashMap::new())),
        })
    }

    /// The peer's log name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The id of the underlying connection.
    pub fn connection_id(&self) -> datalink_transport::ConnectionId {
        self.conn.id()
    }

    /// Calls `method` on the peer and suspends until it answers.
    ///
    /// The argument slice is copied before transmission; mutating the
    /// caller's buffers afterwards cannot affect what was sent.
    pub async fn call(
        &self,
        method: &str,
        args: &[Value],
        kwargs: &Kwargs,
    ) -> Result<Value, RpcError> {
        let (tx, rx) = oneshot::channel();
        let id = self.register(PendingReply::Waiter(tx))?;
        let msg = RpcMessage::Call {
            id,
            method: method.to_string(),
            args: args.to_vec(),
            kwargs: kwargs.clone(),
        };
        if let Err(e) = self.transmit(&msg).await {
            self.forget(id);
            return Err(e);
        }
        match rx.await {
            Ok(result) => result,
            // The pump dropped the sender without resolving: connection gone.
            Err(_) => Err(RpcError::Disconnected),
        }
    }

    /// Fire-and-forget request. The peer processes it but never answers.
    pub async fn post(&self, method: &str, args: &[Value], kwargs: &Kwargs) -> Result<(), RpcError> {
        let msg = RpcMessage::Post {
            method: method.to_string(),
            args: args.to_vec(),
            kwargs: kwargs.clone(),
        };
        self.transmit(&msg).await
    }

    /// Enqueues a call without suspending; `reply` runs on the read pump
    /// when the peer answers (or fails, if the connection dies first).
    pub async fn post_with_reply(
        &self,
        method: &str,
        args: &[Value],
        kwargs: &Kwargs,
        reply: impl FnOnce(Result<Value, RpcError>) + Send + 'static,
    ) -> Result<(), RpcError> {
        let id = self.register(PendingReply::Callback(Box::new(reply)))?;
        let msg = RpcMessage::Call {
            id,
            method: method.to_string(),
            args: args.to_vec(),
            kwargs: kwargs.clone(),
        };
        if let Err(e) = self.transmit(&msg).await {
            self.forget(id);
            return Err(e);
        }
        Ok(())
    }

    /// Sends a raw message. Used by the pump for replies and errors.
    pub(crate) async fn transmit(&self, msg: &RpcMessage) -> Result<(), RpcError> {
        let bytes = self.codec.encode(msg)?;
        self.conn
            .send(&bytes)
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))
    }

    /// Closes the underlying connection. The read pump observes the close
    /// and runs the usual teardown.
    pub async fn close(&self) {
        if let Err(e) = self.conn.close().await {
            tracing::debug!(peer = %self.name, error = %e, "close failed");
        }
    }

    fn register(&self, entry: PendingReply) -> Result<CallId, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        match pending.as_mut() {
            Some(map) => {
                map.insert(id, entry);
                Ok(id)
            }
            None => Err(RpcError::Disconnected),
        }
    }

    fn forget(&self, id: CallId) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(map) = pending.as_mut() {
            map.remove(&id);
        }
    }

    /// Routes a reply to its waiter. Unknown ids are logged and dropped.
    fn resolve(&self, id: CallId, result: Result<Value, RpcError>) {
        let entry = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.as_mut().and_then(|map| map.remove(&id))
        };
        match entry {
            Some(PendingReply::Waiter(tx)) => {
                let _ = tx.send(result);
            }
            Some(PendingReply::Callback(f)) => f(result),
            None => {
                tracing::debug!(peer = %self.name, id, "reply for unknown call id");
            }
        }
    }

    /// Fails every in-flight call and refuses new ones.
    fn shut_down(&self) {
        let map = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.take()
        };
        let Some(map) = map else { return };
        for (_, entry) in map {
            match entry {
                PendingReply::Waiter(tx) => {
                    let _ = tx.send(Err(RpcError::Disconnected));
                }
                PendingReply::Callback(f) => f(Err(RpcError::Disconnected)),
            }
        }
    }
}

/// Serves inbound requests on a peer.
///
/// Implemented by the broker once per connection variant (player socket,
/// player-userdata socket, game-data link). Handlers are shared with the
/// dispatch tasks, so they take `&self`; any mutable state lives behind the
/// broker's own locks.
pub trait Handler: Send + Sync + 'static {
    /// Serves one inbound request. The `Display` text of the error becomes
    /// the wire error message for calls.
    ///
    /// Declared with an explicit `Send` future so [`run_peer`] can dispatch
    /// on spawned tasks; implementations just write `async fn handle`.
    fn handle(
        &self,
        method: &str,
        args: Vec<Value>,
        kwargs: Kwargs,
    ) -> impl std::future::Future<Output = Result<Value, RpcError>> + Send;

    /// Runs exactly once when the connection is gone, after every pending
    /// call has been failed.
    fn closed(&self) -> impl std::future::Future<Output = ()> + Send;

    /// A connection-level error frame (one without a call id) arrived.
    fn error(&self, message: &str) -> impl std::future::Future<Output = ()> + Send {
        async move {
            tracing::warn!(message, "unhandled connection-level rpc error");
        }
    }
}

/// The read pump. Runs until the connection ends, then tears down.
///
/// Spawn this once per peer:
/// `tokio::spawn(run_peer(peer.clone(), handler));`
pub async fn run_peer<C: Connection, H: Handler>(peer: Arc<RpcPeer<C>>, handler: Arc<H>) {
    loop {
        let frame = match peer.conn.recv().await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(peer = %peer.name, error = %e, "recv failed");
                break;
            }
        };

        let msg: RpcMessage = match peer.codec.decode(&frame) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(peer = %peer.name, error = %e, "undecodable frame");
                continue;
            }
        };

        match msg {
            RpcMessage::Reply { id, result } => peer.resolve(id, Ok(result)),
            RpcMessage::Error {
                id: Some(id),
                message,
            } => peer.resolve(id, Err(RpcError::Remote(message))),
            RpcMessage::Error { id: None, message } => {
                handler.error(&message).await;
            }
            RpcMessage::Call {
                id,
                method,
                args,
                kwargs,
            } => {
                let peer = Arc::clone(&peer);
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    let reply = match handler.handle(&method, args, kwargs).await {
                        Ok(result) => RpcMessage::Reply { id, result },
                        Err(e) => {
                            tracing::debug!(peer = %peer.name, method, error = %e, "call failed");
                            RpcMessage::Error {
                                id: Some(id),
                                message: e.to_string(),
                            }
                        }
                    };
                    if let Err(e) = peer.transmit(&reply).await {
                        tracing::debug!(peer = %peer.name, error = %e, "reply send failed");
                    }
                });
            }
            RpcMessage::Post {
                method,
                args,
                kwargs,
            } => {
                let peer = Arc::clone(&peer);
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    if let Err(e) = handler.handle(&method, args, kwargs).await {
                        tracing::debug!(peer = %peer.name, method, error = %e, "post failed");
                    }
                });
            }
        }
    }

    peer.shut_down();
    handler.closed().await;
}

// =========================================================================
// Tests
// =========================================================================
