//! The channel access handle.
//!
//! A userdata service multiplexes many tenants over one transport and
//! expects every request to carry the tenant's channel id as its first
//! positional argument. `Access` binds a peer and a channel so callers never
//! deal with that convention by hand: the broker's own storage account is an
//! `Access` on channel 1, and each logged-in player gets one on a fresh
//! channel.

use std::sync::Arc;

use serde_json::Value;

use datalink_protocol::{ChannelId, Kwargs};
use datalink_transport::Connection;

use crate::{RpcError, RpcPeer};

/// A (peer, channel) pair exposing the peer's operations with the channel
/// id transparently inserted at argument position 0.
///
/// Cloning is cheap; handles share the peer. The argument slice passed to
/// any operation is copied before transmission, so mutating the caller's
/// buffers afterwards cannot change what was sent.
pub struct Access<C: Connection> {
    peer: Arc<RpcPeer<C>>,
    channel: ChannelId,
}

impl<C: Connection> Clone for Access<C> {
    fn clone(&self) -> Self {
        Self {
            peer: Arc::clone(&self.peer),
            channel: self.channel,
        }
    }
}

impl<C: Connection> Access<C> {
    /// Binds `peer` and `channel`.
    pub fn new(peer: Arc<RpcPeer<C>>, channel: ChannelId) -> Self {
        Self { peer, channel }
    }

    /// The channel this handle is bound to.
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// The peer this handle borrows.
    pub fn peer(&self) -> &Arc<RpcPeer<C>> {
        &self.peer
    }

    /// Calls `method` on the channel and suspends until the peer answers.
    pub async fn call(
        &self,
        method: &str,
        args: &[Value],
        kwargs: &Kwargs,
    ) -> Result<Value, RpcError> {
        self.peer
            .call(method, &self.with_channel(args), kwargs)
            .await
    }

    /// Fire-and-forget request on the channel.
    pub async fn post(&self, method: &str, args: &[Value], kwargs: &Kwargs) -> Result<(), RpcError> {
        self.peer
            .post(method, &self.with_channel(args), kwargs)
            .await
    }

    /// Enqueues a call on the channel; `reply` runs when the peer answers.
    pub async fn post_with_reply(
        &self,
        method: &str,
        args: &[Value],
        kwargs: &Kwargs,
        reply: impl FnOnce(Result<Value, RpcError>) + Send + 'static,
    ) -> Result<(), RpcError> {
        self.peer
            .post_with_reply(method, &self.with_channel(args), kwargs, reply)
            .await
    }

    /// Copies `args` with the channel id inserted at position 0.
    fn with_channel(&self, args: &[Value]) -> Vec<Value> {
        let mut realargs = Vec::with_capacity(args.len() + 1);
        realargs.push(Value::from(self.channel.0));
        realargs.extend_from_slice(args);
        realargs
    }
}

// =========================================================================
// Tests
// =========================================================================
