//! RPC multiplexing for datalink.
//!
//! One websocket carries many logical conversations: the broker's calls to a
//! userdata service, the service's calls back, and fire-and-forget posts in
//! both directions. [`RpcPeer`] owns a connection and correlates replies to
//! in-flight calls; [`run_peer`] is the read pump that drives dispatch; and
//! [`Access`] is the per-tenant handle that prepends a channel id to every
//! outbound request.

mod access;
mod error;
mod peer;

pub use access::Access;
pub use error::RpcError;
pub use peer::{run_peer, Handler, RpcPeer};
