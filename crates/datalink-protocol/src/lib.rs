//! Wire protocol types for the datalink userdata broker.
//!
//! Everything that travels between the broker, the userdata services, and
//! the player clients is an [`RpcMessage`] serialized by a [`Codec`]. The
//! broker multiplexes many logical tenants over one transport by tagging
//! requests with a [`ChannelId`]; this crate only defines the types. The
//! tagging itself lives in `datalink-rpc`.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{ChannelId, CallId, Kwargs, RpcMessage};
