//! Error types for the RPC layer.
//!
//! The `Display` text of a variant is what goes on the wire when a handler
//! fails an inbound call, so the strings here are part of the protocol:
//! userdata clients match on `undefined function` and friends.

use datalink_protocol::ProtocolError;

/// Errors that can occur while issuing or serving RPCs.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Encoding or decoding a wire message failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The underlying connection failed mid-operation.
    #[error("transport error: {0}")]
    Transport(String),

    /// The connection went away before the peer answered.
    #[error("connection lost before reply")]
    Disconnected,

    /// The peer answered a call of ours with an error.
    #[error("remote error: {0}")]
    Remote(String),

    /// An inbound call named a method nobody publishes.
    #[error("undefined function")]
    UndefinedMethod,

    /// An inbound call had the wrong argument count or types.
    #[error("invalid arguments for {0}")]
    InvalidArguments(String),

    /// A handler-level failure; the message is sent to the caller verbatim.
    #[error("{0}")]
    Failed(String),
}

impl RpcError {
    /// Shorthand for a handler failure with a fixed wire message.
    pub fn failed(message: impl Into<String>) -> Self {
        RpcError::Failed(message.into())
    }
}
