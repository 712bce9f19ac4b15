//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The bytes were malformed or did not match the expected shape.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// A structurally valid message that violates the protocol (wrong
    /// argument count, wrong type, reserved channel, ...).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
