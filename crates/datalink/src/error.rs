//! Unified error type for the broker.

use datalink_protocol::ProtocolError;
use datalink_rpc::RpcError;
use datalink_transport::TransportError;

use crate::config::ConfigError;

/// Top-level error covering broker startup and the handshake state machine.
///
/// Handshake variants are sent to RPC callers, so their `Display` text is
/// part of the wire protocol (`invalid gcid` and friends).
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// A configuration-level error (missing file, incoherent policy).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A transport-level error (bind, connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An RPC-level error (call failed, peer reported an error).
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// The game-data service rejected the game's credentials.
    #[error("login to game data service failed")]
    GameLoginFailed,

    /// The game-data connection died; the broker cannot continue.
    #[error("game data connection lost: {0}")]
    GameDataLost(String),

    /// `start_game_data` was called twice on one broker.
    #[error("game data connection already started")]
    AlreadyStarted,

    /// A handshake named a gcid with no pending session.
    #[error("invalid gcid")]
    InvalidGcid,

    /// A handshake supplied channel 0, which is reserved.
    #[error("invalid channel")]
    InvalidChannel,

    /// The embedder's player factory failed.
    #[error("player setup failed: {0}")]
    PlayerSetup(String),
}

impl BrokerError {
    /// Converts into the RPC error whose `Display` text goes on the wire.
    pub(crate) fn into_rpc(self) -> RpcError {
        match self {
            BrokerError::Rpc(e) => e,
            other => RpcError::Failed(other.to_string()),
        }
    }
}
