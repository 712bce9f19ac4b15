//! # datalink
//!
//! A user-data brokerage runtime for multiplayer game servers.
//!
//! The broker sits between the embedding game, one or more userdata
//! services (the backing stores for account data), and the players'
//! websockets. It logs the game in to its own storage account, runs the
//! token handshake that authenticates each player against a userdata of
//! their choice (or the game's own), and hands the game a channel-
//! multiplexed storage handle per player.
//!
//! The embedding game implements one trait ([`Player`]) and instantiates
//! one [`Broker`]:
//!
//! ```rust,no_run
//! use datalink::prelude::*;
//!
//! // Implement Player for your game, then:
//! // let config = Config::load(&Overrides::parse())?;
//! // let broker = Broker::<MyPlayer>::new(config, None, None);
//! // broker.run().await
//! ```

mod broker;
mod config;
mod error;
mod player;
mod session;
#[cfg(feature = "websocket")]
mod setup;
mod token;

pub use broker::{Broker, GcidState};
pub use config::{Config, ConfigError, Overrides};
pub use error::BrokerError;
pub use player::Player;
pub use session::Session;
#[cfg(feature = "websocket")]
pub use setup::generate_configuration;
pub use token::{mint, mint_unique};

/// Re-exports everything an embedding game needs.
///
/// ```rust
/// use datalink::prelude::*;
/// ```
pub mod prelude {
    // Meta-crate
    pub use crate::{
        Broker, BrokerError, Config, ConfigError, GcidState, Overrides, Player, Session,
    };

    // Protocol types
    pub use datalink_protocol::{ChannelId, Codec, JsonCodec, Kwargs, ProtocolError, RpcMessage};

    // RPC types
    pub use datalink_rpc::{Access, RpcError, RpcPeer};

    // Transport types
    pub use datalink_transport::{
        Connection, ConnectionId, MemoryConnection, QueryParams, Transport, TransportError,
    };
    #[cfg(feature = "websocket")]
    pub use datalink_transport::{WebSocketConnection, WebSocketListener};
}
