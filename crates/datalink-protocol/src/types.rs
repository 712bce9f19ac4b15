//! Core protocol types for datalink's wire format.
//!
//! The broker speaks a small dynamically-typed RPC dialect: every message
//! carries a method name, a positional argument vector and a keyword map,
//! with values represented as `serde_json::Value`. Userdata services written
//! in other languages interoperate as long as they produce the same JSON
//! shapes, so these types pin the wire format exactly.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Keyword arguments of an RPC request.
pub type Kwargs = serde_json::Map<String, Value>;

/// Correlation id of an in-flight call, unique per transport direction.
pub type CallId = u64;

// ---------------------------------------------------------------------------
// ChannelId
// ---------------------------------------------------------------------------

/// A logical tenant within a shared RPC transport.
///
/// One websocket to a userdata service can serve the game's own storage
/// account and any number of players at the same time; the channel id is
/// what keeps them apart. Channel 1 is reserved for the game's own data
/// account, players get 2 and up. Channel 0 is never a valid player channel
/// and is rejected during the handshake.
///
/// `#[serde(transparent)]` keeps the wire shape a plain integer, which is
/// what the userdata services expect as the first argument of every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub i64);

impl ChannelId {
    /// The channel the game's own data account is served on.
    pub const GAME_DATA: ChannelId = ChannelId(1);

    /// Returns the raw channel number.
    pub fn into_inner(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RpcMessage
// ---------------------------------------------------------------------------

/// The top-level wire message. Everything on a datalink transport is one of
/// these, in both directions.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON, e.g.
/// `{ "type": "Call", "id": 3, "method": "create_dcid", "args": [...] }`,
/// which is easy to construct from JavaScript userdata clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RpcMessage {
    /// A request that expects a [`RpcMessage::Reply`] carrying the same `id`.
    Call {
        id: CallId,
        method: String,
        #[serde(default)]
        args: Vec<Value>,
        #[serde(default)]
        kwargs: Kwargs,
    },

    /// A fire-and-forget request. The peer processes it but never answers.
    Post {
        method: String,
        #[serde(default)]
        args: Vec<Value>,
        #[serde(default)]
        kwargs: Kwargs,
    },

    /// The successful answer to a [`RpcMessage::Call`].
    Reply { id: CallId, result: Value },

    /// A failed call (`id` set) or a connection-level error (`id` absent).
    Error {
        #[serde(default)]
        id: Option<CallId>,
        message: String,
    },
}

impl RpcMessage {
    /// Returns the method name for requests, `None` for replies and errors.
    pub fn method(&self) -> Option<&str> {
        match self {
            RpcMessage::Call { method, .. } | RpcMessage::Post { method, .. } => Some(method),
            _ => None,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The wire shapes below are load-bearing: userdata services in other
    //! languages parse them, so a serde attribute change that alters the
    //! JSON is a protocol break, not a refactor.

    use serde_json::json;

    use super::*;

    #[test]
    fn test_channel_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&ChannelId(7)).unwrap();
        assert_eq!(json, "7");
    }

    #[test]
    fn test_channel_id_deserializes_from_plain_number() {
        let ch: ChannelId = serde_json::from_str("2").unwrap();
        assert_eq!(ch, ChannelId(2));
    }

    #[test]
    fn test_channel_id_display() {
        assert_eq!(ChannelId::GAME_DATA.to_string(), "ch-1");
    }

    #[test]
    fn test_call_json_format() {
        let msg = RpcMessage::Call {
            id: 3,
            method: "create_dcid".into(),
            args: vec![json!("G1")],
            kwargs: Kwargs::new(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "Call");
        assert_eq!(value["id"], 3);
        assert_eq!(value["method"], "create_dcid");
        assert_eq!(value["args"], json!(["G1"]));
    }

    #[test]
    fn test_call_args_and_kwargs_default_when_missing() {
        // Userdata clients may omit empty argument lists entirely.
        let msg: RpcMessage =
            serde_json::from_str(r#"{"type": "Call", "id": 1, "method": "ping"}"#).unwrap();
        match msg {
            RpcMessage::Call { args, kwargs, .. } => {
                assert!(args.is_empty());
                assert!(kwargs.is_empty());
            }
            other => panic!("expected Call, got {other:?}"),
        }
    }

    #[test]
    fn test_post_has_no_id() {
        let msg = RpcMessage::Post {
            method: "drop_pending_dcid".into(),
            args: vec![json!("D1")],
            kwargs: Kwargs::new(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "Post");
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_reply_round_trip() {
        let msg = RpcMessage::Reply {
            id: 9,
            result: json!({"ok": true}),
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: RpcMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_error_without_id_round_trip() {
        let msg = RpcMessage::Error {
            id: None,
            message: "invalid gcid".into(),
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: RpcMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_method_accessor() {
        let call = RpcMessage::Call {
            id: 1,
            method: "login_game".into(),
            args: vec![],
            kwargs: Kwargs::new(),
        };
        assert_eq!(call.method(), Some("login_game"));

        let reply = RpcMessage::Reply {
            id: 1,
            result: Value::Null,
        };
        assert_eq!(reply.method(), None);
    }

    #[test]
    fn test_decode_unknown_type_returns_error() {
        let unknown = r#"{"type": "Teleport", "id": 1}"#;
        let result: Result<RpcMessage, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }
}
