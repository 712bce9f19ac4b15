//! Codec trait and the JSON implementation.
//!
//! The transport layer moves opaque byte frames; a codec turns those frames
//! into [`RpcMessage`](crate::RpcMessage)s and back. Keeping this behind a
//! trait lets a deployment swap in a binary codec without touching the
//! broker, as long as both ends agree.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes values to byte frames and decodes them back.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON via `serde_json`.
///
/// JSON is what browser-side userdata clients speak natively, and it keeps
/// every frame inspectable in DevTools, so it is the default (and currently
/// only) codec.
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{Kwargs, RpcMessage};

    use super::*;

    #[test]
    fn test_json_codec_round_trip() {
        let codec = JsonCodec;
        let msg = RpcMessage::Call {
            id: 1,
            method: "access_managed_player".into(),
            args: vec![json!(2), json!("alice")],
            kwargs: Kwargs::new(),
        };
        let bytes = codec.encode(&msg).unwrap();
        let decoded: RpcMessage = codec.decode(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_json_codec_decode_garbage_fails() {
        let codec = JsonCodec;
        let result: Result<RpcMessage, _> = codec.decode(b"not json");
        assert!(result.is_err());
    }
}
