//! Codec trait and implementations for serializing wire messages.
//!
//! The rest of the server never calls `serde_json` directly; it goes
//! through a [`Codec`], so the format can be swapped without touching the
//! connection adapter.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes Rust values to bytes and decodes them back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T)
    -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;

    /// Serializes a value for a WebSocket text frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::InvalidMessage` if the encoded bytes are
    /// not UTF-8, or whatever [`Codec::encode`] returns.
    fn encode_text<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<String, ProtocolError> {
        let bytes = self.encode(value)?;
        String::from_utf8(bytes)
            .map_err(|e| ProtocolError::InvalidMessage(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Browser clients speak JSON natively, so this is the only codec the
/// server ships with.
///
/// ## Example
///
/// ```rust
/// use fourfold_protocol::{ClientMessage, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let msg: ClientMessage = codec.decode(br#"{"type":"move","column":3}"#).unwrap();
/// assert_eq!(msg, ClientMessage::Move { column: 3 });
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{ServerMessage, SessionId};

    #[test]
    fn test_decode_malformed_json_returns_decode_error() {
        let result: Result<crate::ClientMessage, _> =
            JsonCodec.decode(b"{not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_encode_text_produces_json_string() {
        let text = JsonCodec
            .encode_text(&ServerMessage::error("not your turn"))
            .unwrap();
        assert_eq!(text, r#"{"type":"error","message":"not your turn"}"#);
    }

    #[test]
    fn test_encode_session_id_is_plain_string() {
        let bytes = JsonCodec.encode(&SessionId::new("ab12")).unwrap();
        assert_eq!(bytes, br#""ab12""#);
    }
}
