//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, an unknown `type`, or a
    /// missing or non-numeric field.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message is well-formed but cannot be carried as-is, e.g. an
    /// encoded payload that is not valid UTF-8 for a text frame.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
