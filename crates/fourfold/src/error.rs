//! Unified error type for the Fourfold server.

use fourfold_transport::TransportError;

/// Top-level error returned by the server's own entry points.
///
/// Only failures that stop the server or a single connection surface
/// here. Rejected moves become `error` frames, and storage, publishing
/// and configuration problems are logged where they happen.
#[derive(Debug, thiserror::Error)]
pub enum FourfoldError {
    /// Listener, handshake, send, or receive failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::HandshakeRejected("username required".into());
        let fourfold_err: FourfoldError = err.into();
        assert!(matches!(fourfold_err, FourfoldError::Transport(_)));
        assert!(fourfold_err.to_string().contains("username required"));
    }

    #[test]
    fn test_from_bind_failure_keeps_source_message() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken");
        let fourfold_err: FourfoldError = TransportError::AcceptFailed(io).into();
        assert_eq!(fourfold_err.to_string(), "accept failed: port taken");
    }
}
