//! Error types for the session layer.

use fourfold_grid::GridError;

/// Reasons a move can be rejected by the registry.
///
/// All of them are reported only to the participant that sent the move;
/// the session is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The session is unknown, the sender is not one of its remote
    /// participants, or it is the other participant's turn.
    #[error("not your turn")]
    InvalidTurn,

    /// The session already has a result.
    #[error("game already finished")]
    GameFinished,

    /// The grid rejected the column.
    #[error(transparent)]
    Grid(#[from] GridError),
}
