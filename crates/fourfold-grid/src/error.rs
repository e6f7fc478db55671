//! Error types for the grid engine.

/// Reasons a move can be rejected by the grid.
///
/// Both variants are move-local and recoverable: the grid is left
/// untouched and the player may try a different column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// The column index is outside `0..COLUMNS`.
    #[error("invalid column")]
    InvalidColumn,

    /// The top cell of the column is already occupied.
    #[error("column is full")]
    ColumnFull,
}
