//! Grid engine and heuristic opponent for Fourfold.
//!
//! This crate is the leaf of the workspace. It knows nothing about
//! players, sessions or networks. It only knows a 6×7 grid, gravity and
//! lines of four.
//!
//! - [`Grid`] applies moves and reports a [`MoveOutcome`] (win, draw, or
//!   neither).
//! - [`Opponent`] picks a column for the algorithmic player using
//!   win / block / centre-preference rules.
//!
//! # How it fits in the stack
//!
//! ```text
//! Session Layer (above)  ← owns one Grid per session, applies moves under a lock
//!     ↕
//! Grid Layer (this crate)  ← pure move application and win detection
//! ```

mod error;
mod grid;
mod opponent;

pub use error::GridError;
pub use grid::{Cell, Coord, Grid, Mark, MoveOutcome, COLUMNS, ROWS};
pub use opponent::Opponent;
