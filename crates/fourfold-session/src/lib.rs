//! Session registry for Fourfold.
//!
//! This crate owns every piece of mutable match state:
//!
//! 1. **Matchmaking**: a single waiting slot that pairs arrivals two by two
//! 2. **Sessions**: one grid, two seats, a turn, and a status per match
//! 3. **Turn arbitration**: [`SessionRegistry::handle_move`] decides who
//!    may move and applies the move to the grid
//! 4. **Forfeits**: [`SessionRegistry::sweep_disconnects`] finishes
//!    sessions whose participants went quiet for too long
//!
//! # How it fits in the stack
//!
//! ```text
//! Connection adapter (above)  ← holds the registry behind one Mutex
//!     ↕
//! Session Layer (this crate)  ← matchmaking, sessions, events
//!     ↕
//! Grid Layer (below)  ← move application, win detection, opponent
//! ```
//!
//! Finished sessions and accepted moves are announced on an unbounded
//! channel of [`SessionEvent`]s so that persistence and analytics never
//! run while the registry is locked.

mod config;
mod error;
mod event;
mod registry;
mod session;

pub use config::RegistryConfig;
pub use error::SessionError;
pub use event::{FinishedGame, SessionEvent};
pub use registry::{Assignment, SessionRegistry};
pub use session::{Participant, ParticipantKind, Session};
