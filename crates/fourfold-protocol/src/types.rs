//! Core protocol types for Fourfold's wire format.
//!
//! Every outbound message is a JSON object tagged by `"type"`, with
//! camelCase field names, because that is what browser clients read.

use std::fmt;

use fourfold_grid::{Coord, Grid, Mark};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The reserved identity of the algorithmic opponent. No remote client may
/// connect under this name.
pub const OPPONENT_IDENTITY: &str = "bot";

/// Text of the notice sent to a client that is waiting for a partner.
pub const WAITING_MESSAGE: &str = "waiting for opponent";

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A participant's self-declared name.
///
/// Identities are not verified: whoever connects with `username=alice` is
/// alice. Serialized as the bare string.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The identity used for the algorithmic opponent.
    pub fn opponent() -> Self {
        Self(OPPONENT_IDENTITY.to_owned())
    }

    /// Returns `true` for names a remote client may not use.
    pub fn is_reserved(&self) -> bool {
        self.0 == OPPONENT_IDENTITY
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A unique identifier for a session (one match).
///
/// Sent to clients as `gameId` so they can rejoin after a reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a session as clients see it.
///
/// There is no `waiting` status: a client that is waiting for a partner
/// has no session yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Finished,
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Messages a client may send.
///
/// `{"type":"move","column":3}`. The column is signed so that a negative
/// value decodes and can be answered with `invalid column` instead of a
/// decode failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Move { column: i64 },
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Messages the server pushes to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// No partner yet; a fallback opponent may follow after a delay.
    Waiting { message: String },

    /// Full session snapshot, sent when a client is placed in a session
    /// or rejoins one.
    #[serde(rename_all = "camelCase")]
    Init {
        game_id: SessionId,
        board: Grid,
        turn: Mark,
        /// The receiving client's own identity.
        you: Identity,
        /// The receiving client's mark.
        slot: Mark,
        /// The other participant's identity (`bot` for the opponent).
        opponent: Option<Identity>,
        status: SessionStatus,
        winner: Option<Identity>,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },

    /// Grid snapshot after every accepted move and at session finish.
    #[serde(rename_all = "camelCase")]
    State {
        board: Grid,
        turn: Mark,
        status: SessionStatus,
        winner: Option<Identity>,
        /// `(row, col)` pairs of the winning run; empty otherwise.
        winning_line: Vec<Coord>,
    },

    /// A rejected request. Only the sender receives it.
    Error { message: String },
}

impl ServerMessage {
    pub fn waiting() -> Self {
        Self::Waiting {
            message: WAITING_MESSAGE.to_owned(),
        }
    }

    pub fn error(message: impl fmt::Display) -> Self {
        Self::Error {
            message: message.to_string(),
        }
    }
}
