//! Events the registry emits for collaborators outside the lock.

use fourfold_protocol::{Identity, SessionId, SessionStatus};
use time::OffsetDateTime;

/// Something that happened inside the registry.
///
/// Events are sent on an unbounded channel while the registry lock is
/// held, so sending never waits. A background task drains the channel and
/// talks to storage and analytics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A move was accepted, from a remote participant or the opponent.
    MovePlayed {
        session_id: SessionId,
        status: SessionStatus,
        winner: Option<Identity>,
        players: Vec<Identity>,
    },

    /// A session finished by win, draw, or forfeit. Emitted exactly once
    /// per session.
    Finished(FinishedGame),
}

/// The record of a finished match handed to persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedGame {
    pub session_id: SessionId,
    /// Both participants in mark order, including `bot` for the opponent.
    pub players: Vec<Identity>,
    pub winner: Option<Identity>,
    pub started_at: OffsetDateTime,
    pub ended_at: OffsetDateTime,
}

impl FinishedGame {
    /// Whole seconds between start and end.
    pub fn duration_secs(&self) -> i64 {
        (self.ended_at - self.started_at).whole_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn test_duration_secs_truncates_to_whole_seconds() {
        let started_at = OffsetDateTime::UNIX_EPOCH;
        let game = FinishedGame {
            session_id: SessionId::new("s"),
            players: vec![Identity::new("a"), Identity::opponent()],
            winner: None,
            started_at,
            ended_at: started_at + Duration::milliseconds(42_900),
        };
        assert_eq!(game.duration_secs(), 42);
    }
}
