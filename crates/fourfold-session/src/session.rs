//! Session types: one match, its grid, and its two seats.

use fourfold_grid::{Coord, Grid, Mark, Opponent};
use fourfold_protocol::{Identity, SessionId, SessionStatus};
use time::OffsetDateTime;
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// Who sits in a seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticipantKind {
    /// A human on a network connection. `connected` is cleared when the
    /// connection drops and set again on rejoin.
    Remote { connected: bool },

    /// The embedded opponent. It has no connection and is never indexed.
    Algorithmic(Opponent),
}

/// One of the two participants of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub identity: Identity,
    pub mark: Mark,
    pub kind: ParticipantKind,
}

impl Participant {
    pub(crate) fn remote(identity: Identity, mark: Mark) -> Self {
        Self {
            identity,
            mark,
            kind: ParticipantKind::Remote { connected: true },
        }
    }

    pub(crate) fn algorithmic(mark: Mark) -> Self {
        Self {
            identity: Identity::opponent(),
            mark,
            kind: ParticipantKind::Algorithmic(Opponent::new(mark)),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.kind, ParticipantKind::Remote { .. })
    }

    /// `true` for a remote participant whose connection is live.
    pub fn is_connected(&self) -> bool {
        matches!(self.kind, ParticipantKind::Remote { connected: true })
    }

    pub(crate) fn set_connected(&mut self, value: bool) {
        if let ParticipantKind::Remote { connected } = &mut self.kind {
            *connected = value;
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single match between two participants.
///
/// The registry hands out clones of sessions as snapshots; only the
/// registry itself mutates the stored copy, and only while it is locked.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub status: SessionStatus,
    /// Whose turn it is. Left unchanged when the session finishes.
    pub turn: Mark,
    pub winner: Option<Identity>,
    /// The run that won the match; empty for draws, forfeits, and
    /// unfinished sessions.
    pub winning_line: Vec<Coord>,
    pub created_at: OffsetDateTime,
    pub ended_at: Option<OffsetDateTime>,
    grid: Grid,
    /// Seats indexed by [`Mark::index`].
    seats: [Participant; 2],
    /// Last accepted move or disconnect observation.
    last_activity: Instant,
    finished_at: Option<Instant>,
}

impl Session {
    pub(crate) fn new(id: SessionId, first: Participant, second: Participant) -> Self {
        Self {
            id,
            status: SessionStatus::Active,
            turn: Mark::One,
            winner: None,
            winning_line: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
            ended_at: None,
            grid: Grid::new(),
            seats: [first, second],
            last_activity: Instant::now(),
            finished_at: None,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn is_finished(&self) -> bool {
        self.status == SessionStatus::Finished
    }

    /// The participant holding `mark`.
    pub fn seat(&self, mark: Mark) -> &Participant {
        &self.seats[mark.index()]
    }

    /// Both participants, mark One first.
    pub fn participants(&self) -> &[Participant] {
        &self.seats
    }

    pub fn participant(&self, identity: &Identity) -> Option<&Participant> {
        self.seats.iter().find(|p| &p.identity == identity)
    }

    /// The participant that is not `identity`.
    pub fn opponent_of(&self, identity: &Identity) -> Option<&Participant> {
        let me = self.participant(identity)?;
        Some(self.seat(me.mark.other()))
    }

    /// Identities of the remote participants, in mark order.
    pub fn remote_identities(&self) -> impl Iterator<Item = &Identity> {
        self.seats
            .iter()
            .filter(|p| p.is_remote())
            .map(|p| &p.identity)
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub(crate) fn participant_mut(
        &mut self,
        identity: &Identity,
    ) -> Option<&mut Participant> {
        self.seats.iter_mut().find(|p| &p.identity == identity)
    }

    pub(crate) fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    pub(crate) fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub(crate) fn finished_at(&self) -> Option<Instant> {
        self.finished_at
    }

    pub(crate) fn finish(&mut self, winner: Option<Identity>, line: Vec<Coord>) {
        self.status = SessionStatus::Finished;
        self.winner = winner;
        self.winning_line = line;
        self.ended_at = Some(OffsetDateTime::now_utc());
        self.finished_at = Some(Instant::now());
    }

    /// Forfeit winner: a connected participant who is not the one to move,
    /// else any connected participant, else the only remote participant.
    /// Two disconnected humans yield no winner.
    pub(crate) fn forfeit_winner(&self) -> Option<Identity> {
        let waiting_on_other = self
            .seats
            .iter()
            .find(|p| p.is_connected() && p.mark != self.turn);
        let connected =
            waiting_on_other.or_else(|| self.seats.iter().find(|p| p.is_connected()));
        if let Some(p) = connected {
            return Some(p.identity.clone());
        }
        let mut remote = self.remote_identities();
        match (remote.next(), remote.next()) {
            (Some(only), None) => Some(only.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn human_pair() -> Session {
        Session::new(
            SessionId::new("s1"),
            Participant::remote(Identity::new("alice"), Mark::One),
            Participant::remote(Identity::new("bob"), Mark::Two),
        )
    }

    #[test]
    fn test_new_session_is_active_with_mark_one_to_move() {
        let session = human_pair();
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.turn, Mark::One);
        assert_eq!(session.seat(Mark::One).identity, Identity::new("alice"));
        assert_eq!(*session.grid(), Grid::new());
    }

    #[test]
    fn test_opponent_of_returns_other_seat() {
        let session = human_pair();
        let other = session.opponent_of(&Identity::new("alice")).unwrap();
        assert_eq!(other.identity, Identity::new("bob"));
        assert!(session.opponent_of(&Identity::new("carol")).is_none());
    }

    #[test]
    fn test_forfeit_winner_prefers_connected_human() {
        let mut session = human_pair();
        session
            .participant_mut(&Identity::new("alice"))
            .unwrap()
            .set_connected(false);
        assert_eq!(session.forfeit_winner(), Some(Identity::new("bob")));
    }

    #[test]
    fn test_forfeit_winner_both_connected_goes_to_player_not_on_turn() {
        let mut session = human_pair();
        assert_eq!(session.forfeit_winner(), Some(Identity::new("bob")));

        session.turn = Mark::Two;
        assert_eq!(session.forfeit_winner(), Some(Identity::new("alice")));
    }

    #[test]
    fn test_forfeit_winner_two_disconnected_humans_is_none() {
        let mut session = human_pair();
        for name in ["alice", "bob"] {
            session
                .participant_mut(&Identity::new(name))
                .unwrap()
                .set_connected(false);
        }
        assert_eq!(session.forfeit_winner(), None);
    }

    #[test]
    fn test_forfeit_winner_against_opponent_is_the_human() {
        let mut session = Session::new(
            SessionId::new("s2"),
            Participant::remote(Identity::new("alice"), Mark::One),
            Participant::algorithmic(Mark::Two),
        );
        session
            .participant_mut(&Identity::new("alice"))
            .unwrap()
            .set_connected(false);
        assert_eq!(session.forfeit_winner(), Some(Identity::new("alice")));
    }

    #[test]
    fn test_set_connected_ignores_algorithmic_participant() {
        let mut bot = Participant::algorithmic(Mark::Two);
        bot.set_connected(true);
        assert!(!bot.is_connected());
        assert!(!bot.is_remote());
    }
}
