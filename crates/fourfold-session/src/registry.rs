//! The session registry: matchmaking, sessions, and the identity index.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is NOT thread-safe by itself. It uses plain
//! `HashMap`s, and the server wraps the whole registry in one
//! `tokio::sync::Mutex`. Every public method is therefore one critical
//! section over the waiting slot, the session map and the index together,
//! and none of them awaits.

use std::collections::HashMap;
use std::time::Duration;

use fourfold_grid::{Mark, MoveOutcome};
use fourfold_protocol::{Identity, SessionId, SessionStatus};
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::{
    FinishedGame, Participant, ParticipantKind, RegistryConfig, Session,
    SessionError, SessionEvent,
};

/// The result of [`SessionRegistry::assign_participant`].
#[derive(Debug, Clone)]
pub struct Assignment {
    /// The session the identity was placed in; `None` while waiting.
    pub session: Option<Session>,
    pub participant: Participant,
    pub waiting: bool,
}

/// Tracks the waiting slot, every session, and which identity plays in
/// which session.
///
/// ## Lifecycle
///
/// ```text
/// assign_participant() ──→ [waiting slot] ──(second arrival)──→ [Active]
///                                │                                 │
///                                └──(fallback timer)──→ [Active vs bot]
///                                                                  │
///                     handle_move() win/draw, sweep_disconnects() forfeit
///                                                                  ▼
///                                                             [Finished]
///                                                                  │
///                                              purge_finished() after retention
/// ```
pub struct SessionRegistry {
    /// The single matchmaking slot.
    waiting: Option<Identity>,

    sessions: HashMap<SessionId, Session>,

    /// Identity → session. Many-to-one; the opponent is never indexed.
    index: HashMap<Identity, SessionId>,

    events: mpsc::UnboundedSender<SessionEvent>,

    config: RegistryConfig,
}

impl SessionRegistry {
    /// Creates an empty registry and the receiving end of its event
    /// channel.
    pub fn new(
        config: RegistryConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let registry = Self {
            waiting: None,
            sessions: HashMap::new(),
            index: HashMap::new(),
            events,
            config,
        };
        (registry, rx)
    }

    // -----------------------------------------------------------------
    // Matchmaking
    // -----------------------------------------------------------------

    /// Places `identity` in a session or in the waiting slot.
    ///
    /// 1. If the identity already plays in an unfinished session, that
    ///    session is returned unchanged apart from the participant being
    ///    flagged connected again.
    /// 2. If the identity is already the one waiting, it stays waiting.
    /// 3. If nobody is waiting, the identity takes the slot.
    /// 4. Otherwise the waiting identity gets mark One (first turn), the
    ///    newcomer gets mark Two, and a new session starts.
    pub fn assign_participant(&mut self, identity: &Identity) -> Assignment {
        if let Some(session) = self.active_session_mut(identity) {
            if let Some(p) = session.participant_mut(identity) {
                p.set_connected(true);
            }
            let session = session.clone();
            if let Some(participant) = session.participant(identity).cloned() {
                tracing::info!(%identity, session_id = %session.id, "participant rejoined");
                return Assignment {
                    session: Some(session),
                    participant,
                    waiting: false,
                };
            }
        }

        match self.waiting.take() {
            Some(waiting) if &waiting == identity => {
                self.waiting = Some(waiting);
                self.waiting_assignment(identity)
            }
            None => {
                self.waiting = Some(identity.clone());
                tracing::info!(%identity, "participant waiting for opponent");
                self.waiting_assignment(identity)
            }
            Some(waiting) => {
                let session = Session::new(
                    generate_session_id(),
                    Participant::remote(waiting.clone(), Mark::One),
                    Participant::remote(identity.clone(), Mark::Two),
                );
                let session_id = session.id.clone();
                tracing::info!(
                    %session_id,
                    first = %waiting,
                    second = %identity,
                    "session paired"
                );

                self.index.insert(waiting, session_id.clone());
                self.index.insert(identity.clone(), session_id.clone());
                self.sessions.insert(session_id, session.clone());

                Assignment {
                    participant: session.seat(Mark::Two).clone(),
                    session: Some(session),
                    waiting: false,
                }
            }
        }
    }

    /// Starts a session between `identity` (mark One) and the embedded
    /// opponent (mark Two).
    ///
    /// Idempotent: if the identity already plays in an unfinished session,
    /// that session is returned unchanged. Clears the waiting slot when it
    /// holds this identity.
    pub fn start_fallback_session(&mut self, identity: &Identity) -> Session {
        if let Some(session) = self.active_session_mut(identity) {
            return session.clone();
        }

        if self.waiting.as_ref() == Some(identity) {
            self.waiting = None;
        }

        let session = Session::new(
            generate_session_id(),
            Participant::remote(identity.clone(), Mark::One),
            Participant::algorithmic(Mark::Two),
        );
        let session_id = session.id.clone();
        tracing::info!(%session_id, %identity, "fallback session started against opponent");

        self.index.insert(identity.clone(), session_id.clone());
        self.sessions.insert(session_id, session.clone());
        session
    }

    /// Starts a fallback session only if `identity` still occupies the
    /// waiting slot. Used by the delayed fallback timer: by the time it
    /// fires the identity may have been paired or may have left.
    pub fn fallback_if_waiting(&mut self, identity: &Identity) -> Option<Session> {
        if self.waiting.as_ref() != Some(identity) {
            return None;
        }
        Some(self.start_fallback_session(identity))
    }

    // -----------------------------------------------------------------
    // Moves
    // -----------------------------------------------------------------

    /// Applies a move by a remote participant.
    ///
    /// # Errors
    /// Checked in this order:
    /// - [`SessionError::InvalidTurn`]: unknown session, or `identity` is
    ///   not a remote participant of it
    /// - [`SessionError::GameFinished`]: the session already has a result
    /// - [`SessionError::InvalidTurn`]: it is the other mark's turn
    /// - [`SessionError::Grid`]: the grid rejected the column
    pub fn handle_move(
        &mut self,
        identity: &Identity,
        session_id: &SessionId,
        column: usize,
    ) -> Result<(MoveOutcome, Session), SessionError> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or(SessionError::InvalidTurn)?;

        let mark = match session.participant(identity) {
            Some(p) if p.is_remote() => p.mark,
            _ => return Err(SessionError::InvalidTurn),
        };
        if session.is_finished() {
            return Err(SessionError::GameFinished);
        }
        if session.turn != mark {
            return Err(SessionError::InvalidTurn);
        }

        let outcome = apply_turn(session, column, &self.events)?;
        Ok((outcome, session.clone()))
    }

    /// Plays the embedded opponent's move if the session is active and the
    /// seat to move is algorithmic. Returns `None` otherwise.
    pub fn play_opponent_turn(
        &mut self,
        session_id: &SessionId,
    ) -> Option<(MoveOutcome, Session)> {
        let session = self.sessions.get_mut(session_id)?;
        if session.is_finished() {
            return None;
        }
        let ParticipantKind::Algorithmic(opponent) = &session.seat(session.turn).kind
        else {
            return None;
        };

        let column = opponent.choose_move(session.grid())?;
        match apply_turn(session, column, &self.events) {
            Ok(outcome) => Some((outcome, session.clone())),
            Err(e) => {
                tracing::warn!(%session_id, column, error = %e, "opponent move rejected");
                None
            }
        }
    }

    // -----------------------------------------------------------------
    // Disconnects and forfeits
    // -----------------------------------------------------------------

    /// Forfeits every active session whose last activity is older than
    /// the reconnection window, and returns the forfeited sessions.
    ///
    /// Each session finishes at most once: finished sessions are skipped
    /// on later sweeps.
    pub fn sweep_disconnects(&mut self) -> Vec<Session> {
        let window = Duration::from_secs(self.config.reconnect_window_secs);
        let now = Instant::now();
        let mut forfeited = Vec::new();

        for session in self.sessions.values_mut() {
            if session.is_finished()
                || now.duration_since(session.last_activity()) <= window
            {
                continue;
            }

            let winner = session.forfeit_winner();
            session.finish(winner, Vec::new());
            tracing::info!(
                session_id = %session.id,
                winner = ?session.winner,
                "session forfeited after reconnection window"
            );
            emit_finished(&self.events, session);
            forfeited.push(session.clone());
        }

        forfeited
    }

    /// Drops finished sessions older than the retention period, together
    /// with index entries pointing at them. Returns how many were removed.
    pub fn purge_finished(&mut self) -> usize {
        let retention = Duration::from_secs(self.config.finished_retention_secs);
        let now = Instant::now();
        let before = self.sessions.len();

        self.sessions.retain(|_, session| match session.finished_at() {
            Some(at) => now.duration_since(at) <= retention,
            None => true,
        });
        self.index.retain(|_, id| self.sessions.contains_key(id));

        let purged = before - self.sessions.len();
        if purged > 0 {
            tracing::debug!(purged, "finished sessions purged");
        }
        purged
    }

    /// Records that `identity`'s connection closed.
    ///
    /// Resets the session's last activity to now, so the reconnection
    /// window counts from the most recent disconnect, and flags the
    /// participant as disconnected.
    pub fn mark_disconnected(&mut self, identity: &Identity) {
        let Some(session) = self
            .index
            .get(identity)
            .and_then(|id| self.sessions.get_mut(id))
        else {
            return;
        };

        session.touch();
        if let Some(p) = session.participant_mut(identity) {
            p.set_connected(false);
        }
        tracing::debug!(%identity, session_id = %session.id, "participant disconnected");
    }

    /// Removes `identity` from the waiting slot and the index. Session
    /// records are not touched.
    pub fn abandon(&mut self, identity: &Identity) {
        if self.waiting.as_ref() == Some(identity) {
            self.waiting = None;
            tracing::debug!(%identity, "waiting participant left");
        }
        self.index.remove(identity);
    }

    // -----------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------

    /// Reattaches `identity` to `session_id` if it is a remote participant
    /// of that session. Finished sessions still answer, so a late client
    /// sees the final grid, unless the identity is already active in a
    /// different session: moves route through the index, so the snapshot
    /// must come from the same session.
    pub fn rejoin(
        &mut self,
        identity: &Identity,
        session_id: &SessionId,
    ) -> Option<Session> {
        let active_elsewhere = self
            .index
            .get(identity)
            .filter(|active| *active != session_id)
            .and_then(|active| self.sessions.get(active))
            .is_some_and(|s| !s.is_finished());
        if active_elsewhere {
            tracing::debug!(%identity, %session_id, "rejoin refused, active in another session");
            return None;
        }
        let session = self.sessions.get_mut(session_id)?;
        let participant = session.participant_mut(identity)?;
        if !participant.is_remote() {
            return None;
        }
        participant.set_connected(true);
        tracing::info!(%identity, %session_id, "participant rejoined by id");
        Some(session.clone())
    }

    /// The session a move from `identity` should go to: the indexed one,
    /// else the id the client asked for.
    pub fn resolve_session(
        &self,
        identity: &Identity,
        requested: Option<&SessionId>,
    ) -> Option<SessionId> {
        self.index.get(identity).or(requested).cloned()
    }

    pub fn is_waiting(&self, identity: &Identity) -> bool {
        self.waiting.as_ref() == Some(identity)
    }

    pub fn session(&self, session_id: &SessionId) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    /// The session `identity` is indexed under, finished or not.
    pub fn session_for(&self, identity: &Identity) -> Option<&Session> {
        self.sessions.get(self.index.get(identity)?)
    }

    /// Number of sessions held, active and finished.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn active_session_mut(&mut self, identity: &Identity) -> Option<&mut Session> {
        let id = self.index.get(identity)?;
        self.sessions.get_mut(id).filter(|s| !s.is_finished())
    }

    fn waiting_assignment(&self, identity: &Identity) -> Assignment {
        Assignment {
            session: None,
            participant: Participant::remote(identity.clone(), Mark::One),
            waiting: true,
        }
    }
}

/// Applies the current turn's move to `session` and announces it.
///
/// Refreshes last activity, then finishes the session on a win or draw or
/// hands the turn to the other mark.
fn apply_turn(
    session: &mut Session,
    column: usize,
    events: &mpsc::UnboundedSender<SessionEvent>,
) -> Result<MoveOutcome, SessionError> {
    let mark = session.turn;
    let outcome = session.grid_mut().apply_move(column, mark)?;
    session.touch();

    if outcome.winner.is_some() {
        let winner = session.seat(mark).identity.clone();
        session.finish(Some(winner), outcome.winning_line.clone());
        tracing::info!(session_id = %session.id, winner = ?session.winner, "session won");
    } else if outcome.is_draw {
        session.finish(None, Vec::new());
        tracing::info!(session_id = %session.id, "session drawn");
    } else {
        session.turn = mark.other();
    }

    // A closed receiver means the server is shutting down; nothing to do.
    let _ = events.send(SessionEvent::MovePlayed {
        session_id: session.id.clone(),
        status: session.status,
        winner: session.winner.clone(),
        players: player_list(session),
    });
    if session.status == SessionStatus::Finished {
        emit_finished(events, session);
    }

    Ok(outcome)
}

fn emit_finished(events: &mpsc::UnboundedSender<SessionEvent>, session: &Session) {
    let game = FinishedGame {
        session_id: session.id.clone(),
        players: player_list(session),
        winner: session.winner.clone(),
        started_at: session.created_at,
        ended_at: session.ended_at.unwrap_or(session.created_at),
    };
    let _ = events.send(SessionEvent::Finished(game));
}

fn player_list(session: &Session) -> Vec<Identity> {
    session
        .participants()
        .iter()
        .map(|p| p.identity.clone())
        .collect()
}

/// Generates a random 32-character hex session id (128 bits).
fn generate_session_id() -> SessionId {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    SessionId::new(bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
}

// =========================================================================
// Tests
// =========================================================================
