//! Delivers registry events to storage and analytics.
//!
//! The registry only pushes events onto an unbounded channel. This task
//! drains that channel, so a slow database or broker delays persistence
//! but never delays a move.

use fourfold_protocol::Identity;
use fourfold_session::{FinishedGame, SessionEvent};
use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::mpsc;

use crate::publisher::EventPublisher;
use crate::store::GameStore;

/// Runs until every sender of the channel is gone.
pub(crate) async fn run_dispatch<S, P>(
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    store: &S,
    publisher: &P,
) where
    S: GameStore,
    P: EventPublisher,
{
    while let Some(event) = events.recv().await {
        deliver(event, store, publisher).await;
    }
    tracing::debug!("event channel closed, dispatch stopped");
}

pub(crate) async fn deliver<S, P>(event: SessionEvent, store: &S, publisher: &P)
where
    S: GameStore,
    P: EventPublisher,
{
    match event {
        SessionEvent::MovePlayed {
            session_id,
            status,
            winner,
            players,
        } => {
            let humans: Vec<Identity> =
                players.into_iter().filter(|p| !p.is_reserved()).collect();
            let payload = json!({
                "gameId": session_id,
                "status": status,
                "winner": winner,
                "players": humans,
            });
            if let Err(e) = publisher.publish("move_played", payload).await {
                tracing::warn!(%session_id, error = %e, "move_played not published");
            }
        }
        SessionEvent::Finished(game) => {
            if let Err(e) = store.save_game(&game).await {
                tracing::warn!(session_id = %game.session_id, error = %e, "finished game not saved");
            }
            let payload = finished_payload(&game);
            if let Err(e) = publisher.publish("game_finished", payload).await {
                tracing::warn!(session_id = %game.session_id, error = %e, "game_finished not published");
            }
        }
    }
}

fn finished_payload(game: &FinishedGame) -> serde_json::Value {
    json!({
        "gameId": game.session_id,
        "status": "finished",
        "winner": game.winner,
        "players": game.players,
        "duration": game.duration_secs(),
        "startedAt": rfc3339(game.started_at),
        "endedAt": rfc3339(game.ended_at),
    })
}

fn rfc3339(at: OffsetDateTime) -> Option<String> {
    at.format(&Rfc3339).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use fourfold_protocol::{SessionId, SessionStatus};
    use time::Duration;

    use crate::publisher::PublishError;
    use crate::store::MemoryStore;

    /// Records every published event.
    #[derive(Default)]
    struct RecordingPublisher {
        events: Mutex<Vec<(String, serde_json::Value)>>,
    }

    impl EventPublisher for RecordingPublisher {
        async fn publish(
            &self,
            event: &str,
            payload: serde_json::Value,
        ) -> Result<(), PublishError> {
            self.events
                .lock()
                .unwrap()
                .push((event.to_string(), payload));
            Ok(())
        }
    }

    struct FailingPublisher;

    impl EventPublisher for FailingPublisher {
        async fn publish(
            &self,
            _event: &str,
            _payload: serde_json::Value,
        ) -> Result<(), PublishError> {
            Err(PublishError::Failed("broker down".into()))
        }
    }

    fn finished() -> FinishedGame {
        FinishedGame {
            session_id: SessionId::new("g1"),
            players: vec![Identity::new("alice"), Identity::opponent()],
            winner: Some(Identity::new("alice")),
            started_at: OffsetDateTime::UNIX_EPOCH,
            ended_at: OffsetDateTime::UNIX_EPOCH + Duration::seconds(90),
        }
    }

    #[tokio::test]
    async fn test_deliver_move_played_excludes_opponent_from_players() {
        let store = MemoryStore::new();
        let publisher = RecordingPublisher::default();
        let event = SessionEvent::MovePlayed {
            session_id: SessionId::new("g1"),
            status: SessionStatus::Active,
            winner: None,
            players: vec![Identity::new("alice"), Identity::opponent()],
        };

        deliver(event, &store, &publisher).await;

        let events = publisher.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "move_played");
        assert_eq!(events[0].1["gameId"], "g1");
        assert_eq!(events[0].1["status"], "active");
        assert_eq!(events[0].1["players"], json!(["alice"]));
        assert!(store.games().await.is_empty());
    }

    #[tokio::test]
    async fn test_deliver_finished_saves_and_publishes_duration() {
        let store = MemoryStore::new();
        let publisher = RecordingPublisher::default();

        deliver(SessionEvent::Finished(finished()), &store, &publisher).await;

        assert_eq!(store.games().await.len(), 1);
        let events = publisher.events.lock().unwrap();
        assert_eq!(events[0].0, "game_finished");
        assert_eq!(events[0].1["duration"], 90);
        assert_eq!(events[0].1["winner"], "alice");
        assert_eq!(events[0].1["players"], json!(["alice", "bot"]));
        assert_eq!(events[0].1["startedAt"], "1970-01-01T00:00:00Z");
    }

    #[tokio::test]
    async fn test_deliver_publish_failure_still_saves_game() {
        let store = MemoryStore::new();

        deliver(SessionEvent::Finished(finished()), &store, &FailingPublisher)
            .await;

        assert_eq!(store.games().await.len(), 1);
    }

    #[tokio::test]
    async fn test_run_dispatch_drains_until_senders_drop() {
        let store = MemoryStore::new();
        let publisher = RecordingPublisher::default();
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(SessionEvent::Finished(finished())).unwrap();
        tx.send(SessionEvent::Finished(finished())).unwrap();
        drop(tx);

        run_dispatch(rx, &store, &publisher).await;

        assert_eq!(store.games().await.len(), 2);
        assert_eq!(publisher.events.lock().unwrap().len(), 2);
    }
}
