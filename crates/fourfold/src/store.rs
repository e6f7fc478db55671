//! Durable storage of finished matches and the ranking query.

use std::collections::HashMap;
use std::future::Future;

use fourfold_protocol::Identity;
use fourfold_session::FinishedGame;
use serde::Serialize;
use tokio::sync::Mutex;

/// A storage backend failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// One row of the win ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardRow {
    #[serde(rename = "username")]
    pub identity: Identity,
    pub wins: u64,
}

/// Where finished matches go.
///
/// Called from the background dispatch task, never while the session
/// registry is locked. Failures are logged and dropped.
pub trait GameStore: Send + Sync + 'static {
    /// Records a finished match.
    fn save_game(
        &self,
        game: &FinishedGame,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// The `limit` identities with the most wins, most wins first.
    fn leaderboard(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<LeaderboardRow>, StoreError>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// A [`GameStore`] that keeps everything in process memory.
///
/// Wins by the embedded opponent are not counted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    games: Vec<FinishedGame>,
    wins: HashMap<Identity, u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every match saved so far, oldest first.
    pub async fn games(&self) -> Vec<FinishedGame> {
        self.inner.lock().await.games.clone()
    }
}

impl GameStore for MemoryStore {
    async fn save_game(&self, game: &FinishedGame) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(winner) = game.winner.as_ref().filter(|w| !w.is_reserved()) {
            *inner.wins.entry(winner.clone()).or_default() += 1;
        }
        inner.games.push(game.clone());
        Ok(())
    }

    async fn leaderboard(
        &self,
        limit: usize,
    ) -> Result<Vec<LeaderboardRow>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<LeaderboardRow> = inner
            .wins
            .iter()
            .map(|(identity, wins)| LeaderboardRow {
                identity: identity.clone(),
                wins: *wins,
            })
            .collect();
        rows.sort_by(|a, b| b.wins.cmp(&a.wins).then_with(|| a.identity.cmp(&b.identity)));
        rows.truncate(limit);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fourfold_protocol::SessionId;
    use time::OffsetDateTime;

    fn game(id: &str, winner: Option<&str>) -> FinishedGame {
        FinishedGame {
            session_id: SessionId::new(id),
            players: vec![Identity::new("alice"), Identity::new("bob")],
            winner: winner.map(Identity::new),
            started_at: OffsetDateTime::UNIX_EPOCH,
            ended_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[tokio::test]
    async fn test_save_game_counts_human_wins_only() {
        let store = MemoryStore::new();
        store.save_game(&game("g1", Some("alice"))).await.unwrap();
        store.save_game(&game("g2", Some("bot"))).await.unwrap();
        store.save_game(&game("g3", None)).await.unwrap();

        let rows = store.leaderboard(10).await.unwrap();

        assert_eq!(
            rows,
            vec![LeaderboardRow {
                identity: Identity::new("alice"),
                wins: 1
            }]
        );
        assert_eq!(store.games().await.len(), 3);
    }

    #[tokio::test]
    async fn test_leaderboard_orders_by_wins_then_name_and_limits() {
        let store = MemoryStore::new();
        for (id, winner) in [
            ("g1", "carol"),
            ("g2", "bob"),
            ("g3", "carol"),
            ("g4", "alice"),
        ] {
            store.save_game(&game(id, Some(winner))).await.unwrap();
        }

        let rows = store.leaderboard(2).await.unwrap();

        let names: Vec<&str> = rows.iter().map(|r| r.identity.as_str()).collect();
        assert_eq!(names, vec!["carol", "alice"]);
        assert_eq!(rows[0].wins, 2);
    }

    #[test]
    fn test_leaderboard_row_serializes_username() {
        let row = LeaderboardRow {
            identity: Identity::new("alice"),
            wins: 3,
        };
        assert_eq!(
            serde_json::to_value(row).unwrap(),
            serde_json::json!({"username": "alice", "wins": 3})
        );
    }
}
