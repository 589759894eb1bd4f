//! Active-game and history persistence contracts.
//!
//! Both stores are narrow document-store interfaces; the engine never sees
//! storage internals. The in-memory implementations keep records as JSON
//! documents, the same shape a key-value backend would hold, and surface
//! decode failures as corrupted-data errors.

use crate::games::types::{ActiveGame, CellIndex, HistoryRecord};
use crate::games::variant::GameVariant;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::Duration;

/// Store errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Corrupted record: {0}")]
    CorruptedData(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),
}

/// Persistence contract for the single in-progress game per (user, variant).
#[async_trait]
pub trait ActiveGameStore: Send + Sync {
    async fn get_by_user(
        &self,
        user: &str,
        variant: GameVariant,
    ) -> Result<Option<ActiveGame>, StoreError>;

    /// Insert only when no game exists for (user, variant). Returns `false`
    /// without writing when the slot is occupied. This is the store-level
    /// guard behind the engine's at-most-one-active-game invariant.
    async fn insert_if_absent(&self, game: &ActiveGame) -> Result<bool, StoreError>;

    /// Mark one more cell played on the stored game.
    async fn update_played(
        &self,
        user: &str,
        variant: GameVariant,
        game_id: &str,
        cell: CellIndex,
    ) -> Result<(), StoreError>;

    async fn delete(&self, user: &str, variant: GameVariant) -> Result<(), StoreError>;
}

/// Append-only store of terminal game snapshots, keyed by bet id.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn insert(&self, record: &HistoryRecord) -> Result<(), StoreError>;

    async fn get_by_bet(&self, bet_id: &str) -> Result<Option<HistoryRecord>, StoreError>;

    /// Most recent records for a user, newest first.
    async fn get_by_user(&self, user: &str, limit: usize)
        -> Result<Vec<HistoryRecord>, StoreError>;
}

fn active_key(user: &str, variant: GameVariant) -> String {
    format!("active:{}:{}", variant, user)
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(|e| StoreError::WriteFailed(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::CorruptedData(e.to_string()))
}

/// In-memory active-game store holding JSON documents.
pub struct InMemoryActiveGames {
    documents: DashMap<String, Vec<u8>>,
}

impl InMemoryActiveGames {
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
        }
    }
}

impl Default for InMemoryActiveGames {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActiveGameStore for InMemoryActiveGames {
    async fn get_by_user(
        &self,
        user: &str,
        variant: GameVariant,
    ) -> Result<Option<ActiveGame>, StoreError> {
        match self.documents.get(&active_key(user, variant)) {
            Some(bytes) => Ok(Some(decode(bytes.value())?)),
            None => Ok(None),
        }
    }

    async fn insert_if_absent(&self, game: &ActiveGame) -> Result<bool, StoreError> {
        let bytes = encode(game)?;
        match self.documents.entry(active_key(&game.user_id, game.variant)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(vacant) => {
                vacant.insert(bytes);
                Ok(true)
            }
        }
    }

    async fn update_played(
        &self,
        user: &str,
        variant: GameVariant,
        game_id: &str,
        cell: CellIndex,
    ) -> Result<(), StoreError> {
        let key = active_key(user, variant);
        let mut document = self
            .documents
            .get_mut(&key)
            .ok_or_else(|| StoreError::WriteFailed(format!("no active game at {}", key)))?;

        let mut game: ActiveGame = decode(document.value())?;
        if game.id != game_id {
            return Err(StoreError::WriteFailed(format!(
                "active game at {} is {}, not {}",
                key, game.id, game_id
            )));
        }

        game.played.insert(cell);
        *document = encode(&game)?;
        Ok(())
    }

    async fn delete(&self, user: &str, variant: GameVariant) -> Result<(), StoreError> {
        self.documents.remove(&active_key(user, variant));
        Ok(())
    }
}

/// In-memory history store with a bounded retention window.
///
/// Retention is enforced lazily: expired documents are dropped on read and
/// pruned opportunistically on insert, mirroring how a TTL index behaves.
pub struct InMemoryHistory {
    documents: DashMap<String, Vec<u8>>,
    by_user: DashMap<String, VecDeque<String>>,
    retention: Duration,
}

impl InMemoryHistory {
    pub fn new(retention: Duration) -> Self {
        Self {
            documents: DashMap::new(),
            by_user: DashMap::new(),
            retention,
        }
    }

    fn expired(&self, record: &HistoryRecord) -> bool {
        let age_ms = chrono::Utc::now().timestamp_millis() - record.archived_at;
        age_ms > self.retention.as_millis() as i64
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    async fn insert(&self, record: &HistoryRecord) -> Result<(), StoreError> {
        let bytes = encode(record)?;
        self.documents.insert(record.bet_id.clone(), bytes);
        self.by_user
            .entry(record.user_id.clone())
            .or_default()
            .push_front(record.bet_id.clone());

        // opportunistic pruning of this user's expired tail
        if let Some(mut index) = self.by_user.get_mut(&record.user_id) {
            while let Some(oldest) = index.back().cloned() {
                let stale = match self.documents.get(&oldest) {
                    Some(bytes) => decode::<HistoryRecord>(bytes.value())
                        .map(|r| self.expired(&r))
                        .unwrap_or(true),
                    None => true,
                };
                if !stale {
                    break;
                }
                index.pop_back();
                self.documents.remove(&oldest);
            }
        }

        Ok(())
    }

    async fn get_by_bet(&self, bet_id: &str) -> Result<Option<HistoryRecord>, StoreError> {
        let Some(bytes) = self.documents.get(bet_id) else {
            return Ok(None);
        };
        let record: HistoryRecord = decode(bytes.value())?;
        if self.expired(&record) {
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn get_by_user(
        &self,
        user: &str,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, StoreError> {
        let Some(index) = self.by_user.get(user) else {
            return Ok(Vec::new());
        };

        let mut records = Vec::with_capacity(limit.min(index.len()));
        for bet_id in index.iter() {
            if records.len() >= limit {
                break;
            }
            if let Some(bytes) = self.documents.get(bet_id) {
                let record: HistoryRecord = decode(bytes.value())?;
                if !self.expired(&record) {
                    records.push(record);
                }
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::types::{CellKind, Deck, GameOutcome};
    use crate::games::variant::{BoardParams, Difficulty};
    use std::collections::BTreeSet;

    fn sample_game(user: &str, id: &str) -> ActiveGame {
        let board =
            BoardParams::resolve(GameVariant::Mines, Difficulty::Grid { grid_size: 25, hazards: 3 })
                .unwrap();
        ActiveGame {
            id: id.to_string(),
            user_id: user.to_string(),
            variant: GameVariant::Mines,
            bet_id: format!("bet-{}", id),
            round_id: format!("round-{}", id),
            bet_amount: 1.0,
            board,
            deck: Deck::new(vec![CellKind::Safe; 25]),
            played: BTreeSet::new(),
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn test_insert_if_absent_guards_the_slot() {
        let store = InMemoryActiveGames::new();
        assert!(store.insert_if_absent(&sample_game("alice", "g1")).await.unwrap());
        assert!(!store.insert_if_absent(&sample_game("alice", "g2")).await.unwrap());

        // the original game is untouched
        let stored = store.get_by_user("alice", GameVariant::Mines).await.unwrap().unwrap();
        assert_eq!(stored.id, "g1");

        // other users and variants are independent slots
        assert!(store.insert_if_absent(&sample_game("bob", "g3")).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_played_checks_game_id() {
        let store = InMemoryActiveGames::new();
        store.insert_if_absent(&sample_game("alice", "g1")).await.unwrap();

        store
            .update_played("alice", GameVariant::Mines, "g1", CellIndex(4))
            .await
            .unwrap();
        let stored = store.get_by_user("alice", GameVariant::Mines).await.unwrap().unwrap();
        assert!(stored.played.contains(&CellIndex(4)));

        assert!(store
            .update_played("alice", GameVariant::Mines, "other", CellIndex(5))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_delete_clears_the_slot() {
        let store = InMemoryActiveGames::new();
        store.insert_if_absent(&sample_game("alice", "g1")).await.unwrap();
        store.delete("alice", GameVariant::Mines).await.unwrap();
        assert!(store.get_by_user("alice", GameVariant::Mines).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_history_retention_window() {
        let history = InMemoryHistory::new(Duration::from_secs(3600));
        let game = sample_game("alice", "g1");

        let fresh = HistoryRecord::from_game(
            &game,
            GameOutcome::CashedOut,
            2.0,
            2.0,
            chrono::Utc::now().timestamp_millis(),
        );
        let stale = HistoryRecord {
            bet_id: "bet-old".to_string(),
            archived_at: chrono::Utc::now().timestamp_millis() - 7_200_000,
            ..fresh.clone()
        };

        history.insert(&stale).await.unwrap();
        history.insert(&fresh).await.unwrap();

        assert!(history.get_by_bet(&fresh.bet_id).await.unwrap().is_some());
        assert!(history.get_by_bet("bet-old").await.unwrap().is_none());

        let recent = history.get_by_user("alice", 10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].bet_id, fresh.bet_id);
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let history = InMemoryHistory::new(Duration::from_secs(3600));
        let now = chrono::Utc::now().timestamp_millis();

        for i in 0..3 {
            let game = sample_game("alice", &format!("g{}", i));
            let record =
                HistoryRecord::from_game(&game, GameOutcome::Busted, 0.0, 0.0, now + i as i64);
            history.insert(&record).await.unwrap();
        }

        let recent = history.get_by_user("alice", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].bet_id, "bet-g2");
        assert_eq!(recent[1].bet_id, "bet-g1");
    }
}
