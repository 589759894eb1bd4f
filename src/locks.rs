//! Short-lived per-user locks wrapping every state-mutating operation.
//!
//! Goals:
//! - Totally order start / reveal / cashout within one (user, purpose) key.
//! - Never block: acquisition either succeeds immediately or surfaces a
//!   slow-down condition to the caller. The engine does not retry.
//! - Survive a crashed holder: entries carry a TTL, so an expired lock can be
//!   taken over by the next acquirer.

use crate::errors::EngineError;
use crate::games::variant::GameVariant;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Purpose component of a lock key. Distinct purposes never contend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockPurpose {
    /// Creating a new round commitment for the user
    CreateRound,
    /// Consuming the user's current round (reveal / cashout paths)
    UseRound,
    /// Mutating the user's active game of one variant
    Play(GameVariant),
}

impl LockPurpose {
    fn key(&self, user: &str) -> String {
        match self {
            LockPurpose::CreateRound => format!("round:create:{}", user),
            LockPurpose::UseRound => format!("round:use:{}", user),
            LockPurpose::Play(variant) => format!("play:{}:{}", variant, user),
        }
    }
}

#[derive(Debug, Clone)]
struct LockEntry {
    token: Uuid,
    expires_at: Instant,
}

/// In-process lock table keyed by (purpose, user).
#[derive(Clone)]
pub struct UserLocks {
    entries: Arc<DashMap<String, LockEntry>>,
    ttl: Duration,
}

impl UserLocks {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Try to acquire the lock for (user, purpose).
    ///
    /// Returns a guard that releases on drop, or `SlowDown` when the key is
    /// held and not yet expired.
    pub fn acquire(&self, user: &str, purpose: LockPurpose) -> Result<LockGuard, EngineError> {
        let key = purpose.key(user);
        let token = Uuid::new_v4();
        let now = Instant::now();
        let entry = LockEntry {
            token,
            expires_at: now + self.ttl,
        };

        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at > now {
                    tracing::debug!(key = %key, "lock contention");
                    return Err(EngineError::SlowDown);
                }
                // stale holder, take the key over
                occupied.insert(entry);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
            }
        }

        Ok(LockGuard {
            entries: self.entries.clone(),
            key,
            token,
        })
    }
}

/// Releases its lock entry on drop. Only removes the entry it created, so a
/// guard outliving its TTL cannot free a key another caller took over.
pub struct LockGuard {
    entries: Arc<DashMap<String, LockEntry>>,
    key: String,
    token: Uuid,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.entries
            .remove_if(&self.key, |_, entry| entry.token == self.token);
    }
}
