//! Round commitment service: commit-reveal seed bookkeeping.
//!
//! A round commits to a secret server seed by publishing its SHA-256 hash
//! before play. The deck hash is derived from the seed, the player's client
//! seed and a per-(user, variant) nonce, so once the seed is revealed anyone
//! can rebuild the deck. The service guarantees a seed is revealed at most
//! once per round and never before the round has concluded.

use crate::games::types::RoundCommit;
use crate::games::variant::GameVariant;
use async_trait::async_trait;
use dashmap::DashMap;
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// SHA-256 of a string, hex encoded.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Salted hash used both to derive decks and to replay them:
/// `sha256_hex("{seed}-{salt}")`.
pub fn salted_hash(seed: &str, salt: &str) -> String {
    sha256_hex(&format!("{}-{}", seed, salt))
}

/// Salt combining the player-visible round inputs.
pub fn deck_salt(client_seed: &str, nonce: u64) -> String {
    format!("{} - {}", client_seed, nonce)
}

/// Round errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum RoundError {
    #[error("A round is already in progress for {0}")]
    RoundInProgress(GameVariant),

    #[error("No round found: {0}")]
    NoRound(String),

    #[error("Round {0} has not concluded; its seed stays sealed")]
    NotConcluded(String),
}

/// A freshly committed round handed to the engine. The deck hash is derived
/// from the secret seed but does not expose it; it never leaves the engine.
#[derive(Debug, Clone)]
pub struct OpenedRound {
    pub commit: RoundCommit,
    pub deck_hash: String,
}

/// A revealed round, safe to hand to a verifier once the round concluded.
#[derive(Debug, Clone)]
pub struct RevealedRound {
    pub round_id: String,
    pub server_seed: String,
    pub hashed_server_seed: String,
    pub client_seed: String,
    pub nonce: u64,
}

/// Round commitment collaborator contract.
#[async_trait]
pub trait RoundService: Send + Sync {
    /// Issue a committed round for (user, variant). Fails while a previous
    /// round for the same pair is still open.
    async fn start_round(
        &self,
        user: &str,
        variant: GameVariant,
        client_seed: &str,
    ) -> Result<OpenedRound, RoundError>;

    /// Mark the current round for (user, variant) concluded. Reveal becomes
    /// possible only after this.
    async fn conclude_round(&self, user: &str, variant: GameVariant) -> Result<(), RoundError>;

    /// Committed (still hashed) info for a stored round.
    async fn commit_info(&self, round_id: &str) -> Result<RoundCommit, RoundError>;

    /// Reveal the server seed of a concluded round. Idempotent: repeat calls
    /// return the same seed.
    async fn reveal_round(&self, round_id: &str) -> Result<RevealedRound, RoundError>;
}

#[derive(Debug, Clone)]
struct RoundState {
    id: String,
    client_seed: String,
    server_seed: String,
    hashed_server_seed: String,
    nonce: u64,
    concluded: bool,
    revealed: bool,
}

impl RoundState {
    fn commit(&self) -> RoundCommit {
        RoundCommit {
            round_id: self.id.clone(),
            hashed_server_seed: self.hashed_server_seed.clone(),
            client_seed: self.client_seed.clone(),
            nonce: self.nonce,
        }
    }
}

/// In-memory commit-reveal implementation.
pub struct CommitRevealRounds {
    /// Current round id per (user, variant)
    current: DashMap<(String, GameVariant), String>,
    /// All rounds by id, kept for verification lookups
    rounds: DashMap<String, RoundState>,
    /// Next nonce per (user, variant)
    nonces: DashMap<(String, GameVariant), u64>,
}

impl CommitRevealRounds {
    pub fn new() -> Self {
        Self {
            current: DashMap::new(),
            rounds: DashMap::new(),
            nonces: DashMap::new(),
        }
    }

    fn fresh_server_seed() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

impl Default for CommitRevealRounds {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoundService for CommitRevealRounds {
    async fn start_round(
        &self,
        user: &str,
        variant: GameVariant,
        client_seed: &str,
    ) -> Result<OpenedRound, RoundError> {
        let key = (user.to_string(), variant);

        if let Some(current_id) = self.current.get(&key) {
            if let Some(round) = self.rounds.get(current_id.value()) {
                if !round.concluded {
                    return Err(RoundError::RoundInProgress(variant));
                }
            }
        }

        let nonce = {
            let mut entry = self.nonces.entry(key.clone()).or_insert(0);
            *entry += 1;
            *entry
        };

        let server_seed = Self::fresh_server_seed();
        let state = RoundState {
            id: Uuid::new_v4().to_string(),
            client_seed: client_seed.to_string(),
            server_seed: server_seed.clone(),
            hashed_server_seed: sha256_hex(&server_seed),
            nonce,
            concluded: false,
            revealed: false,
        };

        let opened = OpenedRound {
            commit: state.commit(),
            deck_hash: salted_hash(&server_seed, &deck_salt(client_seed, nonce)),
        };

        tracing::debug!(user = user, variant = %variant, nonce, round_id = %state.id, "round committed");
        self.current.insert(key, state.id.clone());
        self.rounds.insert(state.id.clone(), state);
        Ok(opened)
    }

    async fn conclude_round(&self, user: &str, variant: GameVariant) -> Result<(), RoundError> {
        let key = (user.to_string(), variant);
        let current_id = self
            .current
            .get(&key)
            .map(|id| id.value().clone())
            .ok_or_else(|| RoundError::NoRound(format!("{}:{}", user, variant)))?;

        let mut round = self
            .rounds
            .get_mut(&current_id)
            .ok_or_else(|| RoundError::NoRound(current_id.clone()))?;
        round.concluded = true;
        Ok(())
    }

    async fn commit_info(&self, round_id: &str) -> Result<RoundCommit, RoundError> {
        self.rounds
            .get(round_id)
            .map(|round| round.commit())
            .ok_or_else(|| RoundError::NoRound(round_id.to_string()))
    }

    async fn reveal_round(&self, round_id: &str) -> Result<RevealedRound, RoundError> {
        let mut round = self
            .rounds
            .get_mut(round_id)
            .ok_or_else(|| RoundError::NoRound(round_id.to_string()))?;

        if !round.concluded {
            return Err(RoundError::NotConcluded(round_id.to_string()));
        }

        if !round.revealed {
            round.revealed = true;
            tracing::info!(round_id = round_id, nonce = round.nonce, "server seed revealed");
        }

        Ok(RevealedRound {
            round_id: round.id.clone(),
            server_seed: round.server_seed.clone(),
            hashed_server_seed: round.hashed_server_seed.clone(),
            client_seed: round.client_seed.clone(),
            nonce: round.nonce,
        })
    }
}
