//! Bet ledger collaborator.
//!
//! The ledger owns money movement; the engine only references bets by id and
//! closes them out with a final multiplier. Closeout failures do not roll back
//! game-state archival (the resolved deck is authoritative); reconciliation is
//! a separate concern outside this engine.

use crate::games::variant::GameVariant;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An open wager referenced by exactly one active game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    pub id: String,
    pub user_id: String,
    pub variant: GameVariant,
    pub amount: f64,
    pub opened_at: i64,
}

/// A wager closed out at a final multiplier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedBet {
    pub id: String,
    pub user_id: String,
    pub variant: GameVariant,
    pub amount: f64,
    pub payout_multiplier: f64,
    pub payout_value: f64,
    pub closed_at: i64,
}

/// Ledger errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
    #[error("Bet {0} not found")]
    BetNotFound(String),

    #[error("Bet {0} is already closed")]
    AlreadyClosed(String),

    #[error("Bet rejected: {0}")]
    Rejected(String),
}

/// Bet ledger contract consumed by the engine.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn open_bet(
        &self,
        user: &str,
        variant: GameVariant,
        amount: f64,
    ) -> Result<Bet, LedgerError>;

    async fn close_bet(&self, bet_id: &str, multiplier: f64) -> Result<ClosedBet, LedgerError>;
}

#[derive(Debug, Clone)]
struct LedgerEntry {
    bet: Bet,
    closed: Option<ClosedBet>,
}

/// In-memory ledger used by tests and embedders without a real money service.
pub struct InMemoryLedger {
    bets: DashMap<String, LedgerEntry>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self { bets: DashMap::new() }
    }

    /// Closed-out state of a bet, if it has been closed.
    pub fn closed_bet(&self, bet_id: &str) -> Option<ClosedBet> {
        self.bets.get(bet_id).and_then(|entry| entry.closed.clone())
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn open_bet(
        &self,
        user: &str,
        variant: GameVariant,
        amount: f64,
    ) -> Result<Bet, LedgerError> {
        let bet = Bet {
            id: Uuid::new_v4().to_string(),
            user_id: user.to_string(),
            variant,
            amount,
            opened_at: chrono::Utc::now().timestamp_millis(),
        };

        self.bets.insert(
            bet.id.clone(),
            LedgerEntry {
                bet: bet.clone(),
                closed: None,
            },
        );
        Ok(bet)
    }

    async fn close_bet(&self, bet_id: &str, multiplier: f64) -> Result<ClosedBet, LedgerError> {
        let mut entry = self
            .bets
            .get_mut(bet_id)
            .ok_or_else(|| LedgerError::BetNotFound(bet_id.to_string()))?;

        if entry.closed.is_some() {
            return Err(LedgerError::AlreadyClosed(bet_id.to_string()));
        }

        let closed = ClosedBet {
            id: entry.bet.id.clone(),
            user_id: entry.bet.user_id.clone(),
            variant: entry.bet.variant,
            amount: entry.bet.amount,
            payout_multiplier: multiplier,
            payout_value: entry.bet.amount * multiplier,
            closed_at: chrono::Utc::now().timestamp_millis(),
        };
        entry.closed = Some(closed.clone());
        Ok(closed)
    }
}
