//! Error taxonomy for the gridfair engine.
//!
//! Four families, matching how callers are expected to react:
//! - validation errors are rejected before any lock is taken and never retried
//! - state conflicts are surfaced verbatim, no retry
//! - lock contention surfaces as a transient slow-down the caller may retry
//! - downstream collaborator failures carry their own error types

use crate::games::types::CellIndex;
use crate::games::variant::GameVariant;
use crate::ledger::LedgerError;
use crate::rounds::RoundError;
use crate::stores::StoreError;

/// Errors surfaced by the game state machine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    // Validation: malformed input, rejected before any lock is taken.
    #[error("Unsupported grid size: {0}")]
    UnsupportedGridSize(u8),

    #[error("Unsupported ladder column count: {0}")]
    UnsupportedColumns(u8),

    #[error("Difficulty parameters do not fit the {0} variant")]
    DifficultyMismatch(GameVariant),

    #[error("Invalid bet amount: {0}")]
    InvalidBetAmount(f64),

    #[error("Client seed must be 1 to 64 printable ASCII characters")]
    InvalidClientSeed,

    // State conflicts: surfaced verbatim to the caller.
    #[error("An active {0} game already exists")]
    ActiveGameExists(GameVariant),

    #[error("No active {0} game")]
    NoActiveGame(GameVariant),

    #[error("Cell {0} is out of range or already played")]
    InvalidCell(CellIndex),

    #[error("No safe cell revealed yet, nothing to cash out")]
    NoSafeCellRevealed,

    // Contention: transient, the caller may retry.
    #[error("Too many concurrent requests, slow down")]
    SlowDown,

    // Downstream collaborators.
    #[error(transparent)]
    Round(#[from] RoundError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Errors terminal for one fairness-audit attempt. None of these warrant an
/// automatic retry.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("A {0} game is still active; the round must conclude before it can be audited")]
    GameStillActive(GameVariant),

    #[error("Bet {0} has expired out of the verification retention window")]
    TooOldToVerify(String),

    #[error("No round recorded for bet {0}")]
    NoRound(String),

    #[error("Server seed for round {0} is not available")]
    NoSeed(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Convenience alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = EngineError::ActiveGameExists(GameVariant::Mines);
        assert!(error.to_string().contains("active mines game"));

        let error = EngineError::InvalidCell(CellIndex(25));
        assert!(error.to_string().contains("25"));
    }

    #[test]
    fn test_downstream_errors_convert() {
        let error: EngineError = RoundError::NoRound("r-1".to_string()).into();
        assert!(matches!(error, EngineError::Round(_)));

        let error: EngineError = StoreError::CorruptedData("bad json".to_string()).into();
        assert!(matches!(error, EngineError::Store(_)));
    }
}
