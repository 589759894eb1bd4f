//! Gridfair - provably fair tile-reveal game engine
//!
//! The engine behind the house "mines" family: grid mines on 25 to 64 cells,
//! the fixed 25-cell fruits variant and the row-based towers ladder. It
//! combines a deterministic commit-reveal random protocol, a per-user
//! concurrency-guarded state machine, combinatorial payout math and a
//! replay-based fairness verifier.
//!
//! Everything with money or transport attached is a collaborator behind a
//! trait: the bet ledger, the round commitment service, the active-game and
//! history stores and the session push channel. In-memory implementations of
//! each ship with the crate for tests and single-process embedders.

pub mod config;
pub mod errors;
pub mod fairness;
pub mod games;
pub mod ledger;
pub mod locks;
pub mod notify;
pub mod rounds;
pub mod stores;

pub use config::EngineConfig;
pub use errors::{EngineError, EngineResult, VerifyError};
pub use fairness::{VerificationReplayer, VerificationReport};
pub use games::engine::{EngineStats, GameEngine, StartRequest};
pub use games::types::{
    ActiveGame, ActiveSnapshot, CellIndex, CellKind, Deck, GameOutcome, GameSettled, GameStarted,
    HistoryRecord, RevealContinued, RevealOutcome, RoundCommit,
};
pub use games::variant::{BoardParams, Difficulty, GameVariant};
pub use ledger::{Bet, ClosedBet, InMemoryLedger, Ledger, LedgerError};
pub use notify::{BroadcastNotifier, GameNotifier, NullNotifier};
pub use rounds::{CommitRevealRounds, RoundError, RoundService};
pub use stores::{
    ActiveGameStore, HistoryStore, InMemoryActiveGames, InMemoryHistory, StoreError,
};
