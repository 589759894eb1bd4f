use crate::games::variant::{BoardParams, GameVariant};
use crate::ledger::ClosedBet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Kind of a single board cell
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Safe,
    Hazard,
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellKind::Safe => write!(f, "safe"),
            CellKind::Hazard => write!(f, "hazard"),
        }
    }
}

/// Zero-based index of a board cell. Ladder boards are indexed row-major.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct CellIndex(pub u8);

impl CellIndex {
    /// Row this cell sits in on a board with `columns` cells per row.
    pub fn row(&self, columns: u8) -> u8 {
        self.0 / columns
    }
}

impl fmt::Display for CellIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for CellIndex {
    fn from(index: u8) -> Self {
        Self(index)
    }
}

/// Deterministic mapping from cell index to cell kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Deck {
    cells: Vec<CellKind>,
}

impl Deck {
    pub fn new(cells: Vec<CellKind>) -> Self {
        Self { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Kind of the given cell, or `None` when the index is off the board.
    pub fn get(&self, cell: CellIndex) -> Option<CellKind> {
        self.cells.get(cell.0 as usize).copied()
    }

    pub fn kinds(&self) -> &[CellKind] {
        &self.cells
    }

    pub fn hazard_count(&self) -> usize {
        self.cells.iter().filter(|k| **k == CellKind::Hazard).count()
    }

    /// Append another deck's cells (used to stitch ladder rows together).
    pub fn extend(&mut self, other: Deck) {
        self.cells.extend(other.cells);
    }
}

/// The single in-progress game for a (user, variant) pair.
///
/// At most one of these exists per (user, variant) at any instant; that is the
/// central correctness invariant of the engine and is what the active-game
/// store's insert-if-absent semantics protect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveGame {
    pub id: String,
    pub user_id: String,
    pub variant: GameVariant,
    pub bet_id: String,
    pub round_id: String,
    pub bet_amount: f64,
    pub board: BoardParams,
    pub deck: Deck,
    /// Cells revealed so far, always a subset of the deck's indices.
    pub played: BTreeSet<CellIndex>,
    pub created_at: i64,
}

impl ActiveGame {
    /// Number of safe cells revealed so far.
    pub fn safe_revealed(&self) -> u32 {
        self.played
            .iter()
            .filter(|cell| self.deck.get(**cell) == Some(CellKind::Safe))
            .count() as u32
    }

    /// Ladder rows cleared so far (rows containing a revealed safe cell).
    pub fn rows_cleared(&self) -> u8 {
        let mut rows: BTreeSet<u8> = BTreeSet::new();
        for cell in &self.played {
            if self.deck.get(*cell) == Some(CellKind::Safe) {
                rows.insert(cell.row(self.board.columns));
            }
        }
        rows.len() as u8
    }

    /// Row the ladder game is currently on: max played row + 1.
    pub fn current_row(&self) -> u8 {
        self.played
            .iter()
            .map(|cell| cell.row(self.board.columns))
            .max()
            .map_or(0, |row| row + 1)
    }
}

/// Why a game reached a terminal state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameOutcome {
    /// A hazard cell was revealed, payout forced to zero
    Busted,
    /// The player cashed out at the current multiplier
    CashedOut,
    /// Max payout, board exhaustion or final ladder row forced a closeout
    AutoClosedOut,
}

impl fmt::Display for GameOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameOutcome::Busted => write!(f, "busted"),
            GameOutcome::CashedOut => write!(f, "cashedout"),
            GameOutcome::AutoClosedOut => write!(f, "autoclosedout"),
        }
    }
}

/// Immutable terminal snapshot of a game, keyed by bet id in the history store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub game_id: String,
    pub user_id: String,
    pub variant: GameVariant,
    pub bet_id: String,
    pub round_id: String,
    pub bet_amount: f64,
    pub board: BoardParams,
    pub deck: Deck,
    pub played: BTreeSet<CellIndex>,
    pub outcome: GameOutcome,
    pub multiplier: f64,
    pub payout: f64,
    pub archived_at: i64,
}

impl HistoryRecord {
    pub fn from_game(
        game: &ActiveGame,
        outcome: GameOutcome,
        multiplier: f64,
        payout: f64,
        archived_at: i64,
    ) -> Self {
        Self {
            game_id: game.id.clone(),
            user_id: game.user_id.clone(),
            variant: game.variant,
            bet_id: game.bet_id.clone(),
            round_id: game.round_id.clone(),
            bet_amount: game.bet_amount,
            board: game.board,
            deck: game.deck.clone(),
            played: game.played.clone(),
            outcome,
            multiplier,
            payout,
            archived_at,
        }
    }
}

/// Committed round info safe to show while the round is still running.
/// The server seed itself is never part of this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundCommit {
    pub round_id: String,
    pub hashed_server_seed: String,
    pub client_seed: String,
    pub nonce: u64,
}

/// Result of starting a game: the new game id, the open bet and the commitment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStarted {
    pub game_id: String,
    pub bet: crate::ledger::Bet,
    pub round: RoundCommit,
}

/// A safe reveal in a game that keeps running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealContinued {
    pub game_id: String,
    pub cell: CellIndex,
    pub kind: CellKind,
    pub multiplier: f64,
    pub safe_revealed: u32,
    pub round: RoundCommit,
}

/// Terminal snapshot returned to the caller and pushed to the user's session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSettled {
    pub game_id: String,
    pub user_id: String,
    pub variant: GameVariant,
    pub outcome: GameOutcome,
    pub multiplier: f64,
    pub payout: f64,
    pub bet_amount: f64,
    pub deck: Deck,
    pub played: BTreeSet<CellIndex>,
    /// `None` when the ledger closeout failed; the outcome stands regardless
    /// and reconciliation happens outside the engine.
    pub closed_bet: Option<ClosedBet>,
    pub settled_at: i64,
}

/// Outcome of a reveal: either the game continues or it just settled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RevealOutcome {
    Continued(RevealContinued),
    Settled(GameSettled),
}

/// Masked view of an in-progress game for session resume.
/// Unrevealed cells are withheld; only played cells expose their kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveSnapshot {
    pub game_id: String,
    pub variant: GameVariant,
    pub bet_amount: f64,
    pub board: BoardParams,
    pub revealed: std::collections::BTreeMap<CellIndex, CellKind>,
    pub multiplier: f64,
    pub round: RoundCommit,
}
