//! Game state machine: start, reveal, cash out.
//!
//! One engine serves all variants. Every state-mutating operation is wrapped
//! in short per-user locks, reads the active-game store under that lock, and
//! on a terminal transition archives the game, concludes the round, closes the
//! bet and pushes the settled snapshot to the user's session.

use crate::config::EngineConfig;
use crate::errors::{EngineError, EngineResult};
use crate::games::deck;
use crate::games::payout;
use crate::games::types::{
    ActiveGame, ActiveSnapshot, CellIndex, CellKind, GameOutcome, GameSettled, GameStarted,
    HistoryRecord, RevealContinued, RevealOutcome,
};
use crate::games::variant::{BoardParams, Difficulty, GameVariant};
use crate::ledger::Ledger;
use crate::locks::{LockPurpose, UserLocks};
use crate::notify::GameNotifier;
use crate::rounds::RoundService;
use crate::stores::{ActiveGameStore, HistoryStore};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Request to start a new game
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub user_id: String,
    pub variant: GameVariant,
    pub bet_amount: f64,
    pub difficulty: Difficulty,
    pub client_seed: String,
}

/// Running engine totals, updated on every terminal transition.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStats {
    pub total_wagered: f64,
    pub total_paid_out: f64,
    pub games_settled: u64,
    pub busts: u64,
    pub cashouts: u64,
    pub auto_closeouts: u64,
}

/// The provably-fair tile-reveal engine.
pub struct GameEngine {
    config: EngineConfig,
    locks: UserLocks,
    rounds: Arc<dyn RoundService>,
    ledger: Arc<dyn Ledger>,
    active: Arc<dyn ActiveGameStore>,
    history: Arc<dyn HistoryStore>,
    notifier: Arc<dyn GameNotifier>,
    stats: Mutex<EngineStats>,
}

impl GameEngine {
    pub fn new(
        config: EngineConfig,
        rounds: Arc<dyn RoundService>,
        ledger: Arc<dyn Ledger>,
        active: Arc<dyn ActiveGameStore>,
        history: Arc<dyn HistoryStore>,
        notifier: Arc<dyn GameNotifier>,
    ) -> Self {
        let locks = UserLocks::new(config.lock_ttl());
        Self {
            config,
            locks,
            rounds,
            ledger,
            active,
            history,
            notifier,
            stats: Mutex::new(EngineStats::default()),
        }
    }

    /// Start a new game: commit a round, deal the deck, open the bet and
    /// create the active game atomically with respect to this user's locks.
    pub async fn start(&self, request: StartRequest) -> EngineResult<GameStarted> {
        // validation happens before any lock is taken
        let board = BoardParams::resolve(request.variant, request.difficulty)?;
        validate_bet_amount(&self.config, request.bet_amount)?;
        validate_client_seed(&request.client_seed)?;

        let _create_guard = self
            .locks
            .acquire(&request.user_id, LockPurpose::CreateRound)?;
        let _play_guard = self
            .locks
            .acquire(&request.user_id, LockPurpose::Play(request.variant))?;

        // optimistic pre-check; the store's insert_if_absent below is the
        // authoritative guard
        if self
            .active
            .get_by_user(&request.user_id, request.variant)
            .await?
            .is_some()
        {
            return Err(EngineError::ActiveGameExists(request.variant));
        }

        let opened = self
            .rounds
            .start_round(&request.user_id, request.variant, &request.client_seed)
            .await?;

        let dealt = match request.variant {
            GameVariant::Towers => {
                deck::generate_ladder(&opened.deck_hash, board.rows, board.columns, board.hazards)
            }
            _ => deck::generate(&opened.deck_hash, board.grid_size, board.hazards),
        };

        let bet = self
            .ledger
            .open_bet(&request.user_id, request.variant, request.bet_amount)
            .await?;

        let game = ActiveGame {
            id: Uuid::new_v4().to_string(),
            user_id: request.user_id.clone(),
            variant: request.variant,
            bet_id: bet.id.clone(),
            round_id: opened.commit.round_id.clone(),
            bet_amount: request.bet_amount,
            board,
            deck: dealt,
            played: BTreeSet::new(),
            created_at: chrono::Utc::now().timestamp_millis(),
        };

        if !self.active.insert_if_absent(&game).await? {
            // lost the residual check-then-insert race; void the wager (stake
            // returned) and release the round so the surviving game keeps its own
            tracing::warn!(
                user = %request.user_id,
                variant = %request.variant,
                bet_id = %bet.id,
                "start raced an existing active game, voiding bet"
            );
            if let Err(e) = self.ledger.close_bet(&bet.id, 1.0).await {
                tracing::warn!(bet_id = %bet.id, "failed to void raced bet: {}", e);
            }
            if let Err(e) = self
                .rounds
                .conclude_round(&request.user_id, request.variant)
                .await
            {
                tracing::warn!(round_id = %opened.commit.round_id, "failed to release raced round: {}", e);
            }
            return Err(EngineError::ActiveGameExists(request.variant));
        }

        tracing::info!(
            user = %request.user_id,
            variant = %request.variant,
            game_id = %game.id,
            bet_id = %bet.id,
            grid_size = board.grid_size,
            hazards = board.hazards,
            "game started"
        );

        Ok(GameStarted {
            game_id: game.id,
            bet,
            round: opened.commit,
        })
    }

    /// Reveal one cell. A hazard busts the game; a safe cell updates the
    /// multiplier and may auto-close the game at the payout cap, on board
    /// exhaustion or on the final ladder row.
    pub async fn reveal_cell(
        &self,
        user: &str,
        variant: GameVariant,
        game_id: &str,
        cell: CellIndex,
    ) -> EngineResult<RevealOutcome> {
        let _use_guard = self.locks.acquire(user, LockPurpose::UseRound)?;
        let _play_guard = self.locks.acquire(user, LockPurpose::Play(variant))?;

        let mut game = self
            .active
            .get_by_user(user, variant)
            .await?
            .filter(|game| game.id == game_id)
            .ok_or(EngineError::NoActiveGame(variant))?;

        let Some(kind) = game.deck.get(cell) else {
            return Err(EngineError::InvalidCell(cell));
        };
        if game.played.contains(&cell) {
            return Err(EngineError::InvalidCell(cell));
        }
        // ladder games may only pick in the current row
        if variant == GameVariant::Towers && cell.row(game.board.columns) != game.current_row() {
            return Err(EngineError::InvalidCell(cell));
        }

        self.active.update_played(user, variant, &game.id, cell).await?;
        game.played.insert(cell);

        if kind == CellKind::Hazard {
            tracing::info!(user, game_id, cell = %cell, "hazard revealed, game busted");
            let settled = self.settle(game, GameOutcome::Busted, 0.0).await?;
            return Ok(RevealOutcome::Settled(settled));
        }

        let multiplier = self.current_multiplier(&game);

        let board_cleared = match variant {
            GameVariant::Towers => game.rows_cleared() >= game.board.rows,
            _ => game.safe_revealed() >= game.board.max_safe_reveals() as u32,
        };
        let capped = multiplier * game.bet_amount > self.config.rules.max_payout;

        if board_cleared || capped {
            let final_multiplier = if capped {
                payout::round2(self.config.rules.max_payout / game.bet_amount).min(multiplier)
            } else {
                multiplier
            };
            let settled = self
                .settle(game, GameOutcome::AutoClosedOut, final_multiplier)
                .await?;
            return Ok(RevealOutcome::Settled(settled));
        }

        let round = self.rounds.commit_info(&game.round_id).await?;
        Ok(RevealOutcome::Continued(RevealContinued {
            game_id: game.id.clone(),
            cell,
            kind,
            multiplier,
            safe_revealed: game.safe_revealed(),
            round,
        }))
    }

    /// Cash out the current multiplier. Requires at least one safe reveal.
    pub async fn cashout(
        &self,
        user: &str,
        variant: GameVariant,
        game_id: &str,
    ) -> EngineResult<GameSettled> {
        let _use_guard = self.locks.acquire(user, LockPurpose::UseRound)?;
        let _play_guard = self.locks.acquire(user, LockPurpose::Play(variant))?;

        let game = self
            .active
            .get_by_user(user, variant)
            .await?
            .filter(|game| game.id == game_id)
            .ok_or(EngineError::NoActiveGame(variant))?;

        if game.safe_revealed() == 0 {
            return Err(EngineError::NoSafeCellRevealed);
        }

        let multiplier = self.current_multiplier(&game);
        self.settle(game, GameOutcome::CashedOut, multiplier).await
    }

    /// Masked view of the user's in-progress game, for session resume.
    pub async fn active_game(
        &self,
        user: &str,
        variant: GameVariant,
    ) -> EngineResult<Option<ActiveSnapshot>> {
        let Some(game) = self.active.get_by_user(user, variant).await? else {
            return Ok(None);
        };

        let round = self.rounds.commit_info(&game.round_id).await?;
        let revealed = game
            .played
            .iter()
            .filter_map(|cell| game.deck.get(*cell).map(|kind| (*cell, kind)))
            .collect();

        Ok(Some(ActiveSnapshot {
            game_id: game.id.clone(),
            variant,
            bet_amount: game.bet_amount,
            board: game.board,
            revealed,
            multiplier: self.current_multiplier(&game),
            round,
        }))
    }

    /// Snapshot of the engine's running totals.
    pub fn stats(&self) -> EngineStats {
        self.stats
            .lock()
            .map(|stats| stats.clone())
            .unwrap_or_default()
    }

    fn current_multiplier(&self, game: &ActiveGame) -> f64 {
        let edge = self.config.rules.house_edge;
        match game.variant {
            GameVariant::Towers => payout::ladder_multiplier(
                game.rows_cleared() as u32,
                game.board.hazards as u32,
                game.board.columns as u32,
                edge,
            ),
            _ => payout::grid_multiplier(
                game.safe_revealed(),
                game.board.hazards as u32,
                game.board.grid_size as u32,
                edge,
            ),
        }
    }

    /// Terminal transition shared by bust, cashout and auto-closeout.
    async fn settle(
        &self,
        game: ActiveGame,
        outcome: GameOutcome,
        multiplier: f64,
    ) -> EngineResult<GameSettled> {
        let payout_value = payout::round2(game.bet_amount * multiplier);
        let now = chrono::Utc::now().timestamp_millis();

        // archive first: once the deck is resolved the outcome is authoritative
        let record = HistoryRecord::from_game(&game, outcome, multiplier, payout_value, now);
        self.history.insert(&record).await?;
        self.active.delete(&game.user_id, game.variant).await?;

        if let Err(e) = self.rounds.conclude_round(&game.user_id, game.variant).await {
            tracing::warn!(game_id = %game.id, "failed to conclude round: {}", e);
        }

        // best effort: a failed closeout is logged and reconciled outside the
        // engine, the caller still receives the resolved result
        let closed_bet = match self.ledger.close_bet(&game.bet_id, multiplier).await {
            Ok(closed) => Some(closed),
            Err(e) => {
                tracing::warn!(
                    bet_id = %game.bet_id,
                    game_id = %game.id,
                    "ledger closeout failed, result returned anyway: {}",
                    e
                );
                None
            }
        };

        if let Ok(mut stats) = self.stats.lock() {
            stats.total_wagered += game.bet_amount;
            stats.total_paid_out += payout_value;
            stats.games_settled += 1;
            match outcome {
                GameOutcome::Busted => stats.busts += 1,
                GameOutcome::CashedOut => stats.cashouts += 1,
                GameOutcome::AutoClosedOut => stats.auto_closeouts += 1,
            }
        }

        let settled = GameSettled {
            game_id: game.id.clone(),
            user_id: game.user_id.clone(),
            variant: game.variant,
            outcome,
            multiplier,
            payout: payout_value,
            bet_amount: game.bet_amount,
            deck: game.deck,
            played: game.played,
            closed_bet,
            settled_at: now,
        };

        self.notifier.game_settled(&settled);
        tracing::info!(
            user = %settled.user_id,
            variant = %settled.variant,
            game_id = %settled.game_id,
            outcome = %outcome,
            multiplier,
            payout = payout_value,
            "game settled"
        );

        Ok(settled)
    }
}

fn validate_bet_amount(config: &EngineConfig, amount: f64) -> EngineResult<()> {
    if !amount.is_finite()
        || amount < config.rules.min_bet
        || amount > config.rules.max_bet
    {
        return Err(EngineError::InvalidBetAmount(amount));
    }
    Ok(())
}

fn validate_client_seed(seed: &str) -> EngineResult<()> {
    let printable_ascii = seed.bytes().all(|byte| (0x20..=0x7e).contains(&byte));
    if seed.is_empty() || seed.len() > 64 || !printable_ascii {
        return Err(EngineError::InvalidClientSeed);
    }
    Ok(())
}
