//! Game variants and difficulty resolution.
//!
//! All three house games run on the same engine; a variant only decides the
//! board shape, how hazard counts are clamped and which payout curve applies.

use crate::errors::EngineError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Supported tile-reveal game variants
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GameVariant {
    /// Grid mines game with a selectable 25/36/49/64-cell board
    Mines,
    /// Fixed 25-cell variant (safe = fruit, hazard = poop)
    Fruits,
    /// Row-based ladder game, one pick per row
    Towers,
}

impl fmt::Display for GameVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameVariant::Mines => write!(f, "mines"),
            GameVariant::Fruits => write!(f, "fruits"),
            GameVariant::Towers => write!(f, "towers"),
        }
    }
}

/// Board shape of the fixed 25-cell variant.
pub const FRUITS_GRID_SIZE: u8 = 25;

/// Ladder boards always have this many rows.
pub const TOWERS_ROWS: u8 = 9;

/// Ladder column bounds (inclusive).
pub const TOWERS_MIN_COLUMNS: u8 = 2;
pub const TOWERS_MAX_COLUMNS: u8 = 4;

/// Square grid sizes the mines variant accepts, mapped to (rows, columns).
static GRID_SHAPES: Lazy<HashMap<u8, (u8, u8)>> = Lazy::new(|| {
    HashMap::from([(25, (5, 5)), (36, (6, 6)), (49, (7, 7)), (64, (8, 8))])
});

/// Player-chosen difficulty parameters for a new game
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Difficulty {
    /// Mines: grid size and hazard count
    Grid { grid_size: u8, hazards: u8 },
    /// Fruits: hazard count on the fixed 25-cell board
    Fixed { hazards: u8 },
    /// Towers: columns per row and hazards per row
    Ladder { columns: u8, hazards_per_row: u8 },
}

/// Resolved board shape and hazard parameters for one game.
///
/// For grid games `hazards` counts hazards on the whole board; for the ladder
/// it counts hazards per row. Hazard counts are clamped, never rejected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoardParams {
    pub variant: GameVariant,
    pub grid_size: u8,
    pub rows: u8,
    pub columns: u8,
    pub hazards: u8,
}

impl BoardParams {
    /// Validate a difficulty request against a variant and clamp hazard counts.
    pub fn resolve(variant: GameVariant, difficulty: Difficulty) -> Result<Self, EngineError> {
        match (variant, difficulty) {
            (GameVariant::Mines, Difficulty::Grid { grid_size, hazards }) => {
                let (rows, columns) = *GRID_SHAPES
                    .get(&grid_size)
                    .ok_or(EngineError::UnsupportedGridSize(grid_size))?;
                Ok(Self {
                    variant,
                    grid_size,
                    rows,
                    columns,
                    hazards: clamp_hazards(hazards, grid_size),
                })
            }
            (GameVariant::Fruits, Difficulty::Fixed { hazards }) => Ok(Self {
                variant,
                grid_size: FRUITS_GRID_SIZE,
                rows: 5,
                columns: 5,
                hazards: clamp_hazards(hazards, FRUITS_GRID_SIZE),
            }),
            (GameVariant::Towers, Difficulty::Ladder { columns, hazards_per_row }) => {
                if !(TOWERS_MIN_COLUMNS..=TOWERS_MAX_COLUMNS).contains(&columns) {
                    return Err(EngineError::UnsupportedColumns(columns));
                }
                Ok(Self {
                    variant,
                    grid_size: TOWERS_ROWS * columns,
                    rows: TOWERS_ROWS,
                    columns,
                    hazards: clamp_hazards(hazards_per_row, columns),
                })
            }
            _ => Err(EngineError::DifficultyMismatch(variant)),
        }
    }

    /// Safe cells a grid game can reveal before the board is exhausted.
    pub fn max_safe_reveals(&self) -> u8 {
        match self.variant {
            GameVariant::Towers => self.rows,
            _ => self.grid_size - self.hazards,
        }
    }
}

/// Hazard counts are clamped into `[1, cells - 1]` rather than rejected.
fn clamp_hazards(requested: u8, cells: u8) -> u8 {
    requested.clamp(1, cells - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mines_grid_sizes() {
        for size in [25u8, 36, 49, 64] {
            let board =
                BoardParams::resolve(GameVariant::Mines, Difficulty::Grid { grid_size: size, hazards: 3 })
                    .expect("supported grid size");
            assert_eq!(board.grid_size, size);
            assert_eq!(board.rows as u16 * board.columns as u16, size as u16);
        }

        assert!(matches!(
            BoardParams::resolve(GameVariant::Mines, Difficulty::Grid { grid_size: 30, hazards: 3 }),
            Err(EngineError::UnsupportedGridSize(30))
        ));
    }

    #[test]
    fn test_hazards_are_clamped_not_rejected() {
        let board =
            BoardParams::resolve(GameVariant::Fruits, Difficulty::Fixed { hazards: 0 }).unwrap();
        assert_eq!(board.hazards, 1);

        let board =
            BoardParams::resolve(GameVariant::Fruits, Difficulty::Fixed { hazards: 200 }).unwrap();
        assert_eq!(board.hazards, 24);
    }

    #[test]
    fn test_towers_shape() {
        let board = BoardParams::resolve(
            GameVariant::Towers,
            Difficulty::Ladder { columns: 4, hazards_per_row: 3 },
        )
        .unwrap();
        assert_eq!(board.rows, TOWERS_ROWS);
        assert_eq!(board.grid_size, 36);
        assert_eq!(board.hazards, 3);
        assert_eq!(board.max_safe_reveals(), TOWERS_ROWS);

        assert!(matches!(
            BoardParams::resolve(
                GameVariant::Towers,
                Difficulty::Ladder { columns: 5, hazards_per_row: 1 },
            ),
            Err(EngineError::UnsupportedColumns(5))
        ));
    }

    #[test]
    fn test_variant_difficulty_mismatch() {
        assert!(matches!(
            BoardParams::resolve(GameVariant::Mines, Difficulty::Fixed { hazards: 3 }),
            Err(EngineError::DifficultyMismatch(GameVariant::Mines))
        ));
    }
}
