//! Payout multiplier math.
//!
//! The fair multiplier after `d` safe reveals on an `n`-cell board with `m`
//! hazards is `P(n, d) / P(n - m, d)` where `P(a, b)` is the falling
//! factorial. Both curves below reduce to that algebra; they are computed as
//! iterative ratio products so nothing overflows and nothing recurses, even
//! at the largest boards in use.

/// Round a multiplier to 2 decimal places, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Multiplier for a grid game after `revealed` safe cells.
///
/// Zero reveals pay zero. `hazards` must be below `grid_size` (the clamping in
/// variant resolution guarantees it).
pub fn grid_multiplier(revealed: u32, hazards: u32, grid_size: u32, house_edge: f64) -> f64 {
    if revealed == 0 {
        return 0.0;
    }

    let mut multiplier = 1.0 - house_edge;
    for i in 0..revealed {
        multiplier *= (grid_size - i) as f64 / (grid_size - hazards - i) as f64;
    }
    round2(multiplier)
}

/// Multiplier for a ladder game after `rows_cleared` rows.
///
/// Each row survives with probability `(columns - hazards_per_row) / columns`,
/// so the fair multiplier is the reciprocal product across cleared rows.
pub fn ladder_multiplier(
    rows_cleared: u32,
    hazards_per_row: u32,
    columns: u32,
    house_edge: f64,
) -> f64 {
    if rows_cleared == 0 {
        return 0.0;
    }

    let per_row = columns as f64 / (columns - hazards_per_row) as f64;
    round2((1.0 - house_edge) * per_row.powi(rows_cleared as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_reveals_pay_zero() {
        assert_eq!(grid_multiplier(0, 3, 25, 0.01), 0.0);
        assert_eq!(ladder_multiplier(0, 1, 4, 0.01), 0.0);
    }

    #[test]
    fn test_reference_scenario_25_cells_3_hazards() {
        // 0.99 * 25 / 22 = 1.125, rounded half away from zero
        assert_eq!(grid_multiplier(1, 3, 25, 0.01), 1.13);
    }

    #[test]
    fn test_grid_multiplier_is_monotone_in_reveals() {
        for (n, m) in [(25u32, 3u32), (36, 10), (64, 1), (25, 24)] {
            let mut previous = 0.0;
            for d in 0..=(n - m) {
                let multiplier = grid_multiplier(d, m, n, 0.01);
                assert!(
                    multiplier >= previous,
                    "multiplier dropped at n={} m={} d={}",
                    n,
                    m,
                    d
                );
                previous = multiplier;
            }
        }
    }

    #[test]
    fn test_grid_extremes_stay_finite() {
        // one safe cell on a 64-cell board: a single reveal pays the whole curve
        let multiplier = grid_multiplier(1, 63, 64, 0.01);
        assert!(multiplier > 60.0 && multiplier.is_finite());

        // full clear of the densest 25-cell board
        let multiplier = grid_multiplier(1, 24, 25, 0.01);
        assert_eq!(multiplier, 24.75);
    }

    #[test]
    fn test_ladder_matches_grid_algebra_per_row() {
        // one row of c columns with h hazards is a c-cell grid with h hazards
        // revealed once
        for (columns, hazards) in [(2u32, 1u32), (3, 1), (4, 1), (4, 3)] {
            assert_eq!(
                ladder_multiplier(1, hazards, columns, 0.01),
                grid_multiplier(1, hazards, columns, 0.01),
            );
        }
    }

    #[test]
    fn test_ladder_multiplier_is_monotone_in_rows() {
        let mut previous = 0.0;
        for row in 0..=9 {
            let multiplier = ladder_multiplier(row, 1, 3, 0.01);
            assert!(multiplier >= previous);
            previous = multiplier;
        }
        // 0.99 * 1.5^9
        assert_eq!(ladder_multiplier(9, 1, 3, 0.01), 38.06);
    }
}
