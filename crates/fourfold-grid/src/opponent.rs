//! The algorithmic opponent.

use crate::grid::{COLUMNS, Grid, Mark};

/// A deterministic one-ply opponent.
///
/// Rules, first match wins:
/// 1. play a column that wins immediately
/// 2. otherwise block a column where the other side would win immediately
/// 3. otherwise take the playable column closest to the centre, ties
///    broken towards the left
///
/// All lookahead runs on copies of the grid; the caller's grid is never
/// modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opponent {
    mark: Mark,
}

impl Opponent {
    pub fn new(mark: Mark) -> Self {
        Self { mark }
    }

    pub fn mark(&self) -> Mark {
        self.mark
    }

    /// Picks a column for this opponent's next move, or `None` if the grid
    /// is full.
    pub fn choose_move(&self, grid: &Grid) -> Option<usize> {
        self.winning_column(grid, self.mark)
            .or_else(|| self.winning_column(grid, self.mark.other()))
            .or_else(|| preference_order().find(|&col| grid.is_playable(col)))
    }

    /// First column (left to right) where `mark` would complete a line.
    fn winning_column(&self, grid: &Grid, mark: Mark) -> Option<usize> {
        grid.playable_columns().find(|&col| {
            let mut trial = *grid;
            trial
                .apply_move(col, mark)
                .is_ok_and(|outcome| outcome.winner == Some(mark))
        })
    }
}

/// Columns ordered centre-out, left before right at equal distance.
/// For a 7-wide grid: 3, 2, 4, 1, 5, 0, 6.
fn preference_order() -> impl Iterator<Item = usize> {
    let centre = COLUMNS / 2;
    (0..=centre).flat_map(move |offset| {
        let left = centre.checked_sub(offset);
        let right = Some(centre + offset).filter(|&c| offset > 0 && c < COLUMNS);
        left.into_iter().chain(right)
    })
}
