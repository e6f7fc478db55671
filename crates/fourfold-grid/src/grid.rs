//! The playing grid: gravity drops and line-of-four detection.
//!
//! Row 0 is the TOP of the grid and row `ROWS - 1` is the bottom, so a
//! disc dropped into an empty column lands in the highest-numbered row.

use serde::{Deserialize, Serialize};

use crate::GridError;

/// Number of rows in the grid.
pub const ROWS: usize = 6;

/// Number of columns in the grid.
pub const COLUMNS: usize = 7;

/// How many contiguous marks make a win.
const WIN_LENGTH: usize = 4;

/// The four line axes, each scanned in both signs from the placed disc:
/// horizontal, vertical, down-right diagonal, down-left diagonal.
const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// A `(row, column)` coordinate on the grid.
pub type Coord = (usize, usize);

// ---------------------------------------------------------------------------
// Mark / Cell
// ---------------------------------------------------------------------------

/// A player's mark. `One` always moves first.
///
/// Serialized as the plain integers `1` and `2`, which is what browser
/// clients index their colour tables with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Mark {
    One,
    Two,
}

impl Mark {
    /// Returns the opposing mark.
    pub fn other(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }

    /// Zero-based seat index: `One` → 0, `Two` → 1.
    pub fn index(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
        }
    }
}

impl From<Mark> for u8 {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::One => 1,
            Mark::Two => 2,
        }
    }
}

impl TryFrom<u8> for Mark {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(format!("invalid mark {other}")),
        }
    }
}

/// The content of one grid cell. Serialized as `0`, `1` or `2`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum Cell {
    #[default]
    Empty,
    Filled(Mark),
}

impl From<Cell> for u8 {
    fn from(cell: Cell) -> Self {
        match cell {
            Cell::Empty => 0,
            Cell::Filled(mark) => mark.into(),
        }
    }
}

impl TryFrom<u8> for Cell {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Empty),
            other => Mark::try_from(other).map(Self::Filled),
        }
    }
}

// ---------------------------------------------------------------------------
// MoveOutcome
// ---------------------------------------------------------------------------

/// The result of a successfully applied move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    /// The grid after the disc was placed.
    pub grid: Grid,
    /// Where the disc landed.
    pub placed: Coord,
    /// The mark that completed a line, if any.
    pub winner: Option<Mark>,
    /// `true` when the grid is full and nobody won.
    pub is_draw: bool,
    /// The contiguous run through `placed` that won the game. Empty unless
    /// `winner` is set; may be longer than four.
    pub winning_line: Vec<Coord>,
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// A fixed 6×7 grid. `Copy`, so lookahead can run on a private copy
/// without touching the owner's grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid {
    cells: [[Cell; COLUMNS]; ROWS],
}

impl Grid {
    /// Creates an empty grid.
    pub fn new() -> Self {
        Self {
            cells: [[Cell::Empty; COLUMNS]; ROWS],
        }
    }

    /// Returns the cell at `(row, col)`, or `None` if out of range.
    pub fn get(&self, row: usize, col: usize) -> Option<Cell> {
        self.cells.get(row)?.get(col).copied()
    }

    /// Returns `true` if a disc can still be dropped into `col`.
    pub fn is_playable(&self, col: usize) -> bool {
        col < COLUMNS && self.cells[0][col] == Cell::Empty
    }

    /// Iterates over every playable column, left to right.
    pub fn playable_columns(&self) -> impl Iterator<Item = usize> + '_ {
        (0..COLUMNS).filter(|&col| self.is_playable(col))
    }

    /// Returns `true` if no column can take another disc.
    pub fn is_full(&self) -> bool {
        self.cells[0].iter().all(|cell| *cell != Cell::Empty)
    }

    /// Drops `mark` into `column` and evaluates the result.
    ///
    /// # Errors
    /// - [`GridError::InvalidColumn`] if `column >= COLUMNS`
    /// - [`GridError::ColumnFull`] if the column has no empty cell
    ///
    /// On error the grid is unchanged.
    pub fn apply_move(
        &mut self,
        column: usize,
        mark: Mark,
    ) -> Result<MoveOutcome, GridError> {
        if column >= COLUMNS {
            return Err(GridError::InvalidColumn);
        }

        let row = (0..ROWS)
            .rev()
            .find(|&row| self.cells[row][column] == Cell::Empty)
            .ok_or(GridError::ColumnFull)?;

        self.cells[row][column] = Cell::Filled(mark);
        Ok(self.evaluate(row, column, mark))
    }

    /// Checks the four axes through the freshly placed disc.
    fn evaluate(&self, row: usize, col: usize, mark: Mark) -> MoveOutcome {
        for (dr, dc) in DIRECTIONS {
            let run = self.run_through(row, col, mark, dr, dc);
            if run.len() >= WIN_LENGTH {
                return MoveOutcome {
                    grid: *self,
                    placed: (row, col),
                    winner: Some(mark),
                    is_draw: false,
                    winning_line: run,
                };
            }
        }

        MoveOutcome {
            grid: *self,
            placed: (row, col),
            winner: None,
            is_draw: self.is_full(),
            winning_line: Vec::new(),
        }
    }

    /// Collects the contiguous run of `mark` through `(row, col)` along one
    /// axis: the placed cell first, then the positive side, then the
    /// negative side.
    fn run_through(
        &self,
        row: usize,
        col: usize,
        mark: Mark,
        dr: isize,
        dc: isize,
    ) -> Vec<Coord> {
        let mut run = vec![(row, col)];
        for sign in [1, -1] {
            let (step_r, step_c) = (dr * sign, dc * sign);
            let mut r = row as isize + step_r;
            let mut c = col as isize + step_c;
            while self.mark_at(r, c) == Some(mark) {
                run.push((r as usize, c as usize));
                r += step_r;
                c += step_c;
            }
        }
        run
    }

    fn mark_at(&self, row: isize, col: isize) -> Option<Mark> {
        let row = usize::try_from(row).ok()?;
        let col = usize::try_from(col).ok()?;
        match self.get(row, col)? {
            Cell::Filled(mark) => Some(mark),
            Cell::Empty => None,
        }
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a grid from six strings of `.`, `1` and `2`, top row first.
/// Shared by the unit tests in this crate.
#[cfg(test)]
pub(crate) fn parse(rows: [&str; ROWS]) -> Grid {
    let mut grid = Grid::new();
    for (r, line) in rows.iter().enumerate() {
        for (c, ch) in line.chars().enumerate() {
            grid.cells[r][c] = match ch {
                '1' => Cell::Filled(Mark::One),
                '2' => Cell::Filled(Mark::Two),
                _ => Cell::Empty,
            };
        }
    }
    grid
}
