//! Cell addressing.
//!
//! A `Position` identifies a cell on the sheet and doubles as the node key
//! in the dependency graph.

use serde::{Deserialize, Serialize};

/// Exclusive row bound for valid positions.
pub const MAX_ROWS: usize = 16_384;
/// Exclusive column bound for valid positions.
pub const MAX_COLS: usize = 16_384;

/// A (row, column) cell address, 0-based.
///
/// Positions compare row-major, so sorted reference lists have a stable
/// top-to-bottom, left-to-right order. A `Position` may lie outside the
/// configured bounds: the parser accepts references like `A20000` and
/// validity is checked separately (`is_valid`), so an out-of-range
/// reference surfaces as a `#REF!` value rather than a parse failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// Row index (0-based)
    pub row: usize,
    /// Column index (0-based)
    pub col: usize,
}

impl Position {
    /// Create a new Position.
    #[inline]
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Range check against the configured sheet bounds. Nothing else.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.row < MAX_ROWS && self.col < MAX_COLS
    }

    /// Parse the conventional letter+number text form (`A1`, `aa10`).
    ///
    /// Accepts lowercase, rejects row 0, empty parts, and trailing garbage.
    /// Out-of-bounds positions parse successfully; see the type docs.
    pub fn parse(s: &str) -> Option<Position> {
        let s = s.trim();
        let split = s.find(|c: char| c.is_ascii_digit())?;
        let (letters, digits) = s.split_at(split);
        if letters.is_empty() || digits.is_empty() {
            return None;
        }
        let col = letters_to_col(letters)?;
        let row: usize = digits.parse().ok()?;
        if row == 0 {
            return None;
        }
        Some(Position::new(row - 1, col))
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", col_to_letters(self.col), self.row + 1)
    }
}

/// Convert 0-based column index to letter(s): 0=A, 25=Z, 26=AA, etc.
pub(crate) fn col_to_letters(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Convert column letter(s) to a 0-based index. Rejects non-letters.
pub(crate) fn letters_to_col(letters: &str) -> Option<usize> {
    let mut col: usize = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let d = (c.to_ascii_uppercase() as u8 - b'A') as usize;
        col = col.checked_mul(26)?.checked_add(d + 1)?;
    }
    Some(col - 1)
}
