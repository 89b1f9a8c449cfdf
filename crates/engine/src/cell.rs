use serde::{Deserialize, Serialize};

use crate::formula::{Formula, FormulaError};
use crate::position::Position;

/// Marker that forces the rest of the input to be literal text.
pub const ESCAPE_SIGN: char = '\'';
/// Marker that starts a formula.
pub const FORMULA_SIGN: char = '=';

/// The externally visible value of a cell: what a formula referencing it
/// sees, and what bulk value printing shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Error(FormulaError),
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            CellValue::Error(e) => write!(f, "{}", e),
        }
    }
}

/// A cell's stored payload. Closed set: every consumer matches all three
/// kinds exhaustively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CellContent {
    Empty,
    Text {
        raw: String,
        escaped: bool,
    },
    /// The result cache is filled by the sheet on first read and cleared by
    /// upward invalidation whenever anything upstream changes.
    #[serde(skip)]
    Formula {
        formula: Formula,
        cache: Option<Result<f64, FormulaError>>,
    },
}

impl Default for CellContent {
    fn default() -> Self {
        CellContent::Empty
    }
}

impl CellContent {
    /// Classify raw input text into content.
    ///
    /// - empty string: `Empty`
    /// - leading `'`: escaped text (the marker stays in the raw text)
    /// - leading `=` with more behind it: parsed formula; a parse failure is
    ///   returned so the caller can leave prior content untouched
    /// - a bare `=`, or anything else: plain text
    pub fn from_input(input: &str) -> Result<CellContent, String> {
        let mut chars = input.chars();
        match chars.next() {
            None => Ok(CellContent::Empty),
            Some(ESCAPE_SIGN) => Ok(CellContent::Text {
                raw: input.to_string(),
                escaped: true,
            }),
            Some(FORMULA_SIGN) if chars.next().is_some() => {
                let formula = Formula::parse(&input[1..])?;
                Ok(CellContent::Formula {
                    formula,
                    cache: None,
                })
            }
            Some(_) => Ok(CellContent::Text {
                raw: input.to_string(),
                escaped: false,
            }),
        }
    }
}

/// A cell in the sheet. Identity (its position) and graph edges live in the
/// sheet and its dependency graph; the cell itself only holds content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cell {
    content: CellContent,
}

impl Cell {
    pub(crate) fn new(content: CellContent) -> Self {
        Self { content }
    }

    pub fn content(&self) -> &CellContent {
        &self.content
    }

    /// The cell's value, read from the formula cache.
    ///
    /// Crate-internal: the sheet warms the cache before every read, so a
    /// cold formula never reaches this. Callers outside the crate read
    /// values through `Sheet::value`, which evaluates first.
    pub(crate) fn value(&self) -> CellValue {
        match &self.content {
            CellContent::Empty => CellValue::Number(0.0),
            CellContent::Text { raw, escaped } => {
                if *escaped {
                    // Strip exactly the one leading marker.
                    CellValue::Text(raw[ESCAPE_SIGN.len_utf8()..].to_string())
                } else {
                    CellValue::Text(raw.clone())
                }
            }
            CellContent::Formula { cache, .. } => match cache {
                Some(Ok(n)) => CellValue::Number(*n),
                Some(Err(e)) => CellValue::Error(*e),
                None => CellValue::Number(0.0),
            },
        }
    }

    /// The text form: raw text as set (marker included), or the canonical
    /// `=`-prefixed rendering for formulas.
    pub fn text(&self) -> String {
        match &self.content {
            CellContent::Empty => String::new(),
            CellContent::Text { raw, .. } => raw.clone(),
            CellContent::Formula { formula, .. } => {
                format!("{}{}", FORMULA_SIGN, formula.expression())
            }
        }
    }

    /// Positions this cell's formula reads, deduplicated and ordered.
    /// Empty for non-formula cells.
    pub fn referenced_cells(&self) -> Vec<Position> {
        match &self.content {
            CellContent::Formula { formula, .. } => formula.referenced_cells(),
            _ => Vec::new(),
        }
    }

    /// Clear the formula result cache. Idempotent; a no-op for non-formula
    /// cells. Returns whether a populated cache was actually dropped.
    pub(crate) fn invalidate(&mut self) -> bool {
        match &mut self.content {
            CellContent::Formula { cache, .. } => cache.take().is_some(),
            _ => false,
        }
    }

    pub(crate) fn needs_eval(&self) -> bool {
        matches!(
            self.content,
            CellContent::Formula { cache: None, .. }
        )
    }

    pub(crate) fn store_result(&mut self, result: Result<f64, FormulaError>) {
        if let CellContent::Formula { cache, .. } = &mut self.content {
            *cache = Some(result);
        }
    }
}
