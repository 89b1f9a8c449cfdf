//! Structural errors: rejections of an edit itself.
//!
//! These are raised synchronously from sheet operations and are never
//! stored as cell state. Value-level errors (`#REF!` and friends) live in
//! `formula::FormulaError` and travel as values instead.

use thiserror::Error;

use crate::position::Position;
use crate::recalc::CycleReport;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SheetError {
    /// The position lies outside the configured sheet bounds.
    #[error("invalid position {0}")]
    InvalidPosition(Position),

    /// Committing the formula would close a reference cycle.
    #[error("circular dependency: {0}")]
    CircularDependency(CycleReport),

    /// The formula text did not parse.
    #[error("formula syntax error: {0}")]
    Syntax(String),
}
