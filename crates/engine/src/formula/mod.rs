//! Formula language: parsing, evaluation, canonical rendering.
//!
//! The rest of the engine treats this module as a black box with four
//! operations: parse, evaluate against a resolver, render back to text,
//! and list referenced positions.

pub mod eval;
pub mod parser;

pub use eval::{CellResolver, FormulaError};

use crate::position::Position;
use parser::Expr;

/// A parsed formula expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    expr: Expr,
}

impl Formula {
    /// Parse expression text, without any leading `=` marker.
    pub fn parse(text: &str) -> Result<Formula, String> {
        Ok(Formula {
            expr: parser::parse(text)?,
        })
    }

    /// Evaluate against a cell-value resolver. Value-level failures come
    /// back as `FormulaError`, never as a panic.
    pub fn evaluate(&self, resolver: &impl CellResolver) -> Result<f64, FormulaError> {
        eval::evaluate(&self.expr, resolver)
    }

    /// The canonical text form (minimal parentheses, uppercase refs),
    /// without the leading `=`.
    pub fn expression(&self) -> String {
        let mut out = String::new();
        self.expr.render(&mut out);
        out
    }

    /// Every referenced position, deduplicated and in row-major order.
    /// May include out-of-bounds positions; those evaluate to `#REF!`.
    pub fn referenced_cells(&self) -> Vec<Position> {
        let mut refs = Vec::new();
        self.expr.collect_refs(&mut refs);
        refs.sort();
        refs.dedup();
        refs
    }
}
