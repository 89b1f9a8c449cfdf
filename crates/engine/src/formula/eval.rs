// Formula evaluator - walks the AST against a cell-value resolver

use serde::{Deserialize, Serialize};

use crate::position::Position;

use super::parser::{BinaryOp, Expr, UnaryOp};

/// Value-level evaluation failure. Stored and returned as a cell's value,
/// never raised out of a value read; propagates through dependent formulas
/// with its category intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormulaError {
    /// A referenced position lies outside the sheet bounds.
    Ref,
    /// A referenced cell's text cannot be coerced to a number.
    Value,
    /// A numeric operation failed (division by zero and friends).
    Arithmetic,
}

impl std::fmt::Display for FormulaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FormulaError::Ref => "#REF!",
            FormulaError::Value => "#VALUE!",
            FormulaError::Arithmetic => "#ARITHM!",
        };
        write!(f, "{}", s)
    }
}

impl std::error::Error for FormulaError {}

/// The "value of position P" side of evaluation. The sheet implements this
/// over its cell store; tests implement it over closures or fixed maps.
pub trait CellResolver {
    fn number(&self, pos: Position) -> Result<f64, FormulaError>;
}

impl<F> CellResolver for F
where
    F: Fn(Position) -> Result<f64, FormulaError>,
{
    fn number(&self, pos: Position) -> Result<f64, FormulaError> {
        self(pos)
    }
}

/// Evaluate an expression. Errors are values here, not panics: every failure
/// comes back as a `FormulaError` for the caller to store.
pub fn evaluate(expr: &Expr, resolver: &impl CellResolver) -> Result<f64, FormulaError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::CellRef(pos) => resolver.number(*pos),
        Expr::Unary { op, operand } => {
            let v = evaluate(operand, resolver)?;
            Ok(match op {
                UnaryOp::Plus => v,
                UnaryOp::Minus => -v,
            })
        }
        Expr::Binary { op, left, right } => {
            let l = evaluate(left, resolver)?;
            let r = evaluate(right, resolver)?;
            match op {
                BinaryOp::Add => Ok(l + r),
                BinaryOp::Sub => Ok(l - r),
                BinaryOp::Mul => Ok(l * r),
                BinaryOp::Div => {
                    let result = l / r;
                    if !result.is_finite() {
                        return Err(FormulaError::Arithmetic);
                    }
                    Ok(result)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::parser::parse;

    fn eval(input: &str, resolver: &impl CellResolver) -> Result<f64, FormulaError> {
        evaluate(&parse(input).unwrap(), resolver)
    }

    fn no_cells(_: Position) -> Result<f64, FormulaError> {
        Ok(0.0)
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1+2*3", &no_cells), Ok(7.0));
        assert_eq!(eval("(1+2)*3", &no_cells), Ok(9.0));
        assert_eq!(eval("10/4", &no_cells), Ok(2.5));
        assert_eq!(eval("-3+1", &no_cells), Ok(-2.0));
        assert_eq!(eval("--2", &no_cells), Ok(2.0));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(eval("1/0", &no_cells), Err(FormulaError::Arithmetic));
        assert_eq!(eval("0/0", &no_cells), Err(FormulaError::Arithmetic));
        // A zero numerator with nonzero denominator is fine
        assert_eq!(eval("0/5", &no_cells), Ok(0.0));
    }

    #[test]
    fn test_cell_ref_resolution() {
        let resolver = |pos: Position| {
            if pos == Position::new(0, 0) {
                Ok(5.0)
            } else {
                Ok(0.0)
            }
        };
        assert_eq!(eval("A1+3", &resolver), Ok(8.0));
        assert_eq!(eval("B1+3", &resolver), Ok(3.0));
    }

    #[test]
    fn test_resolver_error_propagates_unchanged() {
        let resolver = |_: Position| Err(FormulaError::Value);
        assert_eq!(eval("A1+1", &resolver), Err(FormulaError::Value));

        let resolver = |_: Position| Err(FormulaError::Ref);
        assert_eq!(eval("1+A1", &resolver), Err(FormulaError::Ref));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(FormulaError::Ref.to_string(), "#REF!");
        assert_eq!(FormulaError::Value.to_string(), "#VALUE!");
        assert_eq!(FormulaError::Arithmetic.to_string(), "#ARITHM!");
    }
}
