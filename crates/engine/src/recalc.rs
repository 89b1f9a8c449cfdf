//! Cycle and invalidation reporting.

use crate::position::Position;

/// Report when cycle detection finds a circular reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Cells participating in the cycle.
    /// May be a subset for large cycles.
    pub cells: Vec<Position>,

    /// Human-readable description of the cycle.
    pub message: String,
}

impl CycleReport {
    /// Create a new cycle report.
    pub fn new(cells: Vec<Position>, message: impl Into<String>) -> Self {
        Self {
            cells,
            message: message.into(),
        }
    }

    /// Create a cycle report for a self-referencing cell.
    pub fn self_reference(cell: Position) -> Self {
        Self {
            cells: vec![cell],
            message: format!("Cell {} references itself", cell),
        }
    }

    /// Create a cycle report for a multi-cell cycle.
    pub fn cycle(cells: Vec<Position>) -> Self {
        let cell_list: Vec<String> = cells.iter().map(|c| c.to_string()).collect();
        let message = format!("Circular reference: {}", cell_list.join(" → "));
        Self { cells, message }
    }
}

impl std::fmt::Display for CycleReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CycleReport {}

/// Report from one upward invalidation walk.
///
/// Diagnostic only; the walk itself cannot fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    /// Cells reached by following parent edges from the edited cell.
    pub cells_visited: usize,
    /// Formula caches that were actually populated and got cleared.
    pub caches_cleared: usize,
}

impl InvalidationReport {
    /// Format as a concise one-line summary.
    pub fn summary(&self) -> String {
        format!(
            "{} cells visited, {} caches cleared",
            self.cells_visited, self.caches_cleared
        )
    }
}
