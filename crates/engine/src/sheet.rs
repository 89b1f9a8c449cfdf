//! The sheet: sparse cell store, edit commit pipeline, lazy evaluation.
//!
//! Every edit runs the same pipeline: classify the input, gate it through
//! cycle detection, swap graph edges, invalidate the dependent closure,
//! install the content. Everything fallible happens before the first
//! mutation, so a rejected edit leaves the sheet bit-identical.

use std::io::{self, Write};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::cell::{Cell, CellContent, CellValue};
use crate::dep_graph::DepGraph;
use crate::error::SheetError;
use crate::formula::{CellResolver, FormulaError};
use crate::position::Position;
use crate::recalc::InvalidationReport;

/// Printable extent of a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub rows: usize,
    pub cols: usize,
}

/// A single spreadsheet: the sole owner of all cells. Graph neighbors are
/// positions resolved through this store, never pointers between cells.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    cells: FxHashMap<Position, Cell>,
    graph: DepGraph,
}

impl Sheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a cell's content from raw input text.
    ///
    /// Structural failures (`InvalidPosition`, `Syntax`,
    /// `CircularDependency`) reject the whole edit: no cell content and no
    /// graph edge changes before the error returns.
    ///
    /// On success the edit commits atomically: referenced cells materialize
    /// as empty cells, the cell's read edges are replaced, every dependent
    /// formula cache is cleared, and the new content lands with a cold
    /// cache (evaluation happens on first read). Returns the report from
    /// the invalidation walk.
    pub fn set_cell(
        &mut self,
        pos: Position,
        text: &str,
    ) -> Result<InvalidationReport, SheetError> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition(pos));
        }

        let content = CellContent::from_input(text).map_err(SheetError::Syntax)?;

        // Out-of-bounds references are legal to commit and evaluate to
        // #REF!; they never become graph edges since nothing can ever be
        // edited there.
        let children: Vec<Position> = match &content {
            CellContent::Formula { formula, .. } => formula
                .referenced_cells()
                .into_iter()
                .filter(Position::is_valid)
                .collect(),
            _ => Vec::new(),
        };

        if let Some(report) = self.graph.would_create_cycle(pos, &children) {
            return Err(SheetError::CircularDependency(report));
        }

        // Commit point: nothing below can fail.
        for &child in &children {
            self.cells.entry(child).or_default();
        }
        self.graph
            .replace_edges(pos, children.iter().copied().collect());
        let report = self.invalidate_dependents(pos);
        self.cells.insert(pos, Cell::new(content));

        Ok(report)
    }

    /// Look up a cell. `None` for positions never set nor referenced.
    pub fn cell(&self, pos: Position) -> Result<Option<&Cell>, SheetError> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition(pos));
        }
        Ok(self.cells.get(&pos))
    }

    /// A cell's externally visible value, evaluating and caching any cold
    /// formulas it depends on first. Value-level failures (`#REF!`,
    /// `#VALUE!`, `#ARITHM!`) are returned as values, never as errors.
    pub fn value(&mut self, pos: Position) -> Result<Option<CellValue>, SheetError> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition(pos));
        }
        if !self.cells.contains_key(&pos) {
            return Ok(None);
        }
        self.ensure_cached(pos);
        Ok(self.cells.get(&pos).map(Cell::value))
    }

    /// A cell's text form. Does not force evaluation.
    pub fn text(&self, pos: Position) -> Result<Option<String>, SheetError> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition(pos));
        }
        Ok(self.cells.get(&pos).map(Cell::text))
    }

    /// Clear a cell.
    ///
    /// Behaves like `set_cell(pos, "")` for graph and invalidation: the
    /// cell's read edges are removed and its dependents' caches cleared.
    /// The cell entry survives (as empty) only while some formula still
    /// references it; otherwise it is dropped from the store and stops
    /// counting toward the printable size. Returns the report from the
    /// invalidation walk.
    pub fn clear_cell(&mut self, pos: Position) -> Result<InvalidationReport, SheetError> {
        if !pos.is_valid() {
            return Err(SheetError::InvalidPosition(pos));
        }
        if !self.cells.contains_key(&pos) {
            return Ok(InvalidationReport::default());
        }

        self.graph.clear_cell(pos);
        let report = self.invalidate_dependents(pos);

        if self.graph.is_referenced(pos) {
            self.cells.insert(pos, Cell::default());
        } else {
            self.cells.remove(&pos);
        }
        Ok(report)
    }

    /// True if at least one formula reads this cell.
    pub fn is_referenced(&self, pos: Position) -> bool {
        self.graph.is_referenced(pos)
    }

    /// Read-only view of the dependency graph.
    pub fn graph(&self) -> &DepGraph {
        &self.graph
    }

    /// `(0, 0)` for an empty store, else one past the furthest stored cell,
    /// including cells that exist only because a formula referenced them.
    pub fn printable_size(&self) -> Size {
        let mut size = Size::default();
        for pos in self.cells.keys() {
            size.rows = size.rows.max(pos.row + 1);
            size.cols = size.cols.max(pos.col + 1);
        }
        size
    }

    /// Print the printable rectangle's values, tab-separated, one line per
    /// row. Forces evaluation of every formula in the rectangle.
    pub fn print_values<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        let size = self.printable_size();
        for row in 0..size.rows {
            for col in 0..size.cols {
                if col > 0 {
                    out.write_all(b"\t")?;
                }
                let pos = Position::new(row, col);
                if self.cells.contains_key(&pos) {
                    self.ensure_cached(pos);
                    if let Some(cell) = self.cells.get(&pos) {
                        write!(out, "{}", cell.value())?;
                    }
                }
            }
            out.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Print the printable rectangle's text forms, tab-separated, one line
    /// per row.
    pub fn print_texts<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let size = self.printable_size();
        for row in 0..size.rows {
            for col in 0..size.cols {
                if col > 0 {
                    out.write_all(b"\t")?;
                }
                if let Some(cell) = self.cells.get(&Position::new(row, col)) {
                    write!(out, "{}", cell.text())?;
                }
            }
            out.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Clear the formula caches of every cell that (transitively) reads
    /// `start`. Iterative walk with a visited set, so diamonds cost linear
    /// time and re-clearing an already-cold cache stays a no-op.
    fn invalidate_dependents(&mut self, start: Position) -> InvalidationReport {
        let mut report = InvalidationReport::default();
        let mut visited = FxHashSet::default();
        let mut frontier: Vec<Position> = self.graph.parents(start).collect();

        while let Some(pos) = frontier.pop() {
            if !visited.insert(pos) {
                continue;
            }
            report.cells_visited += 1;
            if let Some(cell) = self.cells.get_mut(&pos) {
                if cell.invalidate() {
                    report.caches_cleared += 1;
                }
            }
            frontier.extend(self.graph.parents(pos));
        }

        report
    }

    /// Warm the formula cache at `start`, children first.
    ///
    /// Explicit-stack post-order over cold formula cells: by the time a
    /// formula evaluates, all its formula children hold warm caches, so the
    /// resolver below never recurses. Terminates because the graph is
    /// acyclic by invariant; the cold-cache check keeps diamonds linear.
    fn ensure_cached(&mut self, start: Position) {
        if !self.cell_needs_eval(start) {
            return;
        }

        struct Frame {
            pos: Position,
            children: Vec<Position>,
            next: usize,
        }

        let mut stack = vec![Frame {
            pos: start,
            children: self.cold_children(start),
            next: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            if frame.next < frame.children.len() {
                let child = frame.children[frame.next];
                frame.next += 1;
                if self.cell_needs_eval(child) {
                    let children = self.cold_children(child);
                    stack.push(Frame {
                        pos: child,
                        children,
                        next: 0,
                    });
                }
            } else {
                let pos = frame.pos;
                stack.pop();
                let result = self.eval_formula(pos);
                if let Some(cell) = self.cells.get_mut(&pos) {
                    cell.store_result(result);
                }
            }
        }
    }

    fn cell_needs_eval(&self, pos: Position) -> bool {
        self.cells.get(&pos).is_some_and(Cell::needs_eval)
    }

    fn cold_children(&self, pos: Position) -> Vec<Position> {
        self.graph
            .children(pos)
            .filter(|c| self.cell_needs_eval(*c))
            .collect()
    }

    /// Evaluate the formula at `pos` against the current store. Callers
    /// guarantee every formula child is already cached.
    fn eval_formula(&self, pos: Position) -> Result<f64, FormulaError> {
        let Some(CellContent::Formula { formula, .. }) =
            self.cells.get(&pos).map(Cell::content)
        else {
            return Ok(0.0);
        };
        formula.evaluate(&StoreResolver { sheet: self })
    }
}

/// Read-only resolver handed to the formula evaluator: the coercion rules
/// between a cell's visible value and the number arithmetic needs.
struct StoreResolver<'a> {
    sheet: &'a Sheet,
}

impl CellResolver for StoreResolver<'_> {
    fn number(&self, pos: Position) -> Result<f64, FormulaError> {
        if !pos.is_valid() {
            return Err(FormulaError::Ref);
        }
        let Some(cell) = self.sheet.cells.get(&pos) else {
            // A reference to nothing contributes zero.
            return Ok(0.0);
        };
        match cell.value() {
            CellValue::Number(n) => Ok(n),
            CellValue::Text(s) => {
                if s.is_empty() {
                    Ok(0.0)
                } else if s.bytes().all(|b| b.is_ascii_digit()) {
                    s.parse().map_err(|_| FormulaError::Value)
                } else {
                    Err(FormulaError::Value)
                }
            }
            // Upstream errors keep their category.
            CellValue::Error(e) => Err(e),
        }
    }
}
