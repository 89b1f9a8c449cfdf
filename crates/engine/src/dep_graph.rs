//! Dependency graph between cells.
//!
//! Tracks, for every formula cell, the cells it reads (its children) and,
//! for every referenced cell, the formula cells that read it (its parents).
//!
//! # Edge Direction
//!
//! ```text
//! A → B  means  "B reads A"  (A is a child of B)
//! ```
//!
//! This makes "whose cache is stale if I change X?" trivial: follow the
//! parent edges.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::position::Position;
use crate::recalc::CycleReport;

/// Persistent dependency graph for formula cells.
///
/// Maintains bidirectional adjacency for O(1) lookups:
/// - `children[B]` = cells that B's formula reads
/// - `parents[A]` = formula cells that read A
///
/// # Invariants
///
/// 1. **Bidirectional consistency:** If A ∈ children[B] then B ∈ parents[A], and vice versa.
/// 2. **No dangling entries:** Empty sets are removed, not stored.
/// 3. **No duplicate edges:** Set semantics enforced by FxHashSet.
/// 4. **Atomic updates:** `replace_edges` is the only mutator that touches both maps.
/// 5. **Acyclic:** guaranteed by the sheet gating every edit through
///    `would_create_cycle`, never by this container itself.
#[derive(Default, Debug, Clone)]
pub struct DepGraph {
    /// For each formula cell B, the cells its formula reads. B -> {A1, A2, ...}
    children: FxHashMap<Position, FxHashSet<Position>>,

    /// For each referenced cell A, the formula cells that read it. A -> {B1, B2, ...}
    parents: FxHashMap<Position, FxHashSet<Position>>,
}

impl DepGraph {
    /// Create an empty dependency graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cells this formula cell reads (its children).
    pub fn children(&self, cell: Position) -> impl Iterator<Item = Position> + '_ {
        self.children
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// Formula cells that read this cell (its parents).
    pub fn parents(&self, cell: Position) -> impl Iterator<Item = Position> + '_ {
        self.parents
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// True if this cell has outgoing read edges in the graph.
    pub fn has_children(&self, cell: Position) -> bool {
        self.children.contains_key(&cell)
    }

    /// True if at least one formula reads this cell.
    pub fn is_referenced(&self, cell: Position) -> bool {
        self.parents.contains_key(&cell)
    }

    /// Number of cells with outgoing edges (formula cells with references).
    pub fn reading_cell_count(&self) -> usize {
        self.children.len()
    }

    /// Number of cells read by at least one formula.
    pub fn referenced_cell_count(&self) -> usize {
        self.parents.len()
    }

    /// Replace all outgoing edges for a formula cell atomically.
    ///
    /// This is the only mutation API. It:
    /// 1. Removes the cell from all its old children's parent sets
    /// 2. Clears the cell's child set
    /// 3. Adds the cell to all new children's parent sets
    /// 4. Sets the cell's new child set
    ///
    /// Pass an empty set to clear all edges for this cell.
    pub fn replace_edges(&mut self, cell: Position, new_children: FxHashSet<Position>) {
        if let Some(old_children) = self.children.remove(&cell) {
            for child in old_children {
                if let Some(parents) = self.parents.get_mut(&child) {
                    parents.remove(&cell);
                    // Clean up empty entries (invariant: no dangling)
                    if parents.is_empty() {
                        self.parents.remove(&child);
                    }
                }
            }
        }

        if new_children.is_empty() {
            return;
        }

        for child in &new_children {
            self.parents.entry(*child).or_default().insert(cell);
        }

        self.children.insert(cell, new_children);
    }

    /// Clear all outgoing edges for a cell (formula removed or cell cleared).
    ///
    /// Convenience wrapper around `replace_edges` with an empty set.
    pub fn clear_cell(&mut self, cell: Position) {
        self.replace_edges(cell, FxHashSet::default());
    }

    /// Check whether giving `cell` the child set `new_children` would close a
    /// cycle, without modifying the graph.
    ///
    /// # Algorithm
    ///
    /// Self-reference is the trivial case. Otherwise a cycle forms exactly
    /// when some new child already (transitively) reads `cell`, so we walk
    /// parent edges from `cell` with an explicit frontier and visited set
    /// and look for any member of `new_children`. The cell's current child
    /// edges never enter the walk, which is what "the old edges are being
    /// replaced" requires.
    pub fn would_create_cycle(
        &self,
        cell: Position,
        new_children: &[Position],
    ) -> Option<CycleReport> {
        if new_children.contains(&cell) {
            return Some(CycleReport::self_reference(cell));
        }

        let new_children_set: FxHashSet<Position> = new_children.iter().copied().collect();
        let mut visited = FxHashSet::default();
        let mut frontier = vec![cell];

        while let Some(current) = frontier.pop() {
            if !visited.insert(current) {
                continue;
            }

            if let Some(parents) = self.parents.get(&current) {
                for &parent in parents {
                    if new_children_set.contains(&parent) {
                        // parent reads cell (transitively); cell would read
                        // parent. That closes the loop.
                        return Some(CycleReport::cycle(vec![parent, cell]));
                    }
                    frontier.push(parent);
                }
            }
        }

        None
    }

    /// Check all invariants. Panics if any are violated.
    ///
    /// Only available in test builds.
    #[cfg(test)]
    pub fn assert_consistent(&self) {
        for (cell, children) in &self.children {
            for child in children {
                assert!(
                    self.parents.get(child).map_or(false, |s| s.contains(cell)),
                    "Missing parent edge: {} should have {} in parents",
                    child,
                    cell
                );
            }
        }

        for (cell, parents) in &self.parents {
            for parent in parents {
                assert!(
                    self.children.get(parent).map_or(false, |s| s.contains(cell)),
                    "Missing child edge: {} should have {} in children",
                    parent,
                    cell
                );
            }
        }

        for (cell, children) in &self.children {
            assert!(!children.is_empty(), "Empty child set stored for {}", cell);
        }
        for (cell, parents) in &self.parents {
            assert!(!parents.is_empty(), "Empty parent set stored for {}", cell);
        }
    }
}
