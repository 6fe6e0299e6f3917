//! Dependency extraction and the recalculation graph
//!
//! Nodes are cell coordinates; an edge runs from a formula cell to each
//! cell it reads. The graph is rebuilt for every recalculation entry
//! point and thrown away afterwards. Node bookkeeping is insertion-
//! ordered so topological output is deterministic for a given build.

use std::collections::VecDeque;

use ahash::{AHashMap, AHashSet};

use crate::ast::Expr;
use crate::error::{EngineError, EngineResult};
use gridcalc_core::{CellCoord, CellRange};

/// Collect every cell a formula reads: each `CellRef` plus every cell of
/// each `Range`, in source order
///
/// Cross-sheet references contribute nothing; the compiler rejects them
/// separately.
pub fn extract_dependencies(expr: &Expr) -> EngineResult<Vec<CellCoord>> {
    let mut deps = Vec::new();
    collect(expr, &mut deps)?;
    Ok(deps)
}

fn collect(expr: &Expr, deps: &mut Vec<CellCoord>) -> EngineResult<()> {
    match expr {
        Expr::CellRef(text) => {
            deps.push(parse_coord(text)?);
        }
        Expr::Range(start, end) => {
            let range = CellRange::new(parse_coord(start)?, parse_coord(end)?);
            deps.extend(range.cells());
        }
        Expr::Unary { operand, .. } => collect(operand, deps)?,
        Expr::Binary { left, right, .. } => {
            collect(left, deps)?;
            collect(right, deps)?;
        }
        Expr::Call { args, .. } => {
            for arg in args {
                collect(arg, deps)?;
            }
        }
        Expr::Literal(_) | Expr::SheetRef { .. } => {}
    }
    Ok(())
}

fn parse_coord(text: &str) -> EngineResult<CellCoord> {
    CellCoord::parse(text).map_err(|_| EngineError::InvalidReference(text.to_string()))
}

/// The directed dependency graph over one worksheet's cells
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Every node, in first-seen order
    nodes: Vec<CellCoord>,
    seen: AHashSet<CellCoord>,
    /// cell → cells it reads
    deps: AHashMap<CellCoord, AHashSet<CellCoord>>,
    /// cell → cells that read it, in first-seen order
    rdeps: AHashMap<CellCoord, Vec<CellCoord>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a formula cell and the cells it reads
    ///
    /// Duplicate reads collapse to one edge. Referenced cells become graph
    /// nodes even when they hold no formula themselves.
    pub fn add_formula<I>(&mut self, cell: CellCoord, reads: I)
    where
        I: IntoIterator<Item = CellCoord>,
    {
        self.track(cell);
        self.deps.entry(cell).or_default();
        for read in reads {
            self.track(read);
            let inserted = self.deps.entry(cell).or_default().insert(read);
            if inserted {
                self.rdeps.entry(read).or_default().push(cell);
            }
        }
    }

    fn track(&mut self, cell: CellCoord) {
        if self.seen.insert(cell) {
            self.nodes.push(cell);
        }
    }

    /// All nodes in first-seen order
    pub fn nodes(&self) -> &[CellCoord] {
        &self.nodes
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Cells the given cell reads
    pub fn dependencies_of(&self, cell: CellCoord) -> impl Iterator<Item = CellCoord> + '_ {
        self.deps
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Cells that read the given cell
    pub fn dependents_of(&self, cell: CellCoord) -> impl Iterator<Item = CellCoord> + '_ {
        self.rdeps
            .get(&cell)
            .into_iter()
            .flat_map(|list| list.iter().copied())
    }

    /// Global evaluation order over every node (Kahn's algorithm)
    ///
    /// Fails with a circular-reference error carrying the first detected
    /// chain when the graph has a cycle.
    pub fn evaluation_order(&self) -> EngineResult<Vec<CellCoord>> {
        self.kahn(None)
    }

    /// Evaluation order restricted to a subset of nodes
    ///
    /// In-degrees count only edges between subset members, so a dirty set
    /// can be ordered without evaluating anything outside it.
    pub fn evaluation_order_for(
        &self,
        subset: &AHashSet<CellCoord>,
    ) -> EngineResult<Vec<CellCoord>> {
        self.kahn(Some(subset))
    }

    fn kahn(&self, restrict: Option<&AHashSet<CellCoord>>) -> EngineResult<Vec<CellCoord>> {
        let member = |cell: &CellCoord| restrict.map_or(true, |set| set.contains(cell));

        let members: Vec<CellCoord> =
            self.nodes.iter().copied().filter(|c| member(c)).collect();

        let mut in_degree: AHashMap<CellCoord, usize> = AHashMap::with_capacity(members.len());
        for &cell in &members {
            let degree = self
                .deps
                .get(&cell)
                .map_or(0, |reads| reads.iter().filter(|r| member(r)).count());
            in_degree.insert(cell, degree);
        }

        let mut queue: VecDeque<CellCoord> = members
            .iter()
            .copied()
            .filter(|c| in_degree.get(c) == Some(&0))
            .collect();

        let mut order = Vec::with_capacity(members.len());
        while let Some(cell) = queue.pop_front() {
            order.push(cell);
            if let Some(dependents) = self.rdeps.get(&cell) {
                for &dependent in dependents {
                    if !member(&dependent) {
                        continue;
                    }
                    if let Some(degree) = in_degree.get_mut(&dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(dependent);
                        }
                    }
                }
            }
        }

        if order.len() < members.len() {
            let chain = self
                .detect_cycles()
                .into_iter()
                .next()
                .unwrap_or_default()
                .iter()
                .map(CellCoord::to_string)
                .collect();
            return Err(EngineError::CircularReference { chain });
        }
        Ok(order)
    }

    /// The transitive dependents of the changed cells (BFS over reverse
    /// edges)
    ///
    /// The changed cells themselves are seeds, not members; one re-enters
    /// only if some other dirty cell feeds it.
    pub fn dirty_set(&self, changed: &[CellCoord]) -> AHashSet<CellCoord> {
        let mut dirty = AHashSet::new();
        let mut queue: VecDeque<CellCoord> = changed.iter().copied().collect();
        while let Some(cell) = queue.pop_front() {
            if let Some(dependents) = self.rdeps.get(&cell) {
                for &dependent in dependents {
                    if dirty.insert(dependent) {
                        queue.push_back(dependent);
                    }
                }
            }
        }
        dirty
    }

    /// Find directed cycles (iterative DFS over forward edges)
    ///
    /// Each returned chain is a true cycle: consecutive entries are edges
    /// and the last entry repeats the first.
    pub fn detect_cycles(&self) -> Vec<Vec<CellCoord>> {
        let mut cycles = Vec::new();
        let mut visited: AHashSet<CellCoord> = AHashSet::new();
        let mut on_stack: AHashSet<CellCoord> = AHashSet::new();
        let mut path: Vec<CellCoord> = Vec::new();
        // (node, sorted neighbors, next neighbor index)
        let mut stack: Vec<(CellCoord, Vec<CellCoord>, usize)> = Vec::new();

        for &start in &self.nodes {
            if visited.contains(&start) {
                continue;
            }
            on_stack.insert(start);
            path.push(start);
            stack.push((start, self.sorted_deps(start), 0));

            while !stack.is_empty() {
                let next = {
                    let Some((_, neighbors, index)) = stack.last_mut() else {
                        break;
                    };
                    if *index < neighbors.len() {
                        let n = neighbors[*index];
                        *index += 1;
                        Some(n)
                    } else {
                        None
                    }
                };

                match next {
                    Some(next) => {
                        if on_stack.contains(&next) {
                            if let Some(pos) = path.iter().position(|&c| c == next) {
                                let mut chain = path[pos..].to_vec();
                                chain.push(next);
                                cycles.push(chain);
                            }
                        } else if !visited.contains(&next) {
                            on_stack.insert(next);
                            path.push(next);
                            stack.push((next, self.sorted_deps(next), 0));
                        }
                    }
                    None => {
                        if let Some((node, _, _)) = stack.pop() {
                            on_stack.remove(&node);
                            path.pop();
                            visited.insert(node);
                        }
                    }
                }
            }
        }
        cycles
    }

    fn sorted_deps(&self, cell: CellCoord) -> Vec<CellCoord> {
        let mut neighbors: Vec<CellCoord> = self
            .deps
            .get(&cell)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        neighbors.sort_unstable();
        neighbors
    }
}
