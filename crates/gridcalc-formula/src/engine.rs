//! The formula engine
//!
//! Orchestrates the pipeline: compile caching, single-cell evaluation,
//! whole-sheet recalculation, and incremental recalculation of dirty
//! dependents. The compiled-formula cache (keyed by exact source text,
//! behind one mutex) is the only state shared across calls; contexts and
//! dependency graphs are rebuilt per call.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use ahash::AHashMap;
use tracing::{debug, warn};

use crate::compile::{CompiledFormula, Compiler};
use crate::context::SheetContext;
use crate::dependency::{extract_dependencies, DependencyGraph};
use crate::error::{EngineError, EngineResult};
use crate::functions::{default_registry, FunctionRegistry};
use crate::parser;
use gridcalc_core::{CellCoord, CellValue, ErrorCode, SharedStrings, Worksheet};

/// Process-lifetime evaluation counters
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStatistics {
    /// Evaluations attempted
    pub total_evaluations: u64,
    /// Evaluations that produced a value (error values included)
    pub successful: u64,
    /// Evaluations that failed with a typed engine error
    pub failed: u64,
    /// `successful / total`, 0 when nothing ran yet
    pub success_rate: f64,
    /// Entries in the compiled-formula cache
    pub compiled_formulas: usize,
    /// Functions in the registry
    pub supported_functions: usize,
    /// Mean evaluation time in microseconds
    pub avg_eval_micros: f64,
}

/// The evaluation engine
///
/// Cheap to share behind `&self`: every operation takes the worksheet as
/// an argument and the engine holds no sheet state.
pub struct FormulaEngine {
    registry: FunctionRegistry,
    compiled: Mutex<AHashMap<String, Arc<CompiledFormula>>>,
    total: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    eval_nanos: AtomicU64,
}

impl FormulaEngine {
    /// Engine over the default built-in function registry
    pub fn new() -> Self {
        Self::with_registry(default_registry().clone())
    }

    /// Engine over a caller-assembled registry
    pub fn with_registry(registry: FunctionRegistry) -> Self {
        Self {
            registry,
            compiled: Mutex::new(AHashMap::new()),
            total: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            eval_nanos: AtomicU64::new(0),
        }
    }

    /// Evaluate one cell's formula and return the typed result
    ///
    /// Fails with a parse error when the cell holds no formula. Nothing is
    /// written back; the caller owns the result.
    pub fn try_evaluate(
        &self,
        sheet: &Worksheet,
        shared: Option<&SharedStrings>,
        cell: &str,
    ) -> EngineResult<CellValue> {
        let coord = CellCoord::parse(cell)
            .map_err(|_| EngineError::InvalidReference(cell.to_string()))?;
        let text = sheet
            .cell_at(coord)
            .and_then(|c| c.formula())
            .map(str::to_owned)
            .ok_or_else(|| {
                EngineError::parse_at(0, format!("cell {coord} has no formula"))
            })?;
        self.evaluate_text(&text, sheet, shared)
    }

    /// Recalculate every formula cell, writing results back into the sheet
    ///
    /// Per-cell failures become error cells; a circular reference aborts
    /// the whole pass.
    pub fn recalculate_sheet(
        &self,
        sheet: &mut Worksheet,
        shared: Option<&SharedStrings>,
    ) -> EngineResult<()> {
        let plan = self.build_plan(sheet);
        let order = plan.graph.evaluation_order()?;
        debug!(formulas = plan.formulas.len(), "recalculating sheet");

        for (coord, code) in &plan.failed {
            sheet.write_value(*coord, &CellValue::Error(*code));
        }
        for coord in order {
            if let Some(text) = plan.formulas.get(&coord) {
                let value = self.evaluate_cell(text, sheet, shared, coord);
                sheet.write_value(coord, &value);
            }
        }
        Ok(())
    }

    /// Recalculate the transitive dependents of the changed cells
    ///
    /// The changed cells themselves are not re-evaluated unless some other
    /// dirty cell feeds them.
    pub fn recalculate_dependents(
        &self,
        sheet: &mut Worksheet,
        shared: Option<&SharedStrings>,
        changed: &[&str],
    ) -> EngineResult<()> {
        let plan = self.build_plan(sheet);

        let mut seeds = Vec::with_capacity(changed.len());
        for reference in changed {
            seeds.push(
                CellCoord::parse(reference)
                    .map_err(|_| EngineError::InvalidReference(reference.to_string()))?,
            );
        }

        let dirty = plan.graph.dirty_set(&seeds);
        if dirty.is_empty() {
            return Ok(());
        }
        let order = plan.graph.evaluation_order_for(&dirty)?;
        debug!(dirty = dirty.len(), "recalculating dependents");

        for (coord, code) in &plan.failed {
            if dirty.contains(coord) {
                sheet.write_value(*coord, &CellValue::Error(*code));
            }
        }
        for coord in order {
            if let Some(text) = plan.formulas.get(&coord) {
                let value = self.evaluate_cell(text, sheet, shared, coord);
                sheet.write_value(coord, &value);
            }
        }
        Ok(())
    }

    /// Build the dependency graph over every formula cell of the sheet
    pub fn dependency_graph(&self, sheet: &Worksheet) -> DependencyGraph {
        self.build_plan(sheet).graph
    }

    /// Snapshot of the engine counters
    pub fn statistics(&self) -> EngineStatistics {
        let total = self.total.load(Ordering::Relaxed);
        let successful = self.succeeded.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let nanos = self.eval_nanos.load(Ordering::Relaxed);
        let compiled_formulas = self
            .compiled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        EngineStatistics {
            total_evaluations: total,
            successful,
            failed,
            success_rate: if total > 0 {
                successful as f64 / total as f64
            } else {
                0.0
            },
            compiled_formulas,
            supported_functions: self.registry.len(),
            avg_eval_micros: if total > 0 {
                nanos as f64 / 1_000.0 / total as f64
            } else {
                0.0
            },
        }
    }

    /// Whether a function name resolves, case-insensitively
    pub fn is_function_supported(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// All supported function names, sorted
    pub fn supported_functions(&self) -> BTreeSet<String> {
        self.registry.names()
    }

    // === Internals ===

    fn build_plan(&self, sheet: &Worksheet) -> RecalcPlan {
        let mut plan = RecalcPlan::default();
        for (coord, text) in sheet.formula_cells() {
            match parser::parse(text).and_then(|ast| extract_dependencies(&ast)) {
                Ok(reads) => {
                    plan.graph.add_formula(coord, reads);
                    plan.formulas.insert(coord, text.to_string());
                }
                Err(error) => {
                    warn!(cell = %coord, %error, "formula rejected before evaluation");
                    plan.failed.push((coord, error_code_for(&error)));
                }
            }
        }
        plan
    }

    /// Retrieve or build the compiled form, keyed by exact source text
    fn compiled_for(&self, text: &str) -> EngineResult<Arc<CompiledFormula>> {
        let mut cache = self.compiled.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(hit) = cache.get(text) {
            return Ok(Arc::clone(hit));
        }
        debug!(formula = text, "compile cache miss");
        let ast = parser::parse(text)?;
        let compiled = Compiler::new(&self.registry).compile(&ast)?;
        let entry = Arc::new(compiled);
        cache.insert(text.to_string(), Arc::clone(&entry));
        Ok(entry)
    }

    /// One counted, timed evaluation against a fresh context
    fn evaluate_text(
        &self,
        text: &str,
        sheet: &Worksheet,
        shared: Option<&SharedStrings>,
    ) -> EngineResult<CellValue> {
        let started = Instant::now();
        self.total.fetch_add(1, Ordering::Relaxed);

        let outcome = self.compiled_for(text).map(|compiled| {
            let ctx = SheetContext::new(sheet, shared);
            compiled.evaluate(&ctx)
        });

        self.eval_nanos
            .fetch_add(started.elapsed().as_nanos() as u64, Ordering::Relaxed);
        match &outcome {
            Ok(_) => self.succeeded.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.failed.fetch_add(1, Ordering::Relaxed),
        };
        outcome
    }

    fn evaluate_cell(
        &self,
        text: &str,
        sheet: &Worksheet,
        shared: Option<&SharedStrings>,
        coord: CellCoord,
    ) -> CellValue {
        match self.evaluate_text(text, sheet, shared) {
            Ok(value) => value,
            Err(error) => {
                warn!(cell = %coord, %error, "evaluation failed; writing error cell");
                CellValue::Error(error_code_for(&error))
            }
        }
    }
}

impl Default for FormulaEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct RecalcPlan {
    graph: DependencyGraph,
    formulas: AHashMap<CellCoord, String>,
    failed: Vec<(CellCoord, ErrorCode)>,
}

/// How engine failures surface when written back as cell values
fn error_code_for(error: &EngineError) -> ErrorCode {
    match error {
        EngineError::Parse { .. } | EngineError::Compile(_) => ErrorCode::Value,
        EngineError::UnsupportedFunction(_) => ErrorCode::Name,
        EngineError::InvalidReference(_) | EngineError::CircularReference { .. } => {
            ErrorCode::Ref
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw(sheet: &Worksheet, address: &str) -> String {
        sheet
            .cell(address)
            .unwrap()
            .and_then(|c| c.raw_value.clone())
            .unwrap_or_default()
    }

    #[test]
    fn evaluate_sum_of_two_cells() {
        let mut sheet = Worksheet::new("Sheet1");
        sheet.set_number("A1", 10.0).unwrap();
        sheet.set_number("B1", 20.0).unwrap();
        sheet.set_formula("C1", "=A1+B1").unwrap();

        let engine = FormulaEngine::new();
        assert_eq!(
            engine.try_evaluate(&sheet, None, "C1").unwrap(),
            CellValue::Number(30.0)
        );
    }

    #[test]
    fn evaluate_sum_over_column_range() {
        let mut sheet = Worksheet::new("Sheet1");
        for row in 1..=10 {
            sheet.set_number(&format!("A{row}"), row as f64).unwrap();
        }
        sheet.set_formula("B1", "=SUM(A1:A10)").unwrap();

        let engine = FormulaEngine::new();
        assert_eq!(
            engine.try_evaluate(&sheet, None, "B1").unwrap(),
            CellValue::Number(55.0)
        );
    }

    #[test]
    fn evaluate_average_over_range() {
        let mut sheet = Worksheet::new("Sheet1");
        for (row, value) in [10.0, 20.0, 30.0, 40.0, 50.0].iter().enumerate() {
            sheet.set_number(&format!("A{}", row + 1), *value).unwrap();
        }
        sheet.set_formula("B1", "=AVERAGE(A1:A5)").unwrap();

        let engine = FormulaEngine::new();
        assert_eq!(
            engine.try_evaluate(&sheet, None, "B1").unwrap(),
            CellValue::Number(30.0)
        );
    }

    #[test]
    fn evaluate_conditional_pick() {
        let mut sheet = Worksheet::new("Sheet1");
        sheet.set_number("A1", 15.0).unwrap();
        sheet.set_number("B1", 100.0).unwrap();
        sheet.set_number("C1", 50.0).unwrap();
        sheet.set_formula("D1", "=IF(A1>10, B1, C1)").unwrap();

        let engine = FormulaEngine::new();
        assert_eq!(
            engine.try_evaluate(&sheet, None, "D1").unwrap(),
            CellValue::Number(100.0)
        );
    }

    #[test]
    fn recalculate_sheet_walks_the_chain() {
        let mut sheet = Worksheet::new("Sheet1");
        sheet.set_number("A1", 5.0).unwrap();
        sheet.set_formula("A2", "=A1*2").unwrap();
        sheet.set_formula("A3", "=A2+10").unwrap();
        sheet.set_formula("A4", "=A3*3").unwrap();

        let engine = FormulaEngine::new();
        engine.recalculate_sheet(&mut sheet, None).unwrap();

        assert_eq!(raw(&sheet, "A2"), "10");
        assert_eq!(raw(&sheet, "A3"), "20");
        assert_eq!(raw(&sheet, "A4"), "60");
    }

    #[test]
    fn recalculate_dependents_after_update() {
        let mut sheet = Worksheet::new("Sheet1");
        sheet.set_number("A1", 10.0).unwrap();
        sheet.set_formula("B1", "=A1*2").unwrap();
        sheet.set_formula("C1", "=A1*3").unwrap();
        sheet.set_formula("D1", "=B1+C1").unwrap();

        let engine = FormulaEngine::new();
        engine.recalculate_sheet(&mut sheet, None).unwrap();
        assert_eq!(raw(&sheet, "D1"), "50");

        sheet.set_number("A1", 20.0).unwrap();
        engine
            .recalculate_dependents(&mut sheet, None, &["A1"])
            .unwrap();

        assert_eq!(raw(&sheet, "B1"), "40");
        assert_eq!(raw(&sheet, "C1"), "60");
        assert_eq!(raw(&sheet, "D1"), "100");
    }

    #[test]
    fn circular_reference_is_fatal() {
        let mut sheet = Worksheet::new("Sheet1");
        sheet.set_formula("A1", "=A2").unwrap();
        sheet.set_formula("A2", "=A1").unwrap();

        let engine = FormulaEngine::new();
        let graph = engine.dependency_graph(&sheet);
        let err = graph.evaluation_order().unwrap_err();
        let EngineError::CircularReference { chain } = &err else {
            panic!("expected a circular reference, got {err:?}");
        };
        assert!(chain.contains(&"A1".to_string()));
        assert!(chain.contains(&"A2".to_string()));

        assert!(matches!(
            engine.recalculate_sheet(&mut sheet, None),
            Err(EngineError::CircularReference { .. })
        ));
    }

    #[test]
    fn evaluate_rank_in_range() {
        let mut sheet = Worksheet::new("Sheet1");
        for row in 1..=10 {
            sheet
                .set_number(&format!("F{row}"), (row * 5) as f64)
                .unwrap();
        }
        sheet.set_formula("A11", "=RANK(25, F1:F10)").unwrap();

        let engine = FormulaEngine::new();
        assert_eq!(
            engine.try_evaluate(&sheet, None, "A11").unwrap(),
            CellValue::Number(6.0)
        );
    }

    #[test]
    fn recalculation_is_idempotent() {
        let mut sheet = Worksheet::new("Sheet1");
        sheet.set_number("A1", 3.0).unwrap();
        sheet.set_formula("B1", "=A1^2").unwrap();
        sheet.set_formula("C1", "=B1&\" units\"").unwrap();
        sheet.set_formula("D1", "=1/0").unwrap();

        let engine = FormulaEngine::new();
        engine.recalculate_sheet(&mut sheet, None).unwrap();
        let first: Vec<(CellCoord, Option<String>)> = sheet
            .iter_cells()
            .map(|(c, cell)| (c, cell.raw_value.clone()))
            .collect();

        engine.recalculate_sheet(&mut sheet, None).unwrap();
        let second: Vec<(CellCoord, Option<String>)> = sheet
            .iter_cells()
            .map(|(c, cell)| (c, cell.raw_value.clone()))
            .collect();

        assert_eq!(first, second);
        assert_eq!(raw(&sheet, "C1"), "9 units");
        assert_eq!(raw(&sheet, "D1"), "#DIV/0!");
    }

    #[test]
    fn compiled_cache_returns_the_same_instance() {
        let engine = FormulaEngine::new();
        let first = engine.compiled_for("=1+2").unwrap();
        let second = engine.compiled_for("=1+2").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let other = engine.compiled_for("=1+3").unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(engine.statistics().compiled_formulas, 2);
    }

    #[test]
    fn literal_round_trip_through_the_engine() {
        let mut sheet = Worksheet::new("Sheet1");
        sheet.set_formula("A1", "=42").unwrap();
        sheet.set_formula("A2", "=\"hi\"").unwrap();
        sheet.set_formula("A3", "=TRUE").unwrap();

        let engine = FormulaEngine::new();
        assert_eq!(
            engine.try_evaluate(&sheet, None, "A1").unwrap(),
            CellValue::Number(42.0)
        );
        assert_eq!(
            engine.try_evaluate(&sheet, None, "A2").unwrap(),
            CellValue::Text("hi".into())
        );
        assert_eq!(
            engine.try_evaluate(&sheet, None, "A3").unwrap(),
            CellValue::Bool(true)
        );
    }

    #[test]
    fn error_values_flow_across_cells() {
        let mut sheet = Worksheet::new("Sheet1");
        sheet.set_formula("A1", "=1/0").unwrap();
        sheet.set_formula("B1", "=A1+1").unwrap();

        let engine = FormulaEngine::new();
        engine.recalculate_sheet(&mut sheet, None).unwrap();
        assert_eq!(raw(&sheet, "A1"), "#DIV/0!");
        assert_eq!(raw(&sheet, "B1"), "#DIV/0!");
    }

    #[test]
    fn missing_formula_is_a_parse_error() {
        let mut sheet = Worksheet::new("Sheet1");
        sheet.set_number("A1", 1.0).unwrap();

        let engine = FormulaEngine::new();
        assert!(matches!(
            engine.try_evaluate(&sheet, None, "A1"),
            Err(EngineError::Parse { .. })
        ));
        assert!(matches!(
            engine.try_evaluate(&sheet, None, "B1"),
            Err(EngineError::Parse { .. })
        ));
        assert!(matches!(
            engine.try_evaluate(&sheet, None, "not-a-ref"),
            Err(EngineError::InvalidReference(_))
        ));
    }

    #[test]
    fn unknown_function_writes_name_error() {
        let mut sheet = Worksheet::new("Sheet1");
        sheet.set_formula("A1", "=NOSUCHFN(1)").unwrap();

        let engine = FormulaEngine::new();
        assert!(matches!(
            engine.try_evaluate(&sheet, None, "A1"),
            Err(EngineError::UnsupportedFunction(_))
        ));

        engine.recalculate_sheet(&mut sheet, None).unwrap();
        assert_eq!(raw(&sheet, "A1"), "#NAME?");
    }

    #[test]
    fn unparseable_formula_writes_value_error() {
        let mut sheet = Worksheet::new("Sheet1");
        sheet.set_formula("A1", "=)").unwrap();
        sheet.set_formula("B1", "=1+1").unwrap();

        let engine = FormulaEngine::new();
        engine.recalculate_sheet(&mut sheet, None).unwrap();
        assert_eq!(raw(&sheet, "A1"), "#VALUE!");
        assert_eq!(raw(&sheet, "B1"), "2");
    }

    #[test]
    fn statistics_track_outcomes() {
        let mut sheet = Worksheet::new("Sheet1");
        sheet.set_number("A1", 1.0).unwrap();
        sheet.set_formula("B1", "=A1+1").unwrap();
        sheet.set_formula("C1", "=NOSUCHFN()").unwrap();

        let engine = FormulaEngine::new();
        engine.try_evaluate(&sheet, None, "B1").unwrap();
        engine.try_evaluate(&sheet, None, "B1").unwrap();
        let _ = engine.try_evaluate(&sheet, None, "C1");

        let stats = engine.statistics();
        assert_eq!(stats.total_evaluations, 3);
        assert_eq!(stats.successful, 2);
        assert_eq!(stats.failed, 1);
        assert!((stats.success_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!(stats.supported_functions > 30);
        assert!(stats.avg_eval_micros >= 0.0);
    }

    #[test]
    fn function_support_queries() {
        let engine = FormulaEngine::new();
        assert!(engine.is_function_supported("sum"));
        assert!(engine.is_function_supported("SUM"));
        assert!(!engine.is_function_supported("NOSUCHFN"));
        assert!(engine.supported_functions().contains("RANK"));
    }

    #[test]
    fn shared_strings_reach_evaluation() {
        let mut shared = SharedStrings::new();
        let idx = shared.push("widget");
        let mut sheet = Worksheet::new("Sheet1");
        sheet.set_shared_string("A1", idx).unwrap();
        sheet.set_formula("B1", "=A1&\"s\"").unwrap();

        let engine = FormulaEngine::new();
        assert_eq!(
            engine.try_evaluate(&sheet, Some(&shared), "B1").unwrap(),
            CellValue::Text("widgets".into())
        );
    }

    #[test]
    fn custom_registry_narrows_support() {
        let mut registry = FunctionRegistry::new();
        registry.register(crate::functions::FunctionDef::new(
            "DOUBLE",
            1,
            Some(1),
            |_ctx, args| {
                let n = args
                    .first()
                    .ok_or(gridcalc_core::ErrorCode::Value)?
                    .to_number()?;
                Ok(CellValue::Number(n * 2.0))
            },
        ));
        let engine = FormulaEngine::with_registry(registry);
        assert!(engine.is_function_supported("DOUBLE"));

        let mut sheet = Worksheet::new("Sheet1");
        sheet.set_formula("A1", "=DOUBLE(21)").unwrap();
        assert_eq!(
            engine.try_evaluate(&sheet, None, "A1").unwrap(),
            CellValue::Number(42.0)
        );
    }
}
