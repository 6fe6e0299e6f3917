//! Evaluation context: the read interface compiled formulas see
//!
//! The engine never owns the worksheet; compiled formulas read through a
//! [`CellContext`] view. The concrete [`SheetContext`] wraps one worksheet
//! plus an optional shared-string table and caches reads so a cell
//! referenced several times in one evaluation resolves once. The context
//! (and its cache) lives for exactly one top-level evaluation.

use std::cell::RefCell;

use ahash::AHashMap;
use gridcalc_core::{CellCoord, CellRange, CellValue, SharedStrings, Worksheet};

/// Read access to cell values during evaluation
pub trait CellContext {
    /// Resolve a single cell; missing cells are `Empty`
    fn get_cell(&self, coord: CellCoord) -> CellValue;

    /// Resolve a rectangular range in row-major order; holes are `Empty`
    /// so the result length always equals the rectangle size
    fn get_range(&self, range: &CellRange) -> Vec<CellValue>;
}

/// A [`CellContext`] over one worksheet and its shared strings
pub struct SheetContext<'a> {
    sheet: &'a Worksheet,
    shared: Option<&'a SharedStrings>,
    cache: RefCell<AHashMap<CellCoord, CellValue>>,
}

impl<'a> SheetContext<'a> {
    pub fn new(sheet: &'a Worksheet, shared: Option<&'a SharedStrings>) -> Self {
        Self {
            sheet,
            shared,
            cache: RefCell::new(AHashMap::new()),
        }
    }
}

impl CellContext for SheetContext<'_> {
    fn get_cell(&self, coord: CellCoord) -> CellValue {
        if let Some(cached) = self.cache.borrow().get(&coord) {
            return cached.clone();
        }
        let value = self
            .sheet
            .cell_at(coord)
            .map(|cell| cell.typed_value(self.shared))
            .unwrap_or(CellValue::Empty);
        self.cache.borrow_mut().insert(coord, value.clone());
        value
    }

    fn get_range(&self, range: &CellRange) -> Vec<CellValue> {
        range.cells().map(|coord| self.get_cell(coord)).collect()
    }
}
