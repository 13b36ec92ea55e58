// ============================================================================
// Cell Data Provider
// ============================================================================
//
// Cell storage for one sheet item. Backed by a persistent ordered map so a
// full snapshot of the sheet is an O(1) clone.
//
// ============================================================================

use crate::core::{CellRef, CellValue};
use im::OrdMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Cell {
    pub value: CellValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

impl Cell {
    pub fn with_value(value: impl Into<CellValue>) -> Self {
        Self {
            value: value.into(),
            expression: None,
        }
    }

    pub fn with_expression(expression: impl Into<String>, value: impl Into<CellValue>) -> Self {
        Self {
            value: value.into(),
            expression: Some(expression.into()),
        }
    }

    /// A cell without value and without expression is equivalent to no cell.
    pub fn is_blank(&self) -> bool {
        self.value.is_empty() && self.expression.is_none()
    }
}

/// Wire shape of one cell: `{ reference, value, formula? }`.
///
/// This is what the server returns in `cells` / `oldcells` and what request
/// commands send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub reference: CellRef,
    #[serde(default)]
    pub value: CellValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
}

impl CellSnapshot {
    pub fn new(reference: CellRef, value: impl Into<CellValue>) -> Self {
        Self {
            reference,
            value: value.into(),
            formula: None,
        }
    }

    pub fn of(reference: CellRef, cell: Option<&Cell>) -> Self {
        match cell {
            Some(cell) => Self {
                reference,
                value: cell.value.clone(),
                formula: cell.expression.clone(),
            },
            None => Self {
                reference,
                value: CellValue::Text(String::new()),
                formula: None,
            },
        }
    }

    /// `None` when the snapshot describes an empty cell.
    pub fn to_cell(&self) -> Option<Cell> {
        let cell = Cell {
            value: self.value.clone(),
            expression: self.formula.clone(),
        };
        (!cell.is_blank()).then_some(cell)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataProvider {
    cells: OrdMap<CellRef, Cell>,
}

impl DataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, reference: &CellRef) -> Option<&Cell> {
        self.cells.get(reference)
    }

    /// Returns the cell at `reference`, creating an empty one if needed.
    pub fn create(&mut self, reference: CellRef) -> &mut Cell {
        self.cells.entry(reference).or_default()
    }

    pub fn set_expression(
        &mut self,
        reference: CellRef,
        expression: Option<String>,
    ) -> &mut Cell {
        let cell = self.create(reference);
        cell.expression = expression;
        cell
    }

    pub fn set_value(&mut self, reference: CellRef, value: CellValue) -> &mut Cell {
        let cell = self.create(reference);
        cell.value = value;
        cell
    }

    /// Replaces the cell wholesale and returns the previous one.
    ///
    /// Passing `None` or a blank cell removes the entry.
    pub fn replace(&mut self, reference: CellRef, cell: Option<Cell>) -> Option<Cell> {
        match cell.filter(|c| !c.is_blank()) {
            Some(cell) => self.cells.insert(reference, cell),
            None => self.cells.remove(&reference),
        }
    }

    pub fn value(&self, reference: &CellRef) -> CellValue {
        self.cells
            .get(reference)
            .map(|c| c.value.clone())
            .unwrap_or_default()
    }

    /// Display text of a cell; empty for missing cells.
    pub fn text(&self, reference: &CellRef) -> String {
        self.cells
            .get(reference)
            .map(|c| c.value.to_string())
            .unwrap_or_default()
    }

    pub fn snapshot_of(&self, reference: CellRef) -> CellSnapshot {
        CellSnapshot::of(reference, self.get(&reference))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CellRef, &Cell)> {
        self.cells.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a1() -> CellRef {
        CellRef::parse("A1").unwrap()
    }

    #[test]
    fn test_replace_removes_blank_cells() {
        let mut provider = DataProvider::new();
        provider.set_value(a1(), CellValue::from("5"));
        assert_eq!(provider.len(), 1);

        let previous = provider.replace(a1(), Some(Cell::with_value("")));
        assert_eq!(previous, Some(Cell::with_value("5")));
        assert!(provider.is_empty());
    }

    #[test]
    fn test_snapshot_of_missing_cell_is_empty_text() {
        let provider = DataProvider::new();
        let snap = provider.snapshot_of(a1());
        assert_eq!(snap.value, CellValue::from(""));
        assert_eq!(snap.to_cell(), None);
    }

    #[test]
    fn test_set_expression_keeps_value() {
        let mut provider = DataProvider::new();
        provider.set_value(a1(), CellValue::from(3i64));
        provider.set_expression(a1(), Some("=1+2".into()));
        let cell = provider.get(&a1()).unwrap();
        assert_eq!(cell.value, CellValue::Number(3.0));
        assert_eq!(cell.expression.as_deref(), Some("=1+2"));
    }
}
