// ============================================================================
// Cell Commands
// ============================================================================
//
// Commands bound to one sheet item. The sheet's cell store is the only thing
// they touch; every pass reports exactly one change for the sheet.
//
// ============================================================================

use super::{Command, CommandBase, CommandKind, ItemBinding, command_any};
use crate::core::{CellRef, CommandError, ItemId, Result};
use crate::graph::{CellSnapshot, Graph, Viewer};
use crate::wire::CommandDescriptor;
use serde::{Deserialize, Serialize};

/// Writes every snapshot into the sheet, returning what each one replaced.
pub(crate) fn write_cells(
    graph: &mut Graph,
    sheet: ItemId,
    cells: &[CellSnapshot],
) -> Result<Vec<CellSnapshot>> {
    graph.update_sheet(sheet, |provider| {
        cells
            .iter()
            .map(|snapshot| {
                let previous = provider.replace(snapshot.reference, snapshot.to_cell());
                CellSnapshot::of(snapshot.reference, previous.as_ref())
            })
            .collect()
    })
}

/// Writes `previous` back in reverse, so a reference written twice ends at
/// its first value.
pub(crate) fn restore_cells(graph: &mut Graph, sheet: ItemId, previous: &[CellSnapshot]) -> Result<()> {
    graph.update_sheet(sheet, |provider| {
        for snapshot in previous.iter().rev() {
            provider.replace(snapshot.reference, snapshot.to_cell());
        }
    })
}

pub(crate) fn clear_cells(
    graph: &mut Graph,
    sheet: ItemId,
    references: &[CellRef],
) -> Result<Vec<CellSnapshot>> {
    graph.update_sheet(sheet, |provider| {
        references
            .iter()
            .map(|reference| {
                let previous = provider.replace(*reference, None);
                CellSnapshot::of(*reference, previous.as_ref())
            })
            .collect()
    })
}

fn not_executed(kind: CommandKind) -> CommandError {
    CommandError::InvalidState(format!("{} has not been executed", kind))
}

fn resolve_sheet(descriptor: &CommandDescriptor, graph: &Graph) -> Result<Option<ItemBinding>> {
    let sheet = descriptor.require_item()?;
    Ok(ItemBinding::resolve(graph, sheet).filter(|_| graph.sheet(sheet).is_ok()))
}

#[derive(Debug, Serialize, Deserialize)]
struct CellFields {
    cell: CellSnapshot,
}

#[derive(Debug, Serialize, Deserialize)]
struct CellsFields {
    cells: Vec<CellSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ReferencesFields {
    references: Vec<CellRef>,
}

// ----------------------------------------------------------------------------
// SetCellCommand
// ----------------------------------------------------------------------------

/// Sets the value or expression of one cell.
#[derive(Debug)]
pub struct SetCellCommand {
    base: CommandBase,
    binding: ItemBinding,
    cell: CellSnapshot,
    previous: Option<CellSnapshot>,
}

impl SetCellCommand {
    pub fn new(sheet: ItemId, cell: CellSnapshot) -> Self {
        Self {
            base: CommandBase::default(),
            binding: ItemBinding::new(sheet),
            cell,
            previous: None,
        }
    }

    pub fn expression(sheet: ItemId, reference: CellRef, expression: impl Into<String>) -> Self {
        let mut cell = CellSnapshot::new(reference, "");
        cell.formula = Some(expression.into());
        Self::new(sheet, cell)
    }

    pub fn create_from_object(descriptor: &CommandDescriptor, graph: &Graph) -> Result<Option<Self>> {
        let Some(binding) = resolve_sheet(descriptor, graph)? else {
            return Ok(None);
        };
        let fields: CellFields = descriptor.fields_as()?;
        let undo: Option<CellFields> = descriptor.undo_as()?;
        Ok(Some(Self {
            base: descriptor.base(),
            binding,
            cell: fields.cell,
            previous: undo.map(|u| u.cell),
        }))
    }
}

impl Command for SetCellCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::SetCell
    }

    fn base(&self) -> &CommandBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CommandBase {
        &mut self.base
    }

    fn item(&self) -> Option<ItemId> {
        Some(self.binding.id())
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<()> {
        let mut previous = write_cells(graph, self.binding.id(), std::slice::from_ref(&self.cell))?;
        self.previous = previous.pop();
        Ok(())
    }

    fn undo(&mut self, graph: &mut Graph) -> Result<()> {
        let previous = self.previous.as_ref().ok_or_else(|| not_executed(self.kind()))?;
        restore_cells(graph, self.binding.id(), std::slice::from_ref(previous))
    }

    fn redo(&mut self, graph: &mut Graph) -> Result<()> {
        write_cells(graph, self.binding.id(), std::slice::from_ref(&self.cell)).map(|_| ())
    }

    fn do_after_undo(&self, graph: &Graph, viewer: &mut dyn Viewer) {
        self.binding.reselect(graph, viewer);
    }

    fn do_after_redo(&self, graph: &Graph, viewer: &mut dyn Viewer) {
        self.binding.reselect(graph, viewer);
    }

    fn to_object(&self) -> Result<CommandDescriptor> {
        let descriptor = CommandDescriptor::new(self.kind(), &self.base)
            .with_item(self.binding.id())
            .with_fields(&CellFields {
                cell: self.cell.clone(),
            })?;
        match &self.previous {
            Some(previous) => descriptor.with_undo(&CellFields {
                cell: previous.clone(),
            }),
            None => Ok(descriptor),
        }
    }

    command_any!();
}

// ----------------------------------------------------------------------------
// SetCellsCommand
// ----------------------------------------------------------------------------

#[derive(Debug)]
pub struct SetCellsCommand {
    base: CommandBase,
    binding: ItemBinding,
    cells: Vec<CellSnapshot>,
    previous: Option<Vec<CellSnapshot>>,
}

impl SetCellsCommand {
    pub fn new(sheet: ItemId, cells: Vec<CellSnapshot>) -> Self {
        Self {
            base: CommandBase::default(),
            binding: ItemBinding::new(sheet),
            cells,
            previous: None,
        }
    }

    pub fn cells(&self) -> &[CellSnapshot] {
        &self.cells
    }

    pub fn create_from_object(descriptor: &CommandDescriptor, graph: &Graph) -> Result<Option<Self>> {
        let Some(binding) = resolve_sheet(descriptor, graph)? else {
            return Ok(None);
        };
        let fields: CellsFields = descriptor.fields_as()?;
        let undo: Option<CellsFields> = descriptor.undo_as()?;
        Ok(Some(Self {
            base: descriptor.base(),
            binding,
            cells: fields.cells,
            previous: undo.map(|u| u.cells),
        }))
    }
}

impl Command for SetCellsCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::SetCells
    }

    fn base(&self) -> &CommandBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CommandBase {
        &mut self.base
    }

    fn item(&self) -> Option<ItemId> {
        Some(self.binding.id())
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<()> {
        self.previous = Some(write_cells(graph, self.binding.id(), &self.cells)?);
        Ok(())
    }

    fn undo(&mut self, graph: &mut Graph) -> Result<()> {
        let previous = self.previous.as_ref().ok_or_else(|| not_executed(self.kind()))?;
        restore_cells(graph, self.binding.id(), previous)
    }

    fn redo(&mut self, graph: &mut Graph) -> Result<()> {
        write_cells(graph, self.binding.id(), &self.cells).map(|_| ())
    }

    fn do_after_undo(&self, graph: &Graph, viewer: &mut dyn Viewer) {
        self.binding.reselect(graph, viewer);
    }

    fn do_after_redo(&self, graph: &Graph, viewer: &mut dyn Viewer) {
        self.binding.reselect(graph, viewer);
    }

    fn to_object(&self) -> Result<CommandDescriptor> {
        let descriptor = CommandDescriptor::new(self.kind(), &self.base)
            .with_item(self.binding.id())
            .with_fields(&CellsFields {
                cells: self.cells.clone(),
            })?;
        match &self.previous {
            Some(previous) => descriptor.with_undo(&CellsFields {
                cells: previous.clone(),
            }),
            None => Ok(descriptor),
        }
    }

    command_any!();
}

// ----------------------------------------------------------------------------
// DeleteCellsCommand
// ----------------------------------------------------------------------------

#[derive(Debug)]
pub struct DeleteCellsCommand {
    base: CommandBase,
    binding: ItemBinding,
    references: Vec<CellRef>,
    previous: Option<Vec<CellSnapshot>>,
}

impl DeleteCellsCommand {
    pub fn new(sheet: ItemId, references: Vec<CellRef>) -> Self {
        Self {
            base: CommandBase::default(),
            binding: ItemBinding::new(sheet),
            references,
            previous: None,
        }
    }

    pub fn create_from_object(descriptor: &CommandDescriptor, graph: &Graph) -> Result<Option<Self>> {
        let Some(binding) = resolve_sheet(descriptor, graph)? else {
            return Ok(None);
        };
        let fields: ReferencesFields = descriptor.fields_as()?;
        let undo: Option<CellsFields> = descriptor.undo_as()?;
        Ok(Some(Self {
            base: descriptor.base(),
            binding,
            references: fields.references,
            previous: undo.map(|u| u.cells),
        }))
    }
}

impl Command for DeleteCellsCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::DeleteCells
    }

    fn base(&self) -> &CommandBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CommandBase {
        &mut self.base
    }

    fn item(&self) -> Option<ItemId> {
        Some(self.binding.id())
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<()> {
        self.previous = Some(clear_cells(graph, self.binding.id(), &self.references)?);
        Ok(())
    }

    fn undo(&mut self, graph: &mut Graph) -> Result<()> {
        let previous = self.previous.as_ref().ok_or_else(|| not_executed(self.kind()))?;
        restore_cells(graph, self.binding.id(), previous)
    }

    fn redo(&mut self, graph: &mut Graph) -> Result<()> {
        clear_cells(graph, self.binding.id(), &self.references).map(|_| ())
    }

    fn do_after_undo(&self, graph: &Graph, viewer: &mut dyn Viewer) {
        self.binding.reselect(graph, viewer);
    }

    fn to_object(&self) -> Result<CommandDescriptor> {
        let descriptor = CommandDescriptor::new(self.kind(), &self.base)
            .with_item(self.binding.id())
            .with_fields(&ReferencesFields {
                references: self.references.clone(),
            })?;
        match &self.previous {
            Some(previous) => descriptor.with_undo(&CellsFields {
                cells: previous.clone(),
            }),
            None => Ok(descriptor),
        }
    }

    command_any!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CellValue;

    fn r(label: &str) -> CellRef {
        CellRef::parse(label).unwrap()
    }

    #[test]
    fn test_set_cell_undo_removes_new_cell() {
        let mut graph = Graph::new();
        let sheet = graph.add_sheet();

        let mut cmd = SetCellCommand::new(sheet, CellSnapshot::new(r("B2"), 7i64));
        cmd.execute(&mut graph).unwrap();
        assert_eq!(graph.sheet(sheet).unwrap().value(&r("B2")), CellValue::Number(7.0));

        cmd.undo(&mut graph).unwrap();
        assert!(graph.sheet(sheet).unwrap().is_empty());
    }

    #[test]
    fn test_set_cells_with_repeated_reference_undoes_to_first_value() {
        let mut graph = Graph::new();
        let sheet = graph.add_sheet();
        graph
            .update_sheet(sheet, |p| {
                p.set_value(r("A1"), CellValue::from("orig"));
            })
            .unwrap();

        let mut cmd = SetCellsCommand::new(
            sheet,
            vec![CellSnapshot::new(r("A1"), "one"), CellSnapshot::new(r("A1"), "two")],
        );
        cmd.execute(&mut graph).unwrap();
        assert_eq!(graph.sheet(sheet).unwrap().text(&r("A1")), "two");

        cmd.undo(&mut graph).unwrap();
        assert_eq!(graph.sheet(sheet).unwrap().text(&r("A1")), "orig");
    }

    #[test]
    fn test_delete_cells_keeps_expression_for_undo() {
        let mut graph = Graph::new();
        let sheet = graph.add_sheet();
        let mut set = SetCellCommand::expression(sheet, r("C3"), "=A1+1");
        set.execute(&mut graph).unwrap();
        let before = graph.snapshot();

        let mut delete = DeleteCellsCommand::new(sheet, vec![r("C3")]);
        delete.execute(&mut graph).unwrap();
        assert!(graph.sheet(sheet).unwrap().get(&r("C3")).is_none());

        delete.undo(&mut graph).unwrap();
        assert_eq!(graph.snapshot(), before);
    }

    #[test]
    fn test_cell_command_on_non_sheet_is_absent() {
        let mut graph = Graph::new();
        let sheet = graph.add_sheet();
        let node = graph.add_node();

        let mut descriptor = SetCellsCommand::new(sheet, vec![]).to_object().unwrap();
        descriptor.item_id = Some(node);
        assert!(SetCellsCommand::create_from_object(&descriptor, &graph)
            .unwrap()
            .is_none());
    }
}
