use super::{Reconciled, RequestCommand};
use crate::command::cell::{clear_cells, restore_cells, write_cells};
use crate::command::{Command, CommandBase, CommandKind, ItemBinding, command_any};
use crate::core::{CellRef, CommandError, ItemId, Result};
use crate::graph::{CellSnapshot, Graph, Viewer};
use crate::wire::{CommandDescriptor, ServerRequest};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use tracing::{Level, event};

/// Server answer to a cell request: `{ cells, oldcells }`.
#[derive(Debug, Default, Deserialize)]
struct CellsResult {
    #[serde(default, alias = "cellsApplied")]
    cells: Option<Vec<CellSnapshot>>,
    #[serde(default, alias = "cellsReplaced")]
    oldcells: Option<Vec<CellSnapshot>>,
}

impl CellsResult {
    fn parse(kind: CommandKind, result: &JsonValue) -> Result<Self> {
        if !result.is_object() {
            return Err(CommandError::malformed(
                kind.wire_name(),
                format!("expected a result object, got {}", result),
            ));
        }
        serde_json::from_value(result.clone())
            .map_err(|err| CommandError::malformed(kind.wire_name(), err))
    }
}

/// Undo-side state carried in the descriptor.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ReconcileUndo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    local: Option<Vec<CellSnapshot>>,
    #[serde(rename = "cellsApplied", default, skip_serializing_if = "Option::is_none")]
    applied: Option<Vec<CellSnapshot>>,
    #[serde(rename = "cellsReplaced", default, skip_serializing_if = "Option::is_none")]
    replaced: Option<Vec<CellSnapshot>>,
}

/// The server writes `cells` in order, so the replaced snapshots go out last
/// first, matching `restore_cells` for references written more than once.
fn undo_request(sheet: ItemId, replaced: &Reconciled<Vec<CellSnapshot>>) -> Option<ServerRequest> {
    replaced.get().map(|cells| {
        let cells: Vec<&CellSnapshot> = cells.iter().rev().collect();
        ServerRequest::new(
            CommandKind::ServerSetCells,
            sheet,
            json!({ "cells": cells, "undo": true }),
        )
    })
}

fn log_settled(kind: CommandKind, sheet: ItemId, accepted: bool) {
    if accepted {
        event!(Level::DEBUG, command = %kind, sheet = %sheet, "server result accepted");
    } else {
        event!(Level::DEBUG, command = %kind, sheet = %sheet, "duplicate server result ignored");
    }
}

fn resolve_sheet(descriptor: &CommandDescriptor, graph: &Graph) -> Result<Option<ItemBinding>> {
    let sheet = descriptor.require_item()?;
    Ok(ItemBinding::resolve(graph, sheet).filter(|_| graph.sheet(sheet).is_ok()))
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
// SetCellsRequestCommand
// ----------------------------------------------------------------------------

/// Sets cells locally and asks the server to do the same.
///
/// Until the server answers, undo restores what the local execute replaced.
/// Afterwards it restores what the server reports it replaced, and redo
/// writes the values the server actually applied.
#[derive(Debug)]
pub struct SetCellsRequestCommand {
    base: CommandBase,
    binding: ItemBinding,
    cells: Vec<CellSnapshot>,
    local: Option<Vec<CellSnapshot>>,
    applied: Reconciled<Vec<CellSnapshot>>,
    replaced: Reconciled<Vec<CellSnapshot>>,
}

impl SetCellsRequestCommand {
    pub fn new(sheet: ItemId, cells: Vec<CellSnapshot>) -> Self {
        Self {
            base: CommandBase::default(),
            binding: ItemBinding::new(sheet),
            cells,
            local: None,
            applied: Reconciled::new(),
            replaced: Reconciled::new(),
        }
    }

    pub fn cells(&self) -> &[CellSnapshot] {
        &self.cells
    }

    pub fn cells_applied(&self) -> Option<&Vec<CellSnapshot>> {
        self.applied.get()
    }

    pub fn cells_replaced(&self) -> Option<&Vec<CellSnapshot>> {
        self.replaced.get()
    }

    pub fn create_from_object(descriptor: &CommandDescriptor, graph: &Graph) -> Result<Option<Self>> {
        let Some(binding) = resolve_sheet(descriptor, graph)? else {
            return Ok(None);
        };
        let fields: CellsFields = descriptor.fields_as()?;
        let undo: ReconcileUndo = descriptor.undo_as()?.unwrap_or_default();
        Ok(Some(Self {
            base: descriptor.base(),
            binding,
            cells: fields.cells,
            local: undo.local,
            applied: Reconciled::from_option(undo.applied),
            replaced: Reconciled::from_option(undo.replaced),
        }))
    }

    fn redo_cells(&self) -> &[CellSnapshot] {
        self.applied.get().map(Vec::as_slice).unwrap_or(&self.cells)
    }
}

impl Command for SetCellsRequestCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::ServerSetCells
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
        self.local = Some(write_cells(graph, self.binding.id(), &self.cells)?);
        Ok(())
    }

    fn undo(&mut self, graph: &mut Graph) -> Result<()> {
        let previous = self
            .replaced
            .get()
            .or(self.local.as_ref())
            .ok_or_else(|| CommandError::InvalidState(format!("{} has not been executed", self.kind())))?;
        restore_cells(graph, self.binding.id(), previous)
    }

    fn redo(&mut self, graph: &mut Graph) -> Result<()> {
        write_cells(graph, self.binding.id(), self.redo_cells()).map(|_| ())
    }

    fn do_after_undo(&self, graph: &Graph, viewer: &mut dyn Viewer) {
        self.binding.reselect(graph, viewer);
    }

    fn do_after_redo(&self, graph: &Graph, viewer: &mut dyn Viewer) {
        self.binding.reselect(graph, viewer);
    }

    fn to_object(&self) -> Result<CommandDescriptor> {
        CommandDescriptor::new(self.kind(), &self.base)
            .with_item(self.binding.id())
            .with_fields(&CellsFields {
                cells: self.cells.clone(),
            })?
            .with_undo(&ReconcileUndo {
                local: self.local.clone(),
                applied: self.applied.get().cloned(),
                replaced: self.replaced.get().cloned(),
            })
    }

    fn as_request_mut(&mut self) -> Option<&mut dyn RequestCommand> {
        Some(self)
    }

    command_any!();
}

impl RequestCommand for SetCellsRequestCommand {
    fn streamsheet_id(&self) -> ItemId {
        self.binding.id()
    }

    fn get_execute_request(&self) -> Result<ServerRequest> {
        Ok(ServerRequest::new(
            self.kind(),
            self.binding.id(),
            json!({ "cells": self.cells }),
        ))
    }

    fn get_redo_request(&self) -> Result<ServerRequest> {
        Ok(ServerRequest::new(
            self.kind(),
            self.binding.id(),
            json!({ "cells": self.redo_cells() }),
        ))
    }

    fn get_undo_request(&self) -> Result<Option<ServerRequest>> {
        Ok(undo_request(self.binding.id(), &self.replaced))
    }

    fn check_result(&self, result: &JsonValue) -> Result<()> {
        CellsResult::parse(self.kind(), result).map(|_| ())
    }

    fn handle_result(&mut self, result: &JsonValue) -> Result<bool> {
        let result = CellsResult::parse(self.kind(), result)?;
        let mut accepted = false;
        if let Some(cells) = result.cells {
            accepted |= self.applied.settle(cells);
        }
        if let Some(oldcells) = result.oldcells {
            accepted |= self.replaced.settle(oldcells);
        }
        log_settled(self.kind(), self.binding.id(), accepted);
        Ok(accepted)
    }

    fn is_reconciled(&self) -> bool {
        self.replaced.is_settled()
    }
}

// ----------------------------------------------------------------------------
// DeleteCellsRequestCommand
// ----------------------------------------------------------------------------

/// Clears cells locally and asks the server to do the same.
#[derive(Debug)]
pub struct DeleteCellsRequestCommand {
    base: CommandBase,
    binding: ItemBinding,
    references: Vec<CellRef>,
    local: Option<Vec<CellSnapshot>>,
    replaced: Reconciled<Vec<CellSnapshot>>,
}

impl DeleteCellsRequestCommand {
    pub fn new(sheet: ItemId, references: Vec<CellRef>) -> Self {
        Self {
            base: CommandBase::default(),
            binding: ItemBinding::new(sheet),
            references,
            local: None,
            replaced: Reconciled::new(),
        }
    }

    pub fn cells_replaced(&self) -> Option<&Vec<CellSnapshot>> {
        self.replaced.get()
    }

    pub fn create_from_object(descriptor: &CommandDescriptor, graph: &Graph) -> Result<Option<Self>> {
        let Some(binding) = resolve_sheet(descriptor, graph)? else {
            return Ok(None);
        };
        let fields: ReferencesFields = descriptor.fields_as()?;
        let undo: ReconcileUndo = descriptor.undo_as()?.unwrap_or_default();
        Ok(Some(Self {
            base: descriptor.base(),
            binding,
            references: fields.references,
            local: undo.local,
            replaced: Reconciled::from_option(undo.replaced),
        }))
    }
}

impl Command for DeleteCellsRequestCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::ServerDeleteCells
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
        self.local = Some(clear_cells(graph, self.binding.id(), &self.references)?);
        Ok(())
    }

    fn undo(&mut self, graph: &mut Graph) -> Result<()> {
        let previous = self
            .replaced
            .get()
            .or(self.local.as_ref())
            .ok_or_else(|| CommandError::InvalidState(format!("{} has not been executed", self.kind())))?;
        restore_cells(graph, self.binding.id(), previous)
    }

    fn redo(&mut self, graph: &mut Graph) -> Result<()> {
        clear_cells(graph, self.binding.id(), &self.references).map(|_| ())
    }

    fn do_after_undo(&self, graph: &Graph, viewer: &mut dyn Viewer) {
        self.binding.reselect(graph, viewer);
    }

    fn to_object(&self) -> Result<CommandDescriptor> {
        CommandDescriptor::new(self.kind(), &self.base)
            .with_item(self.binding.id())
            .with_fields(&ReferencesFields {
                references: self.references.clone(),
            })?
            .with_undo(&ReconcileUndo {
                local: self.local.clone(),
                applied: None,
                replaced: self.replaced.get().cloned(),
            })
    }

    fn as_request_mut(&mut self) -> Option<&mut dyn RequestCommand> {
        Some(self)
    }

    command_any!();
}

impl RequestCommand for DeleteCellsRequestCommand {
    fn streamsheet_id(&self) -> ItemId {
        self.binding.id()
    }

    fn get_execute_request(&self) -> Result<ServerRequest> {
        Ok(ServerRequest::new(
            self.kind(),
            self.binding.id(),
            json!({ "references": self.references }),
        ))
    }

    fn get_redo_request(&self) -> Result<ServerRequest> {
        self.get_execute_request()
    }

    fn get_undo_request(&self) -> Result<Option<ServerRequest>> {
        Ok(undo_request(self.binding.id(), &self.replaced))
    }

    fn check_result(&self, result: &JsonValue) -> Result<()> {
        CellsResult::parse(self.kind(), result).map(|_| ())
    }

    fn handle_result(&mut self, result: &JsonValue) -> Result<bool> {
        let result = CellsResult::parse(self.kind(), result)?;
        let accepted = match result.oldcells {
            Some(oldcells) => self.replaced.settle(oldcells),
            None => false,
        };
        log_settled(self.kind(), self.binding.id(), accepted);
        Ok(accepted)
    }

    fn is_reconciled(&self) -> bool {
        self.replaced.is_settled()
    }
}
