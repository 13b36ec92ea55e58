// ============================================================================
// Cell Authority
// ============================================================================
//
// Server side of request commands. Re-executes each request against the
// authoritative graph and answers with what it actually applied and what it
// replaced:
//
//   { "cells": [..applied..], "oldcells": [..replaced..] }
//
// Compound requests answer `{ "results": [..] }`, one entry per child, and
// are applied all or nothing.
//
// ============================================================================

pub mod web;

use crate::command::CommandKind;
use crate::command::cell::{clear_cells, restore_cells, write_cells};
use crate::core::{CellRef, CommandError, ItemId, Result};
use crate::graph::{CellSnapshot, Graph};
use crate::wire::ServerRequest;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tracing::{Level, event, info_span};

#[derive(Deserialize)]
struct CellsInfo {
    cells: Vec<CellSnapshot>,
}

#[derive(Deserialize)]
struct ReferencesInfo {
    references: Vec<CellRef>,
}

#[derive(Deserialize)]
struct CompoundInfo {
    requests: Vec<ServerRequest>,
}

fn info_as<T: serde::de::DeserializeOwned>(request: &ServerRequest) -> Result<T> {
    serde_json::from_value(request.info.clone())
        .map_err(|err| CommandError::malformed(&request.name, err))
}

/// What one applied request replaced, kept until its batch completes.
struct Applied {
    sheet: ItemId,
    replaced: Vec<CellSnapshot>,
}

#[derive(Debug, Default)]
pub struct CellAuthority {
    graph: Graph,
    handled: u64,
}

impl CellAuthority {
    pub fn new(graph: Graph) -> Self {
        Self { graph, handled: 0 }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// Number of top-level requests applied so far.
    pub fn handled(&self) -> u64 {
        self.handled
    }

    pub fn handle(&mut self, request: &ServerRequest) -> Result<JsonValue> {
        let span = info_span!(
            "server.request",
            name = %request.name,
            sheet = %request.streamsheet_id,
            undo = request.is_undo()
        );
        let _enter = span.enter();

        let mut applied = Vec::new();
        match self.apply(request, &mut applied) {
            Ok(result) => {
                self.handled += 1;
                event!(Level::DEBUG, changes = applied.len(), "request applied");
                Ok(result)
            }
            Err(err) => {
                for step in applied.iter().rev() {
                    if let Err(rollback) = restore_cells(&mut self.graph, step.sheet, &step.replaced) {
                        event!(Level::WARN, error = %rollback, "rollback of partial request failed");
                    }
                }
                event!(Level::WARN, error = %err, "request rejected");
                Err(err)
            }
        }
    }

    fn apply(&mut self, request: &ServerRequest, applied: &mut Vec<Applied>) -> Result<JsonValue> {
        let kind = request
            .kind()
            .ok_or_else(|| CommandError::UnknownCommand(request.name.clone()))?;
        let sheet = request.streamsheet_id;
        match kind {
            CommandKind::ServerSetCells => {
                let info: CellsInfo = info_as(request)?;
                let replaced = write_cells(&mut self.graph, sheet, &info.cells)?;
                let provider = self.graph.sheet(sheet)?;
                let cells: Vec<CellSnapshot> = info
                    .cells
                    .iter()
                    .map(|c| provider.snapshot_of(c.reference))
                    .collect();
                applied.push(Applied {
                    sheet,
                    replaced: replaced.clone(),
                });
                Ok(json!({ "cells": cells, "oldcells": replaced }))
            }
            CommandKind::ServerDeleteCells => {
                let info: ReferencesInfo = info_as(request)?;
                let replaced = clear_cells(&mut self.graph, sheet, &info.references)?;
                applied.push(Applied {
                    sheet,
                    replaced: replaced.clone(),
                });
                Ok(json!({ "cells": [], "oldcells": replaced }))
            }
            CommandKind::ServerCompound => {
                let info: CompoundInfo = info_as(request)?;
                let results = info
                    .requests
                    .iter()
                    .map(|child| self.apply(child, applied))
                    .collect::<Result<Vec<_>>>()?;
                Ok(json!({ "results": results }))
            }
            other => Err(CommandError::UnknownCommand(other.wire_name().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CellValue;

    fn r(label: &str) -> CellRef {
        CellRef::parse(label).unwrap()
    }

    fn authority() -> (CellAuthority, ItemId) {
        let mut graph = Graph::new();
        let sheet = graph.add_sheet();
        (CellAuthority::new(graph), sheet)
    }

    #[test]
    fn test_set_cells_reports_replaced_values() {
        let (mut authority, sheet) = authority();
        let first = ServerRequest::new(
            CommandKind::ServerSetCells,
            sheet,
            json!({"cells": [{"reference": "A1", "value": 1}]}),
        );
        let result = authority.handle(&first).unwrap();
        assert_eq!(result["oldcells"][0]["value"], json!(""));

        let second = ServerRequest::new(
            CommandKind::ServerSetCells,
            sheet,
            json!({"cells": [{"reference": "A1", "value": 2}]}),
        );
        let result = authority.handle(&second).unwrap();
        assert_eq!(result["oldcells"][0]["value"], json!(1.0));
        assert_eq!(result["cells"][0]["value"], json!(2.0));
    }

    #[test]
    fn test_failing_compound_leaves_no_trace() {
        let (mut authority, sheet) = authority();
        let request = ServerRequest::new(
            CommandKind::ServerCompound,
            sheet,
            json!({"requests": [
                {"name": "command.server.SetCellsCommand", "streamsheetId": sheet,
                 "info": {"cells": [{"reference": "B2", "value": "x"}]}},
                {"name": "command.server.SetCellsCommand", "streamsheetId": 99,
                 "info": {"cells": []}}
            ]}),
        );
        assert!(matches!(
            authority.handle(&request),
            Err(CommandError::ItemNotFound(ItemId(99)))
        ));
        assert_eq!(
            authority.graph().sheet(sheet).unwrap().value(&r("B2")),
            CellValue::Null
        );
        assert_eq!(authority.handled(), 0);
    }
}
