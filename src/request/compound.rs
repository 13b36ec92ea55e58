use super::RequestCommand;
use crate::command::compound::{batch_order, run_batch};
use crate::command::{Command, CommandBase, CommandKind, Pass, command_any};
use crate::core::{CommandError, ItemId, Result};
use crate::graph::{Graph, Viewer};
use crate::wire::{CommandDescriptor, ServerRequest};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use tracing::info_span;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CompoundRequestFields {
    pub commands: Vec<CommandDescriptor>,
}

/// Batch of request commands addressed to one sheet.
///
/// Requests are `{ requests: [..] }` with one entry per child. The undo
/// request lists the children's undo requests last child first.
#[derive(Debug)]
pub struct CompoundRequestCommand {
    base: CommandBase,
    streamsheet_id: ItemId,
    children: Vec<Box<dyn RequestCommand>>,
}

impl CompoundRequestCommand {
    pub fn new(streamsheet_id: ItemId) -> Self {
        Self {
            base: CommandBase::default(),
            streamsheet_id,
            children: Vec::new(),
        }
    }

    pub(crate) fn from_parts(
        base: CommandBase,
        streamsheet_id: ItemId,
        children: Vec<Box<dyn RequestCommand>>,
    ) -> Self {
        Self {
            base,
            streamsheet_id,
            children,
        }
    }

    pub fn add(mut self, child: impl RequestCommand + 'static) -> Self {
        self.children.push(Box::new(child));
        self
    }

    pub fn push(&mut self, child: Box<dyn RequestCommand>) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[Box<dyn RequestCommand>] {
        &self.children
    }

    fn run(&mut self, graph: &mut Graph, pass: Pass) -> Result<()> {
        let span = info_span!(
            "command.server.compound",
            pass = pass.name(),
            size = self.children.len(),
            sheet = %self.streamsheet_id
        );
        let _enter = span.enter();
        let order = batch_order(self.children.len(), pass, false);
        run_batch(self.children.as_mut_slice(), &order, graph, false, pass)
    }

    fn result_list<'a>(&self, result: &'a JsonValue) -> Result<&'a Vec<JsonValue>> {
        let results = result
            .as_array()
            .or_else(|| result.get("results").and_then(JsonValue::as_array))
            .ok_or_else(|| CommandError::malformed(self.kind().wire_name(), "expected a result list"))?;
        if results.len() != self.children.len() {
            return Err(CommandError::malformed(
                self.kind().wire_name(),
                format!(
                    "{} results for {} requests",
                    results.len(),
                    self.children.len()
                ),
            ));
        }
        Ok(results)
    }

    fn batch_request(&self, requests: Vec<ServerRequest>, undo: bool) -> ServerRequest {
        let mut info = json!({ "requests": requests });
        if undo {
            info["undo"] = JsonValue::Bool(true);
        }
        ServerRequest::new(self.kind(), self.streamsheet_id, info)
    }
}

impl Command for CompoundRequestCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::ServerCompound
    }

    fn base(&self) -> &CommandBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CommandBase {
        &mut self.base
    }

    fn item(&self) -> Option<ItemId> {
        None
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<()> {
        self.run(graph, Pass::Execute)
    }

    fn undo(&mut self, graph: &mut Graph) -> Result<()> {
        self.run(graph, Pass::Undo)
    }

    fn redo(&mut self, graph: &mut Graph) -> Result<()> {
        self.run(graph, Pass::Redo)
    }

    fn do_after_undo(&self, graph: &Graph, viewer: &mut dyn Viewer) {
        for child in self.children.iter().rev() {
            child.do_after_undo(graph, viewer);
        }
    }

    fn do_after_redo(&self, graph: &Graph, viewer: &mut dyn Viewer) {
        for child in &self.children {
            child.do_after_redo(graph, viewer);
        }
    }

    fn to_object(&self) -> Result<CommandDescriptor> {
        let commands = self
            .children
            .iter()
            .map(|c| c.to_object())
            .collect::<Result<Vec<_>>>()?;
        CommandDescriptor::new(self.kind(), &self.base)
            .with_item(self.streamsheet_id)
            .with_fields(&CompoundRequestFields { commands })
    }

    fn as_request_mut(&mut self) -> Option<&mut dyn RequestCommand> {
        Some(self)
    }

    command_any!();
}

impl RequestCommand for CompoundRequestCommand {
    fn streamsheet_id(&self) -> ItemId {
        self.streamsheet_id
    }

    fn get_execute_request(&self) -> Result<ServerRequest> {
        let requests = self
            .children
            .iter()
            .map(|c| c.get_execute_request())
            .collect::<Result<Vec<_>>>()?;
        Ok(self.batch_request(requests, false))
    }

    fn get_redo_request(&self) -> Result<ServerRequest> {
        let requests = self
            .children
            .iter()
            .map(|c| c.get_redo_request())
            .collect::<Result<Vec<_>>>()?;
        Ok(self.batch_request(requests, false))
    }

    fn get_undo_request(&self) -> Result<Option<ServerRequest>> {
        let mut requests = Vec::with_capacity(self.children.len());
        for child in self.children.iter().rev() {
            match child.get_undo_request()? {
                Some(request) => requests.push(request),
                None => return Ok(None),
            }
        }
        Ok(Some(self.batch_request(requests, true)))
    }

    fn check_result(&self, result: &JsonValue) -> Result<()> {
        let results = self.result_list(result)?;
        for (child, result) in self.children.iter().zip(results) {
            child.check_result(result)?;
        }
        Ok(())
    }

    /// Accepts `[r0, r1, ..]` or `{ results: [..] }`; the i-th result goes to
    /// the i-th child. Every child result is checked before any is settled.
    fn handle_result(&mut self, result: &JsonValue) -> Result<bool> {
        self.check_result(result)?;
        let results = self.result_list(result)?;

        let mut accepted = false;
        for (child, result) in self.children.iter_mut().zip(results) {
            accepted |= child.handle_result(result)?;
        }
        Ok(accepted)
    }

    fn handle_error(&mut self, error: &CommandError) {
        for child in &mut self.children {
            child.handle_error(error);
        }
    }

    fn is_reconciled(&self) -> bool {
        self.children.iter().all(|c| c.is_reconciled())
    }
}
