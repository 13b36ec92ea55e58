// ============================================================================
// Compound Command
// ============================================================================
//
// An ordered batch of commands executed as one history entry.
//
// Order:
//   execute -> insertion order
//   undo    -> reverse insertion order, or insertion order with reverse_undo
//   redo    -> insertion order
//
// Change notifications of every sub-command item are held back for the
// duration of a pass and flushed once at the end. A failing sub-command rolls
// back the ones that already ran in that pass.
//
// ============================================================================

use super::{Command, CommandBase, CommandKind, DeletePortCommand, DetachEdgeCommand, Pass, command_any};
use crate::config::CommandConfig;
use crate::core::{ItemId, Result};
use crate::graph::{EdgeEnd, Graph, SuppressedRefresh, Viewer};
use crate::wire::CommandDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{Level, event, info_span};

/// Hooks wiring data between sequential sub-commands during `execute`.
pub trait CompoundHooks: fmt::Debug + Send {
    /// Called before the sub-command at `index` runs.
    fn init_next_command(&mut self, _command: &mut dyn Command, _index: usize, _graph: &Graph) {}

    /// Called after the sub-command at `index` ran successfully.
    fn executed_command(&mut self, _command: &dyn Command, _index: usize, _graph: &Graph) {}
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CompoundFields {
    pub commands: Vec<CommandDescriptor>,
    #[serde(rename = "reverseUndo", default)]
    pub reverse_undo: bool,
    #[serde(rename = "forceRefresh", default)]
    pub force_refresh: bool,
}

#[derive(Debug, Default)]
pub struct CompoundCommand {
    base: CommandBase,
    commands: Vec<Box<dyn Command>>,
    reverse_undo: bool,
    force_refresh: bool,
    hooks: Option<Box<dyn CompoundHooks>>,
}

impl CompoundCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty batch carrying the configured refresh behaviour.
    pub fn from_config(config: &CommandConfig) -> Self {
        Self::new().with_force_refresh(config.force_refresh)
    }

    pub(crate) fn from_parts(
        base: CommandBase,
        commands: Vec<Box<dyn Command>>,
        reverse_undo: bool,
        force_refresh: bool,
    ) -> Self {
        Self {
            base,
            commands,
            reverse_undo,
            force_refresh,
            hooks: None,
        }
    }

    /// Detaches one end of an edge and deletes the port it was linked to when
    /// no other edge uses that port any more.
    pub fn detach_and_remove_orphan(edge: ItemId, end: EdgeEnd) -> Self {
        Self::new()
            .add(DetachEdgeCommand::new(edge, end))
            .add(DeletePortCommand::unbound())
            .with_hooks(OrphanPortCleanup::default())
    }

    pub fn add(mut self, command: impl Command + 'static) -> Self {
        self.commands.push(Box::new(command));
        self
    }

    pub fn push(&mut self, command: Box<dyn Command>) {
        self.commands.push(command);
    }

    pub fn with_reverse_undo(mut self, reverse_undo: bool) -> Self {
        self.reverse_undo = reverse_undo;
        self
    }

    pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    pub fn with_hooks(mut self, hooks: impl CompoundHooks + 'static) -> Self {
        self.hooks = Some(Box::new(hooks));
        self
    }

    pub fn commands(&self) -> &[Box<dyn Command>] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    fn order(&self, pass: Pass) -> Vec<usize> {
        batch_order(self.commands.len(), pass, self.reverse_undo)
    }
}

/// Indices of a batch in the order `pass` visits them.
pub(crate) fn batch_order(len: usize, pass: Pass, reverse_undo: bool) -> Vec<usize> {
    match pass {
        Pass::Undo if !reverse_undo => (0..len).rev().collect(),
        _ => (0..len).collect(),
    }
}

/// Runs `pass` over `commands` in `order` with their refresh suppressed.
pub(crate) fn run_batch<C>(
    commands: &mut [Box<C>],
    order: &[usize],
    graph: &mut Graph,
    force: bool,
    pass: Pass,
) -> Result<()>
where
    C: Command + ?Sized,
{
    let items: Vec<ItemId> = commands.iter().filter_map(|c| c.item()).collect();
    let mut guard = SuppressedRefresh::new(graph, items, force);

    for (done, &index) in order.iter().enumerate() {
        if let Err(err) = pass.apply(commands[index].as_mut(), &mut *guard) {
            event!(Level::WARN, index = index, pass = %pass, error = %err, "sub-command failed, rolling back batch");
            rollback(commands, &order[..done], &mut guard, pass);
            return Err(err);
        }
    }
    Ok(())
}

fn rollback<C>(commands: &mut [Box<C>], done: &[usize], graph: &mut Graph, pass: Pass)
where
    C: Command + ?Sized,
{
    let inverse = pass.inverse();
    for &index in done.iter().rev() {
        if let Err(err) = inverse.apply(commands[index].as_mut(), graph) {
            event!(Level::WARN, index = index, pass = %inverse, error = %err, "rollback of sub-command failed");
        }
    }
}

impl Command for CompoundCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::Compound
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
        let span = info_span!("command.compound", pass = "execute", size = self.commands.len());
        let _enter = span.enter();

        let items: Vec<ItemId> = self.commands.iter().filter_map(|c| c.item()).collect();
        let mut guard = SuppressedRefresh::new(graph, items, self.force_refresh);

        for index in 0..self.commands.len() {
            if let Some(hooks) = self.hooks.as_mut() {
                hooks.init_next_command(self.commands[index].as_mut(), index, &guard);
            }
            // hooks may have bound the command to an item only now
            if let Some(item) = self.commands[index].item() {
                guard.suppress(item);
            }

            if let Err(err) = self.commands[index].execute(&mut guard) {
                event!(Level::WARN, index = index, error = %err, "sub-command failed, rolling back batch");
                let done: Vec<usize> = (0..index).collect();
                rollback(self.commands.as_mut_slice(), &done, &mut guard, Pass::Execute);
                return Err(err);
            }

            if let Some(hooks) = self.hooks.as_mut() {
                hooks.executed_command(self.commands[index].as_ref(), index, &guard);
            }
        }
        Ok(())
    }

    fn undo(&mut self, graph: &mut Graph) -> Result<()> {
        let span = info_span!("command.compound", pass = "undo", size = self.commands.len());
        let _enter = span.enter();
        let order = self.order(Pass::Undo);
        run_batch(self.commands.as_mut_slice(), &order, graph, self.force_refresh, Pass::Undo)
    }

    fn redo(&mut self, graph: &mut Graph) -> Result<()> {
        let span = info_span!("command.compound", pass = "redo", size = self.commands.len());
        let _enter = span.enter();
        let order = self.order(Pass::Redo);
        run_batch(self.commands.as_mut_slice(), &order, graph, self.force_refresh, Pass::Redo)
    }

    fn do_after_execute(&self, graph: &Graph, viewer: &mut dyn Viewer) {
        for index in self.order(Pass::Execute) {
            self.commands[index].do_after_execute(graph, viewer);
        }
    }

    fn do_after_undo(&self, graph: &Graph, viewer: &mut dyn Viewer) {
        for index in self.order(Pass::Undo) {
            self.commands[index].do_after_undo(graph, viewer);
        }
    }

    fn do_after_redo(&self, graph: &Graph, viewer: &mut dyn Viewer) {
        for index in self.order(Pass::Redo) {
            self.commands[index].do_after_redo(graph, viewer);
        }
    }

    fn to_object(&self) -> Result<CommandDescriptor> {
        let commands = self
            .commands
            .iter()
            .map(|c| c.to_object())
            .collect::<Result<Vec<_>>>()?;
        CommandDescriptor::new(self.kind(), &self.base).with_fields(&CompoundFields {
            commands,
            reverse_undo: self.reverse_undo,
            force_refresh: self.force_refresh,
        })
    }

    command_any!();
}

/// Deletes the port a preceding detach left without edges.
///
/// A `DetachEdgeCommand` records the port it unlinked; if no edge uses that
/// port afterwards, the next unbound `DeletePortCommand` in the batch is bound
/// to it. Otherwise the delete stays unbound and does nothing.
#[derive(Debug, Default)]
pub struct OrphanPortCleanup {
    orphan: Option<ItemId>,
}

impl CompoundHooks for OrphanPortCleanup {
    fn init_next_command(&mut self, command: &mut dyn Command, _index: usize, _graph: &Graph) {
        let Some(delete) = command.as_any_mut().downcast_mut::<DeletePortCommand>() else {
            return;
        };
        if delete.port().is_none() {
            if let Some(port) = self.orphan.take() {
                delete.bind_port(port);
            }
        }
    }

    fn executed_command(&mut self, command: &dyn Command, _index: usize, graph: &Graph) {
        if let Some(detach) = command.as_any().downcast_ref::<DetachEdgeCommand>() {
            self.orphan = detach
                .detached_port()
                .filter(|port| graph.edges_at(*port).is_empty());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::SetAttributeCommand;
    use serde_json::json;

    #[test]
    fn test_undo_order_follows_reverse_undo_flag() {
        assert_eq!(batch_order(3, Pass::Execute, false), vec![0, 1, 2]);
        assert_eq!(batch_order(3, Pass::Undo, false), vec![2, 1, 0]);
        assert_eq!(batch_order(3, Pass::Undo, true), vec![0, 1, 2]);
        assert_eq!(batch_order(3, Pass::Redo, false), vec![0, 1, 2]);
    }

    #[test]
    fn test_batch_flushes_one_event_per_item() {
        let mut graph = Graph::new();
        let node = graph.add_node();
        graph.notifier_mut().take_events();

        let mut compound = CompoundCommand::new()
            .add(SetAttributeCommand::new(node, "a", Some(json!(1))))
            .add(SetAttributeCommand::new(node, "b", Some(json!(2))));
        compound.execute(&mut graph).unwrap();

        assert_eq!(graph.notifier().count_for(node), 1);
        assert!(graph.notifier().is_refresh_enabled(node));
    }

    #[test]
    fn test_orphan_port_is_deleted_and_restored() {
        let mut graph = Graph::new();
        let node = graph.add_node();
        let port = graph.add_port(node).unwrap();
        let edge = graph.add_edge(None, Some(port)).unwrap();
        let before = graph.snapshot();

        let mut compound = CompoundCommand::detach_and_remove_orphan(edge, EdgeEnd::Target);
        compound.execute(&mut graph).unwrap();
        assert!(!graph.contains(port));
        assert_eq!(graph.edge_end(edge, EdgeEnd::Target).unwrap(), None);

        compound.undo(&mut graph).unwrap();
        assert_eq!(graph.snapshot(), before);

        compound.redo(&mut graph).unwrap();
        assert!(!graph.contains(port));
    }

    #[test]
    fn test_shared_port_survives_detach() {
        let mut graph = Graph::new();
        let node = graph.add_node();
        let port = graph.add_port(node).unwrap();
        let edge = graph.add_edge(None, Some(port)).unwrap();
        graph.add_edge(Some(port), None).unwrap();

        let mut compound = CompoundCommand::detach_and_remove_orphan(edge, EdgeEnd::Target);
        compound.execute(&mut graph).unwrap();
        assert!(graph.contains(port));
    }
}
