// ============================================================================
// Command History
// ============================================================================
//
// Undo/redo driver for one document. Executed commands are pushed on the
// undo stack unless volatile; executing anything new clears the redo stack.
// The oldest entries are evicted once the configured limit is exceeded.
//
// ============================================================================

use crate::command::{Command, CompoundCommand, Pass};
use crate::config::CommandConfig;
use crate::core::Result;
use crate::graph::{Graph, Viewer};
use crate::registry::CommandFactory;
use crate::wire::CommandDescriptor;
use std::collections::VecDeque;
use tracing::{Level, event, info_span};

/// Outcome of loading a serialized history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub loaded: usize,
    /// Index and reason of every entry that could not be replayed.
    pub skipped: Vec<(usize, String)>,
}

pub struct CommandStack {
    undo: VecDeque<Box<dyn Command>>,
    redo: Vec<Box<dyn Command>>,
    limit: usize,
    force_refresh: bool,
}

impl CommandStack {
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit: limit.max(1),
            force_refresh: false,
        }
    }

    pub fn from_config(config: &CommandConfig) -> Self {
        Self {
            force_refresh: config.force_refresh,
            ..Self::new(config.history_limit)
        }
    }

    /// Empty batch for this document, refreshing like the stack was configured.
    pub fn batch(&self) -> CompoundCommand {
        CompoundCommand::new().with_force_refresh(self.force_refresh)
    }

    pub fn execute(
        &mut self,
        mut command: Box<dyn Command>,
        graph: &mut Graph,
        viewer: &mut dyn Viewer,
    ) -> Result<()> {
        command.execute(graph)?;
        command.do_after_execute(graph, viewer);
        if command.is_volatile() {
            event!(Level::DEBUG, command = %command.kind(), "volatile command not recorded");
            return Ok(());
        }
        self.redo.clear();
        self.push_undo(command);
        Ok(())
    }

    /// Undoes the newest entry. Returns `false` if there was nothing to undo.
    pub fn undo(&mut self, graph: &mut Graph, viewer: &mut dyn Viewer) -> Result<bool> {
        let Some(mut command) = self.undo.pop_back() else {
            return Ok(false);
        };
        if let Err(err) = Pass::Undo.apply(command.as_mut(), graph) {
            self.undo.push_back(command);
            return Err(err);
        }
        command.do_after_undo(graph, viewer);
        self.redo.push(command);
        Ok(true)
    }

    pub fn redo(&mut self, graph: &mut Graph, viewer: &mut dyn Viewer) -> Result<bool> {
        let Some(mut command) = self.redo.pop() else {
            return Ok(false);
        };
        if let Err(err) = Pass::Redo.apply(command.as_mut(), graph) {
            self.redo.push(command);
            return Err(err);
        }
        command.do_after_redo(graph, viewer);
        self.undo.push_back(command);
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Newest undoable entry; request commands are reconciled through it.
    pub fn last_mut(&mut self) -> Option<&mut Box<dyn Command>> {
        self.undo.back_mut()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Undoable entries, oldest first.
    pub fn export(&self) -> Result<Vec<CommandDescriptor>> {
        self.undo.iter().map(|c| c.to_object()).collect()
    }

    /// Replaces the history with reconstructed entries.
    ///
    /// Entries that do not reconstruct are skipped; the rest of the history
    /// still loads.
    pub fn load(
        &mut self,
        descriptors: &[CommandDescriptor],
        factory: &CommandFactory,
        graph: &Graph,
    ) -> LoadReport {
        let span = info_span!("history.load", entries = descriptors.len());
        let _enter = span.enter();

        self.clear();
        let mut report = LoadReport::default();
        for (index, descriptor) in descriptors.iter().enumerate() {
            let reason = match factory.create_from_object(descriptor, graph) {
                Ok(Some(command)) => {
                    self.push_undo(command);
                    report.loaded += 1;
                    continue;
                }
                Ok(None) => "unresolvable item".to_string(),
                Err(err) => err.to_string(),
            };
            event!(
                Level::WARN,
                index = index,
                command = %descriptor.name,
                reason = %reason,
                "skipping history entry"
            );
            report.skipped.push((index, reason));
        }
        report
    }

    fn push_undo(&mut self, command: Box<dyn Command>) {
        self.undo.push_back(command);
        while self.undo.len() > self.limit {
            if let Some(evicted) = self.undo.pop_front() {
                event!(Level::DEBUG, command = %evicted.kind(), "evicted oldest history entry");
            }
        }
    }
}

impl Default for CommandStack {
    fn default() -> Self {
        Self::from_config(&CommandConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandBase, SetAttributeCommand};
    use crate::graph::NullViewer;
    use serde_json::json;

    fn set(node: crate::core::ItemId, value: i64) -> Box<dyn Command> {
        Box::new(SetAttributeCommand::new(node, "v", Some(json!(value))))
    }

    #[test]
    fn test_volatile_commands_are_not_recorded() {
        let mut graph = Graph::new();
        let node = graph.add_node();
        let mut stack = CommandStack::new(10);

        let mut cmd = SetAttributeCommand::new(node, "v", Some(json!(1)));
        *cmd.base_mut() = CommandBase::volatile();
        stack.execute(Box::new(cmd), &mut graph, &mut NullViewer).unwrap();

        assert!(!stack.can_undo());
        assert_eq!(graph.item(node).unwrap().attribute("v"), Some(&json!(1)));
    }

    #[test]
    fn test_limit_evicts_oldest() {
        let mut graph = Graph::new();
        let node = graph.add_node();
        let mut stack = CommandStack::new(2);
        for value in 0..3 {
            stack.execute(set(node, value), &mut graph, &mut NullViewer).unwrap();
        }
        assert_eq!(stack.undo_len(), 2);

        assert!(stack.undo(&mut graph, &mut NullViewer).unwrap());
        assert!(stack.undo(&mut graph, &mut NullViewer).unwrap());
        assert!(!stack.undo(&mut graph, &mut NullViewer).unwrap());
        assert_eq!(graph.item(node).unwrap().attribute("v"), Some(&json!(0)));
    }

    #[test]
    fn test_new_command_clears_redo() {
        let mut graph = Graph::new();
        let node = graph.add_node();
        let mut stack = CommandStack::new(10);
        stack.execute(set(node, 1), &mut graph, &mut NullViewer).unwrap();
        stack.undo(&mut graph, &mut NullViewer).unwrap();
        assert!(stack.can_redo());

        stack.execute(set(node, 2), &mut graph, &mut NullViewer).unwrap();
        assert!(!stack.can_redo());
    }
}
