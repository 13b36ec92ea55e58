// ============================================================================
// Command Module
// ============================================================================
//
// A command is one reversible, serializable mutation of the document graph.
//
// Lifecycle:
//   execute  -> computes and stores the "old" state, applies the "new" one
//   undo     -> restores the stored "old" state
//   redo     -> reapplies the "new" state from what execute stored
//
// `redo` must leave the graph as a second `execute` on the same prior state
// would, but only `execute` computes the snapshot undo/redo reuse.
//
// ============================================================================

macro_rules! command_any {
    () => {
        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
            self
        }
    };
}
pub(crate) use command_any;

pub mod cell;
pub mod compound;
pub mod graph;
pub mod item;
pub mod kind;

pub use cell::{DeleteCellsCommand, SetCellCommand, SetCellsCommand};
pub use compound::{CompoundCommand, CompoundHooks, OrphanPortCleanup};
pub use graph::{
    AddItemCommand, AttachEdgeCommand, DeleteItemCommand, DeletePortCommand, DetachEdgeCommand,
    SetAttributeCommand,
};
pub use item::ItemBinding;
pub use kind::CommandKind;

use crate::core::{ItemId, Result};
use crate::graph::{Graph, Viewer};
use crate::request::RequestCommand;
use crate::wire::CommandDescriptor;
use serde_json::Value as JsonValue;
use std::any::Any;
use std::fmt;

/// State shared by every command kind.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandBase {
    /// Volatile commands are executed but never kept in the undo history.
    pub is_volatile: bool,
    /// Opaque payload carried through serialization untouched.
    pub custom: JsonValue,
}

impl CommandBase {
    pub fn volatile() -> Self {
        Self {
            is_volatile: true,
            custom: JsonValue::Null,
        }
    }

    pub fn with_custom(mut self, custom: JsonValue) -> Self {
        self.custom = custom;
        self
    }
}

pub trait Command: fmt::Debug + Send {
    fn kind(&self) -> CommandKind;

    fn base(&self) -> &CommandBase;

    fn base_mut(&mut self) -> &mut CommandBase;

    /// The item whose change notifications this command produces, if any.
    ///
    /// Batches use it to suppress intermediate refreshes. Every command
    /// answers explicitly; commands without a single item return `None`.
    fn item(&self) -> Option<ItemId>;

    fn execute(&mut self, graph: &mut Graph) -> Result<()>;

    fn undo(&mut self, graph: &mut Graph) -> Result<()>;

    fn redo(&mut self, graph: &mut Graph) -> Result<()>;

    fn do_after_execute(&self, _graph: &Graph, _viewer: &mut dyn Viewer) {}

    fn do_after_undo(&self, _graph: &Graph, _viewer: &mut dyn Viewer) {}

    fn do_after_redo(&self, _graph: &Graph, _viewer: &mut dyn Viewer) {}

    fn to_object(&self) -> Result<CommandDescriptor>;

    fn is_volatile(&self) -> bool {
        self.base().is_volatile
    }

    /// Access to the request side of commands whose effect is decided by the
    /// server.
    fn as_request_mut(&mut self) -> Option<&mut dyn RequestCommand> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// One pass over a command: the three entry points of the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Execute,
    Undo,
    Redo,
}

impl Pass {
    pub fn apply<C>(self, command: &mut C, graph: &mut Graph) -> Result<()>
    where
        C: Command + ?Sized,
    {
        match self {
            Pass::Execute => command.execute(graph),
            Pass::Undo => command.undo(graph),
            Pass::Redo => command.redo(graph),
        }
    }

    /// The pass that reverses this one.
    pub fn inverse(self) -> Pass {
        match self {
            Pass::Execute | Pass::Redo => Pass::Undo,
            Pass::Undo => Pass::Redo,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Pass::Execute => "execute",
            Pass::Undo => "undo",
            Pass::Redo => "redo",
        }
    }

    pub fn after<C>(self, command: &C, graph: &Graph, viewer: &mut dyn Viewer)
    where
        C: Command + ?Sized,
    {
        match self {
            Pass::Execute => command.do_after_execute(graph, viewer),
            Pass::Undo => command.do_after_undo(graph, viewer),
            Pass::Redo => command.do_after_redo(graph, viewer),
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
