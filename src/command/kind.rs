use std::fmt;

/// Closed set of command kinds known on the wire.
///
/// The wire name is the only thing a descriptor carries to select its
/// reconstruction path, so each kind maps to exactly one name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    AddItem,
    DeleteItem,
    SetAttribute,
    AttachEdge,
    DetachEdge,
    DeletePort,
    SetCell,
    SetCells,
    DeleteCells,
    Compound,
    ServerSetCells,
    ServerDeleteCells,
    ServerCompound,
}

impl CommandKind {
    pub const ALL: [CommandKind; 13] = [
        CommandKind::AddItem,
        CommandKind::DeleteItem,
        CommandKind::SetAttribute,
        CommandKind::AttachEdge,
        CommandKind::DetachEdge,
        CommandKind::DeletePort,
        CommandKind::SetCell,
        CommandKind::SetCells,
        CommandKind::DeleteCells,
        CommandKind::Compound,
        CommandKind::ServerSetCells,
        CommandKind::ServerDeleteCells,
        CommandKind::ServerCompound,
    ];

    pub fn wire_name(&self) -> &'static str {
        match self {
            CommandKind::AddItem => "command.AddItemCommand",
            CommandKind::DeleteItem => "command.DeleteItemCommand",
            CommandKind::SetAttribute => "command.SetAttributeCommand",
            CommandKind::AttachEdge => "command.AttachEdgeCommand",
            CommandKind::DetachEdge => "command.DetachEdgeCommand",
            CommandKind::DeletePort => "command.DeletePortCommand",
            CommandKind::SetCell => "command.SetCellCommand",
            CommandKind::SetCells => "command.SetCellsCommand",
            CommandKind::DeleteCells => "command.DeleteCellsCommand",
            CommandKind::Compound => "command.CompoundCommand",
            CommandKind::ServerSetCells => "command.server.SetCellsCommand",
            CommandKind::ServerDeleteCells => "command.server.DeleteCellsCommand",
            CommandKind::ServerCompound => "command.server.CompoundCommand",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.wire_name() == name)
    }

    pub fn is_server(&self) -> bool {
        matches!(
            self,
            CommandKind::ServerSetCells
                | CommandKind::ServerDeleteCells
                | CommandKind::ServerCompound
        )
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}
