use super::{CommandRegistry, FactoryContext, create_all};
use crate::command::{Command, CommandKind};
use crate::core::{CellRef, CommandError, ItemId, Result};
use crate::graph::{CellSnapshot, Graph};
use crate::request::compound::CompoundRequestFields;
use crate::request::{
    CompoundRequestCommand, DeleteCellsRequestCommand, RequestCommand, SetCellsRequestCommand,
};
use crate::wire::CommandDescriptor;
use serde::Deserialize;
use serde_json::Value as JsonValue;

/// Concrete request command, before it is boxed as either trait object.
enum ServerCommand {
    SetCells(SetCellsRequestCommand),
    DeleteCells(DeleteCellsRequestCommand),
    Compound(CompoundRequestCommand),
}

impl ServerCommand {
    fn into_command(self) -> Box<dyn Command> {
        match self {
            ServerCommand::SetCells(c) => Box::new(c),
            ServerCommand::DeleteCells(c) => Box::new(c),
            ServerCommand::Compound(c) => Box::new(c),
        }
    }

    fn into_request(self) -> Box<dyn RequestCommand> {
        match self {
            ServerCommand::SetCells(c) => Box::new(c),
            ServerCommand::DeleteCells(c) => Box::new(c),
            ServerCommand::Compound(c) => Box::new(c),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetCellsArgs {
    streamsheet_id: ItemId,
    cells: Vec<CellSnapshot>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteCellsArgs {
    streamsheet_id: ItemId,
    references: Vec<CellRef>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompoundArgs {
    streamsheet_id: ItemId,
    commands: Vec<NamedArgs>,
}

#[derive(Deserialize)]
struct NamedArgs {
    name: String,
    #[serde(flatten)]
    args: serde_json::Map<String, JsonValue>,
}

fn parse_args<T: serde::de::DeserializeOwned>(kind: CommandKind, args: &JsonValue) -> Result<T> {
    serde_json::from_value(args.clone()).map_err(|err| CommandError::malformed(kind.wire_name(), err))
}

/// `command.server.*` request commands.
pub struct ServerRegistry;

impl ServerRegistry {
    /// Builds a request command from in-memory arguments.
    ///
    /// `args` always carries `streamsheetId`; the rest depends on the kind:
    /// `cells`, `references`, or `commands` (each `{ name, ..args }`).
    pub fn create(kind: CommandKind, args: &JsonValue) -> Result<Box<dyn RequestCommand>> {
        Self::create_command(kind, args).map(ServerCommand::into_request)
    }

    fn create_command(kind: CommandKind, args: &JsonValue) -> Result<ServerCommand> {
        match kind {
            CommandKind::ServerSetCells => {
                let args: SetCellsArgs = parse_args(kind, args)?;
                Ok(ServerCommand::SetCells(SetCellsRequestCommand::new(
                    args.streamsheet_id,
                    args.cells,
                )))
            }
            CommandKind::ServerDeleteCells => {
                let args: DeleteCellsArgs = parse_args(kind, args)?;
                Ok(ServerCommand::DeleteCells(DeleteCellsRequestCommand::new(
                    args.streamsheet_id,
                    args.references,
                )))
            }
            CommandKind::ServerCompound => {
                let args: CompoundArgs = parse_args(kind, args)?;
                let mut compound = CompoundRequestCommand::new(args.streamsheet_id);
                for child in args.commands {
                    let child_kind = server_kind(&child.name)?;
                    let mut child_args = child.args;
                    child_args
                        .entry("streamsheetId")
                        .or_insert_with(|| serde_json::json!(args.streamsheet_id));
                    compound.push(Self::create(child_kind, &JsonValue::Object(child_args))?);
                }
                Ok(ServerCommand::Compound(compound))
            }
            other => Err(CommandError::UnknownCommand(other.wire_name().to_string())),
        }
    }

    fn create_request_from_object(
        kind: CommandKind,
        descriptor: &CommandDescriptor,
        graph: &Graph,
    ) -> Result<Option<ServerCommand>> {
        match kind {
            CommandKind::ServerSetCells => Ok(SetCellsRequestCommand::create_from_object(descriptor, graph)?
                .map(ServerCommand::SetCells)),
            CommandKind::ServerDeleteCells => Ok(DeleteCellsRequestCommand::create_from_object(
                descriptor, graph,
            )?
            .map(ServerCommand::DeleteCells)),
            CommandKind::ServerCompound => {
                let sheet = descriptor.require_item()?;
                if !graph.contains(sheet) {
                    return Ok(None);
                }
                let fields: CompoundRequestFields = descriptor.fields_as()?;
                let children = create_all(&descriptor.name, &fields.commands, |child| {
                    let child_kind = server_kind(&child.name)?;
                    Ok(Self::create_request_from_object(child_kind, child, graph)?
                        .map(ServerCommand::into_request))
                })?;
                Ok(children.map(|children| {
                    ServerCommand::Compound(CompoundRequestCommand::from_parts(
                        descriptor.base(),
                        sheet,
                        children,
                    ))
                }))
            }
            other => Err(CommandError::UnknownCommand(other.wire_name().to_string())),
        }
    }
}

/// Children of a server compound must themselves be server commands.
fn server_kind(name: &str) -> Result<CommandKind> {
    match CommandKind::from_wire_name(name) {
        Some(kind) if kind.is_server() => Ok(kind),
        Some(_) => Err(CommandError::malformed(
            CommandKind::ServerCompound.wire_name(),
            format!("'{}' is not a server command", name),
        )),
        None => Err(CommandError::UnknownCommand(name.to_string())),
    }
}

impl CommandRegistry for ServerRegistry {
    fn name(&self) -> &'static str {
        "server"
    }

    fn handles(&self, kind: CommandKind) -> bool {
        kind.is_server()
    }

    fn create_from_object(
        &self,
        kind: CommandKind,
        descriptor: &CommandDescriptor,
        ctx: FactoryContext<'_>,
    ) -> Result<Option<Box<dyn Command>>> {
        Ok(Self::create_request_from_object(kind, descriptor, ctx.graph)?
            .map(ServerCommand::into_command))
    }
}
