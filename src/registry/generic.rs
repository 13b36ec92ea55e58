use super::{CommandRegistry, FactoryContext};
use crate::command::{
    AddItemCommand, AttachEdgeCommand, Command, CommandKind, DeleteItemCommand, DeletePortCommand,
    DetachEdgeCommand, SetAttributeCommand,
};
use crate::core::Result;
use crate::wire::CommandDescriptor;

pub(crate) fn boxed<C: Command + 'static>(command: Option<C>) -> Option<Box<dyn Command>> {
    command.map(|c| Box::new(c) as Box<dyn Command>)
}

/// Graph item commands.
pub struct GenericRegistry;

impl CommandRegistry for GenericRegistry {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn handles(&self, kind: CommandKind) -> bool {
        matches!(
            kind,
            CommandKind::AddItem
                | CommandKind::DeleteItem
                | CommandKind::SetAttribute
                | CommandKind::AttachEdge
                | CommandKind::DetachEdge
                | CommandKind::DeletePort
        )
    }

    fn create_from_object(
        &self,
        kind: CommandKind,
        descriptor: &CommandDescriptor,
        ctx: FactoryContext<'_>,
    ) -> Result<Option<Box<dyn Command>>> {
        let graph = ctx.graph;
        Ok(match kind {
            CommandKind::AddItem => boxed(AddItemCommand::create_from_object(descriptor, graph)?),
            CommandKind::DeleteItem => boxed(DeleteItemCommand::create_from_object(descriptor, graph)?),
            CommandKind::SetAttribute => {
                boxed(SetAttributeCommand::create_from_object(descriptor, graph)?)
            }
            CommandKind::AttachEdge => boxed(AttachEdgeCommand::create_from_object(descriptor, graph)?),
            CommandKind::DetachEdge => boxed(DetachEdgeCommand::create_from_object(descriptor, graph)?),
            CommandKind::DeletePort => boxed(DeletePortCommand::create_from_object(descriptor, graph)?),
            _ => None,
        })
    }
}
