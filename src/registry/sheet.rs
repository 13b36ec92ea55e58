use super::generic::boxed;
use super::{CommandRegistry, FactoryContext, create_all};
use crate::command::compound::CompoundFields;
use crate::command::{
    Command, CommandKind, CompoundCommand, DeleteCellsCommand, SetCellCommand, SetCellsCommand,
};
use crate::core::Result;
use crate::wire::CommandDescriptor;

/// Cell commands and compound wrappers.
///
/// Children of a compound go back through the whole chain, so a compound can
/// hold any kind of command.
pub struct SheetRegistry;

impl SheetRegistry {
    fn create_compound(
        descriptor: &CommandDescriptor,
        ctx: FactoryContext<'_>,
    ) -> Result<Option<CompoundCommand>> {
        let fields: CompoundFields = descriptor.fields_as()?;
        let children = create_all(&descriptor.name, &fields.commands, |child| {
            ctx.factory.create_from_object(child, ctx.graph)
        })?;
        Ok(children.map(|commands| {
            CompoundCommand::from_parts(
                descriptor.base(),
                commands,
                fields.reverse_undo,
                fields.force_refresh,
            )
        }))
    }
}

impl CommandRegistry for SheetRegistry {
    fn name(&self) -> &'static str {
        "sheet"
    }

    fn handles(&self, kind: CommandKind) -> bool {
        matches!(
            kind,
            CommandKind::SetCell
                | CommandKind::SetCells
                | CommandKind::DeleteCells
                | CommandKind::Compound
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
            CommandKind::SetCell => boxed(SetCellCommand::create_from_object(descriptor, graph)?),
            CommandKind::SetCells => boxed(SetCellsCommand::create_from_object(descriptor, graph)?),
            CommandKind::DeleteCells => {
                boxed(DeleteCellsCommand::create_from_object(descriptor, graph)?)
            }
            CommandKind::Compound => boxed(Self::create_compound(descriptor, ctx)?),
            _ => None,
        })
    }
}
