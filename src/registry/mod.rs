// ============================================================================
// Command Registries
// ============================================================================
//
// Descriptor -> command reconstruction. Registries form a fallback chain,
// most specific first:
//
//   ServerRegistry  -> command.server.*
//   SheetRegistry   -> cell commands and compound wrappers
//   GenericRegistry -> graph item commands
//
// A name no registry handles is an error. A handled name whose ids do not
// resolve yields `Ok(None)` and the caller skips the entry.
//
// ============================================================================

pub mod generic;
pub mod server;
pub mod sheet;

pub use generic::GenericRegistry;
pub use server::ServerRegistry;
pub use sheet::SheetRegistry;

use crate::command::{Command, CommandKind};
use crate::core::{CommandError, Result};
use crate::graph::Graph;
use crate::request::RequestCommand;
use crate::wire::CommandDescriptor;
use serde_json::Value as JsonValue;
use tracing::{Level, event};

/// What a registry may consult while reconstructing.
///
/// `factory` is the whole chain, for registries that rebuild nested
/// descriptors.
#[derive(Clone, Copy)]
pub struct FactoryContext<'a> {
    pub graph: &'a Graph,
    pub factory: &'a CommandFactory,
}

pub trait CommandRegistry: Send + Sync {
    fn name(&self) -> &'static str;

    fn handles(&self, kind: CommandKind) -> bool;

    fn create_from_object(
        &self,
        kind: CommandKind,
        descriptor: &CommandDescriptor,
        ctx: FactoryContext<'_>,
    ) -> Result<Option<Box<dyn Command>>>;
}

pub struct CommandFactory {
    registries: Vec<Box<dyn CommandRegistry>>,
}

impl CommandFactory {
    pub fn new() -> Self {
        Self {
            registries: Vec::new(),
        }
    }

    /// Appends a registry at the end of the chain (least specific).
    pub fn register(&mut self, registry: Box<dyn CommandRegistry>) {
        event!(Level::DEBUG, registry = registry.name(), "registered command registry");
        self.registries.push(registry);
    }

    pub fn with_default_registries() -> Self {
        let mut factory = Self::new();
        factory.register(Box::new(ServerRegistry));
        factory.register(Box::new(SheetRegistry));
        factory.register(Box::new(GenericRegistry));
        factory
    }

    pub fn create_from_object(
        &self,
        descriptor: &CommandDescriptor,
        graph: &Graph,
    ) -> Result<Option<Box<dyn Command>>> {
        let kind = self.resolve_kind(&descriptor.name)?;
        let ctx = FactoryContext {
            graph,
            factory: self,
        };
        for registry in &self.registries {
            if registry.handles(kind) {
                return registry.create_from_object(kind, descriptor, ctx);
            }
        }
        Err(CommandError::UnknownCommand(descriptor.name.clone()))
    }

    /// Builds a request command from in-memory arguments instead of a
    /// descriptor.
    pub fn create_request(&self, name: &str, args: &JsonValue) -> Result<Box<dyn RequestCommand>> {
        let kind = self.resolve_kind(name)?;
        if !kind.is_server() {
            return Err(CommandError::UnknownCommand(name.to_string()));
        }
        ServerRegistry::create(kind, args)
    }

    /// Whether some registry in the chain handles `name`.
    pub fn handles(&self, name: &str) -> bool {
        CommandKind::from_wire_name(name)
            .is_some_and(|kind| self.registries.iter().any(|r| r.handles(kind)))
    }

    pub fn registry_names(&self) -> Vec<&'static str> {
        self.registries.iter().map(|r| r.name()).collect()
    }

    fn resolve_kind(&self, name: &str) -> Result<CommandKind> {
        CommandKind::from_wire_name(name).ok_or_else(|| CommandError::UnknownCommand(name.to_string()))
    }
}

impl Default for CommandFactory {
    fn default() -> Self {
        Self::with_default_registries()
    }
}

/// Rebuilds every nested descriptor or none of them.
///
/// `Ok(None)` if any child is absent; errors from any child are returned
/// as is.
pub(crate) fn create_all<T>(
    parent: &str,
    descriptors: &[CommandDescriptor],
    mut create: impl FnMut(&CommandDescriptor) -> Result<Option<T>>,
) -> Result<Option<Vec<T>>> {
    let mut children = Vec::with_capacity(descriptors.len());
    for (index, descriptor) in descriptors.iter().enumerate() {
        match create(descriptor)? {
            Some(child) => children.push(child),
            None => {
                event!(
                    Level::WARN,
                    compound = parent,
                    index = index,
                    child = %descriptor.name,
                    "sub-command could not be resolved, discarding whole compound"
                );
                return Ok(None);
            }
        }
    }
    Ok(Some(children))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandBase;

    #[test]
    fn test_default_chain_order() {
        let factory = CommandFactory::with_default_registries();
        assert_eq!(factory.registry_names(), vec!["server", "sheet", "generic"]);
    }

    #[test]
    fn test_unknown_name_is_an_error() {
        let factory = CommandFactory::with_default_registries();
        let mut descriptor = CommandDescriptor::new(CommandKind::DeleteItem, &CommandBase::default());
        descriptor.name = "command.NoSuchCommand".into();
        assert!(matches!(
            factory.create_from_object(&descriptor, &Graph::new()),
            Err(CommandError::UnknownCommand(name)) if name == "command.NoSuchCommand"
        ));
    }

    #[test]
    fn test_empty_chain_rejects_known_names() {
        let factory = CommandFactory::new();
        let descriptor = CommandDescriptor::new(CommandKind::DeleteItem, &CommandBase::default());
        assert!(matches!(
            factory.create_from_object(&descriptor, &Graph::new()),
            Err(CommandError::UnknownCommand(_))
        ));
        assert!(!factory.handles("command.DeleteItemCommand"));
    }
}
