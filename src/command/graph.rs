// ============================================================================
// Graph Item Commands
// ============================================================================
//
// Commands bound to one node, port, edge or sheet item of the graph.
// Reconstruction resolves the bound id against the receiving graph; an id
// that is not there yields an absent command instead of an error.
//
// ============================================================================

use super::{Command, CommandBase, CommandKind, ItemBinding, command_any};
use crate::core::{CommandError, ItemId, Result};
use crate::graph::{EdgeEnd, Graph, Item, ItemKind, Viewer};
use crate::wire::CommandDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Edge end that pointed at a removed port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeLink {
    pub edge: ItemId,
    pub end: EdgeEnd,
    pub port: ItemId,
}

/// Everything a removal took out of the graph, in insertion order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RemovedItems {
    pub items: Vec<Item>,
    #[serde(default)]
    pub links: Vec<EdgeLink>,
}

impl RemovedItems {
    /// Removes `id` (and the ports of a node), unlinking every edge end that
    /// pointed at a removed port.
    pub fn collect_and_remove(graph: &mut Graph, id: ItemId) -> Result<Self> {
        let root = graph.item(id)?.clone();
        let mut items = vec![root];
        if matches!(items[0].kind, ItemKind::Node) {
            for port in graph.ports_of(id) {
                items.push(graph.item(port)?.clone());
            }
        }

        let mut links = Vec::new();
        for item in items.iter().filter(|i| matches!(i.kind, ItemKind::Port { .. })) {
            for edge in graph.edges_at(item.id) {
                for end in [EdgeEnd::Source, EdgeEnd::Target] {
                    if graph.edge_end(edge, end)? == Some(item.id) {
                        links.push(EdgeLink {
                            edge,
                            end,
                            port: item.id,
                        });
                    }
                }
            }
        }

        let removed = Self { items, links };
        removed.remove(graph)?;
        Ok(removed)
    }

    pub fn remove(&self, graph: &mut Graph) -> Result<()> {
        for link in &self.links {
            graph.set_edge_end(link.edge, link.end, None)?;
        }
        for item in self.items.iter().rev() {
            graph.remove_item(item.id)?;
        }
        Ok(())
    }

    pub fn restore(&self, graph: &mut Graph) -> Result<()> {
        for item in &self.items {
            graph.insert_item(item.clone())?;
        }
        for link in &self.links {
            graph.set_edge_end(link.edge, link.end, Some(link.port))?;
        }
        Ok(())
    }
}

fn not_executed(kind: CommandKind) -> CommandError {
    CommandError::InvalidState(format!("{} has not been executed", kind))
}

// ----------------------------------------------------------------------------
// AddItemCommand
// ----------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct AddItemFields {
    item: Item,
}

/// Inserts a prepared item. The id is allocated at construction so undo,
/// redo and the wire form all refer to the same item.
#[derive(Debug)]
pub struct AddItemCommand {
    base: CommandBase,
    item: Item,
}

impl AddItemCommand {
    pub fn new(graph: &mut Graph, kind: ItemKind) -> Self {
        let id = graph.allocate_id();
        Self::from_item(Item::new(id, kind))
    }

    pub fn from_item(item: Item) -> Self {
        Self {
            base: CommandBase::default(),
            item,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.item.attributes.insert(name.into(), value);
        self
    }

    pub fn item_id(&self) -> ItemId {
        self.item.id
    }

    pub fn create_from_object(descriptor: &CommandDescriptor, _graph: &Graph) -> Result<Option<Self>> {
        let fields: AddItemFields = descriptor.fields_as()?;
        Ok(Some(Self {
            base: descriptor.base(),
            item: fields.item,
        }))
    }
}

impl Command for AddItemCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::AddItem
    }

    fn base(&self) -> &CommandBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CommandBase {
        &mut self.base
    }

    fn item(&self) -> Option<ItemId> {
        Some(self.item.id)
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<()> {
        graph.insert_item(self.item.clone())
    }

    fn undo(&mut self, graph: &mut Graph) -> Result<()> {
        graph.remove_item(self.item.id).map(|_| ())
    }

    fn redo(&mut self, graph: &mut Graph) -> Result<()> {
        graph.insert_item(self.item.clone())
    }

    fn do_after_execute(&self, graph: &Graph, viewer: &mut dyn Viewer) {
        ItemBinding::new(self.item.id).reselect(graph, viewer);
    }

    fn do_after_redo(&self, graph: &Graph, viewer: &mut dyn Viewer) {
        ItemBinding::new(self.item.id).reselect(graph, viewer);
    }

    fn to_object(&self) -> Result<CommandDescriptor> {
        CommandDescriptor::new(self.kind(), &self.base)
            .with_item(self.item.id)
            .with_fields(&AddItemFields {
                item: self.item.clone(),
            })
    }

    command_any!();
}

// ----------------------------------------------------------------------------
// DeleteItemCommand
// ----------------------------------------------------------------------------

#[derive(Debug)]
pub struct DeleteItemCommand {
    base: CommandBase,
    binding: ItemBinding,
    removed: Option<RemovedItems>,
}

impl DeleteItemCommand {
    pub fn new(item: ItemId) -> Self {
        Self {
            base: CommandBase::default(),
            binding: ItemBinding::new(item),
            removed: None,
        }
    }

    pub fn removed(&self) -> Option<&RemovedItems> {
        self.removed.as_ref()
    }

    /// Executed descriptors carry the removed items themselves, so only
    /// never-executed ones need the item to be present.
    pub fn create_from_object(descriptor: &CommandDescriptor, graph: &Graph) -> Result<Option<Self>> {
        let item = descriptor.require_item()?;
        let removed: Option<RemovedItems> = descriptor.undo_as()?;
        if removed.is_none() && !graph.contains(item) {
            return Ok(None);
        }
        Ok(Some(Self {
            base: descriptor.base(),
            binding: ItemBinding::new(item),
            removed,
        }))
    }
}

impl Command for DeleteItemCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::DeleteItem
    }

    fn base(&self) -> &CommandBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CommandBase {
        &mut self.base
    }

    fn item(&self) -> Option<ItemId> {
        Some(self.binding.id())
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<()> {
        self.removed = Some(RemovedItems::collect_and_remove(graph, self.binding.id())?);
        Ok(())
    }

    fn undo(&mut self, graph: &mut Graph) -> Result<()> {
        self.removed
            .as_ref()
            .ok_or_else(|| not_executed(self.kind()))?
            .restore(graph)
    }

    fn redo(&mut self, graph: &mut Graph) -> Result<()> {
        self.removed
            .as_ref()
            .ok_or_else(|| not_executed(self.kind()))?
            .remove(graph)
    }

    fn do_after_undo(&self, graph: &Graph, viewer: &mut dyn Viewer) {
        self.binding.reselect(graph, viewer);
    }

    fn to_object(&self) -> Result<CommandDescriptor> {
        let descriptor =
            CommandDescriptor::new(self.kind(), &self.base).with_item(self.binding.id());
        match &self.removed {
            Some(removed) => descriptor.with_undo(removed),
            None => Ok(descriptor),
        }
    }

    command_any!();
}

// ----------------------------------------------------------------------------
// SetAttributeCommand
// ----------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct AttributeFields {
    attribute: String,
    #[serde(default)]
    value: Option<JsonValue>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AttributeUndo {
    #[serde(default)]
    previous: Option<JsonValue>,
}

#[derive(Debug)]
pub struct SetAttributeCommand {
    base: CommandBase,
    binding: ItemBinding,
    attribute: String,
    value: Option<JsonValue>,
    previous: Option<Option<JsonValue>>,
}

impl SetAttributeCommand {
    /// `value == None` removes the attribute.
    pub fn new(item: ItemId, attribute: impl Into<String>, value: Option<JsonValue>) -> Self {
        Self {
            base: CommandBase::default(),
            binding: ItemBinding::new(item),
            attribute: attribute.into(),
            value,
            previous: None,
        }
    }

    pub fn create_from_object(descriptor: &CommandDescriptor, graph: &Graph) -> Result<Option<Self>> {
        let Some(binding) = ItemBinding::resolve(graph, descriptor.require_item()?) else {
            return Ok(None);
        };
        let fields: AttributeFields = descriptor.fields_as()?;
        let undo: Option<AttributeUndo> = descriptor.undo_as()?;
        Ok(Some(Self {
            base: descriptor.base(),
            binding,
            attribute: fields.attribute,
            value: fields.value,
            previous: undo.map(|u| u.previous),
        }))
    }
}

impl Command for SetAttributeCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::SetAttribute
    }

    fn base(&self) -> &CommandBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CommandBase {
        &mut self.base
    }

    fn item(&self) -> Option<ItemId> {
        Some(self.binding.id())
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<()> {
        let previous = graph.set_attribute(self.binding.id(), &self.attribute, self.value.clone())?;
        self.previous = Some(previous);
        Ok(())
    }

    fn undo(&mut self, graph: &mut Graph) -> Result<()> {
        let previous = self.previous.clone().ok_or_else(|| not_executed(self.kind()))?;
        graph.set_attribute(self.binding.id(), &self.attribute, previous)?;
        Ok(())
    }

    fn redo(&mut self, graph: &mut Graph) -> Result<()> {
        graph.set_attribute(self.binding.id(), &self.attribute, self.value.clone())?;
        Ok(())
    }

    fn do_after_undo(&self, graph: &Graph, viewer: &mut dyn Viewer) {
        self.binding.reselect(graph, viewer);
    }

    fn do_after_redo(&self, graph: &Graph, viewer: &mut dyn Viewer) {
        self.binding.reselect(graph, viewer);
    }

    fn to_object(&self) -> Result<CommandDescriptor> {
        let descriptor = CommandDescriptor::new(self.kind(), &self.base)
            .with_item(self.binding.id())
            .with_fields(&AttributeFields {
                attribute: self.attribute.clone(),
                value: self.value.clone(),
            })?;
        match &self.previous {
            Some(previous) => descriptor.with_undo(&AttributeUndo {
                previous: previous.clone(),
            }),
            None => Ok(descriptor),
        }
    }

    command_any!();
}

// ----------------------------------------------------------------------------
// AttachEdgeCommand / DetachEdgeCommand
// ----------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct AttachFields {
    end: EdgeEnd,
    port: ItemId,
}

#[derive(Debug, Serialize, Deserialize)]
struct EdgeEndFields {
    end: EdgeEnd,
}

#[derive(Debug, Serialize, Deserialize)]
struct EdgeEndUndo {
    #[serde(default)]
    port: Option<ItemId>,
}

#[derive(Debug)]
pub struct AttachEdgeCommand {
    base: CommandBase,
    binding: ItemBinding,
    end: EdgeEnd,
    port: ItemId,
    previous: Option<Option<ItemId>>,
}

impl AttachEdgeCommand {
    pub fn new(edge: ItemId, end: EdgeEnd, port: ItemId) -> Self {
        Self {
            base: CommandBase::default(),
            binding: ItemBinding::new(edge),
            end,
            port,
            previous: None,
        }
    }

    pub fn create_from_object(descriptor: &CommandDescriptor, graph: &Graph) -> Result<Option<Self>> {
        let Some(binding) = ItemBinding::resolve(graph, descriptor.require_item()?) else {
            return Ok(None);
        };
        let fields: AttachFields = descriptor.fields_as()?;
        if !graph.contains(fields.port) {
            return Ok(None);
        }
        let undo: Option<EdgeEndUndo> = descriptor.undo_as()?;
        Ok(Some(Self {
            base: descriptor.base(),
            binding,
            end: fields.end,
            port: fields.port,
            previous: undo.map(|u| u.port),
        }))
    }
}

impl Command for AttachEdgeCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::AttachEdge
    }

    fn base(&self) -> &CommandBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CommandBase {
        &mut self.base
    }

    fn item(&self) -> Option<ItemId> {
        Some(self.binding.id())
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<()> {
        let previous = graph.set_edge_end(self.binding.id(), self.end, Some(self.port))?;
        self.previous = Some(previous);
        Ok(())
    }

    fn undo(&mut self, graph: &mut Graph) -> Result<()> {
        let previous = self.previous.ok_or_else(|| not_executed(self.kind()))?;
        graph.set_edge_end(self.binding.id(), self.end, previous)?;
        Ok(())
    }

    fn redo(&mut self, graph: &mut Graph) -> Result<()> {
        graph.set_edge_end(self.binding.id(), self.end, Some(self.port))?;
        Ok(())
    }

    fn do_after_undo(&self, graph: &Graph, viewer: &mut dyn Viewer) {
        self.binding.reselect(graph, viewer);
    }

    fn do_after_redo(&self, graph: &Graph, viewer: &mut dyn Viewer) {
        self.binding.reselect(graph, viewer);
    }

    fn to_object(&self) -> Result<CommandDescriptor> {
        let descriptor = CommandDescriptor::new(self.kind(), &self.base)
            .with_item(self.binding.id())
            .with_fields(&AttachFields {
                end: self.end,
                port: self.port,
            })?;
        match self.previous {
            Some(port) => descriptor.with_undo(&EdgeEndUndo { port }),
            None => Ok(descriptor),
        }
    }

    command_any!();
}

#[derive(Debug)]
pub struct DetachEdgeCommand {
    base: CommandBase,
    binding: ItemBinding,
    end: EdgeEnd,
    detached: Option<Option<ItemId>>,
}

impl DetachEdgeCommand {
    pub fn new(edge: ItemId, end: EdgeEnd) -> Self {
        Self {
            base: CommandBase::default(),
            binding: ItemBinding::new(edge),
            end,
            detached: None,
        }
    }

    pub fn edge(&self) -> ItemId {
        self.binding.id()
    }

    /// Port the edge end was linked to before execute; `None` before execute
    /// or when the end was already free.
    pub fn detached_port(&self) -> Option<ItemId> {
        self.detached.flatten()
    }

    pub fn create_from_object(descriptor: &CommandDescriptor, graph: &Graph) -> Result<Option<Self>> {
        let Some(binding) = ItemBinding::resolve(graph, descriptor.require_item()?) else {
            return Ok(None);
        };
        let fields: EdgeEndFields = descriptor.fields_as()?;
        let undo: Option<EdgeEndUndo> = descriptor.undo_as()?;
        Ok(Some(Self {
            base: descriptor.base(),
            binding,
            end: fields.end,
            detached: undo.map(|u| u.port),
        }))
    }
}

impl Command for DetachEdgeCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::DetachEdge
    }

    fn base(&self) -> &CommandBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CommandBase {
        &mut self.base
    }

    fn item(&self) -> Option<ItemId> {
        Some(self.binding.id())
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<()> {
        let previous = graph.set_edge_end(self.binding.id(), self.end, None)?;
        self.detached = Some(previous);
        Ok(())
    }

    fn undo(&mut self, graph: &mut Graph) -> Result<()> {
        let port = self.detached.ok_or_else(|| not_executed(self.kind()))?;
        graph.set_edge_end(self.binding.id(), self.end, port)?;
        Ok(())
    }

    fn redo(&mut self, graph: &mut Graph) -> Result<()> {
        graph.set_edge_end(self.binding.id(), self.end, None)?;
        Ok(())
    }

    fn do_after_undo(&self, graph: &Graph, viewer: &mut dyn Viewer) {
        self.binding.reselect(graph, viewer);
    }

    fn do_after_redo(&self, graph: &Graph, viewer: &mut dyn Viewer) {
        self.binding.reselect(graph, viewer);
    }

    fn to_object(&self) -> Result<CommandDescriptor> {
        let descriptor = CommandDescriptor::new(self.kind(), &self.base)
            .with_item(self.binding.id())
            .with_fields(&EdgeEndFields { end: self.end })?;
        match self.detached {
            Some(port) => descriptor.with_undo(&EdgeEndUndo { port }),
            None => Ok(descriptor),
        }
    }

    command_any!();
}

// ----------------------------------------------------------------------------
// DeletePortCommand
// ----------------------------------------------------------------------------

/// Deletes a port, unlinking the edges that still point at it.
///
/// The port may be left unbound at construction and bound later by the
/// batch it runs in; an unbound port at execute time makes the command a
/// no-op.
#[derive(Debug, Default)]
pub struct DeletePortCommand {
    base: CommandBase,
    port: Option<ItemId>,
    removed: Option<RemovedItems>,
}

impl DeletePortCommand {
    pub fn new(port: ItemId) -> Self {
        Self {
            port: Some(port),
            ..Self::default()
        }
    }

    pub fn unbound() -> Self {
        Self::default()
    }

    pub fn port(&self) -> Option<ItemId> {
        self.port
    }

    pub fn bind_port(&mut self, port: ItemId) {
        self.port = Some(port);
    }

    pub fn create_from_object(descriptor: &CommandDescriptor, graph: &Graph) -> Result<Option<Self>> {
        let removed: Option<RemovedItems> = descriptor.undo_as()?;
        if let Some(port) = descriptor.item_id {
            if removed.is_none() && !graph.contains(port) {
                return Ok(None);
            }
        }
        Ok(Some(Self {
            base: descriptor.base(),
            port: descriptor.item_id,
            removed,
        }))
    }
}

impl Command for DeletePortCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::DeletePort
    }

    fn base(&self) -> &CommandBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CommandBase {
        &mut self.base
    }

    fn item(&self) -> Option<ItemId> {
        self.port
    }

    fn execute(&mut self, graph: &mut Graph) -> Result<()> {
        let Some(port) = self.port else {
            return Ok(());
        };
        if !matches!(graph.item(port)?.kind, ItemKind::Port { .. }) {
            return Err(CommandError::InvalidState(format!("item {} is not a port", port)));
        }
        self.removed = Some(RemovedItems::collect_and_remove(graph, port)?);
        Ok(())
    }

    fn undo(&mut self, graph: &mut Graph) -> Result<()> {
        match &self.removed {
            Some(removed) => removed.restore(graph),
            None => Ok(()),
        }
    }

    fn redo(&mut self, graph: &mut Graph) -> Result<()> {
        match &self.removed {
            Some(removed) => removed.remove(graph),
            None => Ok(()),
        }
    }

    fn to_object(&self) -> Result<CommandDescriptor> {
        let mut descriptor = CommandDescriptor::new(self.kind(), &self.base);
        if let Some(port) = self.port {
            descriptor = descriptor.with_item(port);
        }
        match &self.removed {
            Some(removed) => descriptor.with_undo(removed),
            None => Ok(descriptor),
        }
    }

    command_any!();
}
