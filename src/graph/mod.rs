// ============================================================================
// Document Graph
// ============================================================================
//
// Root registry of addressable items. Everything a command touches is
// reachable from here by `ItemId`; commands never keep references into it.
//
// ============================================================================

pub mod cells;
pub mod notify;
pub mod selection;

pub use cells::{Cell, CellSnapshot, DataProvider};
pub use notify::{ChangeEvent, ChangeNotifier, SuppressedRefresh};
pub use selection::{NullViewer, SelectionModel, Viewer};

use crate::core::{CommandError, ItemId, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};

/// Which end of an edge a port link refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeEnd {
    Source,
    Target,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemKind {
    Node,
    Port {
        owner: ItemId,
    },
    Edge {
        #[serde(default)]
        source: Option<ItemId>,
        #[serde(default)]
        target: Option<ItemId>,
    },
    Sheet {
        #[serde(default)]
        cells: DataProvider,
    },
}

impl ItemKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ItemKind::Node => "node",
            ItemKind::Port { .. } => "port",
            ItemKind::Edge { .. } => "edge",
            ItemKind::Sheet { .. } => "sheet",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub kind: ItemKind,
    #[serde(default)]
    pub attributes: BTreeMap<String, JsonValue>,
}

impl Item {
    pub fn new(id: ItemId, kind: ItemKind) -> Self {
        Self {
            id,
            kind,
            attributes: BTreeMap::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&JsonValue> {
        self.attributes.get(name)
    }
}

#[derive(Debug)]
pub struct Graph {
    items: HashMap<ItemId, Item>,
    next_id: u64,
    notifier: ChangeNotifier,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
            next_id: 1,
            notifier: ChangeNotifier::new(),
        }
    }

    pub fn get_item_by_id(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn item(&self, id: ItemId) -> Result<&Item> {
        self.items.get(&id).ok_or(CommandError::ItemNotFound(id))
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    /// Structural copy of all items, ordered by id. Used to compare document
    /// states.
    pub fn snapshot(&self) -> BTreeMap<ItemId, Item> {
        self.items.iter().map(|(id, item)| (*id, item.clone())).collect()
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut ChangeNotifier {
        &mut self.notifier
    }

    pub fn notify_changed(&mut self, id: ItemId) {
        self.notifier.notify(id);
    }

    pub fn allocate_id(&mut self) -> ItemId {
        let id = ItemId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn add_item(&mut self, kind: ItemKind) -> ItemId {
        let id = self.allocate_id();
        self.items.insert(id, Item::new(id, kind));
        self.notify_changed(id);
        id
    }

    pub fn add_node(&mut self) -> ItemId {
        self.add_item(ItemKind::Node)
    }

    pub fn add_sheet(&mut self) -> ItemId {
        self.add_item(ItemKind::Sheet {
            cells: DataProvider::new(),
        })
    }

    pub fn add_port(&mut self, owner: ItemId) -> Result<ItemId> {
        self.item(owner)?;
        Ok(self.add_item(ItemKind::Port { owner }))
    }

    pub fn add_edge(&mut self, source: Option<ItemId>, target: Option<ItemId>) -> Result<ItemId> {
        for port in source.iter().chain(target.iter()) {
            self.expect_port(*port)?;
        }
        Ok(self.add_item(ItemKind::Edge { source, target }))
    }

    /// Inserts an item under its own id. Fails if the id is taken.
    pub fn insert_item(&mut self, item: Item) -> Result<()> {
        if self.items.contains_key(&item.id) {
            return Err(CommandError::InvalidState(format!(
                "item {} already exists",
                item.id
            )));
        }
        let id = item.id;
        self.next_id = self.next_id.max(id.0 + 1);
        self.items.insert(id, item);
        self.notify_changed(id);
        Ok(())
    }

    pub fn remove_item(&mut self, id: ItemId) -> Result<Item> {
        let item = self.items.remove(&id).ok_or(CommandError::ItemNotFound(id))?;
        self.notify_changed(id);
        Ok(item)
    }

    /// Sets (`Some`) or clears (`None`) an attribute and returns the previous
    /// value.
    pub fn set_attribute(
        &mut self,
        id: ItemId,
        name: &str,
        value: Option<JsonValue>,
    ) -> Result<Option<JsonValue>> {
        let item = self.items.get_mut(&id).ok_or(CommandError::ItemNotFound(id))?;
        let previous = match value {
            Some(value) => item.attributes.insert(name.to_string(), value),
            None => item.attributes.remove(name),
        };
        self.notify_changed(id);
        Ok(previous)
    }

    pub fn edge_end(&self, edge: ItemId, end: EdgeEnd) -> Result<Option<ItemId>> {
        match &self.item(edge)?.kind {
            ItemKind::Edge { source, target } => Ok(match end {
                EdgeEnd::Source => *source,
                EdgeEnd::Target => *target,
            }),
            other => Err(CommandError::InvalidState(format!(
                "item {} is a {}, not an edge",
                edge,
                other.type_name()
            ))),
        }
    }

    /// Links an edge end to a port (or unlinks with `None`) and returns the
    /// previously linked port.
    pub fn set_edge_end(
        &mut self,
        edge: ItemId,
        end: EdgeEnd,
        port: Option<ItemId>,
    ) -> Result<Option<ItemId>> {
        if let Some(port) = port {
            self.expect_port(port)?;
        }
        let item = self.items.get_mut(&edge).ok_or(CommandError::ItemNotFound(edge))?;
        let slot = match &mut item.kind {
            ItemKind::Edge { source, target } => match end {
                EdgeEnd::Source => source,
                EdgeEnd::Target => target,
            },
            other => {
                return Err(CommandError::InvalidState(format!(
                    "item {} is a {}, not an edge",
                    edge,
                    other.type_name()
                )));
            }
        };
        let previous = std::mem::replace(slot, port);
        self.notify_changed(edge);
        Ok(previous)
    }

    /// Edges with at least one end linked to `port`, ordered by id.
    pub fn edges_at(&self, port: ItemId) -> Vec<ItemId> {
        let mut edges: Vec<ItemId> = self
            .items
            .values()
            .filter(|item| match item.kind {
                ItemKind::Edge { source, target } => {
                    source == Some(port) || target == Some(port)
                }
                _ => false,
            })
            .map(|item| item.id)
            .collect();
        edges.sort();
        edges
    }

    /// Ports owned by `owner`, ordered by id.
    pub fn ports_of(&self, owner: ItemId) -> Vec<ItemId> {
        let mut ports: Vec<ItemId> = self
            .items
            .values()
            .filter(|item| matches!(item.kind, ItemKind::Port { owner: o } if o == owner))
            .map(|item| item.id)
            .collect();
        ports.sort();
        ports
    }

    pub fn sheet(&self, id: ItemId) -> Result<&DataProvider> {
        match &self.item(id)?.kind {
            ItemKind::Sheet { cells } => Ok(cells),
            other => Err(CommandError::InvalidState(format!(
                "item {} is a {}, not a sheet",
                id,
                other.type_name()
            ))),
        }
    }

    /// Runs `f` against the sheet's cells and reports one change for it.
    pub fn update_sheet<R>(
        &mut self,
        id: ItemId,
        f: impl FnOnce(&mut DataProvider) -> R,
    ) -> Result<R> {
        let item = self.items.get_mut(&id).ok_or(CommandError::ItemNotFound(id))?;
        let result = match &mut item.kind {
            ItemKind::Sheet { cells } => f(cells),
            other => {
                return Err(CommandError::InvalidState(format!(
                    "item {} is a {}, not a sheet",
                    id,
                    other.type_name()
                )));
            }
        };
        self.notify_changed(id);
        Ok(result)
    }

    fn expect_port(&self, id: ItemId) -> Result<()> {
        match &self.item(id)?.kind {
            ItemKind::Port { .. } => Ok(()),
            other => Err(CommandError::InvalidState(format!(
                "item {} is a {}, not a port",
                id,
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_edge_linking() {
        let mut graph = Graph::new();
        let node = graph.add_node();
        let port = graph.add_port(node).unwrap();
        let edge = graph.add_edge(Some(port), None).unwrap();

        assert_eq!(graph.edges_at(port), vec![edge]);
        let previous = graph.set_edge_end(edge, EdgeEnd::Source, None).unwrap();
        assert_eq!(previous, Some(port));
        assert!(graph.edges_at(port).is_empty());
    }

    #[test]
    fn test_set_edge_end_rejects_non_ports() {
        let mut graph = Graph::new();
        let node = graph.add_node();
        let edge = graph.add_edge(None, None).unwrap();
        assert!(graph.set_edge_end(edge, EdgeEnd::Target, Some(node)).is_err());
        assert!(graph.set_edge_end(node, EdgeEnd::Target, None).is_err());
    }

    #[test]
    fn test_insert_item_keeps_ids_unique() {
        let mut graph = Graph::new();
        let item = Item::new(ItemId(10), ItemKind::Node);
        graph.insert_item(item.clone()).unwrap();
        assert!(graph.insert_item(item).is_err());
        assert_eq!(graph.add_node(), ItemId(11));
    }

    #[test]
    fn test_item_serde_shape() {
        let mut item = Item::new(ItemId(4), ItemKind::Port { owner: ItemId(2) });
        item.attributes.insert("name".into(), json!("in"));
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(
            value,
            json!({"id": 4, "kind": {"type": "port", "owner": 2}, "attributes": {"name": "in"}})
        );
        let back: Item = serde_json::from_value(value).unwrap();
        assert_eq!(back, item);
    }
}
