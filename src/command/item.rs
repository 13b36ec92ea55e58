use crate::core::ItemId;
use crate::graph::{Graph, Item, Viewer};

/// Binding of a command to one addressable item.
///
/// Item commands embed it and delegate their after-undo/redo hooks to
/// [`ItemBinding::reselect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemBinding {
    item: ItemId,
}

impl ItemBinding {
    pub fn new(item: ItemId) -> Self {
        Self { item }
    }

    /// Binding for reconstruction: `None` if the id is not in the graph.
    pub fn resolve(graph: &Graph, item: ItemId) -> Option<Self> {
        graph.contains(item).then_some(Self { item })
    }

    pub fn id(&self) -> ItemId {
        self.item
    }

    pub fn get_item<'g>(&self, graph: &'g Graph) -> Option<&'g Item> {
        graph.get_item_by_id(self.item)
    }

    /// Adds the item to the selection if the viewer shows it and it is not
    /// selected yet. Never removes anything from the selection.
    pub fn reselect(&self, graph: &Graph, viewer: &mut dyn Viewer) {
        if self.get_item(graph).is_none() || !viewer.find_controller_for_item(self.item) {
            return;
        }
        let mut selection = viewer.selection();
        if !selection.contains(&self.item) {
            selection.push(self.item);
            viewer.set_selection(selection);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SelectionModel;

    #[test]
    fn test_reselect_is_additive() {
        let mut graph = Graph::new();
        let a = graph.add_node();
        let b = graph.add_node();

        let mut viewer = SelectionModel::new();
        viewer.register_controller(a);
        viewer.register_controller(b);
        viewer.set_selection(vec![a]);

        ItemBinding::new(b).reselect(&graph, &mut viewer);
        assert_eq!(viewer.selection(), vec![a, b]);

        ItemBinding::new(b).reselect(&graph, &mut viewer);
        assert_eq!(viewer.selection(), vec![a, b]);
    }

    #[test]
    fn test_reselect_skips_items_without_controller() {
        let mut graph = Graph::new();
        let a = graph.add_node();
        let mut viewer = SelectionModel::new();

        ItemBinding::new(a).reselect(&graph, &mut viewer);
        assert!(viewer.selection().is_empty());
    }

    #[test]
    fn test_resolve_requires_existing_item() {
        let mut graph = Graph::new();
        let a = graph.add_node();
        assert!(ItemBinding::resolve(&graph, a).is_some());
        assert!(ItemBinding::resolve(&graph, ItemId(99)).is_none());
    }
}
