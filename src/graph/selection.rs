use crate::core::ItemId;
use std::collections::HashSet;

/// Selection surface of whatever view is showing the document.
///
/// Owned by the UI layer; commands only use it in their after-hooks.
pub trait Viewer {
    fn selection(&self) -> Vec<ItemId>;

    fn set_selection(&mut self, items: Vec<ItemId>);

    /// Whether the view currently has a controller (a visible element) for
    /// the item. Items without controller cannot be selected.
    fn find_controller_for_item(&self, item: ItemId) -> bool;
}

/// In-memory viewer used by headless hosts and tests.
#[derive(Debug, Default, Clone)]
pub struct SelectionModel {
    selection: Vec<ItemId>,
    controllers: HashSet<ItemId>,
}

impl SelectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_controller(&mut self, item: ItemId) {
        self.controllers.insert(item);
    }

    pub fn unregister_controller(&mut self, item: ItemId) {
        self.controllers.remove(&item);
        self.selection.retain(|selected| *selected != item);
    }

    pub fn is_selected(&self, item: ItemId) -> bool {
        self.selection.contains(&item)
    }
}

impl Viewer for SelectionModel {
    fn selection(&self) -> Vec<ItemId> {
        self.selection.clone()
    }

    fn set_selection(&mut self, items: Vec<ItemId>) {
        self.selection = items;
    }

    fn find_controller_for_item(&self, item: ItemId) -> bool {
        self.controllers.contains(&item)
    }
}

/// Viewer for hosts without any view; selection side effects are dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullViewer;

impl Viewer for NullViewer {
    fn selection(&self) -> Vec<ItemId> {
        Vec::new()
    }

    fn set_selection(&mut self, _items: Vec<ItemId>) {}

    fn find_controller_for_item(&self, _item: ItemId) -> bool {
        false
    }
}
