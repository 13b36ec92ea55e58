// ============================================================================
// Change Notifications
// ============================================================================
//
// Every mutation of an item reports a change. While refresh is disabled for
// an item its changes are only remembered; re-enabling flushes at most one
// event for the whole batch.
//
// ============================================================================

use super::Graph;
use crate::core::ItemId;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub item: ItemId,
    pub sequence: u64,
}

#[derive(Debug, Default)]
pub struct ChangeNotifier {
    /// Items with refresh disabled, mapped to "changed while disabled".
    suppressed: HashMap<ItemId, bool>,
    events: Vec<ChangeEvent>,
    sequence: u64,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_refresh_enabled(&self, item: ItemId) -> bool {
        !self.suppressed.contains_key(&item)
    }

    pub fn notify(&mut self, item: ItemId) {
        match self.suppressed.get_mut(&item) {
            Some(dirty) => *dirty = true,
            None => self.emit(item),
        }
    }

    /// Returns `true` if refresh was enabled before the call, i.e. the caller
    /// now owns the re-enable.
    pub fn disable_refresh(&mut self, item: ItemId) -> bool {
        if self.suppressed.contains_key(&item) {
            return false;
        }
        self.suppressed.insert(item, false);
        true
    }

    pub fn enable_refresh(&mut self, item: ItemId, force: bool) {
        let dirty = self.suppressed.remove(&item).unwrap_or(false);
        if dirty || force {
            self.emit(item);
        }
    }

    pub fn events(&self) -> &[ChangeEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<ChangeEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn count_for(&self, item: ItemId) -> usize {
        self.events.iter().filter(|e| e.item == item).count()
    }

    fn emit(&mut self, item: ItemId) {
        self.sequence += 1;
        self.events.push(ChangeEvent {
            item,
            sequence: self.sequence,
        });
    }
}

/// Scoped refresh suppression over a set of items.
///
/// Derefs to the graph so the batch runs against it; dropping the guard
/// restores refresh for every item it disabled, including on early return
/// and unwinding.
pub struct SuppressedRefresh<'a> {
    graph: &'a mut Graph,
    owned: Vec<ItemId>,
    force: bool,
}

impl<'a> SuppressedRefresh<'a> {
    pub fn new(graph: &'a mut Graph, items: impl IntoIterator<Item = ItemId>, force: bool) -> Self {
        let mut owned = Vec::new();
        for item in items {
            if graph.notifier_mut().disable_refresh(item) {
                owned.push(item);
            }
        }
        Self {
            graph,
            owned,
            force,
        }
    }

    /// Adds an item discovered while the batch is already running.
    pub fn suppress(&mut self, item: ItemId) {
        if self.graph.notifier_mut().disable_refresh(item) {
            self.owned.push(item);
        }
    }

    pub fn suppressed_items(&self) -> &[ItemId] {
        &self.owned
    }
}

impl Deref for SuppressedRefresh<'_> {
    type Target = Graph;

    fn deref(&self) -> &Graph {
        self.graph
    }
}

impl DerefMut for SuppressedRefresh<'_> {
    fn deref_mut(&mut self) -> &mut Graph {
        self.graph
    }
}

impl Drop for SuppressedRefresh<'_> {
    fn drop(&mut self) {
        let force = self.force;
        for item in self.owned.drain(..) {
            self.graph.notifier_mut().enable_refresh(item, force);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suppressed_changes_flush_once() {
        let mut notifier = ChangeNotifier::new();
        let item = ItemId(1);

        assert!(notifier.disable_refresh(item));
        notifier.notify(item);
        notifier.notify(item);
        assert!(notifier.events().is_empty());

        notifier.enable_refresh(item, false);
        assert_eq!(notifier.count_for(item), 1);
    }

    #[test]
    fn test_nested_disable_is_not_owned() {
        let mut notifier = ChangeNotifier::new();
        let item = ItemId(7);
        assert!(notifier.disable_refresh(item));
        assert!(!notifier.disable_refresh(item));
    }

    #[test]
    fn test_force_emits_without_changes() {
        let mut notifier = ChangeNotifier::new();
        let item = ItemId(3);
        notifier.disable_refresh(item);
        notifier.enable_refresh(item, true);
        assert_eq!(notifier.count_for(item), 1);

        notifier.disable_refresh(item);
        notifier.enable_refresh(item, false);
        assert_eq!(notifier.count_for(item), 1);
    }

    #[test]
    fn test_guard_restores_on_drop() {
        let mut graph = Graph::new();
        let node = graph.add_node();
        graph.notifier_mut().take_events();

        {
            let mut guard = SuppressedRefresh::new(&mut graph, [node, node], false);
            assert_eq!(guard.suppressed_items(), &[node]);
            guard
                .set_attribute(node, "name", Some(serde_json::json!("x")))
                .unwrap();
            assert!(guard.notifier().events().is_empty());
        }

        assert!(graph.notifier().is_refresh_enabled(node));
        assert_eq!(graph.notifier().count_for(node), 1);
    }
}
