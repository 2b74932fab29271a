use std::collections::HashMap;

use log::debug;

use crate::snapshots::{merge_positions, PositionPatch, PositionSnapshot};

/// Per-portfolio position lists backing the expandable detail view.
///
/// The cache lives independently of the snapshot store: a portfolio can be
/// present in the store while its cache entry is still cold. A warm entry
/// means the detail view has rendered at least once and partial ticks can be
/// blended with that history.
#[derive(Debug, Clone, Default)]
pub struct PositionCache {
    entries: HashMap<String, Vec<PositionSnapshot>>,
}

impl PositionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, parent_id: &str, positions: Vec<PositionSnapshot>) {
        debug!(
            "Caching {} position(s) for portfolio {}",
            positions.len(),
            parent_id
        );
        self.entries.insert(parent_id.to_string(), positions);
    }

    /// Whether the entry for `parent_id` is warm.
    pub fn has(&self, parent_id: &str) -> bool {
        self.entries.contains_key(parent_id)
    }

    pub fn get(&self, parent_id: &str) -> Option<Vec<PositionSnapshot>> {
        self.entries.get(parent_id).cloned()
    }

    /// Merges `patches` into the cached list and returns the result.
    ///
    /// A cold entry is warmed with the patch applied over an empty list.
    pub fn merge_patch(
        &mut self,
        parent_id: &str,
        patches: &[PositionPatch],
    ) -> Vec<PositionSnapshot> {
        let positions = self.entries.entry(parent_id.to_string()).or_default();
        merge_positions(positions, patches);
        positions.clone()
    }

    pub fn clear(&mut self, parent_id: &str) {
        self.entries.remove(parent_id);
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
