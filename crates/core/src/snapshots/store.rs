//! Normalized in-memory read model for accounts and portfolios.

use std::collections::HashMap;
use std::fmt;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::snapshots_model::{AccountSnapshot, PortfolioSnapshot};
use super::snapshots_patch::Merge;

/// Entity families held by the [`SnapshotStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Account,
    Portfolio,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Account => "account",
            EntityKind::Portfolio => "portfolio",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An identifiable entity that can be patched in place.
pub trait Snapshot: Merge + Clone + Default {
    const KIND: EntityKind;

    fn id(&self) -> &str;

    fn patch_id(patch: &Self::Patch) -> &str;

    /// Builds a new entity from a patch over defaults.
    fn from_patch(patch: &Self::Patch) -> Self;
}

impl Snapshot for AccountSnapshot {
    const KIND: EntityKind = EntityKind::Account;

    fn id(&self) -> &str {
        &self.uuid
    }

    fn patch_id(patch: &Self::Patch) -> &str {
        &patch.uuid
    }

    fn from_patch(patch: &Self::Patch) -> Self {
        let mut account = AccountSnapshot {
            uuid: patch.uuid.clone(),
            ..Default::default()
        };
        account.apply_patch(patch);
        account
    }
}

impl Snapshot for PortfolioSnapshot {
    const KIND: EntityKind = EntityKind::Portfolio;

    fn id(&self) -> &str {
        &self.uuid
    }

    fn patch_id(patch: &Self::Patch) -> &str {
        &patch.uuid
    }

    fn from_patch(patch: &Self::Patch) -> Self {
        let mut portfolio = PortfolioSnapshot {
            uuid: patch.uuid.clone(),
            ..Default::default()
        };
        portfolio.apply_patch(patch);
        portfolio
    }
}

/// Keyed table for one entity family.
///
/// Entities are handed out as owned clones and written from owned values, so
/// no caller ever holds a reference into the table.
#[derive(Debug, Clone)]
pub struct SnapshotTable<T: Snapshot> {
    entries: HashMap<String, T>,
    /// Insertion order of ids, used for `get_all`.
    order: Vec<String>,
}

impl<T: Snapshot> Default for SnapshotTable<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<T: Snapshot> SnapshotTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the table and repopulates it from a full sync.
    ///
    /// Later duplicates of the same id overwrite earlier ones but keep the
    /// position of the first occurrence.
    pub fn replace(&mut self, items: Vec<T>) {
        self.clear();
        for item in items {
            let id = item.id().to_string();
            if id.is_empty() {
                warn!("Dropping {} without identifier from full sync", T::KIND);
                continue;
            }
            if self.entries.insert(id.clone(), item).is_none() {
                self.order.push(id);
            }
        }
        debug!("Replaced {} table with {} entries", T::KIND, self.order.len());
    }

    /// Applies each patch to the entity it names, creating missing entities.
    ///
    /// Returns the merged entities in patch order.
    pub fn merge(&mut self, patches: &[T::Patch]) -> Vec<T> {
        let mut merged = Vec::with_capacity(patches.len());
        for patch in patches {
            let id = T::patch_id(patch);
            if id.is_empty() {
                warn!("Dropping {} patch without identifier", T::KIND);
                continue;
            }
            let entity = match self.entries.get_mut(id) {
                Some(existing) => {
                    existing.apply_patch(patch);
                    existing.clone()
                }
                None => {
                    let created = T::from_patch(patch);
                    self.order.push(id.to_string());
                    self.entries.insert(id.to_string(), created.clone());
                    created
                }
            };
            merged.push(entity);
        }
        merged
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.entries.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get_all(&self) -> Vec<T> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

/// Canonical state for every entity family.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    accounts: SnapshotTable<AccountSnapshot>,
    portfolios: SnapshotTable<PortfolioSnapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accounts(&self) -> &SnapshotTable<AccountSnapshot> {
        &self.accounts
    }

    pub fn accounts_mut(&mut self) -> &mut SnapshotTable<AccountSnapshot> {
        &mut self.accounts
    }

    pub fn portfolios(&self) -> &SnapshotTable<PortfolioSnapshot> {
        &self.portfolios
    }

    pub fn portfolios_mut(&mut self) -> &mut SnapshotTable<PortfolioSnapshot> {
        &mut self.portfolios
    }

    /// Number of entities held for `kind`.
    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Account => self.accounts.len(),
            EntityKind::Portfolio => self.portfolios.len(),
        }
    }

    /// Drops every entity of every family.
    pub fn reset(&mut self) {
        self.accounts.clear();
        self.portfolios.clear();
    }
}
