//! Snapshots module - entity models, patch merge rules and the snapshot store.

mod snapshots_model;
mod snapshots_patch;
mod store;

pub use snapshots_model::*;
pub use snapshots_patch::*;
pub use store::*;

#[cfg(test)]
mod snapshots_patch_tests;
