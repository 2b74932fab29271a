//! Position cache for lazily expanded portfolio detail views.

mod position_cache;

pub use position_cache::PositionCache;
