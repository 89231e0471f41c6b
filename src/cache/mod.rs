//! In-memory result caching and single-flight collapsing for station lookups.

pub mod collapse;
pub mod store;

pub use collapse::{CollapseError, RequestCollapser};
pub use store::{CacheStats, CacheStore, DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL, MAX_TTL};
