//! Gas station search with grid-snapped caching and request collapsing.
//!
//! A search is normalized into a coarse cache key, answered from the
//! [`cache::CacheStore`] when fresh, and otherwise resolved once per key
//! through the [`cache::RequestCollapser`] no matter how many callers are
//! waiting on it.

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod places;
pub mod pricing;
pub mod query;
pub mod search;
pub mod state;
pub mod utils;
pub mod web;
