//! HTTP surface: station searches plus health and metrics.

pub mod error;
pub mod middleware;
pub mod routes;
pub mod stations;
pub mod status;

pub use routes::*;
