//! Price and distance resolution for a normalized query.

pub mod cost;
pub mod fuel;
pub mod resolver;

pub use cost::{TripCost, effective_fuel_volume};
pub use fuel::{FuelPolicy, price_to_f64};
pub use resolver::{PricingResolver, ResolveError, ResolverConfig, StationResult};
