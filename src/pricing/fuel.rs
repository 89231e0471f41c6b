//! Fuel grade selection and price conversion.
//!
//! Which provider grades may stand in for a requested fuel type is plain
//! ordered data, so each policy can be tested on its own.

use crate::places::{FuelPrice, Money};
use std::collections::HashMap;

pub const REGULAR_UNLEADED: &str = "REGULAR_UNLEADED";
pub const MIDGRADE: &str = "MIDGRADE";
pub const PREMIUM: &str = "PREMIUM";
pub const DIESEL: &str = "DIESEL";
pub const DIESEL_PLUS: &str = "DIESEL_PLUS";
pub const TRUCK_DIESEL: &str = "TRUCK_DIESEL";

/// Ordered provider grades accepted for each user-facing fuel type.
#[derive(Debug, Clone, PartialEq)]
pub struct FuelPolicy {
    chains: HashMap<String, Vec<String>>,
    /// Used for fuel types with no chain of their own.
    fallback_chain: Vec<String>,
}

fn chain(grades: &[&str]) -> Vec<String> {
    grades.iter().map(|g| (*g).to_owned()).collect()
}

impl Default for FuelPolicy {
    fn default() -> Self {
        Self::strict()
    }
}

impl FuelPolicy {
    pub fn new(chains: HashMap<String, Vec<String>>, fallback_chain: Vec<String>) -> Self {
        Self {
            chains,
            fallback_chain,
        }
    }

    /// Regular may fall back to higher grades; Premium and Diesel never
    /// substitute a different grade.
    pub fn strict() -> Self {
        Self::new(
            HashMap::from([
                ("Regular".to_owned(), chain(&[REGULAR_UNLEADED, MIDGRADE, PREMIUM])),
                ("Premium".to_owned(), chain(&[PREMIUM])),
                ("Diesel".to_owned(), chain(&[DIESEL])),
            ]),
            chain(&[REGULAR_UNLEADED]),
        )
    }

    /// Every fuel type falls back through neighbouring grades.
    pub fn permissive() -> Self {
        Self::new(
            HashMap::from([
                ("Regular".to_owned(), chain(&[REGULAR_UNLEADED, MIDGRADE, PREMIUM])),
                ("Premium".to_owned(), chain(&[PREMIUM, REGULAR_UNLEADED, MIDGRADE])),
                ("Diesel".to_owned(), chain(&[DIESEL, DIESEL_PLUS, TRUCK_DIESEL])),
            ]),
            chain(&[REGULAR_UNLEADED]),
        )
    }

    pub fn chain_for(&self, fuel_type: &str) -> &[String] {
        self.chains
            .get(fuel_type)
            .map(Vec::as_slice)
            .unwrap_or(&self.fallback_chain)
    }

    /// First grade in the chain with a complete posted price, as
    /// `(provider grade, price)`.
    pub fn best_price<'a>(&self, prices: &'a [FuelPrice], fuel_type: &str) -> Option<(&'a str, f64)> {
        self.chain_for(fuel_type).iter().find_map(|grade| {
            prices
                .iter()
                .filter(|p| &p.fuel_type == grade)
                .find_map(|p| Some((p.fuel_type.as_str(), price_to_f64(p.price.as_ref()?)?)))
        })
    }
}

/// Convert provider money to a decimal price with 1/1000 precision.
///
/// Returns `None` unless both `units` and `nanos` are present, or if the
/// amount does not fit in thousandths.
pub fn price_to_f64(money: &Money) -> Option<f64> {
    let units = money.units?;
    let nanos = money.nanos?;
    let millis = (nanos as f64 / 1e6).round() as i64;
    let total = units.checked_mul(1000)?.checked_add(millis)?;
    Some(total as f64 / 1000.0)
}
