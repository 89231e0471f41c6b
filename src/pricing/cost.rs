//! True cost of filling up at a station: the pump price plus the fuel burned
//! driving there and back.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TripCost {
    /// Cost of the round trip's fuel at the station's price.
    pub travel_cost: f64,
    /// Budget left for fuel after the trip.
    pub effective_budget: f64,
    /// Litres the remaining budget buys; zero when the trip eats the budget.
    pub fuel_volume: f64,
}

fn cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Work out how much fuel `budget` buys at a station `distance_km` away.
///
/// Results are rounded to two decimals.
pub fn effective_fuel_volume(
    price_per_litre: f64,
    distance_km: f64,
    budget: f64,
    efficiency_l_per_100km: f64,
) -> TripCost {
    let litres_used = distance_km * 2.0 * efficiency_l_per_100km / 100.0;
    let travel_cost = litres_used * price_per_litre;
    let effective_budget = budget - travel_cost;
    let fuel_volume = if effective_budget > 0.0 && price_per_litre > 0.0 {
        effective_budget / price_per_litre
    } else {
        0.0
    };

    TripCost {
        travel_cost: cents(travel_cost),
        effective_budget: cents(effective_budget),
        fuel_volume: cents(fuel_volume),
    }
}
