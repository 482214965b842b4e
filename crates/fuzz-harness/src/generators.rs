//! Domain generators for property-based testing
//!
//! Values are drawn from the ranges the simulator is meant to explore: LEO
//! altitudes, practical elevation masks, Ka/Ku band payloads.

use constellation_models::{IslTopology, SatelliteDesign};
use demand_model::{DemandParams, REFERENCE_GROWTH_RATE};
use proptest::prelude::*;

// ============================================================================
// Range String Generators
// ============================================================================

/// A range string with the number of values it must expand to
#[derive(Debug, Clone, PartialEq)]
pub struct RangeCase {
    pub text: String,
    pub count: usize,
}

/// Decimal with two places, built from an integer so the text is exact
fn centi(n: i64) -> String {
    format!("{}", n as f64 / 100.0)
}

/// Continuous `start|increment|end` range spanning a whole number of increments
pub fn continuous_range() -> impl Strategy<Value = RangeCase> {
    (0i64..=10_000, 1i64..=500, 1usize..=60).prop_map(|(start, inc, count)| {
        let end = start + inc * (count as i64 - 1);
        RangeCase {
            text: format!("{}|{}|{}", centi(start), centi(inc), centi(end)),
            count,
        }
    })
}

/// Continuous range whose end falls between two increments
pub fn ragged_range() -> impl Strategy<Value = RangeCase> {
    (0i64..=10_000, 2i64..=500, 1usize..=60).prop_flat_map(|(start, inc, count)| {
        (1..inc).prop_map(move |extra| {
            let end = start + inc * (count as i64 - 1) + extra;
            RangeCase {
                text: format!("{}|{}|{}", centi(start), centi(inc), centi(end)),
                count,
            }
        })
    })
}

/// Comma-separated numeric list
pub fn discrete_numbers() -> impl Strategy<Value = RangeCase> {
    prop::collection::vec(-100_000i64..=100_000, 1..=20).prop_map(|values| RangeCase {
        text: values.iter().map(|v| centi(*v)).collect::<Vec<_>>().join(","),
        count: values.len(),
    })
}

/// Strings that must be rejected by the range parser
pub fn malformed_range() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("1|2".to_string()),
        Just("1|2|3|4".to_string()),
        Just("1||3".to_string()),
        Just("1,,3".to_string()),
        Just("5|1|2".to_string()),
        Just("1|0|3".to_string()),
        Just("1|-1|3".to_string()),
        Just("a|1|3".to_string()),
        Just("1|NaN|3".to_string()),
    ]
}

// ============================================================================
// Architecture Generators
// ============================================================================

pub fn topology() -> impl Strategy<Value = IslTopology> {
    prop_oneof![
        Just(IslTopology::None),
        Just(IslTopology::Ring),
        Just(IslTopology::Mesh),
    ]
}

/// Antenna diameter in m
pub fn antenna_diameter_m() -> impl Strategy<Value = f64> {
    (50u32..=400).prop_map(|d| d as f64 / 100.0)
}

/// Transmit power in W
pub fn transmit_power_w() -> impl Strategy<Value = f64> {
    (100u32..=2500).prop_map(f64::from)
}

/// Carrier frequency in GHz
pub fn frequency_ghz() -> impl Strategy<Value = f64> {
    prop_oneof![Just(12.0), Just(15.0), Just(20.0), Just(30.0), Just(50.0)]
}

pub fn satellite_design() -> impl Strategy<Value = SatelliteDesign> {
    (antenna_diameter_m(), transmit_power_w(), frequency_ghz(), topology()).prop_map(
        |(d, p, f, isl)| SatelliteDesign {
            diameter_m: d,
            power_w: p,
            frequency_ghz: f,
            isl,
        },
    )
}

/// LEO altitude in km
pub fn altitude_km() -> impl Strategy<Value = f64> {
    (300u32..=2000).prop_map(f64::from)
}

/// Minimum elevation angle in degrees
pub fn elevation_deg() -> impl Strategy<Value = f64> {
    (5u32..=70).prop_map(f64::from)
}

/// (elevation deg, altitude km)
pub fn orbit() -> impl Strategy<Value = (f64, f64)> {
    (elevation_deg(), altitude_km())
}

// ============================================================================
// Strategy and Scenario Generators
// ============================================================================

/// Capacity jump factor J
pub fn capacity_jump() -> impl Strategy<Value = f64> {
    (105u32..=500).prop_map(|j| j as f64 / 100.0)
}

/// Maximum layers Lm
pub fn max_layers() -> impl Strategy<Value = usize> {
    1usize..=5
}

/// (J, Lm)
pub fn flex_strategy() -> impl Strategy<Value = (f64, usize)> {
    (capacity_jump(), max_layers())
}

/// Annual discount rate
pub fn discount_rate() -> impl Strategy<Value = f64> {
    (0u32..=60).prop_map(|r| r as f64 / 100.0)
}

/// Demand volatility σ
pub fn volatility() -> impl Strategy<Value = f64> {
    (0u32..=50).prop_map(|s| s as f64 / 100.0)
}

/// Demand model parameters with a short horizon
pub fn demand_params() -> impl Strategy<Value = DemandParams> {
    (1u32..=20, 1usize..=200, 1_000u32..=100_000).prop_map(|(years, steps, start)| DemandParams {
        horizon_years: f64::from(years),
        growth_rate: REFERENCE_GROWTH_RATE,
        start: f64::from(start),
        steps,
    })
}
