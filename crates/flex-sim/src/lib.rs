//! Flexible Constellation Deployment Simulator
//!
//! Compares a fixed ("traditional") constellation sized for peak demand with
//! a flexible deployment that starts small and evolves, by adding orbital
//! layers or reconfiguring existing ones, as uncertain demand materialises.
//!
//! # Pipeline
//!
//! ```text
//! InputConfig ─► ArchitectureBuilder ─► run_fixed ─► Pareto filter
//!                                           │              │
//!                                     optimal_fixed   EvolutionPlanner
//!                                           │              │
//!                                     TraditionalResult  replay over demand
//!                                                          scenarios ─► ELCC
//! ```
//!
//! All costs are in FY2021 $K. Capacity is in simultaneous channels.
//!
//! | Symbol | Meaning |
//! |--------|---------|
//! | J      | Capacity jump factor per evolution |
//! | Lm     | Maximum number of orbital layers |
//! | r      | Annual discount rate |
//! | rec    | Reconfiguration cost as a fraction of production cost |
//! | σ      | Demand volatility |
//! | S      | Number of demand scenarios |

use constellation_models::{ModelError, SatelliteDesign};
use demand_model::DemandError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tradespace::RangeError;

pub mod architecture;
pub mod codec;
pub mod config;
pub mod engine;
pub mod evolution;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod metrics;
pub mod optimizer;
pub mod pareto;

pub use architecture::{ArchitectureBuilder, ArchitectureFamily, Configuration};
pub use codec::CodecError;
pub use config::{InputConfig, SimulationConstants, SimulationInputs};
pub use engine::{ReplayTrace, Simulation};
pub use evolution::{Evolution, EvolutionPlan, EvolutionPlanner, FlexStrategy, PlanError};
pub use metrics::OutputMetric;
pub use optimizer::{run_experiment, ExperimentResults, Progress};

#[derive(Error, Debug)]
pub enum SimError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Range(#[from] RangeError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Demand(#[from] DemandError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("Invalid value for parameter {name}: {value}")]
    InvalidParameter { name: String, value: String },
    #[error("Missing parameter {0}")]
    MissingParameter(String),
    #[error("No architectures could be built from the inputs")]
    NoArchitectures,
}

pub type Result<T> = std::result::Result<T, SimError>;

/// Scenario case identifying one row of results
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaseKey {
    pub r: f64,
    pub rec: f64,
    #[serde(rename = "σ", alias = "sigma")]
    pub sigma: f64,
}

impl CaseKey {
    pub fn matches(&self, other: &CaseKey) -> bool {
        approx_eq(self.r, other.r) && approx_eq(self.rec, other.rec) && approx_eq(self.sigma, other.sigma)
    }
}

/// Cheapest fixed design that meets peak demand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraditionalResult {
    #[serde(rename = "LCC")]
    pub lcc: f64,
    pub cap: f64,
    #[serde(flatten)]
    pub design: SatelliteDesign,
    pub a: f64,
    pub e: f64,
    pub n: u32,
}

/// Best family for one flexible strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyResult {
    #[serde(rename = "ELCC")]
    pub elcc: f64,
    #[serde(flatten)]
    pub design: SatelliteDesign,
    #[serde(flatten)]
    pub strategy: FlexStrategy,
    /// Mean new layers per scenario
    #[serde(rename = "avgN")]
    pub avg_new_layers: f64,
    /// Mean reconfigurations per layer per scenario
    #[serde(rename = "avgR")]
    pub avg_reconfigurations: f64,
}

impl TraditionalResult {
    /// Reporting precision: LCC to cents of $K
    pub fn rounded(&self) -> Self {
        Self { lcc: round_to(self.lcc, 2), ..self.clone() }
    }
}

impl StrategyResult {
    /// Reporting precision: ELCC to 2 decimals, averages to 4
    pub fn rounded(&self) -> Self {
        Self {
            elcc: round_to(self.elcc, 2),
            avg_new_layers: round_to(self.avg_new_layers, 4),
            avg_reconfigurations: round_to(self.avg_reconfigurations, 4),
            ..self.clone()
        }
    }
}

/// Round half away from zero to `places` decimals
pub fn round_to(x: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (x * scale).round() / scale
}

pub(crate) fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use constellation_models::IslTopology;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(513_412.254_9, 2), 513_412.25);
        assert_eq!(round_to(2.333_333, 4), 2.3333);
        assert_eq!(round_to(-1.5, 0), -2.0);
    }

    #[test]
    fn test_case_key_serde() {
        let key = CaseKey { r: 0.1, rec: 0.2, sigma: 0.3 };
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, r#"{"r":0.1,"rec":0.2,"σ":0.3}"#);
        let back: CaseKey = serde_json::from_str(r#"{"r":0.1,"rec":0.2,"sigma":0.3}"#).unwrap();
        assert!(back.matches(&key));
    }

    #[test]
    fn test_strategy_result_flattened_keys() {
        let result = StrategyResult {
            elcc: 1.0,
            design: SatelliteDesign::new(2.0, 800.0, 15.0, IslTopology::Mesh).unwrap(),
            strategy: FlexStrategy::new(1.5, 2).unwrap(),
            avg_new_layers: 1.0,
            avg_reconfigurations: 4.0,
        };
        let json = serde_json::to_value(&result).unwrap();
        for key in ["ELCC", "D", "P", "f", "I", "J", "Lm", "avgN", "avgR"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        let back: StrategyResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }
}
