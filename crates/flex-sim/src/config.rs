//! Input configuration and JSON loading
//!
//! Every swept input is a range string (see [`tradespace::parse_range`]).
//! Ranges are validated up front so a malformed input fails before any
//! enumeration or simulation work starts.

use crate::{CaseKey, Result, SimError};
use demand_model::{DemandParams, REFERENCE_GROWTH_RATE};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;
use tradespace::{ParameterRange, ParameterVector, Tradespace};

/// Default simulation horizon (years)
pub const DEFAULT_HORIZON_YEARS: f64 = 10.0;
/// Default time steps (weekly over ten years, rounded)
pub const DEFAULT_STEPS: usize = 480;
/// Default starting demand (channels)
pub const DEFAULT_START_DEMAND: f64 = 50_000.0;
/// Default peak demand the fixed design must meet (channels)
pub const DEFAULT_CAP_MAX: f64 = 15e6;

/// Scenario parameters, one case per combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioInputs {
    pub r: String,
    pub rec: String,
    #[serde(rename = "σ", alias = "sigma")]
    pub sigma: String,
    #[serde(rename = "S")]
    pub scenarios: String,
}

/// Flexible strategy parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyInputs {
    #[serde(rename = "J")]
    pub jump: String,
    #[serde(rename = "Lm")]
    pub max_layers: String,
}

/// Architecture tradespace: family parameters and configuration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureInputs {
    #[serde(rename = "D")]
    pub diameter: String,
    #[serde(rename = "P")]
    pub power: String,
    #[serde(rename = "f")]
    pub frequency: String,
    #[serde(rename = "I")]
    pub isl: String,
    #[serde(rename = "a")]
    pub altitude: String,
    #[serde(rename = "e")]
    pub elevation: String,
}

/// Constants shared by every scenario case
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationConstants {
    #[serde(rename = "T")]
    pub horizon_years: f64,
    #[serde(rename = "μ", alias = "mu")]
    pub growth_rate: f64,
    pub steps: usize,
    pub start: f64,
    #[serde(rename = "capMax")]
    pub cap_max: f64,
}

impl Default for SimulationConstants {
    fn default() -> Self {
        Self {
            horizon_years: DEFAULT_HORIZON_YEARS,
            growth_rate: REFERENCE_GROWTH_RATE,
            steps: DEFAULT_STEPS,
            start: DEFAULT_START_DEMAND,
            cap_max: DEFAULT_CAP_MAX,
        }
    }
}

impl SimulationConstants {
    pub fn demand_params(&self) -> DemandParams {
        DemandParams {
            horizon_years: self.horizon_years,
            growth_rate: self.growth_rate,
            start: self.start,
            steps: self.steps,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.demand_params().validate()?;
        if !(self.cap_max.is_finite() && self.cap_max > 0.0) {
            return Err(SimError::InvalidParameter {
                name: "capMax".to_string(),
                value: self.cap_max.to_string(),
            });
        }
        Ok(())
    }
}

/// Inputs for a single simulation: constants plus one scenario case
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationInputs {
    #[serde(flatten)]
    pub constants: SimulationConstants,
    /// Annual discount rate
    pub r: f64,
    /// Reconfiguration cost fraction of production cost
    #[serde(rename = "reconCost")]
    pub reconfiguration_cost: f64,
    #[serde(rename = "σ", alias = "sigma")]
    pub sigma: f64,
    #[serde(rename = "numScenarios")]
    pub scenarios: usize,
}

impl Default for SimulationInputs {
    fn default() -> Self {
        Self {
            constants: SimulationConstants::default(),
            r: 0.55,
            reconfiguration_cost: 0.2,
            sigma: 0.2,
            scenarios: 100,
        }
    }
}

impl SimulationInputs {
    /// Inputs for one enumerated scenario case
    pub fn from_case(constants: SimulationConstants, case: &ParameterVector) -> Result<Self> {
        let scenarios = number(case, "S")?;
        if !(scenarios >= 1.0 && scenarios.fract() == 0.0) {
            return Err(SimError::InvalidParameter {
                name: "S".to_string(),
                value: scenarios.to_string(),
            });
        }
        Ok(Self {
            constants,
            r: number(case, "r")?,
            reconfiguration_cost: number(case, "rec")?,
            sigma: number(case, "σ")?,
            scenarios: scenarios as usize,
        })
    }

    pub fn case_key(&self) -> CaseKey {
        CaseKey { r: self.r, rec: self.reconfiguration_cost, sigma: self.sigma }
    }

    /// Discount factors are only meaningful for r > -1
    pub fn validate(&self) -> Result<()> {
        self.constants.validate()?;
        if !(self.r.is_finite() && self.r > -1.0) {
            return Err(SimError::InvalidParameter { name: "r".to_string(), value: self.r.to_string() });
        }
        if !self.reconfiguration_cost.is_finite() {
            return Err(SimError::InvalidParameter {
                name: "rec".to_string(),
                value: self.reconfiguration_cost.to_string(),
            });
        }
        Ok(())
    }

    pub fn dt(&self) -> f64 {
        self.constants.demand_params().dt()
    }
}

/// Full experiment input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    pub scenario: ScenarioInputs,
    pub strategy: StrategyInputs,
    pub architecture: ArchitectureInputs,
    #[serde(default)]
    pub simulation: SimulationConstants,
    /// Fixed RNG seed for reproducible scenario sets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            scenario: ScenarioInputs {
                r: "0|0.1|0.5".to_string(),
                rec: "0.2".to_string(),
                sigma: "0.2".to_string(),
                scenarios: "10".to_string(),
            },
            strategy: StrategyInputs {
                jump: "1.5".to_string(),
                max_layers: "2".to_string(),
            },
            architecture: ArchitectureInputs {
                diameter: "2|0.5|4".to_string(),
                power: "200|400|2200".to_string(),
                frequency: "15,50".to_string(),
                isl: "None,Mesh,Ring".to_string(),
                altitude: "400|50|1600".to_string(),
                elevation: "15|15|60".to_string(),
            },
            simulation: SimulationConstants::default(),
            seed: None,
        }
    }
}

impl InputConfig {
    /// Raw range string for a parameter symbol
    pub fn raw_range(&self, symbol: &str) -> Option<&str> {
        let raw = match symbol {
            "r" => &self.scenario.r,
            "rec" => &self.scenario.rec,
            "σ" | "sigma" => &self.scenario.sigma,
            "S" => &self.scenario.scenarios,
            "J" => &self.strategy.jump,
            "Lm" => &self.strategy.max_layers,
            "D" => &self.architecture.diameter,
            "P" => &self.architecture.power,
            "f" => &self.architecture.frequency,
            "I" => &self.architecture.isl,
            "a" => &self.architecture.altitude,
            "e" => &self.architecture.elevation,
            _ => return None,
        };
        Some(raw.as_str())
    }

    /// Parsed range for a parameter symbol
    pub fn range(&self, symbol: &str) -> Result<ParameterRange> {
        let raw = self
            .raw_range(symbol)
            .ok_or_else(|| SimError::MissingParameter(symbol.to_string()))?;
        let space = Tradespace::parse([(symbol, raw)])?;
        space
            .range(symbol)
            .cloned()
            .ok_or_else(|| SimError::MissingParameter(symbol.to_string()))
    }

    fn space(&self, symbols: &[&str]) -> Result<Tradespace> {
        let mut pairs = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let raw = self
                .raw_range(symbol)
                .ok_or_else(|| SimError::MissingParameter(symbol.to_string()))?;
            pairs.push((*symbol, raw));
        }
        Ok(Tradespace::parse(pairs)?)
    }

    /// r, rec, σ, S
    pub fn scenario_space(&self) -> Result<Tradespace> {
        self.space(&["r", "rec", "σ", "S"])
    }

    /// D, P, f, I
    pub fn family_space(&self) -> Result<Tradespace> {
        self.space(&["D", "P", "f", "I"])
    }

    /// a, e
    pub fn configuration_space(&self) -> Result<Tradespace> {
        self.space(&["a", "e"])
    }

    /// J with Lm = 1
    pub fn single_layer_space(&self) -> Result<Tradespace> {
        Ok(self
            .space(&["J"])?
            .with("Lm", ParameterRange::Discrete { values: vec![1.0.into()] }))
    }

    /// J, Lm
    pub fn multi_layer_space(&self) -> Result<Tradespace> {
        self.space(&["J", "Lm"])
    }

    /// Parse every range and check the constants
    pub fn validate(&self) -> Result<()> {
        self.scenario_space()?;
        self.multi_layer_space()?;
        self.family_space()?;
        self.configuration_space()?;
        self.simulation.validate()
    }
}

pub(crate) fn number(vector: &ParameterVector, name: &str) -> Result<f64> {
    match vector.get(name) {
        Some(value) => value.as_f64().ok_or_else(|| SimError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
        }),
        None => Err(SimError::MissingParameter(name.to_string())),
    }
}

/// Load an input configuration from a JSON file
pub fn load_config(path: impl AsRef<Path>) -> Result<InputConfig> {
    let path = path.as_ref();
    info!("Loading inputs from {:?}", path);

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let config: InputConfig = serde_json::from_reader(reader)?;
    config.validate()?;

    Ok(config)
}

/// Write an input configuration as pretty JSON
pub fn save_config(path: impl AsRef<Path>, config: &InputConfig) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, config)?;
    Ok(())
}
