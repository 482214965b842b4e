//! Constellation Models
//!
//! Physical and economic models for a single-shell polar constellation:
//!
//! - [`geometry`]: coverage footprint, slant range and satellite count
//! - [`capacity`]: link budget, data rate and channel capacity
//! - [`cost`]: SSCM-style mass and cost estimating relationships
//!
//! Every function takes its inputs explicitly; the only mutable state is the
//! [`cost::LearningCurve`] memo, which callers own.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod capacity;
pub mod cost;
pub mod geometry;

pub use capacity::{capacity, data_rate_mbps, detailed_budget, LinkBudgetBreakdown};
pub use cost::{
    CostComponent, CostTable, LccComponents, LearningCurve, Masses, PRODUCTION_COMPONENTS,
};
pub use geometry::{Footprint, PolarConstellation, EARTH_RADIUS_KM};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("No coverage footprint for elevation {elevation_deg} deg at altitude {altitude_km} km")]
    InvalidGeometry { elevation_deg: f64, altitude_km: f64 },
    #[error("Unknown ISL topology: {0}")]
    UnknownTopology(String),
    #[error("Invalid satellite design: {0}")]
    InvalidDesign(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;

/// Inter-satellite link topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IslTopology {
    /// No inter-satellite links, bent-pipe only
    None,
    /// Links to in-plane neighbours
    Ring,
    /// Links to in-plane and cross-plane neighbours
    Mesh,
}

impl IslTopology {
    pub const ALL: [IslTopology; 3] = [Self::None, Self::Ring, Self::Mesh];

    /// Fraction of channel capacity the network can actually route
    pub fn utilisation(&self) -> f64 {
        match self {
            Self::None => 0.1,
            Self::Ring => 0.7,
            Self::Mesh => 0.9,
        }
    }

    /// Dry mass multiplier for the ISL terminals
    pub fn mass_factor(&self) -> f64 {
        match self {
            Self::None => 1.0,
            Self::Ring => 1.05,
            Self::Mesh => 1.2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Ring => "Ring",
            Self::Mesh => "Mesh",
        }
    }
}

impl fmt::Display for IslTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IslTopology {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "ring" => Ok(Self::Ring),
            "mesh" => Ok(Self::Mesh),
            _ => Err(ModelError::UnknownTopology(s.to_string())),
        }
    }
}

/// Fixed satellite design shared by every configuration of a family
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SatelliteDesign {
    /// Antenna diameter (m)
    #[serde(rename = "D")]
    pub diameter_m: f64,
    /// Transmit power (W)
    #[serde(rename = "P")]
    pub power_w: f64,
    /// Carrier frequency (GHz)
    #[serde(rename = "f")]
    pub frequency_ghz: f64,
    #[serde(rename = "I")]
    pub isl: IslTopology,
}

impl SatelliteDesign {
    pub fn new(diameter_m: f64, power_w: f64, frequency_ghz: f64, isl: IslTopology) -> Result<Self> {
        for (name, v) in [("D", diameter_m), ("P", power_w), ("f", frequency_ghz)] {
            if !(v.is_finite() && v > 0.0) {
                return Err(ModelError::InvalidDesign(format!("{} must be positive, got {}", name, v)));
            }
        }
        Ok(Self { diameter_m, power_w, frequency_ghz, isl })
    }
}

/// Decibels from a linear ratio
pub(crate) fn db(x: f64) -> f64 {
    10.0 * x.log10()
}
