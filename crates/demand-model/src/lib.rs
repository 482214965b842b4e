//! Demand Model
//!
//! Demand is measured in simultaneous channels and grows geometrically at an
//! expected annual rate μ. Uncertainty comes from a recombining binomial
//! lattice with volatility σ:
//!
//! ```text
//! u = e^(σ·√Δt)    d = 1/u    p = (e^(μ·Δt) − d) / (u − d)
//! ```
//!
//! Stochastic paths are then rescaled so the mean final demand across paths
//! matches the deterministic final demand.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Growth rate at which the volatility scaling is calibrated
pub const REFERENCE_GROWTH_RATE: f64 = 0.77119;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DemandError {
    #[error("Invalid demand parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("At least one scenario is required")]
    NoScenarios,
}

pub type Result<T> = std::result::Result<T, DemandError>;

/// Demand growth inputs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DemandParams {
    /// Horizon (years)
    #[serde(rename = "T")]
    pub horizon_years: f64,
    /// Expected annual growth rate
    #[serde(rename = "μ", alias = "mu")]
    pub growth_rate: f64,
    /// Starting demand (channels)
    pub start: f64,
    /// Time steps over the horizon
    pub steps: usize,
}

impl DemandParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.horizon_years.is_finite() && self.horizon_years >= 0.0) {
            return Err(DemandError::InvalidParameter { name: "T", value: self.horizon_years });
        }
        if !(self.growth_rate.is_finite() && self.growth_rate > -1.0) {
            return Err(DemandError::InvalidParameter { name: "μ", value: self.growth_rate });
        }
        if !(self.start.is_finite() && self.start > 0.0) {
            return Err(DemandError::InvalidParameter { name: "start", value: self.start });
        }
        Ok(())
    }

    /// Step length (years); zero when there are no steps
    pub fn dt(&self) -> f64 {
        if self.steps == 0 {
            0.0
        } else {
            self.horizon_years / self.steps as f64
        }
    }
}

/// Deterministic geometric growth, `steps + 1` values starting at `start`
pub fn deterministic(params: &DemandParams) -> Vec<f64> {
    let step_rate = (1.0 + params.growth_rate).powf(params.dt()) - 1.0;

    let mut path = Vec::with_capacity(params.steps + 1);
    let mut value = params.start;
    path.push(value);
    for _ in 0..params.steps {
        value *= 1.0 + step_rate;
        path.push(value);
    }
    path
}

/// Binomial lattice step factors and up-move probability
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lattice {
    pub up: f64,
    pub down: f64,
    pub p_up: f64,
}

impl Lattice {
    pub fn new(growth_rate: f64, volatility: f64, dt: f64) -> Self {
        let up = (volatility * dt.sqrt()).exp();
        let down = 1.0 / up;
        let p_up = if (up - down).abs() < f64::EPSILON {
            1.0
        } else {
            (((growth_rate * dt).exp() - down) / (up - down)).clamp(0.0, 1.0)
        };
        Self { up, down, p_up }
    }
}

/// Generate `count` stochastic paths, rescaled to the deterministic mean
pub fn stochastic<R: Rng + ?Sized>(
    params: &DemandParams,
    volatility: f64,
    count: usize,
    rng: &mut R,
) -> Result<Vec<Vec<f64>>> {
    params.validate()?;
    if count == 0 {
        return Err(DemandError::NoScenarios);
    }
    if !volatility.is_finite() {
        return Err(DemandError::InvalidParameter { name: "σ", value: volatility });
    }

    let lattice = Lattice::new(params.growth_rate, volatility, params.dt());
    let mut paths = Vec::with_capacity(count);
    for _ in 0..count {
        let mut path = Vec::with_capacity(params.steps + 1);
        let mut value = params.start;
        path.push(value);
        for _ in 0..params.steps {
            value *= if rng.gen::<f64>() <= lattice.p_up { lattice.up } else { lattice.down };
            path.push(value);
        }
        paths.push(path);
    }

    let det_final = deterministic(params).last().copied().unwrap_or(params.start);
    let mean_final = paths.iter().filter_map(|p| p.last()).sum::<f64>() / count as f64;
    rescale(&mut paths, mean_final / det_final, params.steps);

    debug!(
        "Generated {} demand paths (u={:.5}, d={:.5}, p={:.4})",
        count, lattice.up, lattice.down, lattice.p_up
    );
    Ok(paths)
}

/// Blend each path towards the deterministic mean, linearly over time
pub fn rescale(paths: &mut [Vec<f64>], shift: f64, steps: usize) {
    if steps == 0 || !shift.is_finite() {
        return;
    }
    let excess = shift - 1.0;
    for path in paths.iter_mut() {
        for (idx, value) in path.iter_mut().enumerate() {
            *value /= 1.0 + excess * (idx as f64 / steps as f64);
        }
    }
}

/// Map user volatility so that σ = 0 gives a (nearly) deterministic lattice.
///
/// The lattice only tracks the deterministic path closely at σ ≈ 0.1·μ/μ₀, so
/// low inputs are compressed onto `[floor, threshold)` while inputs at or
/// above the threshold pass through unchanged. Monotonic and continuous.
pub fn scale_volatility(sigma: f64, growth_rate: f64) -> f64 {
    let relative = growth_rate / REFERENCE_GROWTH_RATE;
    let floor = 0.1 * relative;
    let threshold = 0.2 * relative;

    if sigma < 0.0 {
        floor
    } else if sigma < threshold {
        sigma / 2.0 + floor
    } else {
        sigma
    }
}

/// Smallest and largest final demand across paths
pub fn final_range(paths: &[Vec<f64>]) -> Option<(f64, f64)> {
    let finals: Vec<f64> = paths.iter().filter_map(|p| p.last().copied()).collect();
    if finals.is_empty() {
        return None;
    }
    let min = finals.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = finals.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    Some((min, max))
}

/// Deterministic path plus the stochastic scenario set of one simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandScenarios {
    pub deterministic: Vec<f64>,
    pub paths: Vec<Vec<f64>>,
}

impl DemandScenarios {
    /// Build the scenario set. `sigma` is the user-facing volatility; it is
    /// scaled internally. `sigma == 0` collapses to a single path.
    pub fn generate<R: Rng + ?Sized>(
        params: &DemandParams,
        sigma: f64,
        count: usize,
        rng: &mut R,
    ) -> Result<Self> {
        params.validate()?;
        let count = if sigma == 0.0 { 1 } else { count };
        let volatility = scale_volatility(sigma, params.growth_rate);
        Ok(Self {
            deterministic: deterministic(params),
            paths: stochastic(params, volatility, count, rng)?,
        })
    }

    /// Scenarios that are exactly the deterministic path
    pub fn deterministic_only(params: &DemandParams) -> Result<Self> {
        params.validate()?;
        let path = deterministic(params);
        Ok(Self {
            paths: vec![path.clone()],
            deterministic: path,
        })
    }

    pub fn expected_final(&self) -> f64 {
        self.deterministic.last().copied().unwrap_or_default()
    }

    pub fn final_range(&self) -> Option<(f64, f64)> {
        final_range(&self.paths)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
