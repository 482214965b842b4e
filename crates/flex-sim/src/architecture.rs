//! Architecture families and configurations
//!
//! A family fixes the satellite design (D, P, f, I). Its configurations vary
//! the orbit (altitude a, minimum elevation e), which sets the satellite
//! count, capacity and cost.

use crate::config::number;
use crate::{Result, SimError};
use constellation_models::capacity::size_configuration;
use constellation_models::cost::{
    inflated_costs, lcc_components, production_cost_source, recurring_costs,
};
use constellation_models::{
    CostComponent, CostTable, IslTopology, LccComponents, LearningCurve, Masses, SatelliteDesign,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tradespace::{ParameterVector, Tradespace};

/// One orbit choice within a family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Minimum elevation (deg)
    pub e: f64,
    /// Altitude (km)
    pub a: f64,
    /// Satellites
    pub n: u32,
    /// Capacity (channels)
    pub cap: f64,
    pub costs: LccComponents,
    /// Fixed-strategy life-cycle cost, once priced
    #[serde(rename = "LCC", default, skip_serializing_if = "Option::is_none")]
    pub lcc: Option<f64>,
}

impl Configuration {
    /// Ranking cost: fixed-strategy LCC when priced, initial cost otherwise
    pub fn cost(&self) -> f64 {
        self.lcc.unwrap_or_else(|| self.costs.initial())
    }

    pub fn same_altitude(&self, other: &Configuration) -> bool {
        self.a == other.a
    }
}

/// Fixed design plus its configurations, sorted by capacity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureFamily {
    #[serde(flatten)]
    pub design: SatelliteDesign,
    pub masses: Masses,
    /// Component costs, FY2021 $K
    pub inflated: CostTable,
    /// Recurring share of each component before the learning curve
    pub recurring: CostTable,
    /// Per-unit production cost before the learning curve
    #[serde(rename = "prodCostSrc")]
    pub production_source: f64,
    #[serde(rename = "cfgs")]
    pub configs: Vec<Configuration>,
}

impl ArchitectureFamily {
    /// Largest capacity any single configuration reaches
    pub fn max_capacity(&self) -> f64 {
        self.configs.iter().map(|c| c.cap).fold(0.0, f64::max)
    }

    /// Yearly operations cost multiplier for the LOOS component
    pub fn operations_source(&self) -> f64 {
        self.recurring[CostComponent::Loos]
    }

    pub fn same_design(&self, other: &SatelliteDesign) -> bool {
        self.design == *other
    }

    /// Copy of the family with different configurations
    pub fn with_configs(&self, configs: Vec<Configuration>) -> Self {
        Self {
            design: self.design,
            masses: self.masses,
            inflated: self.inflated,
            recurring: self.recurring,
            production_source: self.production_source,
            configs,
        }
    }
}

/// Builds families from the (D, P, f, I) × (a, e) tradespace
#[derive(Debug, Default)]
pub struct ArchitectureBuilder {
    curve: LearningCurve,
    skipped: usize,
}

impl ArchitectureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_curve(curve: LearningCurve) -> Self {
        Self { curve, skipped: 0 }
    }

    /// Configurations dropped for invalid geometry so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Build every family; configurations with no valid geometry are skipped
    pub fn build(
        &mut self,
        families: &Tradespace,
        configurations: &Tradespace,
    ) -> Result<Vec<ArchitectureFamily>> {
        let designs = families.enumerate();
        let orbits = configurations.enumerate();
        info!(
            "Building {} families x {} configurations",
            designs.len(),
            orbits.len()
        );

        let mut out = Vec::with_capacity(designs.len());
        for vector in &designs {
            let design = design_from_vector(vector)?;
            let family = self.build_family(design, &orbits)?;
            if family.configs.is_empty() {
                debug!("Family {:?} has no valid configurations, skipping", design);
                continue;
            }
            out.push(family);
        }

        if out.is_empty() {
            return Err(SimError::NoArchitectures);
        }
        info!(
            "Built {} families ({} configurations skipped)",
            out.len(),
            self.skipped
        );
        Ok(out)
    }

    /// Price all orbit choices for one satellite design
    pub fn build_family(
        &mut self,
        design: SatelliteDesign,
        orbits: &[ParameterVector],
    ) -> Result<ArchitectureFamily> {
        let masses = Masses::estimate(design.diameter_m, design.power_w, design.isl);
        let inflated = inflated_costs(&masses);
        let recurring = recurring_costs(&inflated);
        let production_source = production_cost_source(&recurring);

        let mut configs = Vec::with_capacity(orbits.len());
        for orbit in orbits {
            let a = number(orbit, "a")?;
            let e = number(orbit, "e")?;

            let (n, cap) = match size_configuration(&design, e, a) {
                Ok(sized) => sized,
                Err(err) => {
                    debug!("Skipping configuration a={} e={}: {}", a, e, err);
                    self.skipped += 1;
                    continue;
                }
            };

            configs.push(Configuration {
                e,
                a,
                n,
                cap: cap.round(),
                costs: lcc_components(&inflated, masses.total_kg, n, &mut self.curve),
                lcc: None,
            });
        }
        configs.sort_by(|x, y| x.cap.total_cmp(&y.cap));

        Ok(ArchitectureFamily {
            design,
            masses,
            inflated,
            recurring,
            production_source,
            configs,
        })
    }
}

fn design_from_vector(vector: &ParameterVector) -> Result<SatelliteDesign> {
    let isl_raw = vector
        .text("I")
        .ok_or_else(|| SimError::MissingParameter("I".to_string()))?;
    let isl: IslTopology = isl_raw.parse()?;
    Ok(SatelliteDesign::new(
        number(vector, "D")?,
        number(vector, "P")?,
        number(vector, "f")?,
        isl,
    )?)
}

/// Total number of configurations across families
pub fn count_configurations(families: &[ArchitectureFamily]) -> usize {
    families.iter().map(|f| f.configs.len()).sum()
}

/// Capacity and cost extents across every configuration, for chart axes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boundaries {
    pub min_cap: f64,
    pub max_cap: f64,
    pub min_cost: f64,
    pub max_cost: f64,
}

pub fn boundaries(families: &[ArchitectureFamily]) -> Option<Boundaries> {
    let mut configs = families.iter().flat_map(|f| f.configs.iter()).peekable();
    configs.peek()?;

    let mut b = Boundaries {
        min_cap: f64::INFINITY,
        max_cap: f64::NEG_INFINITY,
        min_cost: f64::INFINITY,
        max_cost: f64::NEG_INFINITY,
    };
    for c in configs {
        b.min_cap = b.min_cap.min(c.cap);
        b.max_cap = b.max_cap.max(c.cap);
        b.min_cost = b.min_cost.min(c.cost());
        b.max_cost = b.max_cost.max(c.cost());
    }
    Some(b)
}
