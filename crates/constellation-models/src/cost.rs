//! Parametric Cost Model
//!
//! Subsystem masses scale from a Starlink-class reference satellite; costs
//! come from SSCM-style cost estimating relationships (CERs) in FY2010 $K,
//! inflated to FY2021. Each component cost is split into a non-recurring
//! part (paid once) and a recurring part (paid per unit, discounted by a
//! learning curve).
//!
//! Life-cycle cost components:
//!
//! | Key | Meaning |
//! |-----|---------|
//! | LC  | Launch cost (Falcon 9 class, whole launches) |
//! | PC  | Production cost (recurring hardware) |
//! | IDC | Initial development cost (all non-recurring) |
//! | OC  | Operations cost per year |
//! | RC  | Reconfiguration cost (propellant) |

use crate::IslTopology;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Index;

/// Reference satellite
const REF_DRY_MASS_KG: f64 = 260.0;
const REF_POWER_W: f64 = 2089.0;
const REF_DIAMETER_M: f64 = 3.5;
const INSTRUMENT_MASS_FRACTION: f64 = 0.3;
const DRY_MASS_FRACTION: f64 = 0.95;

/// FY2010 -> FY2021
pub const INFLATION_FACTOR: f64 = 1.231;

/// Default learning curve slope
pub const LEARNING_SLOPE: f64 = 0.85;

/// Falcon 9 payload to LEO (kg) and price ($K)
const LAUNCH_CAPACITY_KG: f64 = 15_600.0;
const LAUNCH_PRICE: f64 = 28_000.0;

/// Propellant cost multiple used to price a reconfiguration
const RECONFIGURATION_MULTIPLE: f64 = 10.0;

/// SSCM cost components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CostComponent {
    Bus,
    Structure,
    Thermal,
    Adcs,
    Eps,
    Propulsion,
    Ttc,
    Cdh,
    Payload,
    Iat,
    ProgramLevel,
    Loos,
    Gse,
}

impl CostComponent {
    pub const ALL: [CostComponent; 13] = [
        Self::Bus,
        Self::Structure,
        Self::Thermal,
        Self::Adcs,
        Self::Eps,
        Self::Propulsion,
        Self::Ttc,
        Self::Cdh,
        Self::Payload,
        Self::Iat,
        Self::ProgramLevel,
        Self::Loos,
        Self::Gse,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Recurring share of the component cost
    pub fn recurring_ratio(self) -> f64 {
        match self {
            Self::Bus => 0.4,
            Self::Structure => 0.3,
            Self::Thermal => 0.5,
            Self::Adcs => 0.63,
            Self::Eps => 0.38,
            Self::Propulsion => 0.5,
            Self::Ttc => 0.29,
            Self::Cdh => 0.29,
            Self::Payload => 0.4,
            Self::Iat => 1.0,
            Self::ProgramLevel => 0.5,
            Self::Loos => 1.0,
            Self::Gse => 0.0,
        }
    }
}

/// Components whose recurring cost is hardware production
pub const PRODUCTION_COMPONENTS: [CostComponent; 9] = [
    CostComponent::Bus,
    CostComponent::Structure,
    CostComponent::Thermal,
    CostComponent::Adcs,
    CostComponent::Ttc,
    CostComponent::Cdh,
    CostComponent::Payload,
    CostComponent::Iat,
    CostComponent::ProgramLevel,
];

/// One value per cost component ($K)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostTable([f64; 13]);

impl CostTable {
    pub fn from_fn(mut f: impl FnMut(CostComponent) -> f64) -> Self {
        let mut values = [0.0; 13];
        for c in CostComponent::ALL {
            values[c.index()] = f(c);
        }
        Self(values)
    }

    pub fn get(&self, component: CostComponent) -> f64 {
        self.0[component.index()]
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn sum_of(&self, components: &[CostComponent]) -> f64 {
        components.iter().map(|c| self.get(*c)).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CostComponent, f64)> + '_ {
        CostComponent::ALL.iter().map(move |c| (*c, self.get(*c)))
    }
}

impl Index<CostComponent> for CostTable {
    type Output = f64;

    fn index(&self, component: CostComponent) -> &f64 {
        &self.0[component.index()]
    }
}

/// Mass breakdown of one satellite (kg)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Masses {
    pub total_kg: f64,
    pub dry_kg: f64,
    pub bus_kg: f64,
    pub structure_kg: f64,
    pub thermal_kg: f64,
    pub adcs_kg: f64,
    pub eps_kg: f64,
    pub ttc_kg: f64,
    pub cdh_kg: f64,
}

impl Masses {
    /// Scale the reference satellite by power, antenna size and ISL payload
    pub fn estimate(diameter_m: f64, power_w: f64, isl: IslTopology) -> Self {
        let dry = REF_DRY_MASS_KG
            * ((1.0 - INSTRUMENT_MASS_FRACTION) + INSTRUMENT_MASS_FRACTION * power_w / REF_POWER_W)
            * (diameter_m / REF_DIAMETER_M).powi(2)
            * isl.mass_factor();

        Self {
            total_kg: dry / DRY_MASS_FRACTION,
            dry_kg: dry,
            bus_kg: dry * 0.7,
            structure_kg: dry * 0.2,
            thermal_kg: dry * 0.04,
            adcs_kg: dry * 0.1,
            eps_kg: dry * 0.15,
            ttc_kg: dry * 0.01,
            cdh_kg: dry * 0.05,
        }
    }
}

/// CER outputs in FY2010 $K
fn cer(component: CostComponent, m: &Masses) -> f64 {
    match component {
        CostComponent::Bus => 1064.0 + 35.5 * m.bus_kg.powf(1.261),
        CostComponent::Structure => 407.0 + 19.3 * m.structure_kg * m.structure_kg.ln(),
        CostComponent::Thermal => 335.0 + 5.7 * m.thermal_kg.powi(2),
        CostComponent::Adcs => 1850.0 + 11.7 * m.adcs_kg.powi(2),
        CostComponent::Eps => 1261.0 + 539.0 * m.eps_kg.powf(0.72),
        CostComponent::Propulsion => 89.0 + 3.0 * m.bus_kg.powf(1.261),
        CostComponent::Ttc => 486.0 + 55.5 * m.ttc_kg.powf(1.35),
        CostComponent::Cdh => 658.0 + 75.0 * m.cdh_kg.powf(1.35),
        CostComponent::Payload => 0.4 * m.bus_kg,
        CostComponent::Iat => 0.139 * m.bus_kg,
        CostComponent::ProgramLevel => 0.229 * m.bus_kg,
        CostComponent::Loos => 0.061 * m.bus_kg,
        CostComponent::Gse => 0.066 * m.bus_kg,
    }
}

/// Component costs inflated to FY2021 $K
pub fn inflated_costs(masses: &Masses) -> CostTable {
    CostTable::from_fn(|c| cer(c, masses) * INFLATION_FACTOR)
}

/// Recurring share of each component, before the learning curve
pub fn recurring_costs(inflated: &CostTable) -> CostTable {
    CostTable::from_fn(|c| inflated[c] * c.recurring_ratio())
}

/// Per-unit production cost before the learning curve
pub fn production_cost_source(recurring: &CostTable) -> f64 {
    recurring.sum_of(&PRODUCTION_COMPONENTS)
}

/// Whole launches needed to lift `n` satellites ($K)
pub fn launch_cost(total_mass_kg: f64, n: u32) -> f64 {
    (total_mass_kg * f64::from(n) / LAUNCH_CAPACITY_KG).ceil() * LAUNCH_PRICE
}

/// Wright learning curve exponent for a given slope
pub fn learning_exponent(slope: f64) -> f64 {
    1.0 - (1.0 / slope).ln() / 2f64.ln()
}

/// Memoized learning-curve factor `n^b`
///
/// Owned by whoever runs a batch of evaluations; never shared globally.
#[derive(Debug, Clone)]
pub struct LearningCurve {
    exponent: f64,
    cache: HashMap<u32, f64>,
}

impl Default for LearningCurve {
    fn default() -> Self {
        Self::with_slope(LEARNING_SLOPE)
    }
}

impl LearningCurve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slope(slope: f64) -> Self {
        Self {
            exponent: learning_exponent(slope),
            cache: HashMap::new(),
        }
    }

    pub fn exponent(&self) -> f64 {
        self.exponent
    }

    /// Cumulative cost multiplier for building `n` units
    pub fn factor(&mut self, n: u32) -> f64 {
        let exponent = self.exponent;
        *self
            .cache
            .entry(n)
            .or_insert_with(|| f64::from(n).powf(exponent))
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

/// Life-cycle cost components of one configuration ($K)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LccComponents {
    #[serde(rename = "LC")]
    pub launch: f64,
    #[serde(rename = "PC")]
    pub production: f64,
    #[serde(rename = "IDC")]
    pub development: f64,
    #[serde(rename = "OC")]
    pub operations: f64,
    #[serde(rename = "RC")]
    pub reconfiguration: f64,
}

impl LccComponents {
    /// Cost to field the constellation: IDC + PC + LC
    pub fn initial(&self) -> f64 {
        self.development + self.production + self.launch
    }
}

/// Price a configuration of `n` satellites
pub fn lcc_components(
    inflated: &CostTable,
    total_mass_kg: f64,
    n: u32,
    curve: &mut LearningCurve,
) -> LccComponents {
    let learning = curve.factor(n);
    let recurring = CostTable::from_fn(|c| inflated[c] * c.recurring_ratio() * learning);
    let non_recurring = CostTable::from_fn(|c| inflated[c] * (1.0 - c.recurring_ratio()));

    LccComponents {
        launch: launch_cost(total_mass_kg, n),
        production: recurring.sum_of(&PRODUCTION_COMPONENTS),
        development: non_recurring.total(),
        operations: recurring[CostComponent::Loos],
        reconfiguration: recurring[CostComponent::Propulsion] * RECONFIGURATION_MULTIPLE,
    }
}
