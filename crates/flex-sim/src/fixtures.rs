//! Shared test fixtures

use crate::architecture::{ArchitectureBuilder, ArchitectureFamily, Configuration};
use crate::config::SimulationInputs;
use crate::engine::Simulation;
use crate::pareto::pareto_front;
use constellation_models::{IslTopology, LccComponents, SatelliteDesign};
use demand_model::DemandScenarios;
use tradespace::Tradespace;

/// D=2, P=800, f=15, Mesh over a = 400|50|1600, e = 15|15|60
pub fn reference_family() -> ArchitectureFamily {
    let design = SatelliteDesign::new(2.0, 800.0, 15.0, IslTopology::Mesh).unwrap();
    let orbits = Tradespace::parse([("a", "400|50|1600"), ("e", "15|15|60")])
        .unwrap()
        .enumerate();
    ArchitectureBuilder::new().build_family(design, &orbits).unwrap()
}

/// Simulation over the single deterministic demand path
pub fn deterministic_simulation(inputs: SimulationInputs) -> Simulation {
    let demand = DemandScenarios::deterministic_only(&inputs.constants.demand_params()).unwrap();
    Simulation::with_scenarios(inputs, demand).unwrap()
}

/// Reference family priced with the fixed strategy at r = 0.55
pub fn priced_reference_family() -> ArchitectureFamily {
    let sim = deterministic_simulation(SimulationInputs::default());
    sim.run_fixed(std::slice::from_ref(&reference_family()))
        .remove(0)
}

/// Pareto-optimal configurations of the priced reference family
pub fn pareto_reference_family() -> ArchitectureFamily {
    let family = priced_reference_family();
    family.with_configs(pareto_front(&family.configs))
}

fn zero_costs() -> LccComponents {
    LccComponents {
        launch: 0.0,
        production: 0.0,
        development: 0.0,
        operations: 0.0,
        reconfiguration: 0.0,
    }
}

/// Configuration with a given capacity and ranking cost
pub fn config(cap: f64, cost: f64) -> Configuration {
    Configuration {
        e: 15.0,
        a: 500.0,
        n: 10,
        cap,
        costs: zero_costs(),
        lcc: Some(cost),
    }
}

/// Configuration with a given altitude and capacity
pub fn config_at(a: f64, cap: f64) -> Configuration {
    Configuration {
        e: 15.0,
        a,
        n: 10,
        cap,
        costs: zero_costs(),
        lcc: None,
    }
}
