//! Property tests over parsing, geometry, demand, Pareto filtering, planning
//! and discounting

use constellation_models::geometry::{path_distance_km, satellite_count};
use demand_model::DemandScenarios;
use flex_sim::evolution::plan_evolution;
use flex_sim::pareto::pareto_front;
use flex_sim::{ArchitectureBuilder, ArchitectureFamily, Evolution, FlexStrategy, PlanError, Simulation, SimulationInputs};
use fuzz_harness::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use tradespace::{parse_range, Tradespace};

const START: f64 = 50_000.0;
const CAP_MAX: f64 = 15e6;

fn build(design: constellation_models::SatelliteDesign) -> ArchitectureFamily {
    let orbits = Tradespace::parse([("a", "400|100|1600"), ("e", "15|15|60")])
        .unwrap()
        .enumerate();
    ArchitectureBuilder::new().build_family(design, &orbits).unwrap()
}

proptest! {
    #![proptest_config(FuzzConfig::new().cases(64).to_proptest_config())]

    #[test]
    fn continuous_ranges_expand_to_whole_increments(case in continuous_range()) {
        let range = parse_range(&case.text).unwrap();
        prop_assert_eq!(range.len(), case.count);
    }

    #[test]
    fn ragged_ranges_stop_before_end(case in ragged_range()) {
        let range = parse_range(&case.text).unwrap();
        prop_assert_eq!(range.len(), case.count);
    }

    #[test]
    fn discrete_lists_keep_every_value(case in discrete_numbers()) {
        let range = parse_range(&case.text).unwrap();
        prop_assert_eq!(range.len(), case.count);
    }

    #[test]
    fn malformed_ranges_are_rejected(text in malformed_range()) {
        prop_assert!(parse_range(&text).is_err());
    }
}

proptest! {
    #![proptest_config(FuzzConfig::new().cases(64).to_proptest_config())]

    #[test]
    fn covered_orbits_need_satellites((e, a) in orbit()) {
        prop_assert!(satellite_count(e, a).unwrap() > 0);
        prop_assert!(path_distance_km(e, a).unwrap() >= a);
    }

    #[test]
    fn demand_paths_start_together_and_match_expected_final(
        params in demand_params(),
        sigma in volatility(),
        seed in any::<u64>(),
    ) {
        let demand = DemandScenarios::generate(&params, sigma, 4, &mut StdRng::seed_from_u64(seed)).unwrap();
        prop_assert_eq!(demand.len(), if sigma == 0.0 { 1 } else { 4 });
        prop_assert_eq!(demand.deterministic.len(), params.steps + 1);
        prop_assert!(demand.deterministic.windows(2).all(|w| w[1] >= w[0]));

        for path in &demand.paths {
            prop_assert_eq!(path.len(), params.steps + 1);
            prop_assert_eq!(path[0], params.start);
        }

        let mean_final = demand.paths.iter().map(|p| p[params.steps]).sum::<f64>() / demand.len() as f64;
        let expected = demand.expected_final();
        prop_assert!((mean_final - expected).abs() <= 1e-9 * expected);
    }
}

proptest! {
    #![proptest_config(FuzzConfig::new().cases(24).to_proptest_config())]

    #[test]
    fn pareto_front_is_idempotent_and_monotonic(design in satellite_design()) {
        let family = build(design);
        let front = pareto_front(&family.configs);
        prop_assert!(!front.is_empty() || family.configs.is_empty());
        prop_assert_eq!(pareto_front(&front), front.clone());
        for pair in front.windows(2) {
            prop_assert!(pair[0].cost() <= pair[1].cost());
            prop_assert!(pair[0].cap <= pair[1].cap);
        }
    }

    #[test]
    fn successful_plans_reach_peak_on_distinct_altitudes(
        design in satellite_design(),
        (jump, layers) in flex_strategy(),
    ) {
        let family = build(design);
        let front = pareto_front(&family.configs);
        let strategy = FlexStrategy::new(jump, layers).unwrap();

        let plan = plan_evolution(&front, strategy, START, CAP_MAX);
        prop_assume!(plan.is_ok());
        let plan = plan.unwrap();

        prop_assert!(plan.capacity >= CAP_MAX);
        prop_assert!(plan.layers.len() <= layers);

        let altitudes: HashSet<u64> = plan.layers.iter().map(|&i| front[i].a.to_bits()).collect();
        prop_assert_eq!(altitudes.len(), plan.layers.len());

        for event in &plan.events {
            if let Evolution::Reconfigure { from, to, .. } = event {
                prop_assert!(to > from);
            }
        }
    }

    #[test]
    fn stalled_plans_stop_short_and_drop_the_family(
        design in satellite_design(),
        (jump, layers) in flex_strategy(),
    ) {
        let family = build(design);
        let front = family.with_configs(pareto_front(&family.configs));
        prop_assume!(!front.configs.is_empty());
        let strategy = FlexStrategy::new(jump, layers).unwrap();

        match plan_evolution(&front.configs, strategy, START, CAP_MAX) {
            Ok(_) => {}
            Err(PlanError::Stalled { layers: used, capacity }) => {
                prop_assert!(capacity < CAP_MAX);
                prop_assert!(used >= 1 && used <= layers);

                let inputs = SimulationInputs::default();
                let demand = DemandScenarios::deterministic_only(&inputs.constants.demand_params()).unwrap();
                let mut sim = Simulation::with_scenarios(inputs, demand).unwrap();
                prop_assert!(sim.run_flexible(std::slice::from_ref(&front), strategy).is_none());
            }
            Err(err) => prop_assert!(false, "unexpected plan error: {}", err),
        }
    }

    #[test]
    fn discount_factors_decrease(r in discount_rate()) {
        prop_assume!(r > 0.0);
        let inputs = SimulationInputs { r, ..SimulationInputs::default() };
        let demand = DemandScenarios::deterministic_only(&inputs.constants.demand_params()).unwrap();
        let sim = Simulation::with_scenarios(inputs, demand).unwrap();

        prop_assert_eq!(sim.discount()[0], 1.0);
        for pair in sim.discount().windows(2) {
            prop_assert!(pair[1] < pair[0]);
        }
    }
}

#[test]
fn seeded_simulations_are_reproducible() {
    let inputs = SimulationInputs { scenarios: 5, ..SimulationInputs::default() };
    let mut runner = FuzzRunner::new(FuzzConfig::new().cases(8).seed(100));

    let result = runner.run("seeded_simulation", |seed| {
        let a = Simulation::new(inputs, &mut StdRng::seed_from_u64(seed)).map_err(|e| e.to_string())?;
        let b = Simulation::new(inputs, &mut StdRng::seed_from_u64(seed)).map_err(|e| e.to_string())?;

        if a.demand().paths != b.demand().paths {
            return Err("demand paths differ".to_string());
        }
        if a.test_scenario() != b.test_scenario() {
            return Err("test scenario differs".to_string());
        }
        if a.test_scenario() >= a.demand().len() {
            return Err(format!("test scenario {} out of range", a.test_scenario()));
        }
        Ok(())
    });

    assert!(result.passed, "{:?}", result.failures);
    assert_eq!(result.cases_run, 8);
}
