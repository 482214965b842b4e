//! Life-cycle cost simulation of fixed and flexible deployments
//!
//! A [`Simulation`] is built for one scenario case (r, rec, σ, S). It owns the
//! demand scenarios, the discount factors and the learning-curve cache, so
//! nothing is shared between cases.

use crate::architecture::ArchitectureFamily;
use crate::config::SimulationInputs;
use crate::evolution::{plan_evolution, Evolution, EvolutionPlan, FlexStrategy, PlanError};
use crate::{Result, SimError, StrategyResult, TraditionalResult};
use constellation_models::cost::launch_cost;
use constellation_models::LearningCurve;
use demand_model::DemandScenarios;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Position of one deployed layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerPosition {
    pub e: f64,
    pub a: f64,
}

/// Step-by-step replay of one strategy against one demand scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayTrace {
    pub demand: Vec<f64>,
    /// Total capacity at the start of each step
    pub capacity: Vec<f64>,
    /// Discounted cost incurred at each step, rounded; index 0 is deployment
    pub cost: Vec<f64>,
    pub evolutions: Vec<Option<Evolution>>,
    pub layers: Vec<Vec<LayerPosition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<FlexStrategy>,
    #[serde(rename = "maxReconsPerSat", default)]
    pub max_reconfigurations_per_layer: usize,
}

impl ReplayTrace {
    /// Sum of the per-step discounted costs
    pub fn total_cost(&self) -> f64 {
        self.cost.iter().sum()
    }
}

/// Outcome of replaying one family's plan over every scenario
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FamilyOutcome {
    pub elcc: f64,
    pub avg_reconfigurations: f64,
    pub avg_new_layers: f64,
}

pub struct Simulation {
    inputs: SimulationInputs,
    demand: DemandScenarios,
    discount: Vec<f64>,
    curve: LearningCurve,
    test_scenario: usize,
}

impl Simulation {
    /// Generate demand scenarios for the case and pick a test scenario
    pub fn new<R: Rng + ?Sized>(inputs: SimulationInputs, rng: &mut R) -> Result<Self> {
        inputs.validate()?;
        let params = inputs.constants.demand_params();
        let demand = DemandScenarios::generate(&params, inputs.sigma, inputs.scenarios, rng)?;
        let test_scenario = rng.gen_range(0..demand.len().max(1));
        let mut sim = Self::with_scenarios(inputs, demand)?;
        sim.test_scenario = test_scenario;
        Ok(sim)
    }

    /// Use a prepared scenario set; the first path is the test scenario
    pub fn with_scenarios(inputs: SimulationInputs, demand: DemandScenarios) -> Result<Self> {
        inputs.validate()?;
        if demand.is_empty() {
            return Err(demand_model::DemandError::NoScenarios.into());
        }

        let steps = inputs.constants.steps;
        if let Some(path) = demand.paths.iter().find(|p| p.len() != steps + 1) {
            return Err(SimError::InvalidParameter {
                name: "demand".to_string(),
                value: format!("path of {} points, expected {}", path.len(), steps + 1),
            });
        }

        let dt = inputs.dt();
        let discount = (0..=steps)
            .map(|i| 1.0 / (1.0 + inputs.r).powf(dt * i as f64))
            .collect();

        Ok(Self {
            inputs,
            demand,
            discount,
            curve: LearningCurve::new(),
            test_scenario: 0,
        })
    }

    pub fn inputs(&self) -> &SimulationInputs {
        &self.inputs
    }

    pub fn demand(&self) -> &DemandScenarios {
        &self.demand
    }

    /// `1/(1+r)^(Δt·i)` for `i = 0..=steps`
    pub fn discount(&self) -> &[f64] {
        &self.discount
    }

    pub fn test_scenario(&self) -> usize {
        self.test_scenario
    }

    fn cap_max(&self) -> f64 {
        self.inputs.constants.cap_max
    }

    /// Price every configuration with the fixed strategy. Capacity order is kept.
    pub fn run_fixed(&self, families: &[ArchitectureFamily]) -> Vec<ArchitectureFamily> {
        let dt = self.inputs.dt();
        families
            .iter()
            .map(|family| {
                let configs = family
                    .configs
                    .iter()
                    .map(|config| {
                        let mut lcc = config.costs.initial();
                        let oc = config.costs.operations * dt;
                        for d in &self.discount[1..] {
                            lcc += oc * d;
                        }
                        let mut priced = config.clone();
                        priced.lcc = Some(lcc);
                        priced
                    })
                    .collect();
                family.with_configs(configs)
            })
            .collect()
    }

    /// Plan a family's evolution under this case's demand bounds
    pub fn plan(
        &self,
        family: &ArchitectureFamily,
        strategy: FlexStrategy,
    ) -> std::result::Result<EvolutionPlan, PlanError> {
        plan_evolution(
            &family.configs,
            strategy,
            self.inputs.constants.start,
            self.cap_max(),
        )
    }

    /// Cheapest family for a flexible strategy, or None when no family can
    /// reach peak demand
    pub fn run_flexible(
        &mut self,
        families: &[ArchitectureFamily],
        strategy: FlexStrategy,
    ) -> Option<StrategyResult> {
        let mut best: Option<StrategyResult> = None;

        for family in families {
            if family.max_capacity() < self.cap_max() {
                continue;
            }
            let plan = match self.plan(family, strategy) {
                Ok(plan) => plan,
                Err(err) => {
                    debug!("Skipping family {:?} for J={} Lm={}: {}", family.design, strategy.jump, strategy.max_layers, err);
                    continue;
                }
            };

            let outcome = self.evaluate(family, &plan, strategy);
            if best.as_ref().map_or(true, |b| outcome.elcc < b.elcc) {
                best = Some(StrategyResult {
                    elcc: outcome.elcc,
                    design: family.design,
                    strategy,
                    avg_new_layers: outcome.avg_new_layers,
                    avg_reconfigurations: outcome.avg_reconfigurations,
                });
            }
        }

        best
    }

    /// Replay a plan over every demand scenario
    pub fn evaluate(
        &mut self,
        family: &ArchitectureFamily,
        plan: &EvolutionPlan,
        strategy: FlexStrategy,
    ) -> FamilyOutcome {
        let scenarios = std::mem::take(&mut self.demand.paths);

        let mut total = 0.0;
        let mut reconfigurations = 0usize;
        let mut new_layers = 0usize;
        for path in &scenarios {
            let (lcc, r, n) = self.replay_lcc(family, plan, path);
            total += lcc;
            reconfigurations += r;
            new_layers += n;
        }

        let count = scenarios.len().max(1) as f64;
        self.demand.paths = scenarios;

        FamilyOutcome {
            elcc: total / count,
            avg_reconfigurations: reconfigurations as f64 / (count * strategy.max_layers as f64),
            avg_new_layers: new_layers as f64 / count,
        }
    }

    /// O&M cost of `n` satellites over one step
    fn operations_cost(&mut self, family: &ArchitectureFamily, n: u32) -> f64 {
        family.operations_source() * self.curve.factor(n) * self.inputs.dt()
    }

    /// Production, launch and reconfiguration reserve for `added` satellites
    fn evolution_cost(
        &mut self,
        family: &ArchitectureFamily,
        n: u32,
        added: u32,
        max_reconfigurations: usize,
    ) -> f64 {
        let production = family.production_source
            * (self.curve.factor(n + added) - self.curve.factor(n));
        production
            + launch_cost(family.masses.total_kg, added)
            + max_reconfigurations as f64 * production * self.inputs.reconfiguration_cost
    }

    fn start_cost(&self, family: &ArchitectureFamily, first: usize, max_reconfigurations: usize) -> f64 {
        let costs = &family.configs[first].costs;
        costs.initial() + max_reconfigurations as f64 * costs.production * self.inputs.reconfiguration_cost
    }

    /// Satellites an evolution adds, saturated at zero
    fn added_satellites(family: &ArchitectureFamily, event: &Evolution) -> u32 {
        let configs = &family.configs;
        match *event {
            Evolution::Init { config } | Evolution::NewLayer { config, .. } => configs[config].n,
            Evolution::Reconfigure { from, to, .. } => configs[to].n.saturating_sub(configs[from].n),
        }
    }

    fn apply(layers: &mut Vec<usize>, event: &Evolution) {
        match *event {
            Evolution::Init { config } => *layers = vec![config],
            Evolution::NewLayer { config, .. } => layers.push(config),
            Evolution::Reconfigure { layer, to, .. } => layers[layer] = to,
        }
    }

    fn totals(family: &ArchitectureFamily, layers: &[usize]) -> (f64, u32) {
        layers.iter().fold((0.0, 0), |(cap, n), &i| {
            (cap + family.configs[i].cap, n + family.configs[i].n)
        })
    }

    /// Discounted LCC of one scenario plus (reconfigurations, new layers) used
    fn replay_lcc(&mut self, family: &ArchitectureFamily, plan: &EvolutionPlan, path: &[f64]) -> (f64, usize, usize) {
        let Some(first) = plan.initial() else {
            return (0.0, 0, 0);
        };
        let max_recons = plan.max_reconfigurations_per_layer();
        let cap_max = self.cap_max();

        let mut layers = vec![first];
        let mut lcc = self.start_cost(family, first, max_recons);
        let (mut cap, mut n) = Self::totals(family, &layers);
        let mut events = plan.events.iter().skip(1);
        let mut prev = 1;
        let (mut reconfigurations, mut new_layers) = (0, 0);

        for t in 1..path.len() {
            if !(path[t] > cap && cap < cap_max) {
                continue;
            }
            // Demand above the final capacity plateaus
            let Some(event) = events.next() else { continue };

            let oc = self.operations_cost(family, n);
            for d in &self.discount[prev..t] {
                lcc += oc * d;
            }

            match event {
                Evolution::NewLayer { .. } => new_layers += 1,
                Evolution::Reconfigure { .. } => reconfigurations += 1,
                Evolution::Init { .. } => {}
            }
            let added = Self::added_satellites(family, event);
            let cost = self.evolution_cost(family, n, added, max_recons);
            Self::apply(&mut layers, event);

            lcc += (cost + oc) * self.discount[t];
            (cap, n) = Self::totals(family, &layers);
            prev = t + 1;
        }

        let oc = self.operations_cost(family, n);
        for d in self.discount.iter().skip(prev) {
            lcc += oc * d;
        }

        (lcc, reconfigurations, new_layers)
    }

    fn scenario(&self, scenario: Option<usize>) -> Result<Vec<f64>> {
        let index = scenario.unwrap_or(self.test_scenario);
        self.demand
            .paths
            .get(index)
            .cloned()
            .ok_or_else(|| SimError::InvalidParameter {
                name: "scenario".to_string(),
                value: index.to_string(),
            })
    }

    /// Step-by-step trace of a flexible strategy against one scenario
    /// (the test scenario when `scenario` is None)
    pub fn replay_flexible(
        &mut self,
        family: &ArchitectureFamily,
        strategy: FlexStrategy,
        scenario: Option<usize>,
    ) -> Result<ReplayTrace> {
        let demand = self.scenario(scenario)?;
        let plan = self.plan(family, strategy)?;
        let Some(first) = plan.initial() else {
            return Err(PlanError::EmptyFamily.into());
        };
        let max_recons = plan.max_reconfigurations_per_layer();
        let cap_max = self.cap_max();
        let steps = demand.len().saturating_sub(1);

        let mut layers = vec![first];
        let mut costs = Vec::with_capacity(steps + 1);
        costs.push(self.start_cost(family, first, max_recons));

        let mut trace = ReplayTrace {
            demand: Vec::new(),
            capacity: Vec::with_capacity(steps),
            cost: Vec::new(),
            evolutions: Vec::with_capacity(steps),
            layers: Vec::with_capacity(steps),
            strategy: Some(strategy),
            max_reconfigurations_per_layer: max_recons,
        };
        let mut events = plan.events.iter().skip(1);

        for t in 1..demand.len() {
            let (cap, n) = Self::totals(family, &layers);
            trace.capacity.push(cap);
            trace.layers.push(positions(family, &layers));

            let mut step = 0.0;
            let mut evolved = None;
            if cap < cap_max && demand[t] > cap {
                if let Some(event) = events.next() {
                    let added = Self::added_satellites(family, event);
                    step += self.evolution_cost(family, n, added, max_recons);
                    Self::apply(&mut layers, event);
                    evolved = Some(*event);
                }
            }
            trace.evolutions.push(evolved);

            let (_, n) = Self::totals(family, &layers);
            step += self.operations_cost(family, n);
            costs.push(step);
        }

        trace.cost = self.discounted(&costs);
        trace.demand = demand;
        Ok(trace)
    }

    /// Step-by-step trace of a fixed configuration against one scenario
    pub fn replay_fixed(
        &self,
        family: &ArchitectureFamily,
        config: usize,
        scenario: Option<usize>,
    ) -> Result<ReplayTrace> {
        let demand = self.scenario(scenario)?;
        let chosen = family.configs.get(config).ok_or_else(|| SimError::InvalidParameter {
            name: "config".to_string(),
            value: config.to_string(),
        })?;
        let steps = demand.len().saturating_sub(1);
        let oc = chosen.costs.operations * self.inputs.dt();

        let mut costs = Vec::with_capacity(steps + 1);
        costs.push(chosen.costs.initial());
        costs.extend(std::iter::repeat(oc).take(steps));

        Ok(ReplayTrace {
            capacity: vec![chosen.cap; steps],
            cost: self.discounted(&costs),
            evolutions: vec![None; steps],
            layers: vec![vec![LayerPosition { e: chosen.e, a: chosen.a }]; steps],
            demand,
            strategy: None,
            max_reconfigurations_per_layer: 0,
        })
    }

    fn discounted(&self, costs: &[f64]) -> Vec<f64> {
        costs
            .iter()
            .zip(&self.discount)
            .map(|(c, d)| (c * d).round())
            .collect()
    }
}

fn positions(family: &ArchitectureFamily, layers: &[usize]) -> Vec<LayerPosition> {
    layers
        .iter()
        .map(|&i| LayerPosition {
            e: family.configs[i].e,
            a: family.configs[i].a,
        })
        .collect()
}

/// Cheapest priced configuration meeting `cap_max`, or None
pub fn optimal_fixed(priced: &[ArchitectureFamily], cap_max: f64) -> Option<TraditionalResult> {
    let mut best: Option<TraditionalResult> = None;
    for family in priced {
        for config in family.configs.iter().filter(|c| c.cap >= cap_max) {
            let lcc = config.cost();
            if best.as_ref().map_or(true, |b| lcc < b.lcc) {
                best = Some(TraditionalResult {
                    lcc,
                    cap: config.cap,
                    design: family.design,
                    a: config.a,
                    e: config.e,
                    n: config.n,
                });
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architecture::ArchitectureBuilder;
    use crate::fixtures::{config_at, deterministic_simulation, pareto_reference_family, priced_reference_family, reference_family};
    use constellation_models::{IslTopology, SatelliteDesign};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tradespace::Tradespace;

    fn strategy(jump: f64, layers: usize) -> FlexStrategy {
        FlexStrategy::new(jump, layers).unwrap()
    }

    #[test]
    fn test_discount_strictly_decreasing() {
        let sim = deterministic_simulation(SimulationInputs::default());
        let d = sim.discount();
        assert_eq!(d.len(), 481);
        assert_eq!(d[0], 1.0);
        assert!(d.windows(2).all(|w| w[1] < w[0]));
    }

    #[test]
    fn test_zero_rate_no_discount() {
        let inputs = SimulationInputs { r: 0.0, ..SimulationInputs::default() };
        let sim = deterministic_simulation(inputs);
        assert!(sim.discount().iter().all(|&d| d == 1.0));
    }

    #[test]
    fn test_fixed_lcc_includes_discounted_operations() {
        let family = priced_reference_family();
        for config in &family.configs {
            let lcc = config.lcc.unwrap();
            assert!(lcc > config.costs.initial());
        }
        // Capacity order survives pricing
        assert!(family.configs.windows(2).all(|w| w[0].cap <= w[1].cap));
    }

    #[test]
    fn test_later_costs_cheaper() {
        let cheap = deterministic_simulation(SimulationInputs { r: 0.1, ..SimulationInputs::default() });
        let dear = deterministic_simulation(SimulationInputs { r: 0.0, ..SimulationInputs::default() });
        let family = reference_family();
        let a = cheap.run_fixed(std::slice::from_ref(&family));
        let b = dear.run_fixed(std::slice::from_ref(&family));
        assert!(a[0].configs[0].cost() < b[0].configs[0].cost());
    }

    #[test]
    fn test_optimal_fixed() {
        let family = priced_reference_family();
        let best = optimal_fixed(std::slice::from_ref(&family), 15e6).unwrap();
        assert!(best.cap >= 15e6);
        for config in family.configs.iter().filter(|c| c.cap >= 15e6) {
            assert!(best.lcc <= config.cost());
        }
        assert!(optimal_fixed(std::slice::from_ref(&family), 1e12).is_none());
    }

    #[test]
    fn test_flexible_reference_values() {
        let family = pareto_reference_family();
        let mut sim = deterministic_simulation(SimulationInputs::default());

        let cases = [
            (1.5, 1, 692_499.2, 9.0, 0.0),
            (1.5, 2, 513_412.25, 4.0, 1.0),
            (2.0, 2, 470_007.6, 2.5, 1.0),
            (1.5, 3, 481_272.2, 7.0 / 3.0, 2.0),
        ];
        for (jump, layers, elcc, avg_r, avg_n) in cases {
            let result = sim
                .run_flexible(std::slice::from_ref(&family), strategy(jump, layers))
                .unwrap();
            assert!((result.elcc - elcc).abs() < 0.01, "J={} Lm={}: {}", jump, layers, result.elcc);
            assert!((result.avg_reconfigurations - avg_r).abs() < 1e-9);
            assert_eq!(result.avg_new_layers, avg_n);
        }
    }

    #[test]
    fn test_no_evolution_matches_fixed() {
        let design = SatelliteDesign::new(2.0, 800.0, 15.0, IslTopology::Mesh).unwrap();
        let orbits = Tradespace::parse([("a", "1000"), ("e", "15")]).unwrap().enumerate();
        let family = ArchitectureBuilder::new().build_family(design, &orbits).unwrap();

        let mut inputs = SimulationInputs { r: 0.1, ..SimulationInputs::default() };
        inputs.constants.cap_max = 1_000.0;
        let mut sim = deterministic_simulation(inputs);

        let priced = sim.run_fixed(std::slice::from_ref(&family));
        let fixed = priced[0].configs[0].cost();
        let flex = sim
            .run_flexible(std::slice::from_ref(&family), strategy(1.5, 2))
            .unwrap();

        assert!((fixed - 268_600.871_451_715).abs() < 1e-6);
        assert!((flex.elcc - fixed).abs() < 1e-6);
        assert_eq!(flex.avg_reconfigurations, 0.0);
        assert_eq!(flex.avg_new_layers, 0.0);
    }

    #[test]
    fn test_family_below_peak_skipped() {
        let mut inputs = SimulationInputs::default();
        inputs.constants.cap_max = 1e12;
        let mut sim = deterministic_simulation(inputs);
        let family = pareto_reference_family();
        assert!(sim.run_flexible(std::slice::from_ref(&family), strategy(1.5, 2)).is_none());
    }

    #[test]
    fn test_stalled_family_skipped() {
        // One altitude only, so no second layer can be added
        let family = reference_family().with_configs(vec![config_at(400.0, 1e6), config_at(400.0, 2e7)]);
        let mut sim = deterministic_simulation(SimulationInputs::default());
        assert!(family.max_capacity() >= sim.cap_max());

        let err = sim.plan(&family, strategy(2.0, 2)).unwrap_err();
        assert_eq!(err, PlanError::Stalled { layers: 1, capacity: 1e6 });
        assert!(sim.run_flexible(std::slice::from_ref(&family), strategy(2.0, 2)).is_none());
    }

    #[test]
    fn test_replay_flexible_trace() {
        let family = pareto_reference_family();
        let mut sim = deterministic_simulation(SimulationInputs::default());
        let trace = sim.replay_flexible(&family, strategy(1.5, 2), None).unwrap();

        assert_eq!(trace.demand.len(), 481);
        assert_eq!(trace.capacity.len(), 480);
        assert_eq!(trace.layers.len(), 480);
        assert_eq!(trace.evolutions.len(), 480);
        assert_eq!(trace.cost.len(), 481);
        assert_eq!(trace.evolutions.iter().flatten().count(), 9);
        assert_eq!(trace.max_reconfigurations_per_layer, 4);
        assert!(trace.capacity.windows(2).all(|w| w[0] <= w[1]));
        assert!(trace.cost.iter().all(|c| c.fract() == 0.0));

        let first = &family.configs[0].costs;
        let start = first.initial() + 4.0 * first.production * 0.2;
        assert_eq!(trace.cost[0], start.round());
    }

    #[test]
    fn test_replay_fixed_trace() {
        let family = priced_reference_family();
        let sim = deterministic_simulation(SimulationInputs::default());
        let trace = sim.replay_fixed(&family, 3, None).unwrap();

        assert_eq!(trace.capacity.len(), 480);
        assert!(trace.capacity.iter().all(|&c| c == family.configs[3].cap));
        assert!(trace.evolutions.iter().all(Option::is_none));
        assert_eq!(trace.cost[0], family.configs[3].costs.initial().round());
        assert!((trace.total_cost() - family.configs[3].cost()).abs() < 481.0);
        assert!(sim.replay_fixed(&family, 10_000, None).is_err());
    }

    #[test]
    fn test_seeded_simulation_reproducible() {
        let inputs = SimulationInputs { scenarios: 5, ..SimulationInputs::default() };
        let a = Simulation::new(inputs, &mut StdRng::seed_from_u64(3)).unwrap();
        let b = Simulation::new(inputs, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(a.demand().paths, b.demand().paths);
        assert_eq!(a.test_scenario(), b.test_scenario());
        assert!(a.test_scenario() < 5);
    }

    #[test]
    fn test_rejects_mismatched_paths() {
        let inputs = SimulationInputs::default();
        let demand = DemandScenarios {
            deterministic: vec![1.0; 3],
            paths: vec![vec![1.0; 3]],
        };
        assert!(Simulation::with_scenarios(inputs, demand).is_err());
    }
}
