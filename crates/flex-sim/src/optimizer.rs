//! Strategy optimisation and the full experiment driver

use crate::architecture::{count_configurations, ArchitectureBuilder, ArchitectureFamily};
use crate::config::{number, InputConfig, SimulationInputs};
use crate::engine::{optimal_fixed, Simulation};
use crate::evolution::FlexStrategy;
use crate::pareto::filter_families;
use crate::{round_to, CaseKey, Result, SimError, StrategyResult, TraditionalResult};
use constellation_models::SatelliteDesign;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tradespace::Tradespace;

/// Strategies enumerated from a (J, Lm) tradespace
pub fn strategies(space: &Tradespace) -> Result<Vec<FlexStrategy>> {
    space
        .enumerate()
        .iter()
        .map(|vector| {
            let layers = number(vector, "Lm")?;
            if !(layers >= 1.0 && layers.fract() == 0.0) {
                return Err(SimError::InvalidParameter {
                    name: "Lm".to_string(),
                    value: layers.to_string(),
                });
            }
            Ok(FlexStrategy::new(number(vector, "J")?, layers as usize)?)
        })
        .collect()
}

/// Minimum-ELCC result over a set of strategies
pub fn optimise(
    sim: &mut Simulation,
    families: &[ArchitectureFamily],
    strategies: &[FlexStrategy],
) -> Option<StrategyResult> {
    let mut best: Option<StrategyResult> = None;
    for strategy in strategies {
        if let Some(result) = sim.run_flexible(families, *strategy) {
            if best.as_ref().map_or(true, |b| result.elcc < b.elcc) {
                best = Some(result);
            }
        }
    }
    best
}

fn lowest<'a>(
    results: impl IntoIterator<Item = &'a StrategyResult>,
    keep: impl Fn(&StrategyResult) -> bool,
) -> Option<&'a StrategyResult> {
    results
        .into_iter()
        .filter(|r| keep(r))
        .fold(None, |best: Option<&StrategyResult>, r| match best {
            Some(b) if b.elcc <= r.elcc => Some(b),
            _ => Some(r),
        })
}

/// Cheapest single-layer (Lm = 1) result
pub fn best_single<'a>(results: impl IntoIterator<Item = &'a StrategyResult>) -> Option<&'a StrategyResult> {
    lowest(results, |r| r.strategy.max_layers == 1)
}

/// Cheapest multi-layer (Lm > 1) result
pub fn best_multi<'a>(results: impl IntoIterator<Item = &'a StrategyResult>) -> Option<&'a StrategyResult> {
    lowest(results, |r| r.strategy.max_layers > 1)
}

/// Progress after each strategy evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub case: usize,
    pub completed: usize,
    pub total: usize,
}

/// Best fixed design of one scenario case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraditionalRecord {
    #[serde(flatten)]
    pub result: TraditionalResult,
    #[serde(flatten)]
    pub case: CaseKey,
}

/// Best family for one strategy in one scenario case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRecord {
    #[serde(flatten)]
    pub result: StrategyResult,
    #[serde(flatten)]
    pub case: CaseKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradespaceConfig {
    pub e: f64,
    pub a: f64,
    #[serde(rename = "LCC")]
    pub lcc: f64,
    pub cap: f64,
}

/// Pareto family as exported for plotting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradespaceFamily {
    #[serde(flatten)]
    pub design: SatelliteDesign,
    pub cfgs: Vec<TradespaceConfig>,
}

impl TradespaceFamily {
    pub fn from_family(family: &ArchitectureFamily) -> Self {
        Self {
            design: family.design,
            cfgs: family
                .configs
                .iter()
                .map(|c| TradespaceConfig { e: c.e, a: c.a, lcc: round_to(c.cost(), 2), cap: c.cap })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentMetadata {
    pub generated_at: String,
    pub cases: usize,
    pub families: usize,
    pub configurations: usize,
    pub strategies: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Result tables of a full experiment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResults {
    #[serde(rename = "xTrad")]
    pub traditional: Vec<TraditionalRecord>,
    pub flex: Vec<StrategyRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tradespace: Option<Vec<TradespaceFamily>>,
    #[serde(default)]
    pub metadata: ExperimentMetadata,
}

impl ExperimentResults {
    pub fn fixed_for(&self, case: &CaseKey) -> Option<&TraditionalResult> {
        self.traditional
            .iter()
            .find(|r| r.case.matches(case))
            .map(|r| &r.result)
    }

    pub fn flex_for<'a>(&'a self, case: &CaseKey) -> impl Iterator<Item = &'a StrategyResult> + 'a {
        let case = *case;
        self.flex
            .iter()
            .filter(move |r| r.case.matches(&case))
            .map(|r| &r.result)
    }

    /// Result for an exact strategy in a case
    pub fn find_flex(&self, case: &CaseKey, strategy: &FlexStrategy) -> Option<&StrategyResult> {
        self.flex_for(case).find(|r| {
            crate::approx_eq(r.strategy.jump, strategy.jump)
                && r.strategy.max_layers == strategy.max_layers
        })
    }
}

/// Run every scenario case: fixed optimum, Pareto filter, then every
/// single-layer strategy followed by every multi-layer strategy
pub fn run_experiment<R, F>(
    config: &InputConfig,
    rng: &mut R,
    mut progress: F,
) -> Result<ExperimentResults>
where
    R: Rng + ?Sized,
    F: FnMut(Progress),
{
    config.validate()?;

    let cases = config.scenario_space()?.enumerate();
    let single = strategies(&config.single_layer_space()?)?;
    let multi: Vec<FlexStrategy> = strategies(&config.multi_layer_space()?)?
        .into_iter()
        .filter(|s| !s.is_single_layer())
        .collect();

    let mut builder = ArchitectureBuilder::new();
    let families = builder.build(&config.family_space()?, &config.configuration_space()?)?;

    let per_case = single.len() + multi.len();
    let total = cases.len() * per_case;
    info!(
        "Experiment: {} cases x {} strategies over {} families",
        cases.len(),
        per_case,
        families.len()
    );

    let mut results = ExperimentResults {
        metadata: ExperimentMetadata {
            generated_at: chrono::Utc::now().to_rfc3339(),
            cases: cases.len(),
            families: families.len(),
            configurations: count_configurations(&families),
            strategies: per_case,
            seed: config.seed,
        },
        ..ExperimentResults::default()
    };

    let mut completed = 0;
    for (index, case) in cases.iter().enumerate() {
        let inputs = SimulationInputs::from_case(config.simulation, case)?;
        let key = inputs.case_key();
        let mut sim = Simulation::new(inputs, rng)?;
        debug!(
            "Case {}/{}: r={} rec={} σ={} ({} scenarios)",
            index + 1,
            cases.len(),
            key.r,
            key.rec,
            key.sigma,
            sim.demand().len()
        );

        let priced = sim.run_fixed(&families);
        match optimal_fixed(&priced, inputs.constants.cap_max) {
            Some(best) => results.traditional.push(TraditionalRecord { result: best.rounded(), case: key }),
            None => warn!("No fixed design reaches peak demand for r={} rec={} σ={}", key.r, key.rec, key.sigma),
        }

        let pareto = filter_families(&priced);
        if index == 0 {
            results.tradespace = Some(pareto.iter().map(TradespaceFamily::from_family).collect());
        }

        for strategy in single.iter().chain(&multi) {
            match sim.run_flexible(&pareto, *strategy) {
                Some(result) => results.flex.push(StrategyRecord { result: result.rounded(), case: key }),
                None => debug!("No family satisfies J={} Lm={}", strategy.jump, strategy.max_layers),
            }
            completed += 1;
            progress(Progress { case: index, completed, total });
        }
    }

    info!(
        "Experiment complete: {} fixed results, {} flexible results",
        results.traditional.len(),
        results.flex.len()
    );
    Ok(results)
}
