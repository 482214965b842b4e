//! Greedy constellation evolution planner
//!
//! Starting from a small configuration, the planner repeatedly grows the
//! constellation by a target factor J until peak demand is covered:
//!
//! ```text
//! Initial ──► Evolving ──► Satisfied
//!                 │
//!                 └──────► Stalled   (no legal evolution left)
//! ```
//!
//! While fewer than Lm layers exist, growth adds a layer at an unused
//! altitude. Afterwards, one existing layer is reconfigured to a larger
//! configuration. Each step is locally greedy: the smallest change that
//! delivers the required jump. The resulting plan is not globally optimal
//! and is replayed unchanged against every demand scenario.

use crate::architecture::Configuration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("Invalid strategy: {0}")]
    InvalidStrategy(String),
    #[error("Family has no configurations")]
    EmptyFamily,
    #[error("No legal evolution from {layers} layer(s) at capacity {capacity}")]
    Stalled { layers: usize, capacity: f64 },
}

/// Flexible deployment strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlexStrategy {
    /// Target capacity growth factor per evolution
    #[serde(rename = "J")]
    pub jump: f64,
    /// Maximum orbital layers
    #[serde(rename = "Lm")]
    pub max_layers: usize,
}

impl FlexStrategy {
    pub fn new(jump: f64, max_layers: usize) -> Result<Self, PlanError> {
        if !(jump.is_finite() && jump > 0.0) {
            return Err(PlanError::InvalidStrategy(format!("J must be positive, got {}", jump)));
        }
        if max_layers == 0 {
            return Err(PlanError::InvalidStrategy("Lm must be at least 1".to_string()));
        }
        Ok(Self { jump, max_layers })
    }

    pub fn is_single_layer(&self) -> bool {
        self.max_layers == 1
    }
}

/// One planned change, referencing configurations by index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Evolution {
    /// Initial deployment of layer 0
    Init { config: usize },
    /// Deploy a new layer
    NewLayer { layer: usize, config: usize },
    /// Move an existing layer to a larger configuration
    Reconfigure { layer: usize, from: usize, to: usize },
}

impl Evolution {
    pub fn layer(&self) -> usize {
        match self {
            Self::Init { .. } => 0,
            Self::NewLayer { layer, .. } | Self::Reconfigure { layer, .. } => *layer,
        }
    }

    /// Configuration the layer ends up in
    pub fn target(&self) -> usize {
        match self {
            Self::Init { config } | Self::NewLayer { config, .. } => *config,
            Self::Reconfigure { to, .. } => *to,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerState {
    Initial,
    Evolving,
    Satisfied,
    Stalled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReconfigurationLimit {
    Bounded(usize),
    Unbounded,
}

impl ReconfigurationLimit {
    fn allows(&self, done: usize) -> bool {
        match self {
            Self::Bounded(max) => done < *max,
            Self::Unbounded => true,
        }
    }
}

/// Ordered evolutions for one (family, strategy) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionPlan {
    pub events: Vec<Evolution>,
    /// Final configuration index of each layer
    pub layers: Vec<usize>,
    /// Final total capacity
    pub capacity: f64,
    /// Reconfigurations performed on each layer
    pub reconfigurations: Vec<usize>,
}

impl EvolutionPlan {
    /// Largest number of reconfigurations any single layer undergoes
    pub fn max_reconfigurations_per_layer(&self) -> usize {
        self.reconfigurations.iter().copied().max().unwrap_or(0)
    }

    pub fn new_layers(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, Evolution::NewLayer { .. }))
            .count()
    }

    pub fn initial(&self) -> Option<usize> {
        match self.events.first() {
            Some(Evolution::Init { config }) => Some(*config),
            _ => None,
        }
    }
}

/// Index of the starting configuration: the first whose capacity exceeds
/// `start × J`, else the largest
pub fn first_configuration(configs: &[Configuration], start: f64, jump: f64) -> Option<usize> {
    if configs.is_empty() {
        return None;
    }
    let threshold = start * jump;
    Some(
        configs
            .iter()
            .position(|c| c.cap > threshold)
            .unwrap_or(configs.len() - 1),
    )
}

/// Capacity the next evolution must add
pub fn required_capacity(total: f64, jump: f64, cap_max: f64) -> f64 {
    if total * jump > cap_max {
        cap_max - total
    } else {
        total * (jump - 1.0)
    }
}

pub struct EvolutionPlanner<'a> {
    configs: &'a [Configuration],
    strategy: FlexStrategy,
    start: f64,
    cap_max: f64,
    state: PlannerState,
    layers: Vec<usize>,
    reconfigurations: Vec<usize>,
    limit: Option<ReconfigurationLimit>,
    events: Vec<Evolution>,
}

impl<'a> EvolutionPlanner<'a> {
    /// `configs` must be sorted by ascending capacity
    pub fn new(configs: &'a [Configuration], strategy: FlexStrategy, start: f64, cap_max: f64) -> Self {
        Self {
            configs,
            strategy,
            start,
            cap_max,
            state: PlannerState::Initial,
            layers: Vec::with_capacity(strategy.max_layers),
            reconfigurations: Vec::with_capacity(strategy.max_layers),
            limit: None,
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> PlannerState {
        self.state
    }

    pub fn layers(&self) -> &[usize] {
        &self.layers
    }

    pub fn total_capacity(&self) -> f64 {
        self.layers.iter().map(|&i| self.configs[i].cap).sum()
    }

    /// Advance the state machine by one evolution
    pub fn step(&mut self) -> PlannerState {
        match self.state {
            PlannerState::Initial => self.initialise(),
            PlannerState::Evolving => {
                let evolved = if self.layers.len() < self.strategy.max_layers {
                    self.add_layer()
                } else {
                    self.reconfigure()
                };
                self.state = if !evolved {
                    PlannerState::Stalled
                } else if self.total_capacity() >= self.cap_max {
                    PlannerState::Satisfied
                } else {
                    PlannerState::Evolving
                };
            }
            PlannerState::Satisfied | PlannerState::Stalled => {}
        }
        self.state
    }

    /// Run to a terminal state
    pub fn run(mut self) -> Result<EvolutionPlan, PlanError> {
        if self.configs.is_empty() {
            return Err(PlanError::EmptyFamily);
        }
        while matches!(self.state, PlannerState::Initial | PlannerState::Evolving) {
            self.step();
        }

        if self.state == PlannerState::Stalled {
            return Err(PlanError::Stalled {
                layers: self.layers.len(),
                capacity: self.total_capacity(),
            });
        }

        let capacity = self.total_capacity();
        debug!(
            "Planned {} evolutions (J={}, Lm={}) reaching {}",
            self.events.len(),
            self.strategy.jump,
            self.strategy.max_layers,
            capacity
        );
        Ok(EvolutionPlan {
            events: self.events,
            layers: self.layers,
            capacity,
            reconfigurations: self.reconfigurations,
        })
    }

    fn initialise(&mut self) {
        let Some(first) = first_configuration(self.configs, self.start, self.strategy.jump) else {
            self.state = PlannerState::Stalled;
            return;
        };
        self.layers.push(first);
        self.reconfigurations.push(0);
        self.events.push(Evolution::Init { config: first });
        self.state = if self.total_capacity() >= self.cap_max {
            PlannerState::Satisfied
        } else {
            PlannerState::Evolving
        };
    }

    /// Shares an altitude with any current layer
    fn collides(&self, index: usize) -> bool {
        let candidate = &self.configs[index];
        self.layers
            .iter()
            .any(|&l| self.configs[l].same_altitude(candidate))
    }

    fn add_layer(&mut self) -> bool {
        let required = required_capacity(self.total_capacity(), self.strategy.jump, self.cap_max);

        let mut fallback = None;
        let mut chosen = None;
        for i in 0..self.configs.len() {
            if self.collides(i) {
                continue;
            }
            fallback = Some(i);
            if self.configs[i].cap > required {
                chosen = Some(i);
                break;
            }
        }

        match chosen.or(fallback) {
            Some(config) => {
                let layer = self.layers.len();
                self.layers.push(config);
                self.reconfigurations.push(0);
                self.events.push(Evolution::NewLayer { layer, config });
                true
            }
            None => false,
        }
    }

    fn reconfiguration_limit(&mut self) -> ReconfigurationLimit {
        if let Some(limit) = self.limit {
            return limit;
        }
        let jump = self.strategy.jump;
        let limit = if jump <= 1.0 {
            ReconfigurationLimit::Unbounded
        } else {
            let growth = (self.cap_max / self.total_capacity()).ln() / jump.ln();
            let per_layer = (growth / self.strategy.max_layers as f64).ceil();
            if per_layer.is_finite() {
                ReconfigurationLimit::Bounded(per_layer.max(0.0) as usize)
            } else {
                ReconfigurationLimit::Unbounded
            }
        };
        self.limit = Some(limit);
        limit
    }

    fn reconfigure(&mut self) -> bool {
        let limit = self.reconfiguration_limit();
        let required = required_capacity(self.total_capacity(), self.strategy.jump, self.cap_max);

        // (layer, target) with the smallest resulting configuration
        let mut best: Option<(usize, usize)> = None;
        for (layer, &current) in self.layers.iter().enumerate() {
            if !limit.allows(self.reconfigurations[layer]) {
                continue;
            }

            let base = self.configs[current].cap;
            let mut fallback = None;
            let mut chosen = None;
            for i in current + 1..self.configs.len() {
                if self.collides(i) {
                    continue;
                }
                fallback = Some(i);
                if self.configs[i].cap - base > required {
                    chosen = Some(i);
                    break;
                }
            }

            if let Some(target) = chosen.or(fallback) {
                let better = match best {
                    Some((_, t)) => self.configs[target].cap < self.configs[t].cap,
                    None => true,
                };
                if better {
                    best = Some((layer, target));
                }
            }
        }

        match best {
            Some((layer, to)) => {
                let from = self.layers[layer];
                self.layers[layer] = to;
                self.reconfigurations[layer] += 1;
                self.events.push(Evolution::Reconfigure { layer, from, to });
                true
            }
            None => false,
        }
    }
}

/// Plan a family's evolution in one call
pub fn plan_evolution(
    configs: &[Configuration],
    strategy: FlexStrategy,
    start: f64,
    cap_max: f64,
) -> Result<EvolutionPlan, PlanError> {
    EvolutionPlanner::new(configs, strategy, start, cap_max).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{config_at, pareto_reference_family};

    const START: f64 = 50_000.0;
    const CAP_MAX: f64 = 15e6;

    fn plan(jump: f64, max_layers: usize) -> EvolutionPlan {
        let family = pareto_reference_family();
        let strategy = FlexStrategy::new(jump, max_layers).unwrap();
        plan_evolution(&family.configs, strategy, START, CAP_MAX).unwrap()
    }

    #[test]
    fn test_reference_plan_two_layers() {
        let plan = plan(1.5, 2);
        assert_eq!(
            plan.events,
            vec![
                Evolution::Init { config: 0 },
                Evolution::NewLayer { layer: 1, config: 1 },
                Evolution::Reconfigure { layer: 0, from: 0, to: 4 },
                Evolution::Reconfigure { layer: 1, from: 1, to: 5 },
                Evolution::Reconfigure { layer: 0, from: 4, to: 8 },
                Evolution::Reconfigure { layer: 1, from: 5, to: 9 },
                Evolution::Reconfigure { layer: 0, from: 8, to: 13 },
                Evolution::Reconfigure { layer: 1, from: 9, to: 17 },
                Evolution::Reconfigure { layer: 0, from: 13, to: 20 },
                Evolution::Reconfigure { layer: 1, from: 17, to: 22 },
            ]
        );
        assert_eq!(plan.layers, vec![20, 22]);
        assert_eq!(plan.capacity, 15_241_838.0);
        assert_eq!(plan.max_reconfigurations_per_layer(), 4);
        assert_eq!(plan.new_layers(), 1);
    }

    #[test]
    fn test_single_layer_plan() {
        let plan = plan(1.5, 1);
        assert_eq!(plan.events.len(), 10);
        assert_eq!(plan.max_reconfigurations_per_layer(), 9);
        assert_eq!(plan.capacity, 15_655_589.0);
    }

    #[test]
    fn test_five_layers_adds_layers_first() {
        let plan = plan(1.5, 5);
        let kinds: Vec<bool> = plan.events[1..]
            .iter()
            .map(|e| matches!(e, Evolution::NewLayer { .. }))
            .collect();
        assert_eq!(kinds[..4], [true; 4]);
        assert!(kinds[4..].iter().all(|new| !new));
        assert_eq!(kinds.len(), 10);
    }

    #[test]
    fn test_unit_jump_terminates() {
        let plan = plan(1.0, 2);
        assert_eq!(plan.capacity, 15_241_838.0);
    }

    #[test]
    fn test_layers_never_share_altitude() {
        let family = pareto_reference_family();
        for (jump, layers) in [(1.5, 2), (2.0, 3), (1.2, 4)] {
            let strategy = FlexStrategy::new(jump, layers).unwrap();
            let plan = plan_evolution(&family.configs, strategy, START, CAP_MAX).unwrap();
            let mut alts: Vec<f64> = plan.layers.iter().map(|&i| family.configs[i].a).collect();
            alts.sort_by(f64::total_cmp);
            alts.dedup();
            assert_eq!(alts.len(), plan.layers.len());
            assert!(plan.capacity >= CAP_MAX);
        }
    }

    #[test]
    fn test_satisfied_at_init() {
        let configs = vec![config_at(500.0, 100.0), config_at(600.0, 2e7)];
        let strategy = FlexStrategy::new(1.5, 2).unwrap();
        let plan = plan_evolution(&configs, strategy, 1_000.0, 1e7).unwrap();
        assert_eq!(plan.events, vec![Evolution::Init { config: 1 }]);
    }

    #[test]
    fn test_stalls_without_free_altitude() {
        // Only one altitude and one layer reconfiguration target short of capMax
        let configs = vec![config_at(500.0, 100.0), config_at(500.0, 200.0)];
        let strategy = FlexStrategy::new(1.5, 2).unwrap();
        let mut planner = EvolutionPlanner::new(&configs, strategy, 10.0, 1e6);
        assert_eq!(planner.step(), PlannerState::Evolving);
        // Second layer cannot share the altitude; falls through to reconfiguration later
        assert_eq!(planner.step(), PlannerState::Stalled);
        assert!(matches!(
            plan_evolution(&configs, strategy, 10.0, 1e6),
            Err(PlanError::Stalled { .. })
        ));
    }

    #[test]
    fn test_empty_family() {
        let strategy = FlexStrategy::new(1.5, 1).unwrap();
        assert_eq!(plan_evolution(&[], strategy, 1.0, 2.0), Err(PlanError::EmptyFamily));
    }

    #[test]
    fn test_required_capacity() {
        assert_eq!(required_capacity(100.0, 1.5, 1000.0), 50.0);
        assert_eq!(required_capacity(900.0, 1.5, 1000.0), 100.0);
        assert_eq!(required_capacity(100.0, 1.0, 1000.0), 0.0);
    }

    #[test]
    fn test_invalid_strategy() {
        assert!(FlexStrategy::new(0.0, 2).is_err());
        assert!(FlexStrategy::new(1.5, 0).is_err());
        assert!(FlexStrategy::new(f64::NAN, 1).is_err());
    }
}
