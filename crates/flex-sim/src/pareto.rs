//! Per-family Pareto filtering on (capacity ↑, cost ↓)

use crate::architecture::{ArchitectureFamily, Configuration};
use std::cmp::Ordering;
use tracing::debug;

/// `other` dominates `config`: at least as much capacity for no more cost,
/// strictly better in one of the two
pub fn dominates(other: &Configuration, config: &Configuration) -> bool {
    let (cap_o, cost_o) = (other.cap, other.cost());
    let (cap_c, cost_c) = (config.cap, config.cost());
    cap_o >= cap_c && cost_o <= cost_c && (cap_o > cap_c || cost_o < cost_c)
}

/// Non-dominated configurations sorted by (cost, capacity)
///
/// Exact duplicates do not dominate each other and are both kept.
pub fn pareto_front(configs: &[Configuration]) -> Vec<Configuration> {
    let mut front: Vec<Configuration> = configs
        .iter()
        .filter(|c| !configs.iter().any(|o| dominates(o, c)))
        .cloned()
        .collect();
    front.sort_by(|x, y| {
        x.cost()
            .total_cmp(&y.cost())
            .then_with(|| x.cap.partial_cmp(&y.cap).unwrap_or(Ordering::Equal))
    });
    front
}

/// Filter every family; families keep all their design data
pub fn filter_families(families: &[ArchitectureFamily]) -> Vec<ArchitectureFamily> {
    let filtered: Vec<ArchitectureFamily> = families
        .iter()
        .map(|f| f.with_configs(pareto_front(&f.configs)))
        .collect();

    let before: usize = families.iter().map(|f| f.configs.len()).sum();
    let after: usize = filtered.iter().map(|f| f.configs.len()).sum();
    debug!("Pareto filter kept {} of {} configurations", after, before);
    filtered
}
