//! Output metrics and heatmap generation
//!
//! A heatmap sweeps two parameters among r, rec, σ, J and Lm, holds the rest
//! constant, and evaluates one [`OutputMetric`] per cell. Cells are stored
//! row-major with rows along the y parameter.

use crate::config::InputConfig;
use crate::evolution::FlexStrategy;
use crate::optimizer::{best_multi, best_single, ExperimentResults};
use crate::{round_to, CaseKey, Result, SimError, StrategyResult, TraditionalResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputMetric {
    #[serde(rename = "xTrad.LCC")]
    FixedLcc,
    #[serde(rename = "flexS.ELCC")]
    SingleElcc,
    #[serde(rename = "flexS.avgR")]
    SingleAvgR,
    #[serde(rename = "flexM.ELCC")]
    MultiElcc,
    #[serde(rename = "flexM.avgN")]
    MultiAvgN,
    #[serde(rename = "flexM.avgR")]
    MultiAvgR,
    #[serde(rename = "flexM.avgR + flexM.avgN")]
    MultiEvolutions,
    #[serde(rename = "flexS.ELCC / xTrad.LCC")]
    SingleVsFixed,
    #[serde(rename = "flexM.ELCC / xTrad.LCC")]
    MultiVsFixed,
    #[serde(rename = "flexM.ELCC / flexS.ELCC")]
    MultiVsSingle,
    #[serde(rename = "flexM.avgR / flexS.avgR")]
    ReconfigurationRatio,
}

impl OutputMetric {
    pub const ALL: [OutputMetric; 11] = [
        Self::FixedLcc,
        Self::SingleElcc,
        Self::SingleAvgR,
        Self::MultiElcc,
        Self::MultiAvgN,
        Self::MultiAvgR,
        Self::MultiEvolutions,
        Self::SingleVsFixed,
        Self::MultiVsFixed,
        Self::MultiVsSingle,
        Self::ReconfigurationRatio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FixedLcc => "xTrad.LCC",
            Self::SingleElcc => "flexS.ELCC",
            Self::SingleAvgR => "flexS.avgR",
            Self::MultiElcc => "flexM.ELCC",
            Self::MultiAvgN => "flexM.avgN",
            Self::MultiAvgR => "flexM.avgR",
            Self::MultiEvolutions => "flexM.avgR + flexM.avgN",
            Self::SingleVsFixed => "flexS.ELCC / xTrad.LCC",
            Self::MultiVsFixed => "flexM.ELCC / xTrad.LCC",
            Self::MultiVsSingle => "flexM.ELCC / flexS.ELCC",
            Self::ReconfigurationRatio => "flexM.avgR / flexS.avgR",
        }
    }

    /// Metric value, or None when an operand is missing or a ratio is undefined
    pub fn compute(
        &self,
        fixed: Option<&TraditionalResult>,
        single: Option<&StrategyResult>,
        multi: Option<&StrategyResult>,
    ) -> Option<f64> {
        let ratio = |num: Option<f64>, den: Option<f64>| {
            let value = num? / den?;
            value.is_finite().then(|| round_to(value, 4))
        };
        let lcc = fixed.map(|x| x.lcc);

        match self {
            Self::FixedLcc => lcc,
            Self::SingleElcc => single.map(|s| s.elcc),
            Self::SingleAvgR => single.map(|s| s.avg_reconfigurations),
            Self::MultiElcc => multi.map(|m| m.elcc),
            Self::MultiAvgN => multi.map(|m| m.avg_new_layers),
            Self::MultiAvgR => multi.map(|m| m.avg_reconfigurations),
            Self::MultiEvolutions => multi.map(|m| m.avg_reconfigurations + m.avg_new_layers),
            Self::SingleVsFixed => ratio(single.map(|s| s.elcc), lcc),
            Self::MultiVsFixed => ratio(multi.map(|m| m.elcc), lcc),
            Self::MultiVsSingle => ratio(multi.map(|m| m.elcc), single.map(|s| s.elcc)),
            Self::ReconfigurationRatio => ratio(
                multi.map(|m| m.avg_reconfigurations),
                single.map(|s| s.avg_reconfigurations),
            ),
        }
    }

    /// Display form of a computed value
    pub fn format(&self, value: f64) -> String {
        match self {
            Self::FixedLcc | Self::SingleElcc | Self::MultiElcc => dollars(value),
            Self::SingleAvgR | Self::MultiAvgN | Self::MultiAvgR => format!("{:.2}", value),
            Self::MultiEvolutions => value.to_string(),
            _ => format!("{:.2}%", value * 100.0),
        }
    }
}

impl fmt::Display for OutputMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputMetric {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| SimError::InvalidParameter {
                name: "metric".to_string(),
                value: s.to_string(),
            })
    }
}

/// Costs in $K as `$xB`, `$xM` or `$x`
pub fn dollars(x: f64) -> String {
    if x > 1e6 {
        format!("${:.2}B", x / 1e6)
    } else if x > 1e3 {
        format!("${:.2}M", x / 1e3)
    } else {
        format!("${:.2}", x)
    }
}

/// Parameter a heatmap axis can sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepParam {
    #[serde(rename = "r")]
    DiscountRate,
    #[serde(rename = "rec")]
    ReconfigurationCost,
    #[serde(rename = "σ", alias = "sigma")]
    Volatility,
    #[serde(rename = "J")]
    Jump,
    #[serde(rename = "Lm")]
    MaxLayers,
}

impl SweepParam {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::DiscountRate => "r",
            Self::ReconfigurationCost => "rec",
            Self::Volatility => "σ",
            Self::Jump => "J",
            Self::MaxLayers => "Lm",
        }
    }
}

impl fmt::Display for SweepParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for SweepParam {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "r" => Ok(Self::DiscountRate),
            "rec" => Ok(Self::ReconfigurationCost),
            "σ" | "sigma" => Ok(Self::Volatility),
            "J" => Ok(Self::Jump),
            "Lm" => Ok(Self::MaxLayers),
            other => Err(SimError::InvalidParameter {
                name: "sweep".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Values held fixed on the axes that are not swept
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatmapConstants {
    pub r: f64,
    pub rec: f64,
    #[serde(rename = "σ", alias = "sigma")]
    pub sigma: f64,
    #[serde(rename = "J")]
    pub jump: f64,
    #[serde(rename = "Lm")]
    pub max_layers: usize,
    /// Use the best strategy per case instead of the (J, Lm) constants
    #[serde(default)]
    pub optimal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub param: SweepParam,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapConfig {
    pub x: Axis,
    pub y: Axis,
    pub constants: HeatmapConstants,
    pub metric: OutputMetric,
}

impl HeatmapConfig {
    /// Axis values taken from the experiment's own input ranges
    pub fn from_inputs(
        inputs: &InputConfig,
        x: SweepParam,
        y: SweepParam,
        constants: HeatmapConstants,
        metric: OutputMetric,
    ) -> Result<Self> {
        Ok(Self {
            x: Axis { param: x, values: inputs.range(x.symbol())?.numbers() },
            y: Axis { param: y, values: inputs.range(y.symbol())?.numbers() },
            constants,
            metric,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heatmap {
    pub config: HeatmapConfig,
    pub data: Vec<Option<f64>>,
}

impl Heatmap {
    pub fn rows(&self) -> usize {
        self.config.y.values.len()
    }

    pub fn cols(&self) -> usize {
        self.config.x.values.len()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if col >= self.cols() {
            return None;
        }
        self.data.get(row * self.cols() + col).copied().flatten()
    }

    /// Cells in display form; missing values are empty
    pub fn formatted(&self) -> Vec<String> {
        self.data
            .iter()
            .map(|v| v.map(|x| self.config.metric.format(x)).unwrap_or_default())
            .collect()
    }
}

fn apply(param: SweepParam, value: f64, case: &mut CaseKey, jump: &mut f64, layers: &mut usize) {
    match param {
        SweepParam::DiscountRate => case.r = value,
        SweepParam::ReconfigurationCost => case.rec = value,
        SweepParam::Volatility => case.sigma = value,
        SweepParam::Jump => *jump = value,
        SweepParam::MaxLayers => *layers = value.round().max(0.0) as usize,
    }
}

/// Evaluate a heatmap over stored experiment results
pub fn heatmap(results: &ExperimentResults, config: HeatmapConfig) -> Result<Heatmap> {
    if config.x.param == config.y.param {
        return Err(SimError::InvalidParameter {
            name: "heatmap".to_string(),
            value: format!("both axes sweep {}", config.x.param),
        });
    }

    let c = config.constants;
    let mut data = Vec::with_capacity(config.x.values.len() * config.y.values.len());

    for &yv in &config.y.values {
        for &xv in &config.x.values {
            let mut case = CaseKey { r: c.r, rec: c.rec, sigma: c.sigma };
            let (mut jump, mut layers) = (c.jump, c.max_layers);
            apply(config.x.param, xv, &mut case, &mut jump, &mut layers);
            apply(config.y.param, yv, &mut case, &mut jump, &mut layers);

            let fixed = results.fixed_for(&case);
            let (single, multi) = if c.optimal {
                (best_single(results.flex_for(&case)), best_multi(results.flex_for(&case)))
            } else {
                let single = FlexStrategy { jump, max_layers: 1 };
                let multi = FlexStrategy { jump, max_layers: layers };
                (results.find_flex(&case, &single), results.find_flex(&case, &multi))
            };

            data.push(config.metric.compute(fixed, single, multi));
        }
    }

    Ok(Heatmap { config, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::{StrategyRecord, TraditionalRecord};
    use constellation_models::{IslTopology, SatelliteDesign};

    fn design() -> SatelliteDesign {
        SatelliteDesign::new(2.0, 800.0, 15.0, IslTopology::Mesh).unwrap()
    }

    fn fixed(lcc: f64) -> TraditionalResult {
        TraditionalResult { lcc, cap: 2e7, design: design(), a: 1000.0, e: 30.0, n: 500 }
    }

    fn flex(elcc: f64, jump: f64, layers: usize, avg_r: f64, avg_n: f64) -> StrategyResult {
        StrategyResult {
            elcc,
            design: design(),
            strategy: FlexStrategy { jump, max_layers: layers },
            avg_new_layers: avg_n,
            avg_reconfigurations: avg_r,
        }
    }

    fn results() -> ExperimentResults {
        let mut out = ExperimentResults::default();
        for (i, r) in [0.1, 0.2].into_iter().enumerate() {
            let case = CaseKey { r, rec: 0.2, sigma: 0.2 };
            let scale = 1.0 + i as f64;
            out.traditional.push(TraditionalRecord { result: fixed(1000.0 * scale), case });
            for (elcc, jump, layers, avg_r, avg_n) in [
                (800.0, 1.5, 1, 8.0, 0.0),
                (700.0, 2.0, 1, 4.0, 0.0),
                (600.0, 1.5, 2, 4.0, 1.0),
                (650.0, 2.0, 2, 2.0, 1.0),
            ] {
                out.flex.push(StrategyRecord {
                    result: flex(elcc * scale, jump, layers, avg_r, avg_n),
                    case,
                });
            }
        }
        out
    }

    #[test]
    fn test_metric_names_round_trip() {
        for metric in OutputMetric::ALL {
            assert_eq!(metric.as_str().parse::<OutputMetric>().unwrap(), metric);
            let json = serde_json::to_string(&metric).unwrap();
            assert_eq!(json, format!("\"{}\"", metric.as_str()));
        }
        assert!("flexX.ELCC".parse::<OutputMetric>().is_err());
    }

    #[test]
    fn test_compute_ratios() {
        let x = fixed(1000.0);
        let s = flex(800.0, 1.5, 1, 8.0, 0.0);
        let m = flex(600.0, 1.5, 2, 4.0, 1.0);
        assert_eq!(OutputMetric::SingleVsFixed.compute(Some(&x), Some(&s), Some(&m)), Some(0.8));
        assert_eq!(OutputMetric::MultiVsSingle.compute(Some(&x), Some(&s), Some(&m)), Some(0.75));
        assert_eq!(OutputMetric::MultiEvolutions.compute(None, None, Some(&m)), Some(5.0));
        assert_eq!(OutputMetric::MultiVsFixed.compute(None, Some(&s), Some(&m)), None);

        let idle = flex(800.0, 1.5, 1, 0.0, 0.0);
        assert_eq!(OutputMetric::ReconfigurationRatio.compute(None, Some(&idle), Some(&m)), None);
    }

    #[test]
    fn test_format() {
        assert_eq!(dollars(2_500_000.0), "$2.50B");
        assert_eq!(dollars(513_412.25), "$513.41M");
        assert_eq!(dollars(999.0), "$999.00");
        assert_eq!(OutputMetric::SingleVsFixed.format(0.8123), "81.23%");
        assert_eq!(OutputMetric::MultiAvgR.format(2.3333), "2.33");
    }

    #[test]
    fn test_heatmap_row_major() {
        let config = HeatmapConfig {
            x: Axis { param: SweepParam::Jump, values: vec![1.5, 2.0] },
            y: Axis { param: SweepParam::DiscountRate, values: vec![0.1, 0.2] },
            constants: HeatmapConstants { r: 0.1, rec: 0.2, sigma: 0.2, jump: 1.5, max_layers: 2, optimal: false },
            metric: OutputMetric::MultiElcc,
        };
        let map = heatmap(&results(), config).unwrap();
        assert_eq!((map.rows(), map.cols()), (2, 2));
        assert_eq!(map.data, vec![Some(600.0), Some(650.0), Some(1200.0), Some(1300.0)]);
        assert_eq!(map.get(1, 0), Some(1200.0));
        assert_eq!(map.formatted()[0], "$600.00");
    }

    #[test]
    fn test_heatmap_optimal_mode() {
        let config = HeatmapConfig {
            x: Axis { param: SweepParam::DiscountRate, values: vec![0.1, 0.2, 0.3] },
            y: Axis { param: SweepParam::Volatility, values: vec![0.2] },
            constants: HeatmapConstants { r: 0.1, rec: 0.2, sigma: 0.2, jump: 9.0, max_layers: 9, optimal: true },
            metric: OutputMetric::SingleElcc,
        };
        let map = heatmap(&results(), config).unwrap();
        assert_eq!(map.data, vec![Some(700.0), Some(1400.0), None]);
    }

    #[test]
    fn test_heatmap_same_axes_rejected() {
        let axis = Axis { param: SweepParam::Jump, values: vec![1.5] };
        let config = HeatmapConfig {
            x: axis.clone(),
            y: axis,
            constants: HeatmapConstants { r: 0.1, rec: 0.2, sigma: 0.2, jump: 1.5, max_layers: 2, optimal: false },
            metric: OutputMetric::FixedLcc,
        };
        assert!(heatmap(&results(), config).is_err());
    }
}
