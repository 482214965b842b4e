//! Parameter range strings
//!
//! Two textual forms are accepted:
//!
//! ```text
//! 400|50|1600        continuous: start|increment|end
//! None,Mesh,Ring     discrete: comma separated values
//! 15,50              discrete numeric
//! ```

use crate::{RangeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upper bound on the number of values a single range may expand to
pub const MAX_RANGE_VALUES: usize = 100_000;

/// Continuous values are snapped to this many decimal places
const VALUE_DECIMALS: f64 = 1e6;

/// Slack when counting increments so `0|0.1|0.5` yields six values
const COUNT_EPSILON: f64 = 1e-9;

/// A single swept value: numeric or textual (e.g. ISL topology names)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(s) => Some(s),
        }
    }

    /// Loose equality used when matching decoded values back to a range
    pub fn matches(&self, other: &ParamValue) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => {
                (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
            }
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{}", v),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Parsed parameter range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParameterRange {
    Continuous { start: f64, increment: f64, end: f64 },
    Discrete { values: Vec<ParamValue> },
}

impl ParameterRange {
    /// Number of values this range expands to
    pub fn len(&self) -> usize {
        match self {
            Self::Continuous { start, increment, end } => continuous_count(*start, *increment, *end),
            Self::Discrete { values } => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expand into the ordered list of values
    pub fn values(&self) -> Vec<ParamValue> {
        match self {
            Self::Continuous { start, increment, end } => {
                let count = continuous_count(*start, *increment, *end);
                (0..count)
                    .map(|k| ParamValue::Number(snap(start + increment * k as f64)))
                    .collect()
            }
            Self::Discrete { values } => values.clone(),
        }
    }

    /// Numeric values only; textual values are skipped
    pub fn numbers(&self) -> Vec<f64> {
        self.values().iter().filter_map(ParamValue::as_f64).collect()
    }

    /// Smallest and largest numeric value, if any
    pub fn bounds(&self) -> Option<(f64, f64)> {
        let nums = self.numbers();
        if nums.is_empty() {
            return None;
        }
        let min = nums.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = nums.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        Some((min, max))
    }

    /// Position of `value` within the expanded range
    pub fn index_of(&self, value: &ParamValue) -> Option<usize> {
        self.values().iter().position(|v| v.matches(value))
    }
}

impl FromStr for ParameterRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self> {
        parse_range(s)
    }
}

impl fmt::Display for ParameterRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continuous { start, increment, end } => {
                write!(f, "{}|{}|{}", start, increment, end)
            }
            Self::Discrete { values } => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

/// Parse a range string into a [`ParameterRange`]
pub fn parse_range(input: &str) -> Result<ParameterRange> {
    if input.contains('|') {
        parse_continuous(input)
    } else {
        parse_discrete(input)
    }
}

fn parse_continuous(input: &str) -> Result<ParameterRange> {
    let tokens: Vec<&str> = input.split('|').map(str::trim).collect();
    if tokens.len() != 3 {
        return Err(RangeError::TokenCount {
            input: input.to_string(),
            found: tokens.len(),
        });
    }
    if tokens.iter().any(|t| t.is_empty()) {
        return Err(RangeError::EmptyToken(input.to_string()));
    }

    let mut nums = [0.0; 3];
    for (slot, token) in nums.iter_mut().zip(&tokens) {
        *slot = parse_number(token).ok_or_else(|| RangeError::NotNumeric {
            input: input.to_string(),
            token: token.to_string(),
        })?;
        if !slot.is_finite() {
            return Err(RangeError::NonFinite(input.to_string()));
        }
    }
    let [start, increment, end] = nums;

    if increment <= 0.0 {
        return Err(RangeError::NonPositiveIncrement {
            input: input.to_string(),
            increment,
        });
    }
    if end < start {
        return Err(RangeError::Reversed {
            input: input.to_string(),
            start,
            end,
        });
    }
    let span = (end - start) / increment;
    if span + 1.0 > MAX_RANGE_VALUES as f64 {
        return Err(RangeError::TooManyValues {
            input: input.to_string(),
            max: MAX_RANGE_VALUES,
        });
    }

    Ok(ParameterRange::Continuous { start, increment, end })
}

fn parse_discrete(input: &str) -> Result<ParameterRange> {
    let tokens: Vec<&str> = input.split(',').map(str::trim).collect();
    if tokens.iter().any(|t| t.is_empty()) {
        return Err(RangeError::EmptyToken(input.to_string()));
    }

    let parsed: Vec<Option<f64>> = tokens.iter().map(|t| parse_number(t)).collect();
    let values = if parsed.iter().all(Option::is_some) {
        let mut values = Vec::with_capacity(tokens.len());
        for v in parsed.into_iter().flatten() {
            if !v.is_finite() {
                return Err(RangeError::NonFinite(input.to_string()));
            }
            values.push(ParamValue::Number(v));
        }
        values
    } else {
        tokens.iter().map(|t| ParamValue::Text(t.to_string())).collect()
    };

    Ok(ParameterRange::Discrete { values })
}

/// `f64::from_str` also accepts "inf" and "NaN"; those are caught by the finiteness checks
fn parse_number(token: &str) -> Option<f64> {
    token.parse::<f64>().ok()
}

fn continuous_count(start: f64, increment: f64, end: f64) -> usize {
    ((end - start) / increment + COUNT_EPSILON).floor() as usize + 1
}

fn snap(v: f64) -> f64 {
    (v * VALUE_DECIMALS).round() / VALUE_DECIMALS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_continuous() {
        let range = parse_range("400|50|1600").unwrap();
        assert_eq!(
            range,
            ParameterRange::Continuous { start: 400.0, increment: 50.0, end: 1600.0 }
        );
        assert_eq!(range.len(), 25);

        let values = range.numbers();
        assert_eq!(values.first(), Some(&400.0));
        assert_eq!(values.last(), Some(&1600.0));
    }

    #[test]
    fn test_fractional_increment() {
        let values = parse_range("0|0.1|0.5").unwrap().numbers();
        assert_eq!(values, vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5]);
    }

    #[test]
    fn test_partial_step_excluded() {
        // 2, 2.5, 3, 3.5; 4.2 is never reached
        let range = parse_range("2|0.5|3.9").unwrap();
        assert_eq!(range.len(), 4);
    }

    #[test]
    fn test_single_value_continuous() {
        let range = parse_range("15|15|15").unwrap();
        assert_eq!(range.numbers(), vec![15.0]);
    }

    #[test]
    fn test_parse_discrete_numeric() {
        let range = parse_range("15, 50").unwrap();
        assert_eq!(range.values(), vec![ParamValue::Number(15.0), ParamValue::Number(50.0)]);
    }

    #[test]
    fn test_parse_discrete_text() {
        let range = parse_range("None,Mesh,Ring").unwrap();
        assert_eq!(range.len(), 3);
        assert_eq!(range.values()[1].as_str(), Some("Mesh"));
    }

    #[test]
    fn test_mixed_discrete_is_text() {
        let range = parse_range("1,Mesh").unwrap();
        assert_eq!(range.values(), vec![ParamValue::from("1"), ParamValue::from("Mesh")]);
    }

    #[test]
    fn test_rejects_bad_ranges() {
        assert!(matches!(parse_range("1|2"), Err(RangeError::TokenCount { found: 2, .. })));
        assert!(matches!(parse_range("1|2|3|4"), Err(RangeError::TokenCount { .. })));
        assert!(matches!(parse_range("1||3"), Err(RangeError::EmptyToken(_))));
        assert!(matches!(parse_range("a|1|3"), Err(RangeError::NotNumeric { .. })));
        assert!(matches!(parse_range("1|0|3"), Err(RangeError::NonPositiveIncrement { .. })));
        assert!(matches!(parse_range("1|-1|3"), Err(RangeError::NonPositiveIncrement { .. })));
        assert!(matches!(parse_range("5|1|3"), Err(RangeError::Reversed { .. })));
        assert!(matches!(parse_range("1|inf|3"), Err(RangeError::NonFinite(_))));
        assert!(matches!(parse_range("1,,3"), Err(RangeError::EmptyToken(_))));
        assert!(matches!(parse_range(""), Err(RangeError::EmptyToken(_))));
        assert!(matches!(parse_range("0|1e-9|1"), Err(RangeError::TooManyValues { .. })));
    }

    #[test]
    fn test_index_of() {
        let range = parse_range("0|0.1|0.5").unwrap();
        assert_eq!(range.index_of(&ParamValue::Number(0.3)), Some(3));
        assert_eq!(range.index_of(&ParamValue::Number(0.35)), None);
        assert_eq!(range.index_of(&ParamValue::from("Mesh")), None);
    }

    #[test]
    fn test_display_round_trip() {
        for s in ["400|50|1600", "None,Mesh,Ring", "15,50"] {
            let range = parse_range(s).unwrap();
            assert_eq!(parse_range(&range.to_string()).unwrap(), range);
        }
    }

    #[test]
    fn test_param_value_json() {
        let json = serde_json::to_string(&vec![ParamValue::Number(2.5), ParamValue::from("Mesh")])
            .unwrap();
        assert_eq!(json, r#"[2.5,"Mesh"]"#);
    }
}
