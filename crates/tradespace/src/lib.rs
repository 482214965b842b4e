//! Tradespace Enumeration
//!
//! Parses parameter range strings and expands ordered sets of ranges into
//! the full Cartesian product of named parameter vectors.
//!
//! ```text
//! D = 2|0.5|4   f = 15,50   I = None,Mesh,Ring
//!   -> {D:2, f:15, I:None}, {D:2, f:15, I:Mesh}, ... (5 x 2 x 3 = 30 vectors)
//! ```
//!
//! Enumeration is depth-first over insertion order: the last parameter
//! varies fastest.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod range;

pub use range::{parse_range, ParamValue, ParameterRange, MAX_RANGE_VALUES};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RangeError {
    #[error("range '{input}' must have exactly 3 tokens (start|increment|end), found {found}")]
    TokenCount { input: String, found: usize },
    #[error("range '{0}' contains an empty token")]
    EmptyToken(String),
    #[error("range '{input}': token '{token}' is not a number")]
    NotNumeric { input: String, token: String },
    #[error("range '{0}' contains a non-finite number")]
    NonFinite(String),
    #[error("range '{input}': increment must be positive, got {increment}")]
    NonPositiveIncrement { input: String, increment: f64 },
    #[error("range '{input}': end {end} is below start {start}")]
    Reversed { input: String, start: f64, end: f64 },
    #[error("range '{input}' expands to more than {max} values")]
    TooManyValues { input: String, max: usize },
    #[error("parameter '{name}': {source}")]
    Parameter {
        name: String,
        #[source]
        source: Box<RangeError>,
    },
}

pub type Result<T> = std::result::Result<T, RangeError>;

/// One point of a tradespace: named values in parameter order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterVector {
    entries: Vec<(String, ParamValue)>,
}

impl ParameterVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: ParamValue) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a named value
    pub fn insert(&mut self, name: &str, value: ParamValue) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(ParamValue::as_f64)
    }

    /// Textual value; numbers are rendered with their display form
    pub fn text(&self, name: &str) -> Option<String> {
        self.get(name).map(ParamValue::to_string)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

/// Ordered set of named ranges that spans a tradespace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tradespace {
    parameters: Vec<(String, ParameterRange)>,
}

impl Tradespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `(name, range string)` pairs, failing on the first bad range
    pub fn parse<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self> {
        let mut space = Self::new();
        for (name, raw) in pairs {
            let range = parse_range(raw).map_err(|e| RangeError::Parameter {
                name: name.to_string(),
                source: Box::new(e),
            })?;
            space.push(name, range);
        }
        Ok(space)
    }

    pub fn push(&mut self, name: &str, range: ParameterRange) {
        self.parameters.push((name.to_string(), range));
    }

    pub fn with(mut self, name: &str, range: ParameterRange) -> Self {
        self.push(name, range);
        self
    }

    pub fn range(&self, name: &str) -> Option<&ParameterRange> {
        self.parameters.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    pub fn parameters(&self) -> impl Iterator<Item = (&str, &ParameterRange)> {
        self.parameters.iter().map(|(n, r)| (n.as_str(), r))
    }

    /// Number of vectors [`Tradespace::enumerate`] will produce
    pub fn size(&self) -> usize {
        self.parameters.iter().map(|(_, r)| r.len()).product()
    }

    /// Full Cartesian product, last parameter varying fastest
    pub fn enumerate(&self) -> Vec<ParameterVector> {
        let axes: Vec<(&str, Vec<ParamValue>)> = self
            .parameters
            .iter()
            .map(|(n, r)| (n.as_str(), r.values()))
            .collect();

        let mut out = Vec::with_capacity(self.size());
        let mut current = ParameterVector::new();
        expand(&axes, &mut current, &mut out);

        debug!(
            "Enumerated {} vectors over {} parameters",
            out.len(),
            axes.len()
        );
        out
    }
}

fn expand(
    axes: &[(&str, Vec<ParamValue>)],
    current: &mut ParameterVector,
    out: &mut Vec<ParameterVector>,
) {
    let Some(((name, values), rest)) = axes.split_first() else {
        out.push(current.clone());
        return;
    };
    for value in values {
        current.insert(name, value.clone());
        expand(rest, current, out);
    }
    current.entries.retain(|(n, _)| n != name);
}

/// Convenience wrapper: parse and enumerate in one call
pub fn enumerate<'a>(
    pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<Vec<ParameterVector>> {
    Ok(Tradespace::parse(pairs)?.enumerate())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_enumerate_order() {
        let vectors = enumerate([("J", "1.5,2"), ("Lm", "1|1|3")]).unwrap();
        assert_eq!(vectors.len(), 6);

        let pairs: Vec<(f64, f64)> = vectors
            .iter()
            .map(|v| (v.number("J").unwrap(), v.number("Lm").unwrap()))
            .collect();
        assert_eq!(
            pairs,
            vec![(1.5, 1.0), (1.5, 2.0), (1.5, 3.0), (2.0, 1.0), (2.0, 2.0), (2.0, 3.0)]
        );
    }

    #[test]
    fn test_enumerate_preserves_parameter_order() {
        let vectors = enumerate([("D", "2"), ("I", "None,Mesh"), ("f", "15")]).unwrap();
        let names: Vec<&str> = vectors[0].iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["D", "I", "f"]);
        assert_eq!(vectors[1].text("I").as_deref(), Some("Mesh"));
    }

    #[test]
    fn test_zero_parameters_yield_single_empty_vector() {
        let vectors = Tradespace::new().enumerate();
        assert_eq!(vectors.len(), 1);
        assert!(vectors[0].is_empty());
    }

    #[test]
    fn test_single_parameter_axis() {
        let vectors = enumerate([("a", "400|50|600")]).unwrap();
        let alts: Vec<f64> = vectors.iter().filter_map(|v| v.number("a")).collect();
        assert_eq!(alts, vec![400.0, 450.0, 500.0, 550.0, 600.0]);
    }

    #[test]
    fn test_bad_range_aborts_enumeration() {
        let err = enumerate([("D", "2|0.5|4"), ("P", "200|0|400")]).unwrap_err();
        match err {
            RangeError::Parameter { name, source } => {
                assert_eq!(name, "P");
                assert!(matches!(*source, RangeError::NonPositiveIncrement { .. }));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_size_matches_default_architecture_space() {
        let space = Tradespace::parse([
            ("D", "2|0.5|4"),
            ("P", "200|400|2200"),
            ("f", "15,50"),
            ("I", "None,Mesh,Ring"),
        ])
        .unwrap();
        assert_eq!(space.size(), 5 * 6 * 2 * 3);
        assert_eq!(space.enumerate().len(), space.size());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn test_continuous_count(start in -500i32..500, inc in 1i32..50, steps in 0u32..40) {
            let end = start + inc * steps as i32;
            let range = parse_range(&format!("{}|{}|{}", start, inc, end)).unwrap();
            let expected = ((end - start) as f64 / inc as f64).round() as usize + 1;
            prop_assert_eq!(range.len(), expected);
            prop_assert_eq!(range.values().len(), expected);
        }

        #[test]
        fn test_product_size(a in 1usize..5, b in 1usize..5, c in 1usize..5) {
            let ra = (0..a).map(|i| i.to_string()).collect::<Vec<_>>().join(",");
            let rb = (0..b).map(|i| i.to_string()).collect::<Vec<_>>().join(",");
            let rc = (0..c).map(|i| i.to_string()).collect::<Vec<_>>().join(",");
            let vectors = enumerate([("a", ra.as_str()), ("b", rb.as_str()), ("c", rc.as_str())])
                .unwrap();
            prop_assert_eq!(vectors.len(), a * b * c);
        }
    }
}
