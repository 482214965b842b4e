//! Compact result files
//!
//! Results are stored as `{inputs, results}`. In compact form every swept
//! value (D, P, f, I, a, e, J, Lm, r, rec, σ) inside `results` is replaced by
//! its index into the input's own range, then repeated tokens in the JSON
//! text are substituted from a dictionary:
//!
//! ```text
//! CZ1 STX entry STX entry ... ETX body      references: SOH index STX
//! ```

use crate::config::InputConfig;
use crate::optimizer::ExperimentResults;
use constellation_models::IslTopology;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};
use tradespace::{ParamValue, RangeError};

const MAGIC: &str = "CZ1\u{2}";
const REF: char = '\u{1}';
const SEP: char = '\u{2}';
const END: char = '\u{3}';

/// Shortest token worth a dictionary entry
const MIN_TOKEN_LEN: usize = 4;

/// Keys whose values are stored as range indices
pub const ENCODED_KEYS: [&str; 11] = ["D", "P", "f", "I", "a", "e", "J", "Lm", "r", "rec", "σ"];

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid input range for {key}: {source}")]
    Range {
        key: String,
        #[source]
        source: RangeError,
    },
    #[error("Value {value} of {key} is not in its input range")]
    UnknownValue { key: String, value: String },
    #[error("Index {index} out of range for {key}")]
    IndexOutOfRange { key: String, index: String },
    #[error("Text contains reserved control characters")]
    ReservedCharacter,
    #[error("Corrupt compressed payload: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, CodecError>;

/// Per-key value tables built from an input configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTables(BTreeMap<&'static str, Vec<ParamValue>>);

impl ValueTables {
    pub fn from_inputs(inputs: &InputConfig) -> Result<Self> {
        let mut tables = BTreeMap::new();
        for key in ENCODED_KEYS {
            let range = inputs.range(key).map_err(|err| match err {
                crate::SimError::Range(source) => CodecError::Range { key: key.to_string(), source },
                other => CodecError::Corrupt(other.to_string()),
            })?;
            let mut values = range.values();
            if key == "I" {
                // Topologies serialize in canonical case
                for value in &mut values {
                    if let Some(topology) = value.as_str().and_then(|s| s.parse::<IslTopology>().ok()) {
                        *value = ParamValue::Text(topology.as_str().to_string());
                    }
                }
            }
            if key == "Lm" && !values.iter().any(|v| v.matches(&ParamValue::Number(1.0))) {
                values.push(ParamValue::Number(1.0));
            }
            tables.insert(key, values);
        }
        Ok(Self(tables))
    }

    pub fn get(&self, key: &str) -> Option<&[ParamValue]> {
        self.0.get(key).map(Vec::as_slice)
    }
}

fn param_value(value: &Value) -> Option<ParamValue> {
    match value {
        Value::Number(n) => n.as_f64().map(ParamValue::Number),
        Value::String(s) => Some(ParamValue::Text(s.clone())),
        _ => None,
    }
}

fn json_value(value: &ParamValue) -> Result<Value> {
    match value {
        ParamValue::Number(x) if x.fract() == 0.0 && x.abs() < 9.0e15 => Ok(Value::from(*x as i64)),
        ParamValue::Number(x) => serde_json::Number::from_f64(*x)
            .map(Value::Number)
            .ok_or_else(|| CodecError::Corrupt(format!("non-finite value {}", x))),
        ParamValue::Text(s) => Ok(Value::String(s.clone())),
    }
}

fn walk(value: &mut Value, f: &mut dyn FnMut(&str, &mut Value) -> Result<bool>) -> Result<()> {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if !f(key, child)? {
                    walk(child, f)?;
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, f)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Replace swept values with their range index
pub fn encode_indices(value: &mut Value, tables: &ValueTables) -> Result<()> {
    walk(value, &mut |key, child| {
        let Some(table) = tables.get(key) else { return Ok(false) };
        let Some(current) = param_value(child) else { return Ok(false) };
        let index = table
            .iter()
            .position(|v| v.matches(&current))
            .ok_or_else(|| CodecError::UnknownValue { key: key.to_string(), value: current.to_string() })?;
        *child = Value::from(index);
        Ok(true)
    })
}

/// Restore swept values from their range index
pub fn decode_indices(value: &mut Value, tables: &ValueTables) -> Result<()> {
    walk(value, &mut |key, child| {
        let Some(table) = tables.get(key) else { return Ok(false) };
        if !matches!(child, Value::Number(_) | Value::String(_)) {
            return Ok(false);
        }
        let restored = child
            .as_u64()
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| table.get(i))
            .ok_or_else(|| CodecError::IndexOutOfRange { key: key.to_string(), index: child.to_string() })?;
        *child = json_value(restored)?;
        Ok(true)
    })
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '{' | '}' | '[' | ']' | ':' | ',' | '"')
}

/// Maximal runs of non-delimiter characters with their byte offsets
fn tokens(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        match (is_delimiter(c), start) {
            (true, Some(s)) => {
                out.push((s, &text[s..i]));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push((s, &text[s..]));
    }
    out
}

fn digits(n: usize) -> usize {
    n.to_string().len()
}

/// Dictionary-compress text. Fails on text containing SOH, STX or ETX.
pub fn compress(text: &str) -> Result<String> {
    if text.contains(|c| matches!(c, REF | SEP | END)) {
        return Err(CodecError::ReservedCharacter);
    }

    let found = tokens(text);
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for (_, token) in &found {
        if token.chars().count() >= MIN_TOKEN_LEN {
            *counts.entry(*token).or_default() += 1;
        }
    }

    let savings = |token: &str, count: usize, index: usize| -> i64 {
        let len = token.len() as i64;
        let reference = 2 + digits(index) as i64;
        count as i64 * (len - reference) - (len + 1)
    };

    let mut candidates: Vec<(&str, usize)> = counts.into_iter().filter(|&(_, c)| c > 1).collect();
    candidates.sort_by(|(ta, ca), (tb, cb)| {
        savings(tb, *cb, 0)
            .cmp(&savings(ta, *ca, 0))
            .then_with(|| ta.cmp(tb))
    });

    let mut entries: Vec<&str> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for (token, count) in candidates {
        if savings(token, count, entries.len()) > 0 {
            index.insert(token, entries.len());
            entries.push(token);
        }
    }

    let mut out = String::with_capacity(text.len());
    out.push_str(MAGIC);
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            out.push(SEP);
        }
        out.push_str(entry);
    }
    out.push(END);

    let mut last = 0;
    for (offset, token) in found {
        if let Some(i) = index.get(token) {
            out.push_str(&text[last..offset]);
            out.push(REF);
            out.push_str(&i.to_string());
            out.push(SEP);
            last = offset + token.len();
        }
    }
    out.push_str(&text[last..]);

    debug!("Compressed {} bytes to {} ({} entries)", text.len(), out.len(), entries.len());
    Ok(out)
}

pub fn is_compressed(text: &str) -> bool {
    text.starts_with(MAGIC)
}

/// Invert [`compress`]
pub fn decompress(text: &str) -> Result<String> {
    let payload = text
        .strip_prefix(MAGIC)
        .ok_or_else(|| CodecError::Corrupt("missing header".to_string()))?;
    let (dictionary, body) = payload
        .split_once(END)
        .ok_or_else(|| CodecError::Corrupt("unterminated dictionary".to_string()))?;
    let entries: Vec<&str> = if dictionary.is_empty() {
        Vec::new()
    } else {
        dictionary.split(SEP).collect()
    };

    let mut out = String::with_capacity(body.len() * 2);
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            REF => {
                let mut number = String::new();
                loop {
                    match chars.next() {
                        Some(SEP) => break,
                        Some(d) if d.is_ascii_digit() => number.push(d),
                        Some(other) => {
                            return Err(CodecError::Corrupt(format!("unexpected {:?} in reference", other)))
                        }
                        None => return Err(CodecError::Corrupt("unterminated reference".to_string())),
                    }
                }
                let entry = number
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| entries.get(i))
                    .ok_or_else(|| CodecError::Corrupt(format!("unknown reference {:?}", number)))?;
                out.push_str(entry);
            }
            SEP | END => return Err(CodecError::Corrupt("stray separator in body".to_string())),
            c => out.push(c),
        }
    }
    Ok(out)
}

/// Result file contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedResults {
    pub inputs: InputConfig,
    pub results: ExperimentResults,
}

/// Encode results with their inputs; `compact` applies index encoding and
/// dictionary compression
pub fn encode_results(inputs: &InputConfig, results: &ExperimentResults, compact: bool) -> Result<String> {
    if !compact {
        let saved = SavedResults { inputs: inputs.clone(), results: results.clone() };
        return Ok(serde_json::to_string_pretty(&saved)?);
    }

    let tables = ValueTables::from_inputs(inputs)?;
    let mut encoded = serde_json::to_value(results)?;
    encode_indices(&mut encoded, &tables)?;

    let mut doc = Map::new();
    doc.insert("inputs".to_string(), serde_json::to_value(inputs)?);
    doc.insert("results".to_string(), encoded);
    compress(&serde_json::to_string(&Value::Object(doc))?)
}

/// Decode either a compact or a plain result file
pub fn decode_results(text: &str) -> Result<SavedResults> {
    if !is_compressed(text) {
        return Ok(serde_json::from_str(text)?);
    }

    let json = decompress(text)?;
    let mut doc: Value = serde_json::from_str(&json)?;
    let inputs: InputConfig = serde_json::from_value(doc.get("inputs").cloned().unwrap_or(Value::Null))?;
    let tables = ValueTables::from_inputs(&inputs)?;

    let mut encoded = doc
        .get_mut("results")
        .map(Value::take)
        .ok_or_else(|| CodecError::Corrupt("missing results".to_string()))?;
    decode_indices(&mut encoded, &tables)?;

    Ok(SavedResults { inputs, results: serde_json::from_value(encoded)? })
}

pub fn save_results(
    path: impl AsRef<Path>,
    inputs: &InputConfig,
    results: &ExperimentResults,
    compact: bool,
) -> crate::Result<()> {
    let path = path.as_ref();
    let text = encode_results(inputs, results, compact)?;
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(text.as_bytes())?;
    writer.flush()?;
    info!("Wrote {} bytes of results to {:?}", text.len(), path);
    Ok(())
}

pub fn load_results(path: impl AsRef<Path>) -> crate::Result<SavedResults> {
    let path = path.as_ref();
    info!("Loading results from {:?}", path);
    let mut text = String::new();
    BufReader::new(File::open(path)?).read_to_string(&mut text)?;
    Ok(decode_results(&text)?)
}
