//! Parameter-sweep case generation.
//!
//! A case specification names a set of parameters to sweep over and a list
//! of alternate overrides:
//!
//! ```json
//! {
//!   "combine":   { "rate": [0.1, 0.2], "seed": [1, 2, 3] },
//!   "alternate": [ {}, { "model": "fast" } ]
//! }
//! ```
//!
//! Every combination of `combine` values is emitted once per alternate,
//! with the alternate's keys layered on top.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// One parameter assignment.
pub type Params = serde_json::Map<String, Value>;

#[derive(Debug, Error)]
pub enum CombinationError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid case specification: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CombinationError>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CaseSpecification {
    pub combine: IndexMap<String, Vec<Value>>,
    #[serde(default = "default_alternate")]
    pub alternate: Vec<Params>,
}

fn default_alternate() -> Vec<Params> {
    vec![Params::new()]
}

impl CaseSpecification {
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| CombinationError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_str(&content)
    }

    /// All cases, combinations outermost and alternates innermost.
    pub fn cases(&self) -> impl Iterator<Item = Params> + '_ {
        generate_cases(self)
    }
}

/// Cartesian product over the values of each key, last key varying fastest.
#[derive(Debug, Clone)]
pub struct ParameterCombinations<'a> {
    keys: Vec<&'a String>,
    values: Vec<&'a [Value]>,
    cursor: Vec<usize>,
    done: bool,
}

impl Iterator for ParameterCombinations<'_> {
    type Item = Params;

    fn next(&mut self) -> Option<Params> {
        if self.done {
            return None;
        }

        let params = self
            .keys
            .iter()
            .zip(&self.values)
            .zip(&self.cursor)
            .map(|((key, values), &i)| ((*key).clone(), values[i].clone()))
            .collect();

        // Odometer step; rolling over the first position ends the sequence.
        let mut pos = self.cursor.len();
        loop {
            if pos == 0 {
                self.done = true;
                break;
            }
            pos -= 1;
            self.cursor[pos] += 1;
            if self.cursor[pos] < self.values[pos].len() {
                break;
            }
            self.cursor[pos] = 0;
        }

        Some(params)
    }
}

/// Iterate over every assignment drawing one value per key.
///
/// An empty map yields one empty assignment. A key with no values yields
/// nothing.
pub fn parameter_combinations(d: &IndexMap<String, Vec<Value>>) -> ParameterCombinations<'_> {
    ParameterCombinations {
        keys: d.keys().collect(),
        values: d.values().map(Vec::as_slice).collect(),
        cursor: vec![0; d.len()],
        done: d.values().any(Vec::is_empty),
    }
}

/// Every combination of `spec.combine`, once per alternate, with the
/// alternate's entries overriding the combination's.
pub fn generate_cases(spec: &CaseSpecification) -> impl Iterator<Item = Params> + '_ {
    parameter_combinations(&spec.combine).flat_map(move |combination| {
        spec.alternate.iter().map(move |alternate| {
            let mut case = combination.clone();
            for (key, value) in alternate {
                case.insert(key.clone(), value.clone());
            }
            case
        })
    })
}

/// Write cases as JSON lines. Returns the number written.
pub fn write_cases<I, W>(cases: I, mut writer: W) -> Result<usize>
where
    I: IntoIterator<Item = Params>,
    W: Write,
{
    let mut count = 0;
    for case in cases {
        serde_json::to_writer(&mut writer, &case)?;
        writer.write_all(b"\n")?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(value: Value) -> CaseSpecification {
        serde_json::from_value(value).unwrap()
    }

    fn as_values(cases: impl Iterator<Item = Params>) -> Vec<Value> {
        cases.map(Value::Object).collect()
    }

    #[test]
    fn test_combinations_last_key_fastest() {
        let spec = spec(json!({"combine": {"a": [1, 2], "b": [3, 4]}}));
        assert_eq!(
            as_values(parameter_combinations(&spec.combine)),
            vec![
                json!({"a": 1, "b": 3}),
                json!({"a": 1, "b": 4}),
                json!({"a": 2, "b": 3}),
                json!({"a": 2, "b": 4}),
            ]
        );
    }

    #[test]
    fn test_empty_map_yields_one_empty_assignment() {
        let combine = IndexMap::new();
        assert_eq!(as_values(parameter_combinations(&combine)), vec![json!({})]);
    }

    #[test]
    fn test_key_without_values_yields_nothing() {
        let spec = spec(json!({"combine": {"a": [1, 2], "b": []}}));
        assert_eq!(parameter_combinations(&spec.combine).count(), 0);
    }

    #[test]
    fn test_cases_apply_alternates() {
        let spec = spec(json!({
            "combine": {"a": [1, 2], "m": ["slow"]},
            "alternate": [{}, {"m": "fast", "extra": true}]
        }));

        let cases: Vec<Value> = as_values(spec.cases());
        assert_eq!(
            cases,
            vec![
                json!({"a": 1, "m": "slow"}),
                json!({"a": 1, "m": "fast", "extra": true}),
                json!({"a": 2, "m": "slow"}),
                json!({"a": 2, "m": "fast", "extra": true}),
            ]
        );

        // Overridden keys keep their position.
        let keys: Vec<&String> = match &cases[1] {
            Value::Object(map) => map.keys().collect(),
            _ => unreachable!(),
        };
        assert_eq!(keys, vec!["a", "m", "extra"]);
    }

    #[test]
    fn test_missing_alternate_defaults_to_identity() {
        let spec = spec(json!({"combine": {"n": [10, 20, 30]}}));
        assert_eq!(spec.alternate, vec![Params::new()]);
        assert_eq!(generate_cases(&spec).count(), 3);
    }

    #[test]
    fn test_empty_alternate_list_yields_nothing() {
        let spec = spec(json!({"combine": {"n": [1]}, "alternate": []}));
        assert_eq!(generate_cases(&spec).count(), 0);
    }

    #[test]
    fn test_missing_combine_is_an_error() {
        assert!(matches!(
            CaseSpecification::from_json_str(r#"{"alternate": [{}]}"#),
            Err(CombinationError::Json(_))
        ));
    }

    #[test]
    fn test_write_cases_json_lines() {
        let spec = spec(json!({"combine": {"a": [1, 2]}}));
        let mut out = Vec::new();

        let n = write_cases(spec.cases(), &mut out).unwrap();

        assert_eq!(n, 2);
        assert_eq!(String::from_utf8(out).unwrap(), "{\"a\":1}\n{\"a\":2}\n");
    }
}
