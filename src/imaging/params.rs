//! Request parameters and encoding quality.
//!
//! A [`ParameterSet`] is the flat `name → value` mapping a caller hands to one
//! pipeline invocation. Every manipulator reads only the keys it owns, so the
//! same set is bound to each stage in turn without any stage seeing another
//! stage's parsed state.
//!
//! ## Types
//!
//! - [`Quality`]: lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`ParamValue`]: a single value, either free text or a number.
//! - [`ParameterSet`]: the mapping itself, with typed accessors that report
//!   malformed values as [`ParamError`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use url::form_urlencoded;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

impl From<u32> for Quality {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<Quality> for u32 {
    fn from(q: Quality) -> Self {
        q.0
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("parameter '{key}' has malformed value '{value}': expected {expected}")]
    Malformed {
        key: String,
        value: String,
        expected: &'static str,
    },
    #[error("parameter '{key}' value {value} is outside {min}..={max}")]
    OutOfRange {
        key: String,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// One parameter value as received from the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl ParamValue {
    /// Numeric view of the value. Text is parsed after trimming.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            ParamValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(n) => write!(f, "{n}"),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<f64> for ParamValue {
    fn from(n: f64) -> Self {
        ParamValue::Number(n)
    }
}

impl From<u32> for ParamValue {
    fn from(n: u32) -> Self {
        ParamValue::Number(n as f64)
    }
}

/// Parameters for one pipeline invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<String, ParamValue>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `key=value&key=value` query string.
    ///
    /// Empty pairs are skipped, a key without `=` maps to an empty string, and
    /// `+` / `%XX` escapes are decoded.
    pub fn parse_query(query: &str) -> Self {
        form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect()
    }

    /// Layer request parameters over configured defaults and presets.
    ///
    /// Precedence, lowest first: `defaults`, then every preset named in the
    /// request's comma-separated `p` parameter in the order given, then the
    /// request itself. Unknown preset names are ignored.
    pub fn resolve(
        request: &ParameterSet,
        defaults: &ParameterSet,
        presets: &BTreeMap<String, ParameterSet>,
    ) -> ParameterSet {
        let mut resolved = defaults.clone();
        if let Some(names) = request.get_str("p") {
            for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                match presets.get(name) {
                    Some(preset) => resolved.extend(preset),
                    None => tracing::debug!(preset = name, "unknown preset ignored"),
                }
            }
        }
        resolved.extend(request);
        resolved
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Overwrite entries with those from `other`.
    pub fn extend(&mut self, other: &ParameterSet) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// First key of `keys` that is present, with its value.
    pub fn first_of<'a>(&'a self, keys: &[&'a str]) -> Option<(&'a str, &'a ParamValue)> {
        keys.iter()
            .find_map(|k| self.0.get(*k).map(|v| (*k, v)))
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key)? {
            ParamValue::Text(s) => Some(s.as_str()),
            ParamValue::Number(_) => None,
        }
    }

    /// Text view of a value, numbers rendered with `Display`.
    pub fn get_text(&self, key: &str) -> Option<String> {
        self.0.get(key).map(|v| v.to_string())
    }

    /// Parse a numeric parameter and check it against an inclusive range.
    ///
    /// An absent or empty value is `Ok(None)`.
    pub fn get_number_in(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Option<f64>, ParamError> {
        let Some(value) = self.0.get(key) else {
            return Ok(None);
        };
        if matches!(value, ParamValue::Text(s) if s.trim().is_empty()) {
            return Ok(None);
        }
        let n = value
            .as_number()
            .filter(|n| n.is_finite())
            .ok_or_else(|| ParamError::Malformed {
                key: key.to_string(),
                value: value.to_string(),
                expected: "a number",
            })?;
        if n < min || n > max {
            return Err(ParamError::OutOfRange {
                key: key.to_string(),
                value: n,
                min,
                max,
            });
        }
        Ok(Some(n))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (k, v) in iter {
            set.insert(k, v);
        }
        set
    }
}
