//! Hierarchical key/value settings
//!
//! Settings files hold `Namespace.key = value` lines. A scoped view looks a
//! key up in its namespace first, then in an optional secondary namespace,
//! and finally at the root. Group sections use this to inherit defaults:
//! `Group1.router` overrides `Group.router`.
//!
//! Numeric values accept the suffixes `k`, `M` and `G`, so `size = 500k`
//! reads as 500000.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::{ConfigError, ConfigResult};

/// Namespace-scoped view over a shared settings table
#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: Arc<BTreeMap<String, String>>,
    namespace: Option<String>,
    secondary: Option<String>,
}

impl Settings {
    /// Empty settings table at root scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings text
    pub fn parse(text: &str) -> ConfigResult<Self> {
        let mut values = BTreeMap::new();
        for (n, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::Parse {
                    line: n + 1,
                    reason: format!("expected 'key = value', got '{line}'"),
                });
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::Parse {
                    line: n + 1,
                    reason: "empty key".to_string(),
                });
            }
            values.insert(key.to_string(), value.trim().to_string());
        }
        Ok(Self {
            values: Arc::new(values),
            namespace: None,
            secondary: None,
        })
    }

    /// Read and parse a settings file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Insert or replace a fully-qualified key
    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        Arc::make_mut(&mut self.values).insert(key.into(), value.to_string());
    }

    /// View of the same table scoped to `namespace`
    pub fn scoped(&self, namespace: impl Into<String>) -> Settings {
        Settings {
            values: Arc::clone(&self.values),
            namespace: Some(namespace.into()),
            secondary: None,
        }
    }

    /// Add a fallback namespace consulted after the primary one
    pub fn with_secondary(mut self, namespace: impl Into<String>) -> Settings {
        self.secondary = Some(namespace.into());
        self
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Fully-qualified name of `key` in the primary namespace
    pub fn full_key(&self, key: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}.{key}"),
            None => key.to_string(),
        }
    }

    fn lookup(&self, key: &str) -> Option<&str> {
        let scopes = [self.namespace.as_deref(), self.secondary.as_deref()];
        for ns in scopes.into_iter().flatten() {
            if let Some(v) = self.values.get(&format!("{ns}.{key}")) {
                return Some(v);
            }
        }
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Raw string value of a required setting
    pub fn get(&self, key: &str) -> ConfigResult<&str> {
        self.lookup(key).ok_or_else(|| ConfigError::MissingSetting {
            key: self.full_key(key),
        })
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.lookup(key).unwrap_or(default)
    }

    fn invalid(&self, key: &str, value: &str, reason: &str) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.full_key(key),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn get_f64(&self, key: &str) -> ConfigResult<f64> {
        let raw = self.get(key)?;
        parse_number(raw).ok_or_else(|| self.invalid(key, raw, "not a number"))
    }

    pub fn get_f64_or(&self, key: &str, default: f64) -> ConfigResult<f64> {
        if self.contains(key) {
            self.get_f64(key)
        } else {
            Ok(default)
        }
    }

    /// A number that must not be negative
    pub fn get_non_negative(&self, key: &str) -> ConfigResult<f64> {
        let value = self.get_f64(key)?;
        if value < 0.0 {
            return Err(ConfigError::NegativeValue {
                key: self.full_key(key),
                value,
            });
        }
        Ok(value)
    }

    pub fn get_non_negative_or(&self, key: &str, default: f64) -> ConfigResult<f64> {
        if self.contains(key) {
            self.get_non_negative(key)
        } else {
            Ok(default)
        }
    }

    pub fn get_i64(&self, key: &str) -> ConfigResult<i64> {
        let raw = self.get(key)?;
        match parse_number(raw) {
            Some(v) if v.fract() == 0.0 => Ok(v as i64),
            _ => Err(self.invalid(key, raw, "not an integer")),
        }
    }

    pub fn get_i64_or(&self, key: &str, default: i64) -> ConfigResult<i64> {
        if self.contains(key) {
            self.get_i64(key)
        } else {
            Ok(default)
        }
    }

    /// An integer that must not be negative
    pub fn get_u64(&self, key: &str) -> ConfigResult<u64> {
        let value = self.get_i64(key)?;
        u64::try_from(value).map_err(|_| ConfigError::NegativeValue {
            key: self.full_key(key),
            value: value as f64,
        })
    }

    pub fn get_u64_or(&self, key: &str, default: u64) -> ConfigResult<u64> {
        if self.contains(key) {
            self.get_u64(key)
        } else {
            Ok(default)
        }
    }

    pub fn get_bool(&self, key: &str) -> ConfigResult<bool> {
        let raw = self.get(key)?;
        match raw.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(self.invalid(key, raw, "not a boolean")),
        }
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> ConfigResult<bool> {
        if self.contains(key) {
            self.get_bool(key)
        } else {
            Ok(default)
        }
    }

    /// Comma-separated values, trimmed
    pub fn get_csv(&self, key: &str) -> ConfigResult<Vec<&str>> {
        Ok(self.get(key)?.split(',').map(str::trim).collect())
    }

    /// Comma-separated numbers; `expected` enforces the count
    pub fn get_csv_f64(&self, key: &str, expected: Option<usize>) -> ConfigResult<Vec<f64>> {
        let raw = self.get(key)?;
        let values = raw
            .split(',')
            .map(|s| parse_number(s.trim()))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| self.invalid(key, raw, "not a list of numbers"))?;
        if let Some(n) = expected {
            if values.len() != n {
                return Err(self.invalid(key, raw, &format!("expected {n} values")));
            }
        }
        Ok(values)
    }

    pub fn get_csv_i64(&self, key: &str, expected: Option<usize>) -> ConfigResult<Vec<i64>> {
        let raw = self.get(key)?;
        let values = self.get_csv_f64(key, expected)?;
        if values.iter().any(|v| v.fract() != 0.0) {
            return Err(self.invalid(key, raw, "not a list of integers"));
        }
        Ok(values.into_iter().map(|v| v as i64).collect())
    }
}

/// Parse a number with an optional `k`, `M` or `G` multiplier
pub fn parse_number(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let (digits, mult) = match raw.chars().last()? {
        'k' => (&raw[..raw.len() - 1], 1e3),
        'M' => (&raw[..raw.len() - 1], 1e6),
        'G' => (&raw[..raw.len() - 1], 1e9),
        _ => (raw, 1.0),
    };
    digits.trim().parse::<f64>().ok().map(|v| v * mult)
}
