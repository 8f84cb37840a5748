// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Process configuration.
//
// The deployment half of the safety catch lives here, together with the
// spooler settings the transports need. Configuration is injected as a
// `ConfigSource` rather than read from ambient state.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{PrintcatchError, Result};

/// Fixed key of the process-wide safety catch.
pub const PRINT_SAFETY_CATCH: &str = "print_safety_catch";

/// Section holding strategy safety options named without a section.
pub const STRATEGY_SECTION: &str = "print.strategy";

/// Key under which `SpoolerSettings` are stored in the configuration file.
pub const SPOOLER_SECTION: &str = "spooler";

/// Read-only view of process configuration.
pub trait ConfigSource: Send + Sync {
    /// Raw value for `key`, if present.
    fn get(&self, key: &str) -> Option<Value>;

    /// `key` interpreted as a strict boolean.
    ///
    /// Absent and non-boolean values are `false`.
    fn get_bool(&self, key: &str) -> bool {
        self.get(key).as_ref().and_then(as_strict_bool).unwrap_or(false)
    }
}

/// Reduce a configuration value to a boolean.
///
/// Accepts JSON booleans, the integers 1 and 0, and the usual config-file
/// spellings (`true`/`yes`/`on`/`1` and `false`/`no`/`off`/`0`). Anything else
/// has no boolean reading.
pub fn as_strict_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Settings used by the spooling transports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpoolerSettings {
    /// Executable used by the `lpr` command transport.
    pub lpr_command: String,
    /// Connect / command timeout for transports.
    pub transport_timeout_secs: u64,
    /// Copies printed when a request does not say otherwise.
    pub default_copies: u32,
}

impl Default for SpoolerSettings {
    fn default() -> Self {
        Self {
            lpr_command: "lpr".into(),
            transport_timeout_secs: 60,
            default_copies: 1,
        }
    }
}

/// Process configuration backed by a JSON options map.
///
/// Keys may be flat (`"print_safety_catch"`), literally dotted
/// (`"labels.enabled"`) or nested (`{"labels": {"enabled": true}}`); a dotted
/// lookup tries the literal key first.
#[derive(Debug, Clone, Default)]
pub struct ProcessConfig {
    options: Map<String, Value>,
}

impl ProcessConfig {
    pub fn new(options: Map<String, Value>) -> Self {
        Self { options }
    }

    /// Build from key/value pairs (mostly for tests and embedding).
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            options: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parse a JSON object.
    pub fn from_json(text: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(text)? {
            Value::Object(options) => Ok(Self { options }),
            other => Err(PrintcatchError::Config(format!(
                "expected a JSON object at the top level, found {}",
                kind_of(&other)
            ))),
        }
    }

    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        info!(path = %path.display(), keys = config.options.len(), "process configuration loaded");
        Ok(config)
    }

    /// Load configuration if the file exists, otherwise start empty (printing
    /// disabled).
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            warn!(path = %path.display(), "no configuration file, printing stays disabled");
            Ok(Self::default())
        }
    }

    /// Set or replace a top-level option.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.options.insert(key.into(), value.into());
    }

    /// Spooler settings, falling back to defaults when missing or malformed.
    pub fn spooler(&self) -> SpoolerSettings {
        match self.options.get(SPOOLER_SECTION) {
            Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
                warn!("ignoring malformed spooler settings: {e}");
                SpoolerSettings::default()
            }),
            None => SpoolerSettings::default(),
        }
    }
}

impl ConfigSource for ProcessConfig {
    fn get(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.options.get(key) {
            return Some(value.clone());
        }
        let mut parts = key.split('.');
        let mut current = self.options.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        debug!(key, "resolved nested configuration key");
        Some(current.clone())
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
