//! Rendering of command results.
//!
//! Every command builds a `serde_json::Value` (key order preserved) and hands it
//! to [`format_output`] together with the [`OutputContext`] chosen on the command
//! line:
//!
//! - `toon` (default): tab-delimited Token-Oriented Object Notation, see [`toon`]
//! - `json`: pretty-printed with two-space indentation
//! - `plain`: `key: value` lines, see [`plain`]

pub mod plain;
pub mod toon;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::IsTerminal;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Toon,
    Json,
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputContext {
    pub format: OutputFormat,
    /// Colour booleans and keys (plain format only)
    pub colors: bool,
}

impl OutputContext {
    /// Colours follow whether stdout is a terminal.
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colors: std::io::stdout().is_terminal(),
        }
    }

    /// Uncoloured context, as used when output is captured.
    pub fn uncolored(format: OutputFormat) -> Self {
        Self {
            format,
            colors: false,
        }
    }
}

impl Default for OutputContext {
    fn default() -> Self {
        Self::new(OutputFormat::default())
    }
}

pub fn format_output(value: &Value, ctx: &OutputContext) -> Result<String> {
    match ctx.format {
        OutputFormat::Toon => Ok(toon::encode(value)),
        OutputFormat::Json => serde_json::to_string_pretty(value).context("Failed to render JSON"),
        OutputFormat::Plain => Ok(plain::encode(value, ctx.colors)),
    }
}

/// Ordered key/value record for command output; `None` values are left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn maybe<V: Into<Value>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.field(key, value),
            None => self,
        }
    }

    pub fn serialized<T: Serialize>(self, key: &str, value: &T) -> Result<Self> {
        let value = serde_json::to_value(value)
            .with_context(|| format!("Failed to serialize {key}"))?;
        Ok(self.field(key, value))
    }

    /// `{ key: record }`
    pub fn wrap(self, key: &str) -> Value {
        Record::new().field(key, self).into_value()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        record.into_value()
    }
}
