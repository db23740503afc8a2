//! Converter configuration
//!
//! Settings come from an optional TOML file and can be overridden from the
//! environment:
//!
//! ```toml
//! sport = "rowing"
//! pretty_print = true
//! strict = false
//! rowpro_version = "3.1"
//! utc_offset_minutes = 60
//! ```

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::document::Sport;
use crate::error::ConvertError;

pub const ENV_SPORT: &str = "ROWPRO_TCX_SPORT";
pub const ENV_PRETTY: &str = "ROWPRO_TCX_PRETTY";
pub const ENV_STRICT: &str = "ROWPRO_TCX_STRICT";
pub const ENV_VERSION: &str = "ROWPRO_TCX_VERSION";
pub const ENV_UTC_OFFSET: &str = "ROWPRO_TCX_UTC_OFFSET";

/// Offsets must stay strictly within one day
const MAX_OFFSET_MINUTES: i32 = 24 * 60 - 1;

/// Settings for one conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverterConfig {
    /// Sport written on the activity
    pub sport: Sport,
    /// Indent the XML output
    pub pretty_print: bool,
    /// Fail on the first diagnostic
    pub strict: bool,
    /// RowPro version written into the `Creator` element
    pub rowpro_version: Option<String>,
    /// Offset applied to export timestamps that carry none
    pub utc_offset_minutes: i32,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            sport: Sport::default(),
            pretty_print: true,
            strict: false,
            rowpro_version: None,
            utc_offset_minutes: 0,
        }
    }
}

impl ConverterConfig {
    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, ConvertError> {
        let config: Self = toml::from_str(text).map_err(|e| ConvertError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConvertError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self, ConvertError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable helper that reads overrides through `get` instead of the
    /// process environment.
    pub fn from_env_with<F>(get: F) -> Result<Self, ConvertError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_env(get)?;
        Ok(config)
    }

    /// Override fields from environment-style lookups; unset keys are left alone
    pub fn apply_env<F>(&mut self, mut get: F) -> Result<(), ConvertError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(value) = get(ENV_SPORT) {
            self.sport = value
                .parse()
                .map_err(|e| ConvertError::Config(format!("{ENV_SPORT}: {e}")))?;
        }
        if let Some(value) = get(ENV_PRETTY) {
            self.pretty_print = parse_flag(ENV_PRETTY, &value)?;
        }
        if let Some(value) = get(ENV_STRICT) {
            self.strict = parse_flag(ENV_STRICT, &value)?;
        }
        if let Some(value) = get(ENV_VERSION) {
            let value = value.trim();
            self.rowpro_version = (!value.is_empty()).then(|| value.to_string());
        }
        if let Some(value) = get(ENV_UTC_OFFSET) {
            self.utc_offset_minutes = value
                .trim()
                .parse()
                .map_err(|e| ConvertError::Config(format!("{ENV_UTC_OFFSET}: {e}")))?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConvertError> {
        self.utc_offset().map(|_| ())
    }

    /// Default offset for naive timestamps
    pub fn utc_offset(&self) -> Result<FixedOffset, ConvertError> {
        if self.utc_offset_minutes.abs() > MAX_OFFSET_MINUTES {
            return Err(ConvertError::Config(format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            )));
        }
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            ConvertError::Config(format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            ))
        })
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConvertError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConvertError::Config(format!("{key}: expected a boolean, got {other:?}"))),
    }
}
