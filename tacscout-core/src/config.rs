//! Run configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{DEFAULT_COMPS_PER_MAP, DEFAULT_DUEL_ROWS, DEFAULT_SCHEMA_SAMPLE_CAP};

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{field} must be at least {min} (got {value})")]
    MinViolation {
        field: &'static str,
        min: usize,
        value: usize,
    },
}

/// Tunables for one scouting run. Every field has a default, so a partial
/// (or empty) JSON document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoutConfig {
    /// Distinct unrecognised record shapes forwarded to the diagnostics
    /// sink per run.
    #[serde(default = "ScoutConfig::default_schema_sample_cap")]
    pub schema_sample_cap: usize,
    #[serde(default)]
    pub report: ReportOptions,
}

impl ScoutConfig {
    const fn default_schema_sample_cap() -> usize {
        DEFAULT_SCHEMA_SAMPLE_CAP
    }

    /// Parse configuration from JSON; absent keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error when the document is not valid JSON for this shape
    /// or a value is out of range.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error when a report table is configured with no rows.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("report.duel_rows", self.report.duel_rows),
            ("report.comps_per_map", self.report.comps_per_map),
        ] {
            if value < 1 {
                return Err(ConfigError::MinViolation {
                    field,
                    min: 1,
                    value,
                });
            }
        }
        Ok(())
    }
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            schema_sample_cap: Self::default_schema_sample_cap(),
            report: ReportOptions::default(),
        }
    }
}

/// Row limits for the rendered report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportOptions {
    #[serde(default = "ReportOptions::default_duel_rows")]
    pub duel_rows: usize,
    #[serde(default = "ReportOptions::default_comps_per_map")]
    pub comps_per_map: usize,
}

impl ReportOptions {
    const fn default_duel_rows() -> usize {
        DEFAULT_DUEL_ROWS
    }

    const fn default_comps_per_map() -> usize {
        DEFAULT_COMPS_PER_MAP
    }
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            duel_rows: Self::default_duel_rows(),
            comps_per_map: Self::default_comps_per_map(),
        }
    }
}
