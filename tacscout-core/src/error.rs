//! Error types shared across the pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a telemetry source could not deliver a series.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("telemetry for {series_id} is unavailable: {reason}")]
    Unavailable { series_id: String, reason: String },
    #[error("not authorized to read telemetry for {series_id}: {reason}")]
    Unauthorized { series_id: String, reason: String },
    #[error("telemetry for {series_id} is not ready yet: {reason}")]
    NotReady { series_id: String, reason: String },
}

impl SourceError {
    #[must_use]
    pub fn series_id(&self) -> &str {
        match self {
            Self::Unavailable { series_id, .. }
            | Self::Unauthorized { series_id, .. }
            | Self::NotReady { series_id, .. } => series_id,
        }
    }
}

/// A series that could not be assembled at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("series id is empty")]
    EmptySeriesId,
    #[error("series {series_id} has neither events nor an end-state map list")]
    NoData { series_id: String },
}

/// A broken consistency rule in the assembled model or the aggregate.
/// Always a defect; callers abort instead of reporting the statistics.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InvariantViolation {
    #[error("series {series_id} contains a map with an empty name")]
    EmptyMapName { series_id: String },
    #[error("series {series_id} lists {count} compositions on {map_name}")]
    TooManyCompositions {
        series_id: String,
        map_name: String,
        count: usize,
    },
    #[error("{table} percentages for {map_name} sum to {sum:.4}")]
    PercentageSum {
        table: &'static str,
        map_name: String,
        sum: f64,
    },
    #[error("{table} for {map_name} has percentages but no samples")]
    PercentagesWithoutSamples {
        table: &'static str,
        map_name: String,
    },
    #[error("{table} counts for {map_name} add up to {counted}, total says {total}")]
    CountTotal {
        table: &'static str,
        map_name: String,
        counted: u32,
        total: u32,
    },
    #[error("net for {player} is {net}, expected {first_kills} - {first_deaths}")]
    NetMismatch {
        player: String,
        first_kills: u32,
        first_deaths: u32,
        net: i64,
    },
    #[error("insufficient_data for {map_name} is {flagged} with {observations} observations")]
    InsufficientFlag {
        map_name: String,
        flagged: bool,
        observations: u32,
    },
}

/// A series excluded from a scouting run, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesFailure {
    pub series_id: String,
    pub reason: String,
}

impl SeriesFailure {
    #[must_use]
    pub fn new(series_id: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            series_id: series_id.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<SourceError> for SeriesFailure {
    fn from(err: SourceError) -> Self {
        Self::new(err.series_id(), &err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_errors_carry_series_id() {
        let err = SourceError::NotReady {
            series_id: "2819".into(),
            reason: "no event files".into(),
        };
        assert_eq!(err.series_id(), "2819");
        let failure = SeriesFailure::from(err);
        assert_eq!(failure.series_id, "2819");
        assert_eq!(
            failure.reason,
            "telemetry for 2819 is not ready yet: no event files"
        );
    }
}
