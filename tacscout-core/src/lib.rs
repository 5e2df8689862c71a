//! Tactical scouting pipeline
//!
//! Turns raw per-series match telemetry (a line-delimited event archive and
//! an end-of-series state snapshot) into aggregated tactical statistics and
//! a markdown report. This crate does no I/O of its own: telemetry arrives
//! through a [`TelemetrySource`] and schema samples leave through a
//! [`DiagnosticsSink`].

pub mod aggregate;
pub mod config;
pub mod constants;
pub mod diagnostics;
pub mod end_state;
pub mod error;
pub mod events;
pub mod normalize;
pub mod numbers;
pub mod record;
pub mod report;
pub mod series;

use std::collections::{BTreeMap, BTreeSet};

use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use aggregate::{
    AggregateStats, CompositionTable, DuelRecord, SiteBreakdown, TacticalAccumulator, aggregate,
};
pub use config::{ConfigError, ReportOptions, ScoutConfig};
pub use diagnostics::{Diagnostic, DiagnosticsSink, LogSink, MemorySink, NoopSink, ShapeSampler};
pub use end_state::{EndStateParse, MapOutcome, TeamLineup, parse_end_state};
pub use error::{AssemblyError, InvariantViolation, SeriesFailure, SourceError};
pub use events::{EventParse, OpeningKill, ParsedMap, decode_archive, opening_kills, parse_events};
pub use normalize::{EventKind, NormalizedEvent, Site, normalize_event};
pub use record::{Attribute, RawRecord};
pub use report::{render_exclusions, render_report, render_report_with};
pub use series::{
    Agents, MapComposition, MapInstance, SeriesRecord, assemble_series, composition_key,
};

/// Supplier of raw telemetry for a series.
pub trait TelemetrySource: Send + Sync {
    /// Fetch the series' event archive as line-delimited JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive is unavailable, unauthorized, or not
    /// yet published.
    fn fetch_events(&self, series_id: &str) -> Result<String, SourceError>;

    /// Fetch the series' end-state snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot is unavailable, unauthorized, or not
    /// yet published.
    fn fetch_end_state(&self, series_id: &str) -> Result<Value, SourceError>;
}

/// Result of one scouting run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoutReport {
    /// Series that contributed to the statistics, in request order.
    pub series_analyzed: Vec<String>,
    /// Series that were excluded, with the reason.
    pub failures: Vec<SeriesFailure>,
    #[serde(flatten)]
    pub stats: AggregateStats,
    /// Non-fatal diagnostics per analysed series; series without any are
    /// omitted.
    pub diagnostics: BTreeMap<String, Vec<Diagnostic>>,
    pub markdown_report: String,
}

/// Drives scouting runs against a telemetry source.
pub struct ScoutEngine<T, D>
where
    T: TelemetrySource,
    D: DiagnosticsSink,
{
    source: T,
    sink: D,
    config: ScoutConfig,
}

impl<T, D> ScoutEngine<T, D>
where
    T: TelemetrySource,
    D: DiagnosticsSink,
{
    pub const fn new(source: T, sink: D, config: ScoutConfig) -> Self {
        Self {
            source,
            sink,
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ScoutConfig {
        &self.config
    }

    #[must_use]
    pub const fn sink(&self) -> &D {
        &self.sink
    }

    /// Fetch and assemble a single series.
    ///
    /// # Errors
    ///
    /// Returns the reason the series cannot take part in a run.
    pub fn assemble(
        &self,
        series_id: &str,
        sampler: &ShapeSampler<'_>,
    ) -> Result<SeriesRecord, SeriesFailure> {
        let events = self.source.fetch_events(series_id)?;
        let end_state = self.source.fetch_end_state(series_id)?;
        assemble_series(series_id, &events, &end_state, sampler)
            .map_err(|err| SeriesFailure::new(series_id, err))
    }

    /// Scout the requested series. Blank ids are ignored and duplicates
    /// collapse to their first occurrence. Series that cannot be fetched or
    /// assembled are excluded and listed in the report; the rest are
    /// aggregated.
    ///
    /// # Errors
    ///
    /// Returns an [`InvariantViolation`] when the assembled data or the
    /// statistics are internally inconsistent.
    pub fn scout(&self, series_ids: &[String]) -> Result<ScoutReport, InvariantViolation> {
        let ids = unique_ids(series_ids);
        let sampler = ShapeSampler::new(&self.sink, self.config.schema_sample_cap);

        let outcomes: Vec<Result<SeriesRecord, SeriesFailure>> = ids
            .par_iter()
            .map(|series_id| self.assemble(series_id, &sampler))
            .collect();

        let mut records = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(record) => records.push(record),
                Err(failure) => {
                    warn!("excluding series {}: {}", failure.series_id, failure.reason);
                    failures.push(failure);
                }
            }
        }

        let stats = aggregate(&records)?;
        let series_analyzed: Vec<String> =
            records.iter().map(|record| record.series_id.clone()).collect();
        let diagnostics = records
            .into_iter()
            .filter(|record| !record.diagnostics.is_empty())
            .map(|record| (record.series_id, record.diagnostics))
            .collect();

        let mut markdown_report =
            render_report_with(&stats, &series_analyzed, &self.config.report);
        markdown_report.push_str(&render_exclusions(&failures));

        info!(
            "scouted {} series ({} excluded, {} schema samples forwarded)",
            series_analyzed.len(),
            failures.len(),
            sampler.forwarded()
        );

        Ok(ScoutReport {
            series_analyzed,
            failures,
            stats,
            diagnostics,
            markdown_report,
        })
    }
}

fn unique_ids(series_ids: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    series_ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && seen.insert(*id))
        .map(str::to_string)
        .collect()
}
