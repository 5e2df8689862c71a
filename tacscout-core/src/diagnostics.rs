//! Diagnostics: the injectable schema-sample sink and the per-series
//! diagnostic records produced while parsing and assembling.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::shape_keys;

/// Best-effort destination for samples of unrecognised record shapes.
///
/// Implementations must never block for long or fail: the pipeline calls
/// this inline and ignores the outcome.
pub trait DiagnosticsSink: Send + Sync {
    fn record_schema_sample(&self, shape_signature: u64, sample: &Value);
}

/// Sink that drops every sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl DiagnosticsSink for NoopSink {
    fn record_schema_sample(&self, _shape_signature: u64, _sample: &Value) {}
}

/// Sink that writes samples to the `log` facade at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl DiagnosticsSink for LogSink {
    fn record_schema_sample(&self, shape_signature: u64, sample: &Value) {
        log::debug!(
            "unrecognised record shape {shape_signature:016x}: keys {:?}",
            shape_keys(sample)
        );
    }
}

/// Sink that keeps every sample in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    samples: Mutex<Vec<(u64, Value)>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the samples received so far, in arrival order.
    #[must_use]
    pub fn samples(&self) -> Vec<(u64, Value)> {
        match self.samples.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl DiagnosticsSink for MemorySink {
    fn record_schema_sample(&self, shape_signature: u64, sample: &Value) {
        let mut guard = match self.samples.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push((shape_signature, sample.clone()));
    }
}

/// Forwards at most one sample per distinct shape to a sink, up to `cap`
/// distinct shapes in total. Shared across every series of one run.
pub struct ShapeSampler<'a> {
    sink: &'a dyn DiagnosticsSink,
    cap: usize,
    seen: Mutex<BTreeSet<u64>>,
}

impl<'a> ShapeSampler<'a> {
    #[must_use]
    pub fn new(sink: &'a dyn DiagnosticsSink, cap: usize) -> Self {
        Self {
            sink,
            cap,
            seen: Mutex::new(BTreeSet::new()),
        }
    }

    /// Offer a sample; returns `true` when it was forwarded.
    pub fn offer(&self, shape_signature: u64, sample: &Value) -> bool {
        {
            let mut seen = match self.seen.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if seen.len() >= self.cap || !seen.insert(shape_signature) {
                return false;
            }
        }
        self.sink.record_schema_sample(shape_signature, sample);
        true
    }

    /// Number of distinct shapes forwarded so far.
    #[must_use]
    pub fn forwarded(&self) -> usize {
        match self.seen.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

impl fmt::Debug for ShapeSampler<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeSampler")
            .field("cap", &self.cap)
            .field("forwarded", &self.forwarded())
            .finish_non_exhaustive()
    }
}

/// Non-fatal observations made while assembling one series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Records whose shape matched no known event kind.
    SchemaAnomaly {
        unknown_records: usize,
        distinct_shapes: usize,
    },
    /// A line of the event archive was not valid JSON.
    MalformedLine { line: usize, error: String },
    /// Event stream and end-state snapshot named the same map differently;
    /// the end-state label was kept.
    MapLabelMismatch {
        ordinal: usize,
        event_label: String,
        end_state_label: String,
    },
    /// A record named a map position past the next unplayed map; the
    /// position was treated as the next map instead.
    MapOrdinalOutOfRange { ordinal: usize },
    /// Event stream and end-state snapshot disagree on the number of maps.
    AssemblyMismatch {
        event_maps: usize,
        end_state_maps: usize,
        kept: usize,
    },
    /// A team listed more than the allowed agents or repeated an agent.
    CompositionTrimmed {
        map_name: String,
        team: String,
        dropped: Vec<String>,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SchemaAnomaly {
                unknown_records,
                distinct_shapes,
            } => write!(
                f,
                "{unknown_records} unrecognised records across {distinct_shapes} shapes"
            ),
            Self::MalformedLine { line, error } => {
                write!(f, "line {line} is not valid JSON: {error}")
            }
            Self::MapLabelMismatch {
                ordinal,
                event_label,
                end_state_label,
            } => write!(
                f,
                "map {ordinal} labelled {event_label:?} by events but {end_state_label:?} by end state"
            ),
            Self::MapOrdinalOutOfRange { ordinal } => {
                write!(f, "map position {ordinal} is out of range; treated as the next map")
            }
            Self::AssemblyMismatch {
                event_maps,
                end_state_maps,
                kept,
            } => write!(
                f,
                "events describe {event_maps} maps, end state {end_state_maps}; kept {kept}"
            ),
            Self::CompositionTrimmed {
                map_name,
                team,
                dropped,
            } => write!(
                f,
                "{team} on {map_name}: dropped agents {}",
                dropped.join(", ")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sampler_forwards_each_shape_once() {
        let sink = MemorySink::new();
        let sampler = ShapeSampler::new(&sink, 8);
        assert!(sampler.offer(1, &json!({"a": 1})));
        assert!(!sampler.offer(1, &json!({"a": 2})));
        assert!(sampler.offer(2, &json!({"b": 1})));
        assert_eq!(sink.samples().len(), 2);
        assert_eq!(sampler.forwarded(), 2);
    }

    #[test]
    fn sampler_respects_cap() {
        let sink = MemorySink::new();
        let sampler = ShapeSampler::new(&sink, 2);
        for signature in 0..10 {
            sampler.offer(signature, &Value::Null);
        }
        assert_eq!(sink.samples().len(), 2);
    }

    #[test]
    fn noop_and_log_sinks_accept_samples() {
        NoopSink.record_schema_sample(1, &json!({"x": 1}));
        LogSink.record_schema_sample(2, &json!([1, 2]));
    }

    #[test]
    fn diagnostics_render_readably() {
        let diag = Diagnostic::AssemblyMismatch {
            event_maps: 3,
            end_state_maps: 2,
            kept: 2,
        };
        assert_eq!(
            diag.to_string(),
            "events describe 3 maps, end state 2; kept 2"
        );
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["kind"], "assembly_mismatch");
    }
}
