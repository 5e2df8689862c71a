//! Raw record normalizer: one loosely-typed record in, one tagged
//! [`NormalizedEvent`] out. Never fails.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diagnostics::ShapeSampler;
use crate::record::{
    Attribute, RawRecord, resolve_clock, resolve_string, resolve_timestamp, resolve_u32,
    shape_signature,
};

/// Closed set of event kinds the aggregator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Kill,
    Plant,
    Unknown,
}

/// Plant site bucket. Anything that is not recognisably A or B is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Site {
    A,
    B,
    Other,
}

impl Site {
    pub const ALL: [Self; 3] = [Self::A, Self::B, Self::Other];

    /// Classify a raw site label (`"A"`, `"site_b"`, `"B Site"`, `"mid"`).
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let Some(captures) = site_re().captures(label.trim()) else {
            return Self::Other;
        };
        match captures.get(1).map(|m| m.as_str()) {
            Some("a" | "A") => Self::A,
            Some("b" | "B") => Self::B,
            _ => Self::Other,
        }
    }

    /// Bucket an optional site: absent sites count as `Other`.
    #[must_use]
    pub fn bucket(site: Option<Self>) -> Self {
        site.unwrap_or(Self::Other)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::Other => "Other",
        }
    }

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::Other => 2,
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn site_re() -> &'static Regex {
    static SITE_RE: OnceLock<Regex> = OnceLock::new();
    SITE_RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:(?:bomb\s*)?site[\s_-]*)?([ab])(?:[\s_-]*(?:bomb\s*)?site)?$")
            .expect("valid site regex")
    })
}

/// A telemetry record reduced to the attributes the pipeline uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub kind: EventKind,
    /// Position of the record in its archive; the stable tie-breaker.
    pub sequence: usize,
    pub round_number: Option<u32>,
    pub actor: Option<String>,
    pub victim: Option<String>,
    pub site: Option<Site>,
    /// Absolute time, usually epoch milliseconds.
    pub timestamp: Option<f64>,
    /// Round clock or ordinal; only compared against other clocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock: Option<f64>,
    /// Map label carried by the record itself, if any.
    pub map_label: Option<String>,
    /// Explicit zero-based map position carried by the record, if any.
    pub map_ordinal: Option<usize>,
    /// Shape signature of records that matched no known kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape_signature: Option<u64>,
}

impl NormalizedEvent {
    /// An `Unknown` event with every attribute absent.
    #[must_use]
    pub fn unknown(sequence: usize, shape_signature: u64) -> Self {
        Self {
            kind: EventKind::Unknown,
            sequence,
            round_number: None,
            actor: None,
            victim: None,
            site: None,
            timestamp: None,
            clock: None,
            map_label: None,
            map_ordinal: None,
            shape_signature: Some(shape_signature),
        }
    }

    #[must_use]
    pub const fn is_kill(&self) -> bool {
        matches!(self.kind, EventKind::Kill)
    }

    #[must_use]
    pub const fn is_plant(&self) -> bool {
        matches!(self.kind, EventKind::Plant)
    }
}

/// Classify a record by its discriminator field.
#[must_use]
pub fn classify(record: &RawRecord) -> EventKind {
    let Some(discriminator) = resolve_string(record, Attribute::Kind) else {
        return EventKind::Unknown;
    };
    let lowered = discriminator.to_ascii_lowercase();
    if lowered.contains("kill") {
        EventKind::Kill
    } else if lowered.contains("plant") {
        EventKind::Plant
    } else {
        EventKind::Unknown
    }
}

/// Normalize one raw record. Unrecognised shapes become `Unknown` events
/// and are offered to the sampler.
#[must_use]
pub fn normalize_event(
    raw: &Value,
    sequence: usize,
    sampler: &ShapeSampler<'_>,
) -> NormalizedEvent {
    let signature = shape_signature(raw);
    let Value::Object(record) = raw else {
        sampler.offer(signature, raw);
        return NormalizedEvent::unknown(sequence, signature);
    };

    let kind = classify(record);
    let round_number = resolve_u32(record, Attribute::Round);
    let map_label = resolve_string(record, Attribute::MapLabel);
    let map_ordinal = map_ordinal(record);

    if kind == EventKind::Unknown {
        sampler.offer(signature, raw);
        return NormalizedEvent {
            round_number,
            map_label,
            map_ordinal,
            ..NormalizedEvent::unknown(sequence, signature)
        };
    }

    NormalizedEvent {
        kind,
        sequence,
        round_number,
        actor: resolve_string(record, Attribute::Actor),
        victim: match kind {
            EventKind::Kill => resolve_string(record, Attribute::Victim),
            _ => None,
        },
        site: match kind {
            EventKind::Plant => {
                resolve_string(record, Attribute::Site).map(|s| Site::from_label(&s))
            }
            _ => None,
        },
        timestamp: resolve_timestamp(record),
        clock: resolve_clock(record),
        map_label,
        map_ordinal,
        shape_signature: None,
    }
}

fn map_ordinal(record: &RawRecord) -> Option<usize> {
    if let Some(index) = resolve_u32(record, Attribute::MapIndex) {
        return usize::try_from(index).ok();
    }
    resolve_u32(record, Attribute::MapNumber)
        .and_then(|number| usize::try_from(number.saturating_sub(1)).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{MemorySink, NoopSink};
    use serde_json::json;

    fn normalize(raw: &Value) -> NormalizedEvent {
        let sink = NoopSink;
        let sampler = ShapeSampler::new(&sink, 8);
        normalize_event(raw, 0, &sampler)
    }

    #[test]
    fn kill_records_resolve_alternate_keys() {
        let event = normalize(&json!({
            "event_type": "player-killed-player",
            "killer_name": "Nova",
            "victim": {"name": "Rook"},
            "round_id": "4",
            "timestamp": 1200
        }));
        assert_eq!(event.kind, EventKind::Kill);
        assert_eq!(event.actor.as_deref(), Some("Nova"));
        assert_eq!(event.victim.as_deref(), Some("Rook"));
        assert_eq!(event.round_number, Some(4));
        assert_eq!(event.timestamp, Some(1200.0));
    }

    #[test]
    fn plant_records_bucket_sites() {
        let event = normalize(&json!({"type": "plant_spike", "site": "site_b", "round": 2}));
        assert_eq!(event.kind, EventKind::Plant);
        assert_eq!(event.site, Some(Site::B));
        let event = normalize(&json!({"event_type": "SpikePlanted", "plant_site": "mid"}));
        assert_eq!(event.site, Some(Site::Other));
        let event = normalize(&json!({"event_type": "spike-planted"}));
        assert_eq!(event.site, None);
        assert_eq!(Site::bucket(event.site), Site::Other);
    }

    #[test]
    fn site_labels_accept_decorations() {
        assert_eq!(Site::from_label("A"), Site::A);
        assert_eq!(Site::from_label(" b "), Site::B);
        assert_eq!(Site::from_label("B Site"), Site::B);
        assert_eq!(Site::from_label("bombsite-A"), Site::A);
        assert_eq!(Site::from_label("C"), Site::Other);
        assert_eq!(Site::from_label("ab"), Site::Other);
        assert_eq!(Site::from_label(""), Site::Other);
    }

    #[test]
    fn unknown_shapes_never_fail() {
        for raw in [
            json!(null),
            json!(42),
            json!("kill"),
            json!([1, 2, 3]),
            json!({}),
            json!({"event_type": 17}),
            json!({"event_type": "round-started", "round": 1}),
            json!({"type": {"nested": true}}),
        ] {
            let event = normalize(&raw);
            assert_eq!(event.kind, EventKind::Unknown, "{raw}");
            assert!(event.shape_signature.is_some());
        }
    }

    #[test]
    fn unknown_records_keep_round_and_map_metadata() {
        let event = normalize(&json!({"type": "map-started", "map_number": 2, "map": "Haven"}));
        assert_eq!(event.kind, EventKind::Unknown);
        assert_eq!(event.map_ordinal, Some(1));
        assert_eq!(event.map_label.as_deref(), Some("Haven"));
    }

    #[test]
    fn unknown_records_are_sampled_once_per_shape() {
        let sink = MemorySink::new();
        let sampler = ShapeSampler::new(&sink, 8);
        for seq in 0..5 {
            let raw = json!({"type": "round-started", "round": seq});
            let _ = normalize_event(&raw, seq, &sampler);
        }
        let _ = normalize_event(&json!({"type": "kill", "killer": "x"}), 5, &sampler);
        assert_eq!(sink.samples().len(), 1);
    }
}
