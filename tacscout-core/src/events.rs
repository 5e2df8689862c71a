//! Event parser: splits one series' event archive into per-map event
//! sequences and classifies each round's opening duel.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{OPENING_ROUND_MAX, UNKNOWN_LABEL};
use crate::diagnostics::{Diagnostic, ShapeSampler};
use crate::normalize::{EventKind, NormalizedEvent, normalize_event};

/// Events attributed to one played map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedMap {
    pub label: String,
    /// First map label carried by the map's own records, if any.
    pub event_label: Option<String>,
    pub events: Vec<NormalizedEvent>,
}

/// Output of [`parse_events`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventParse {
    pub maps: Vec<ParsedMap>,
    /// Number of records in the archive.
    pub records: usize,
    /// `true` when a round reset or explicit map metadata split the stream.
    pub boundaries_found: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl EventParse {
    /// Whether the archive held no records at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.records == 0
    }
}

/// Decode a line-delimited JSON archive. Blank lines are skipped; lines
/// that are not valid JSON become `null` records (normalized to `Unknown`)
/// and are reported.
#[must_use]
pub fn decode_archive(text: &str) -> (Vec<Value>, Vec<Diagnostic>) {
    let mut records = Vec::new();
    let mut diagnostics = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => records.push(value),
            Err(err) => {
                diagnostics.push(Diagnostic::MalformedLine {
                    line: idx + 1,
                    error: err.to_string(),
                });
                records.push(Value::Null);
            }
        }
    }
    (records, diagnostics)
}

/// Attribute every record to a map.
///
/// The current map advances when a record carries an explicit map position
/// or when the round counter resets to an opening round after a later
/// round. Records before the first boundary belong to map 0. Without any
/// boundary the whole stream becomes a single map named after the first
/// declared map.
///
/// An explicit position may address any declared map or the next new map.
/// Anything further is pulled back to the later of those two and reported.
/// Maps past the declared ones that end up with no events are dropped.
#[must_use]
pub fn parse_events(
    raw: &[Value],
    declared_maps: &[String],
    sampler: &ShapeSampler<'_>,
) -> EventParse {
    let mut buckets: Vec<(Option<String>, Vec<NormalizedEvent>)> = vec![(None, Vec::new())];
    let mut current = 0usize;
    let mut last_round: Option<u32> = None;
    let mut boundaries_found = false;
    let mut unknown_records = 0usize;
    let mut unknown_shapes: BTreeSet<u64> = BTreeSet::new();
    let mut out_of_range: BTreeMap<usize, usize> = BTreeMap::new();

    for (sequence, value) in raw.iter().enumerate() {
        let event = normalize_event(value, sequence, sampler);

        if let Some(ordinal) = event.map_ordinal {
            boundaries_found = true;
            let limit = declared_maps.len().saturating_sub(1).max(buckets.len());
            let target = match out_of_range.get(&ordinal) {
                Some(assigned) => *assigned,
                None if ordinal > limit => {
                    out_of_range.insert(ordinal, limit);
                    limit
                }
                None => ordinal,
            };
            if target != current {
                current = target;
                last_round = None;
            }
        } else if let (Some(round), Some(last)) = (event.round_number, last_round)
            && round < last
            && round <= OPENING_ROUND_MAX
        {
            boundaries_found = true;
            current += 1;
        }
        if let Some(round) = event.round_number {
            last_round = Some(round);
        }

        if event.kind == EventKind::Unknown {
            unknown_records += 1;
            if let Some(signature) = event.shape_signature {
                unknown_shapes.insert(signature);
            }
        }

        if buckets.len() <= current {
            buckets.resize_with(current + 1, || (None, Vec::new()));
        }
        let bucket = &mut buckets[current];
        if bucket.0.is_none() {
            bucket.0.clone_from(&event.map_label);
        }
        bucket.1.push(event);
    }

    let maps = if boundaries_found {
        buckets
            .into_iter()
            .enumerate()
            .filter(|(idx, (_, events))| *idx < declared_maps.len() || !events.is_empty())
            .map(|(idx, (event_label, events))| {
                label_map(event_label, declared_maps.get(idx), events)
            })
            .collect()
    } else {
        let (event_label, events) = buckets.into_iter().next().unwrap_or_default();
        let label = declared_maps
            .first()
            .cloned()
            .or_else(|| event_label.clone())
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string());
        vec![ParsedMap {
            label,
            event_label,
            events,
        }]
    };

    let mut diagnostics: Vec<Diagnostic> = out_of_range
        .into_keys()
        .map(|ordinal| Diagnostic::MapOrdinalOutOfRange { ordinal })
        .collect();
    if unknown_records > 0 {
        diagnostics.push(Diagnostic::SchemaAnomaly {
            unknown_records,
            distinct_shapes: unknown_shapes.len(),
        });
    }

    EventParse {
        maps,
        records: raw.len(),
        boundaries_found,
        diagnostics,
    }
}

fn label_map(
    event_label: Option<String>,
    declared: Option<&String>,
    events: Vec<NormalizedEvent>,
) -> ParsedMap {
    let label = event_label
        .clone()
        .or_else(|| declared.cloned())
        .unwrap_or_else(|| UNKNOWN_LABEL.to_string());
    ParsedMap {
        label,
        event_label,
        events,
    }
}

/// The first kill of a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningKill {
    pub round: u32,
    pub killer: Option<String>,
    pub victim: Option<String>,
}

/// Pick each round's opening kill. Kills without a round number are ignored.
///
/// A round is ordered by absolute timestamps when any of its kills carries
/// one, otherwise by round clock. Kills missing the chosen key sort last and
/// ties keep input order.
#[must_use]
pub fn opening_kills(events: &[NormalizedEvent]) -> Vec<OpeningKill> {
    let mut rounds: BTreeMap<u32, Vec<&NormalizedEvent>> = BTreeMap::new();
    for event in events.iter().filter(|e| e.is_kill()) {
        if let Some(round) = event.round_number {
            rounds.entry(round).or_default().push(event);
        }
    }

    rounds
        .into_iter()
        .filter_map(|(round, kills)| {
            let key = OrderingKey::for_round(&kills);
            kills
                .into_iter()
                .reduce(|best, event| {
                    if key.of(event).total_cmp(&key.of(best)).is_lt() {
                        event
                    } else {
                        best
                    }
                })
                .map(|event| OpeningKill {
                    round,
                    killer: event.actor.clone(),
                    victim: event.victim.clone(),
                })
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
enum OrderingKey {
    Timestamp,
    Clock,
}

impl OrderingKey {
    fn for_round(kills: &[&NormalizedEvent]) -> Self {
        if kills.iter().any(|kill| kill.timestamp.is_some()) {
            Self::Timestamp
        } else {
            Self::Clock
        }
    }

    fn of(self, event: &NormalizedEvent) -> f64 {
        match self {
            Self::Timestamp => event.timestamp,
            Self::Clock => event.clock,
        }
        .unwrap_or(f64::INFINITY)
    }
}
