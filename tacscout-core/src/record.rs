//! Best-effort field resolution over loosely-typed telemetry records.
//!
//! Telemetry is not schema-stable: the same logical attribute shows up under
//! different key names depending on the producer and the record. Each
//! [`Attribute`] carries an ordered list of candidate keys; the first key
//! that is present and non-null wins. Lookups never fail, they return `None`
//! and the caller substitutes a default.

use std::hash::Hasher;

use chrono::DateTime;
use serde_json::{Map, Value};
use twox_hash::XxHash64;

use crate::numbers::{f64_to_i64, i64_to_f64, i64_to_u32};

/// An untyped record exactly as delivered by the telemetry source.
pub type RawRecord = Map<String, Value>;

/// Logical attributes the pipeline reads from raw records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Kind,
    Round,
    Actor,
    Victim,
    Site,
    Timestamp,
    Clock,
    MapLabel,
    MapIndex,
    MapNumber,
    Name,
    Team,
    TeamName,
    Agent,
    Winner,
}

impl Attribute {
    /// Candidate keys in priority order.
    #[must_use]
    pub const fn keys(self) -> &'static [&'static str] {
        match self {
            Self::Kind => &["event_type", "type", "eventType", "action"],
            Self::Round => &["round_number", "round_id", "round", "roundNumber"],
            Self::Actor => &[
                "killer",
                "killer_name",
                "actor",
                "attacker",
                "player",
                "planter",
            ],
            Self::Victim => &["victim", "victim_name", "target"],
            Self::Site => &["site", "plant_site", "bombsite", "spike_site"],
            Self::Timestamp => &["timestamp", "occurred_at", "time"],
            Self::Clock => &["round_time", "sequence", "seq"],
            Self::MapLabel => &["map", "map_name", "mapName"],
            Self::MapIndex => &["map_index", "game_index"],
            Self::MapNumber => &["map_number", "game_number", "map_sequence"],
            Self::Name => &["name", "map_name", "mapName"],
            Self::Team => &["team", "team_name", "side"],
            Self::TeamName => &["name", "team", "id"],
            Self::Agent => &["agent", "selected_agent", "character"],
            Self::Winner => &["winner", "winning_team"],
        }
    }
}

/// First present, non-null value for `attribute`.
#[must_use]
pub fn resolve(record: &RawRecord, attribute: Attribute) -> Option<&Value> {
    attribute
        .keys()
        .iter()
        .filter_map(|key| record.get(*key))
        .find(|value| !value.is_null())
}

/// Resolve `attribute` as a non-empty, trimmed string.
///
/// Numbers are rendered in their JSON form and objects are accepted when
/// they carry a `name` field (`{"name": "Ascent"}`).
#[must_use]
pub fn resolve_string(record: &RawRecord, attribute: Attribute) -> Option<String> {
    resolve(record, attribute).and_then(value_as_label)
}

/// Resolve `attribute` as a non-negative integer. Numeric strings are
/// accepted; fractional numbers are truncated.
#[must_use]
pub fn resolve_u32(record: &RawRecord, attribute: Attribute) -> Option<u32> {
    resolve(record, attribute).and_then(value_as_u32)
}

/// Resolve the record's absolute time: a plain number, a numeric string, or
/// an RFC 3339 timestamp converted to epoch milliseconds.
#[must_use]
pub fn resolve_timestamp(record: &RawRecord) -> Option<f64> {
    resolve(record, Attribute::Timestamp).and_then(value_as_timestamp)
}

/// Resolve the record's position within its round (round clock or a
/// source-provided ordinal).
#[must_use]
pub fn resolve_clock(record: &RawRecord) -> Option<f64> {
    resolve(record, Attribute::Clock).and_then(value_as_timestamp)
}

/// Interpret a value as a display label.
#[must_use]
pub fn value_as_label(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        Value::Object(inner) => inner.get("name").and_then(value_as_label),
        _ => None,
    }
}

fn value_as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .or_else(|| number.as_f64().and_then(f64_to_i64).and_then(i64_to_u32)),
        Value::String(text) => text.trim().parse::<u32>().ok(),
        _ => None,
    }
}

fn value_as_timestamp(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|n| n.is_finite()),
        Value::String(text) => {
            let trimmed = text.trim();
            if let Ok(parsed) = trimmed.parse::<f64>() {
                return parsed.is_finite().then_some(parsed);
            }
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|stamp| i64_to_f64(stamp.timestamp_millis()))
        }
        _ => None,
    }
}

/// Stable signature of a record's shape: xxHash64 over its sorted top-level
/// key names. Non-object values hash their JSON type name instead.
#[must_use]
pub fn shape_signature(value: &Value) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
            keys.sort_unstable();
            for key in keys {
                hasher.write(key.as_bytes());
                hasher.write_u8(0);
            }
        }
        other => hasher.write(json_type_name(other).as_bytes()),
    }
    hasher.finish()
}

/// Sorted top-level key names of a record, for diagnostics.
#[must_use]
pub fn shape_keys(value: &Value) -> Vec<String> {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<String> = map.keys().cloned().collect();
            keys.sort_unstable();
            keys
        }
        other => vec![format!("<{}>", json_type_name(other))],
    }
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            _ => RawRecord::new(),
        }
    }

    #[test]
    fn resolve_prefers_earlier_keys_and_skips_nulls() {
        let raw = record(json!({"killer": null, "killer_name": "Nova", "actor": "Other"}));
        assert_eq!(
            resolve_string(&raw, Attribute::Actor).as_deref(),
            Some("Nova")
        );
    }

    #[test]
    fn resolve_string_accepts_named_objects_and_numbers() {
        let raw = record(json!({"map": {"name": " Bind "}, "team": 7}));
        assert_eq!(
            resolve_string(&raw, Attribute::MapLabel).as_deref(),
            Some("Bind")
        );
        assert_eq!(resolve_string(&raw, Attribute::Team).as_deref(), Some("7"));
        assert_eq!(resolve_string(&raw, Attribute::Victim), None);
    }

    #[test]
    fn resolve_u32_handles_strings_and_fractions() {
        let raw = record(json!({"round_id": "12"}));
        assert_eq!(resolve_u32(&raw, Attribute::Round), Some(12));
        let raw = record(json!({"round": 3.0}));
        assert_eq!(resolve_u32(&raw, Attribute::Round), Some(3));
        let raw = record(json!({"round": -2}));
        assert_eq!(resolve_u32(&raw, Attribute::Round), None);
        let raw = record(json!({"round": "soon"}));
        assert_eq!(resolve_u32(&raw, Attribute::Round), None);
    }

    #[test]
    fn timestamps_accept_numbers_and_rfc3339() {
        let raw = record(json!({"timestamp": "2024-01-01T00:00:01Z"}));
        assert_eq!(resolve_timestamp(&raw), Some(1_704_067_201_000.0));
        let raw = record(json!({"time": 42.5}));
        assert_eq!(resolve_timestamp(&raw), Some(42.5));
        let raw = record(json!({"timestamp": "yesterday"}));
        assert_eq!(resolve_timestamp(&raw), None);
    }

    #[test]
    fn clocks_are_kept_apart_from_timestamps() {
        let raw = record(json!({"seq": "7", "round_time": 12}));
        assert_eq!(resolve_clock(&raw), Some(12.0));
        assert_eq!(resolve_timestamp(&raw), None);
        let raw = record(json!({"timestamp": 1_704_067_201_000_u64}));
        assert_eq!(resolve_clock(&raw), None);
    }

    #[test]
    fn shape_signature_ignores_key_order_and_values() {
        let first = json!({"a": 1, "b": 2});
        let second = json!({"b": "x", "a": null});
        let third = json!({"a": 1, "c": 2});
        assert_eq!(shape_signature(&first), shape_signature(&second));
        assert_ne!(shape_signature(&first), shape_signature(&third));
        assert_ne!(shape_signature(&json!([])), shape_signature(&json!("x")));
    }

    #[test]
    fn shape_keys_are_sorted() {
        assert_eq!(shape_keys(&json!({"z": 1, "a": 2})), vec!["a", "z"]);
        assert_eq!(shape_keys(&json!(5)), vec!["<number>"]);
    }
}
