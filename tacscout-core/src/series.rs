//! The assembled per-series model and the assembler that reconciles the
//! event stream with the end-state snapshot.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;

use crate::constants::{
    COMPOSITION_KEY_SEPARATOR, MAX_AGENTS_PER_TEAM, TEAMS_PER_MAP, UNKNOWN_LABEL,
};
use crate::diagnostics::{Diagnostic, ShapeSampler};
use crate::end_state::{EndStateParse, MapOutcome, bind_lineups, parse_end_state};
use crate::error::{AssemblyError, InvariantViolation};
use crate::events::{EventParse, ParsedMap, decode_archive, parse_events};
use crate::normalize::NormalizedEvent;

/// A team's agent picks; at most five, without repeats.
pub type Agents = SmallVec<[String; MAX_AGENTS_PER_TEAM]>;

/// One team's agent selection for one map instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapComposition {
    pub map_name: String,
    pub team: String,
    pub agents: Agents,
}

impl MapComposition {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Order-independent identity of the agent set, `None` when no agents
    /// were recorded.
    #[must_use]
    pub fn composition_key(&self) -> Option<String> {
        (!self.is_empty()).then(|| composition_key(&self.agents))
    }
}

/// Canonical key for an agent set: sorted names joined with `+`.
#[must_use]
pub fn composition_key(agents: &[String]) -> String {
    let mut sorted: Vec<&str> = agents.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.join(COMPOSITION_KEY_SEPARATOR)
}

/// One played map within a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapInstance {
    pub map_name: String,
    pub events: Vec<NormalizedEvent>,
    pub compositions: Vec<MapComposition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
}

/// Everything the aggregator needs from one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRecord {
    pub series_id: String,
    pub maps: Vec<MapInstance>,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl SeriesRecord {
    /// Check the model invariants the aggregator relies on.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantViolation::EmptyMapName`] when a map has a blank
    /// name and [`InvariantViolation::TooManyCompositions`] when a map lists
    /// more compositions than teams.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        for map in &self.maps {
            if map.map_name.trim().is_empty() {
                return Err(InvariantViolation::EmptyMapName {
                    series_id: self.series_id.clone(),
                });
            }
            if map.compositions.len() > TEAMS_PER_MAP {
                return Err(InvariantViolation::TooManyCompositions {
                    series_id: self.series_id.clone(),
                    map_name: map.map_name.clone(),
                    count: map.compositions.len(),
                });
            }
        }
        Ok(())
    }
}

/// Assemble one series from its raw event archive (line-delimited JSON) and
/// its end-state snapshot.
///
/// Maps are aligned by play order. The end-state label wins over the
/// event-derived one; when the two sources disagree on the number of maps
/// the longer side is truncated. Both cases are recorded as diagnostics.
///
/// # Errors
///
/// Returns an error when the series id is blank or neither source yields a
/// single map.
pub fn assemble_series(
    series_id: &str,
    raw_events: &str,
    raw_end_state: &Value,
    sampler: &ShapeSampler<'_>,
) -> Result<SeriesRecord, AssemblyError> {
    let series_id = series_id.trim();
    if series_id.is_empty() {
        return Err(AssemblyError::EmptySeriesId);
    }

    let end_state = parse_end_state(raw_end_state);
    let (records, mut diagnostics) = decode_archive(raw_events);
    let events = parse_events(&records, &end_state.map_labels(), sampler);

    if events.is_empty() && end_state.maps.is_empty() {
        return Err(AssemblyError::NoData {
            series_id: series_id.to_string(),
        });
    }

    diagnostics.extend(events.diagnostics.iter().cloned());
    diagnostics.extend(end_state.diagnostics.iter().cloned());
    let maps = reconcile(events, end_state, &mut diagnostics);

    for diagnostic in &diagnostics {
        warn!("series {series_id}: {diagnostic}");
    }
    info!(
        "assembled series {series_id}: {} maps, {} records",
        maps.len(),
        maps.iter().map(|map| map.events.len()).sum::<usize>()
    );

    Ok(SeriesRecord {
        series_id: series_id.to_string(),
        maps,
        diagnostics,
    })
}

fn reconcile(
    events: EventParse,
    end_state: EndStateParse,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<MapInstance> {
    if end_state.maps.is_empty() {
        return events
            .maps
            .into_iter()
            .map(|parsed| {
                let compositions = bind_lineups(&parsed.label, &end_state.series_lineups);
                MapInstance {
                    map_name: parsed.label,
                    events: parsed.events,
                    compositions,
                    winner: None,
                }
            })
            .collect();
    }

    if events.is_empty() {
        return end_state.maps.into_iter().map(from_outcome).collect();
    }

    let event_maps = events.maps.len();
    let end_state_maps = end_state.maps.len();
    if event_maps != end_state_maps {
        diagnostics.push(Diagnostic::AssemblyMismatch {
            event_maps,
            end_state_maps,
            kept: event_maps.min(end_state_maps),
        });
    }

    events
        .maps
        .into_iter()
        .zip(end_state.maps)
        .enumerate()
        .map(|(ordinal, (parsed, outcome))| merge_map(ordinal, parsed, outcome, diagnostics))
        .collect()
}

fn merge_map(
    ordinal: usize,
    parsed: ParsedMap,
    outcome: MapOutcome,
    diagnostics: &mut Vec<Diagnostic>,
) -> MapInstance {
    let map_name = if outcome.map_name == UNKNOWN_LABEL {
        parsed.label
    } else {
        if let Some(event_label) = parsed.event_label
            && !event_label.eq_ignore_ascii_case(&outcome.map_name)
        {
            diagnostics.push(Diagnostic::MapLabelMismatch {
                ordinal,
                event_label,
                end_state_label: outcome.map_name.clone(),
            });
        }
        outcome.map_name
    };

    let compositions = outcome
        .compositions
        .into_iter()
        .map(|composition| MapComposition {
            map_name: map_name.clone(),
            ..composition
        })
        .collect();

    MapInstance {
        map_name,
        events: parsed.events,
        compositions,
        winner: outcome.winner,
    }
}

fn from_outcome(outcome: MapOutcome) -> MapInstance {
    MapInstance {
        map_name: outcome.map_name,
        events: Vec::new(),
        compositions: outcome.compositions,
        winner: outcome.winner,
    }
}
