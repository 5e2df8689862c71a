//! End-state parser: per-map compositions and outcomes from the snapshot a
//! series leaves behind once it has finished.

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{MAX_AGENTS_PER_TEAM, TEAMS_PER_MAP, UNKNOWN_LABEL};
use crate::diagnostics::Diagnostic;
use crate::record::{Attribute, RawRecord, resolve, resolve_string, value_as_label};
use crate::series::{Agents, MapComposition};

const MAP_LIST_KEYS: [&str; 2] = ["maps", "games"];
const NESTED_STATE_KEYS: [&str; 2] = ["seriesState", "series_state"];

/// One played map as recorded by the end-state snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapOutcome {
    pub map_name: String,
    pub compositions: Vec<MapComposition>,
    pub winner: Option<String>,
}

/// A team lineup that is not tied to a particular map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamLineup {
    pub team: String,
    pub agents: Agents,
}

impl TeamLineup {
    /// Bind the lineup to a map.
    #[must_use]
    pub fn on_map(&self, map_name: &str) -> MapComposition {
        MapComposition {
            map_name: map_name.to_string(),
            team: self.team.clone(),
            agents: self.agents.clone(),
        }
    }
}

/// Output of [`parse_end_state`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndStateParse {
    /// Maps in the order they were played.
    pub maps: Vec<MapOutcome>,
    /// Root-level lineups, applied to every map that lists none of its own.
    pub series_lineups: Vec<TeamLineup>,
    pub diagnostics: Vec<Diagnostic>,
}

impl EndStateParse {
    /// Declared map labels, in play order.
    #[must_use]
    pub fn map_labels(&self) -> Vec<String> {
        self.maps.iter().map(|map| map.map_name.clone()).collect()
    }
}

/// Parse an end-state snapshot. Unexpected shapes produce fewer maps or
/// empty compositions, never an error.
#[must_use]
pub fn parse_end_state(snapshot: &Value) -> EndStateParse {
    let mut diagnostics = Vec::new();
    let Value::Object(root) = snapshot else {
        return EndStateParse::default();
    };

    let containers: Vec<&RawRecord> = std::iter::once(root)
        .chain(
            NESTED_STATE_KEYS
                .iter()
                .filter_map(|key| root.get(*key).and_then(Value::as_object)),
        )
        .collect();

    let series_lineups = containers
        .iter()
        .find_map(|container| container.get("players").and_then(Value::as_array))
        .map(|players| lineups_from_players(players, UNKNOWN_LABEL, &mut diagnostics))
        .unwrap_or_default();

    let map_entries = containers
        .iter()
        .find_map(|container| {
            MAP_LIST_KEYS
                .iter()
                .find_map(|key| container.get(*key).and_then(Value::as_array))
        })
        .map(Vec::as_slice)
        .unwrap_or_default();

    let maps = map_entries
        .iter()
        .map(|entry| parse_map(entry, &series_lineups, &mut diagnostics))
        .collect();

    EndStateParse {
        maps,
        series_lineups,
        diagnostics,
    }
}

fn parse_map(
    entry: &Value,
    series_lineups: &[TeamLineup],
    diagnostics: &mut Vec<Diagnostic>,
) -> MapOutcome {
    let Value::Object(map) = entry else {
        let map_name = value_as_label(entry).unwrap_or_else(|| UNKNOWN_LABEL.to_string());
        return MapOutcome {
            compositions: bind_lineups(&map_name, series_lineups),
            map_name,
            winner: None,
        };
    };

    let map_name = resolve_string(map, Attribute::Name)
        .or_else(|| map.get("map").and_then(value_as_label))
        .unwrap_or_else(|| UNKNOWN_LABEL.to_string());

    let mut winner = resolve_string(map, Attribute::Winner);
    let lineups = if let Some(teams) = map.get("teams").and_then(Value::as_array) {
        let mut lineups = Vec::with_capacity(teams.len());
        for team in teams.iter().filter_map(Value::as_object) {
            let name = resolve_string(team, Attribute::TeamName)
                .unwrap_or_else(|| UNKNOWN_LABEL.to_string());
            if winner.is_none() && team.get("won").and_then(Value::as_bool) == Some(true) {
                winner = Some(name.clone());
            }
            let agents = team_agents(team);
            lineups.push(build_lineup(&map_name, name, agents, diagnostics));
        }
        lineups
    } else if let Some(players) = map.get("players").and_then(Value::as_array) {
        lineups_from_players(players, &map_name, diagnostics)
    } else {
        series_lineups.to_vec()
    };

    let compositions = bind_lineups(&map_name, &lineups);

    MapOutcome {
        map_name,
        compositions,
        winner,
    }
}

/// Bind lineups to a map, keeping the first [`TEAMS_PER_MAP`].
pub(crate) fn bind_lineups(map_name: &str, lineups: &[TeamLineup]) -> Vec<MapComposition> {
    if lineups.len() > TEAMS_PER_MAP {
        warn!(
            "{map_name}: {} team lineups listed, keeping the first {TEAMS_PER_MAP}",
            lineups.len()
        );
    }
    lineups
        .iter()
        .take(TEAMS_PER_MAP)
        .map(|lineup| lineup.on_map(map_name))
        .collect()
}

fn team_agents(team: &RawRecord) -> Vec<String> {
    if let Some(players) = team.get("players").and_then(Value::as_array) {
        return players
            .iter()
            .filter_map(Value::as_object)
            .filter_map(player_agent)
            .collect();
    }
    team.get("agents")
        .and_then(Value::as_array)
        .map(|agents| agents.iter().filter_map(value_as_label).collect())
        .unwrap_or_default()
}

fn player_agent(player: &RawRecord) -> Option<String> {
    resolve(player, Attribute::Agent).and_then(value_as_label)
}

/// Group a flat player list into lineups by team, in first-seen order.
fn lineups_from_players(
    players: &[Value],
    map_name: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<TeamLineup> {
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for player in players.iter().filter_map(Value::as_object) {
        let team =
            resolve_string(player, Attribute::Team).unwrap_or_else(|| UNKNOWN_LABEL.to_string());
        let slot = match grouped.iter().position(|(name, _)| *name == team) {
            Some(idx) => idx,
            None => {
                grouped.push((team, Vec::new()));
                grouped.len() - 1
            }
        };
        if let Some(agent) = player_agent(player) {
            grouped[slot].1.push(agent);
        }
    }
    grouped
        .into_iter()
        .map(|(team, agents)| build_lineup(map_name, team, agents, diagnostics))
        .collect()
}

/// De-duplicate (first occurrence wins) and cap a team's agent list.
fn build_lineup(
    map_name: &str,
    team: String,
    raw_agents: Vec<String>,
    diagnostics: &mut Vec<Diagnostic>,
) -> TeamLineup {
    let mut agents = Agents::new();
    let mut dropped = Vec::new();
    for agent in raw_agents {
        if agents.contains(&agent) || agents.len() == MAX_AGENTS_PER_TEAM {
            dropped.push(agent);
        } else {
            agents.push(agent);
        }
    }
    if !dropped.is_empty() {
        let diagnostic = Diagnostic::CompositionTrimmed {
            map_name: map_name.to_string(),
            team: team.clone(),
            dropped,
        };
        warn!("{diagnostic}");
        diagnostics.push(diagnostic);
    }
    TeamLineup { team, agents }
}
