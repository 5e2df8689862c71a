//! Tactical aggregation across any number of assembled series.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::constants::{MIN_COMPOSITION_SAMPLES, UNKNOWN_LABEL};
use crate::error::InvariantViolation;
use crate::events::opening_kills;
use crate::normalize::Site;
use crate::numbers::{hundredths_to_percent, largest_remainder_hundredths};
use crate::series::{MapInstance, SeriesRecord};

const PERCENT_TOLERANCE: f64 = 0.01;

/// Composition counts for one map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionTable {
    /// Composition key -> number of times a team fielded it.
    pub compositions: BTreeMap<String, u32>,
    /// Non-empty composition observations.
    pub total: u32,
    pub insufficient_data: bool,
}

impl CompositionTable {
    /// Compositions by count descending, key ascending.
    #[must_use]
    pub fn ranked(&self) -> Vec<(&str, u32)> {
        let mut rows: Vec<(&str, u32)> = self
            .compositions
            .iter()
            .map(|(key, count)| (key.as_str(), *count))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        rows
    }
}

/// Site counts and percentages for one map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteBreakdown {
    pub counts: BTreeMap<Site, u32>,
    /// Empty when `total` is zero.
    pub percentages: BTreeMap<Site, f64>,
    pub total: u32,
}

impl SiteBreakdown {
    fn from_counts(counts: [u32; 3]) -> Self {
        let total: u32 = counts.iter().sum();
        let percentages = if total == 0 {
            BTreeMap::new()
        } else {
            Site::ALL
                .into_iter()
                .zip(largest_remainder_hundredths(&counts))
                .map(|(site, hundredths)| (site, hundredths_to_percent(hundredths)))
                .collect()
        };
        Self {
            counts: Site::ALL
                .into_iter()
                .map(|site| (site, counts[site.index()]))
                .collect(),
            percentages,
            total,
        }
    }

    #[must_use]
    pub fn count(&self, site: Site) -> u32 {
        self.counts.get(&site).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn percentage(&self, site: Site) -> f64 {
        self.percentages.get(&site).copied().unwrap_or(0.0)
    }

    /// Most frequent site; ties go to A, then B. `None` without samples.
    #[must_use]
    pub fn preferred(&self) -> Option<Site> {
        preferred_site(Site::ALL.map(|site| self.count(site)))
    }
}

/// Opening-duel tally for one player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuelRecord {
    pub first_kills: u32,
    pub first_deaths: u32,
    pub net: i64,
}

impl DuelRecord {
    fn new(first_kills: u32, first_deaths: u32) -> Self {
        Self {
            first_kills,
            first_deaths,
            net: i64::from(first_kills) - i64::from(first_deaths),
        }
    }
}

/// Aggregated tactical statistics. Immutable once produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub maps_played: BTreeMap<String, u32>,
    pub comp_frequency: BTreeMap<String, CompositionTable>,
    pub attack_site_preference: BTreeMap<String, SiteBreakdown>,
    pub plant_sites: BTreeMap<String, SiteBreakdown>,
    pub opening_duels: BTreeMap<String, DuelRecord>,
}

impl AggregateStats {
    /// Maps by play count descending, name ascending.
    #[must_use]
    pub fn map_pool(&self) -> Vec<(&str, u32)> {
        let mut rows: Vec<(&str, u32)> = self
            .maps_played
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        rows
    }

    /// Players by net descending, first kills descending, name ascending.
    #[must_use]
    pub fn duel_leaders(&self) -> Vec<(&str, DuelRecord)> {
        let mut rows: Vec<(&str, DuelRecord)> = self
            .opening_duels
            .iter()
            .map(|(name, record)| (name.as_str(), *record))
            .collect();
        rows.sort_by(|a, b| {
            b.1.net
                .cmp(&a.1.net)
                .then_with(|| b.1.first_kills.cmp(&a.1.first_kills))
                .then_with(|| a.0.cmp(b.0))
        });
        rows
    }

    /// Attack site preferred across every map.
    #[must_use]
    pub fn overall_attack_site(&self) -> Option<(Site, u32, u32)> {
        let mut counts = [0u32; 3];
        for breakdown in self.attack_site_preference.values() {
            for site in Site::ALL {
                counts[site.index()] += breakdown.count(site);
            }
        }
        let total: u32 = counts.iter().sum();
        preferred_site(counts).map(|site| (site, counts[site.index()], total))
    }

    /// Check every aggregate invariant.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        for (map_name, table) in &self.comp_frequency {
            let expected = table.total < MIN_COMPOSITION_SAMPLES;
            if table.insufficient_data != expected {
                return Err(InvariantViolation::InsufficientFlag {
                    map_name: map_name.clone(),
                    flagged: table.insufficient_data,
                    observations: table.total,
                });
            }
            let counted: u32 = table.compositions.values().sum();
            if counted != table.total {
                return Err(InvariantViolation::CountTotal {
                    table: "comp_frequency",
                    map_name: map_name.clone(),
                    counted,
                    total: table.total,
                });
            }
        }
        for (table, breakdowns) in [
            ("attack_site_preference", &self.attack_site_preference),
            ("plant_sites", &self.plant_sites),
        ] {
            for (map_name, breakdown) in breakdowns {
                validate_breakdown(table, map_name, breakdown)?;
            }
        }
        for (player, record) in &self.opening_duels {
            if record.net != i64::from(record.first_kills) - i64::from(record.first_deaths) {
                return Err(InvariantViolation::NetMismatch {
                    player: player.clone(),
                    first_kills: record.first_kills,
                    first_deaths: record.first_deaths,
                    net: record.net,
                });
            }
        }
        Ok(())
    }
}

fn validate_breakdown(
    table: &'static str,
    map_name: &str,
    breakdown: &SiteBreakdown,
) -> Result<(), InvariantViolation> {
    let counted: u32 = breakdown.counts.values().sum();
    if counted != breakdown.total {
        return Err(InvariantViolation::CountTotal {
            table,
            map_name: map_name.to_string(),
            counted,
            total: breakdown.total,
        });
    }
    if breakdown.total == 0 {
        if !breakdown.percentages.is_empty() {
            return Err(InvariantViolation::PercentagesWithoutSamples {
                table,
                map_name: map_name.to_string(),
            });
        }
        return Ok(());
    }
    let sum: f64 = breakdown.percentages.values().sum();
    if (sum - 100.0).abs() > PERCENT_TOLERANCE {
        return Err(InvariantViolation::PercentageSum {
            table,
            map_name: map_name.to_string(),
            sum,
        });
    }
    Ok(())
}

fn preferred_site(counts: [u32; 3]) -> Option<Site> {
    let mut best: Option<Site> = None;
    for site in Site::ALL {
        let count = counts[site.index()];
        if count == 0 {
            continue;
        }
        if best.is_none_or(|current| count > counts[current.index()]) {
            best = Some(site);
        }
    }
    best
}

/// Running totals for a set of series. Partial accumulators built on
/// separate threads can be merged before [`TacticalAccumulator::finish`].
#[derive(Debug, Clone, Default)]
pub struct TacticalAccumulator {
    maps_played: BTreeMap<String, u32>,
    compositions: BTreeMap<String, BTreeMap<String, u32>>,
    attack_sites: BTreeMap<String, [u32; 3]>,
    plant_sites: BTreeMap<String, [u32; 3]>,
    duels: BTreeMap<String, (u32, u32)>,
}

impl TacticalAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, record: &SeriesRecord) {
        for map in &record.maps {
            self.ingest_map(map);
        }
    }

    fn ingest_map(&mut self, map: &MapInstance) {
        let name = map.map_name.as_str();
        *self.maps_played.entry(name.to_string()).or_insert(0) += 1;

        let comps = self.compositions.entry(name.to_string()).or_default();
        for key in map.compositions.iter().filter_map(|c| c.composition_key()) {
            *comps.entry(key).or_insert(0) += 1;
        }

        let attack = self.attack_sites.entry(name.to_string()).or_default();
        let plants = self.plant_sites.entry(name.to_string()).or_default();
        let mut committed_rounds: BTreeSet<u32> = BTreeSet::new();
        for event in map.events.iter().filter(|e| e.is_plant()) {
            let slot = Site::bucket(event.site).index();
            plants[slot] += 1;
            let first_in_round = event
                .round_number
                .is_none_or(|round| committed_rounds.insert(round));
            if first_in_round {
                attack[slot] += 1;
            }
        }

        for opening in opening_kills(&map.events) {
            if let Some(killer) = creditable(opening.killer.as_deref()) {
                self.duels.entry(killer.to_string()).or_default().0 += 1;
            }
            if let Some(victim) = creditable(opening.victim.as_deref()) {
                self.duels.entry(victim.to_string()).or_default().1 += 1;
            }
        }
    }

    pub fn merge(&mut self, other: Self) {
        merge_counts(&mut self.maps_played, other.maps_played);
        for (map, comps) in other.compositions {
            merge_counts(self.compositions.entry(map).or_default(), comps);
        }
        merge_sites(&mut self.attack_sites, other.attack_sites);
        merge_sites(&mut self.plant_sites, other.plant_sites);
        for (player, (kills, deaths)) in other.duels {
            let entry = self.duels.entry(player).or_default();
            entry.0 += kills;
            entry.1 += deaths;
        }
    }

    /// Produce the final statistics.
    ///
    /// # Errors
    ///
    /// Returns an [`InvariantViolation`] if the computed statistics are
    /// internally inconsistent.
    pub fn finish(self) -> Result<AggregateStats, InvariantViolation> {
        let comp_frequency = self
            .compositions
            .into_iter()
            .map(|(map, compositions)| {
                let total: u32 = compositions.values().sum();
                let table = CompositionTable {
                    compositions,
                    total,
                    insufficient_data: total < MIN_COMPOSITION_SAMPLES,
                };
                (map, table)
            })
            .collect();
        let stats = AggregateStats {
            maps_played: self.maps_played,
            comp_frequency,
            attack_site_preference: breakdowns(self.attack_sites),
            plant_sites: breakdowns(self.plant_sites),
            opening_duels: self
                .duels
                .into_iter()
                .map(|(player, (kills, deaths))| (player, DuelRecord::new(kills, deaths)))
                .collect(),
        };
        stats.validate()?;
        Ok(stats)
    }
}

fn creditable(name: Option<&str>) -> Option<&str> {
    name.filter(|name| !name.eq_ignore_ascii_case(UNKNOWN_LABEL))
}

fn merge_counts(into: &mut BTreeMap<String, u32>, from: BTreeMap<String, u32>) {
    for (key, count) in from {
        *into.entry(key).or_insert(0) += count;
    }
}

fn merge_sites(into: &mut BTreeMap<String, [u32; 3]>, from: BTreeMap<String, [u32; 3]>) {
    for (map, counts) in from {
        let entry = into.entry(map).or_default();
        for (slot, count) in entry.iter_mut().zip(counts) {
            *slot += count;
        }
    }
}

fn breakdowns(sites: BTreeMap<String, [u32; 3]>) -> BTreeMap<String, SiteBreakdown> {
    sites
        .into_iter()
        .map(|(map, counts)| (map, SiteBreakdown::from_counts(counts)))
        .collect()
}

/// Aggregate a collection of series. An empty collection yields empty
/// statistics.
///
/// # Errors
///
/// Returns an [`InvariantViolation`] if a record or the resulting
/// statistics break a model invariant.
pub fn aggregate(records: &[SeriesRecord]) -> Result<AggregateStats, InvariantViolation> {
    let mut accumulator = TacticalAccumulator::new();
    for record in records {
        record.validate()?;
        accumulator.ingest(record);
    }
    accumulator.finish()
}
