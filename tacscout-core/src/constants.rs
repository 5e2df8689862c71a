//! Centralized thresholds and labels for the scouting pipeline.
//!
//! These values define what counts as enough evidence and how absent
//! telemetry is labelled. They are fixed in code rather than exposed as
//! configuration so that every report is computed with the same rules.

// Evidence thresholds ------------------------------------------------------
/// Fewer non-empty composition observations than this flags a map as
/// having insufficient composition data.
pub const MIN_COMPOSITION_SAMPLES: u32 = 3;
/// Maximum agents a single team can field on one map.
pub const MAX_AGENTS_PER_TEAM: usize = 5;
/// Teams contesting one map; a map carries at most this many compositions.
pub const TEAMS_PER_MAP: usize = 2;

// Labels -------------------------------------------------------------------
/// Label used when no source names a map, team or player.
pub const UNKNOWN_LABEL: &str = "unknown";
/// Separator joining sorted agent names into a composition key.
pub const COMPOSITION_KEY_SEPARATOR: &str = "+";

// Round structure ----------------------------------------------------------
/// Highest round number treated as the opening round of a map when
/// detecting a round reset (covers zero- and one-based round counters).
pub(crate) const OPENING_ROUND_MAX: u32 = 1;

// Percentages --------------------------------------------------------------
/// Percentages are computed in hundredths of a percent.
pub(crate) const PERCENT_SCALE: u64 = 10_000;

// Diagnostics --------------------------------------------------------------
pub(crate) const DEFAULT_SCHEMA_SAMPLE_CAP: usize = 8;
pub(crate) const DEFAULT_DUEL_ROWS: usize = 10;
pub(crate) const DEFAULT_COMPS_PER_MAP: usize = 5;
