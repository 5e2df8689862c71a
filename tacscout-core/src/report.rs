//! Markdown rendering of aggregated statistics. Pure and deterministic:
//! the same statistics always render to the same bytes.

use std::fmt::{self, Write};

use crate::aggregate::{AggregateStats, SiteBreakdown};
use crate::config::ReportOptions;
use crate::error::SeriesFailure;
use crate::normalize::Site;
use crate::numbers::u64_to_f64;

/// Render the report with default row limits.
#[must_use]
pub fn render_report(stats: &AggregateStats, series_ids: &[String]) -> String {
    render_report_with(stats, series_ids, &ReportOptions::default())
}

/// Render the report with explicit row limits.
#[must_use]
pub fn render_report_with(
    stats: &AggregateStats,
    series_ids: &[String],
    options: &ReportOptions,
) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut out, stats, series_ids, options);
    out
}

/// Render the excluded-series section; empty when nothing failed.
#[must_use]
pub fn render_exclusions(failures: &[SeriesFailure]) -> String {
    let mut out = String::new();
    if failures.is_empty() {
        return out;
    }
    out.push_str("## Excluded Series\n\n");
    for failure in failures {
        let _ = writeln!(out, "- `{}`: {}", failure.series_id, cell(&failure.reason));
    }
    out.push('\n');
    out
}

fn write_report(
    out: &mut String,
    stats: &AggregateStats,
    series_ids: &[String],
    options: &ReportOptions,
) -> fmt::Result {
    writeln!(out, "# Tactical Scouting Report\n")?;
    if series_ids.is_empty() {
        writeln!(out, "**Series analyzed:** 0\n")?;
    } else {
        writeln!(
            out,
            "**Series analyzed:** {} ({})\n",
            series_ids.len(),
            series_ids.join(", ")
        )?;
    }

    write_map_pool(out, stats)?;
    write_compositions(out, stats, options)?;
    writeln!(out, "## Attack Site Preference\n")?;
    write_site_table(out, &stats.attack_site_preference, "No plants recorded.")?;
    writeln!(out, "## Spike Plant Sites\n")?;
    write_site_table(out, &stats.plant_sites, "No plants recorded.")?;
    write_duels(out, stats, options)?;
    write_highlights(out, stats)
}

fn write_map_pool(out: &mut String, stats: &AggregateStats) -> fmt::Result {
    writeln!(out, "## Map Pool\n")?;
    let pool = stats.map_pool();
    if pool.is_empty() {
        return writeln!(out, "_No maps recorded._\n");
    }
    writeln!(out, "| Map | Played |")?;
    writeln!(out, "|---|---:|")?;
    for (map, count) in pool {
        writeln!(out, "| {} | {count} |", cell(map))?;
    }
    writeln!(out)
}

fn write_compositions(
    out: &mut String,
    stats: &AggregateStats,
    options: &ReportOptions,
) -> fmt::Result {
    writeln!(out, "## Agent Compositions\n")?;
    if stats.comp_frequency.is_empty() {
        return writeln!(out, "_No compositions recorded._\n");
    }
    for (map, table) in &stats.comp_frequency {
        writeln!(out, "### {}\n", cell(map))?;
        if table.insufficient_data {
            writeln!(
                out,
                "*Insufficient composition data* ({} observed)\n",
                table.total
            )?;
            continue;
        }
        writeln!(out, "| Composition | Picks |")?;
        writeln!(out, "|---|---:|")?;
        for (key, count) in table.ranked().into_iter().take(options.comps_per_map) {
            writeln!(out, "| {} | {count} |", cell(key))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_site_table(
    out: &mut String,
    tables: &std::collections::BTreeMap<String, SiteBreakdown>,
    empty_note: &str,
) -> fmt::Result {
    if tables.is_empty() {
        return writeln!(out, "_{empty_note}_\n");
    }
    writeln!(out, "| Map | A | B | Other | Total |")?;
    writeln!(out, "|---|---:|---:|---:|---:|")?;
    for (map, breakdown) in tables {
        write!(out, "| {} ", cell(map))?;
        for site in Site::ALL {
            if breakdown.total == 0 {
                write!(out, "| - ")?;
            } else {
                write!(
                    out,
                    "| {:.2}% ({}) ",
                    breakdown.percentage(site),
                    breakdown.count(site)
                )?;
            }
        }
        writeln!(out, "| {} |", breakdown.total)?;
    }
    writeln!(out)
}

fn write_duels(out: &mut String, stats: &AggregateStats, options: &ReportOptions) -> fmt::Result {
    writeln!(out, "## Opening Duel Leaders\n")?;
    let leaders = stats.duel_leaders();
    if leaders.is_empty() {
        return writeln!(out, "_No opening duels recorded._\n");
    }
    writeln!(out, "| Player | First Kills | First Deaths | Net |")?;
    writeln!(out, "|---|---:|---:|---:|")?;
    for (player, record) in leaders.into_iter().take(options.duel_rows) {
        writeln!(
            out,
            "| {} | {} | {} | {:+} |",
            cell(player),
            record.first_kills,
            record.first_deaths,
            record.net
        )?;
    }
    writeln!(out)
}

fn write_highlights(out: &mut String, stats: &AggregateStats) -> fmt::Result {
    writeln!(out, "## Highlights\n")?;
    match stats.map_pool().first() {
        Some((map, count)) => writeln!(
            out,
            "- **Most played map:** {} (played {count} {})",
            cell(map),
            plural(*count, "time", "times")
        )?,
        None => writeln!(out, "- **Most played map:** none")?,
    }
    match stats.overall_attack_site() {
        Some((site, count, total)) => writeln!(
            out,
            "- **Preferred attack site:** {site} ({count} of {total} rounds, {:.2}%)",
            u64_to_f64(u64::from(count)) * 100.0 / u64_to_f64(u64::from(total))
        )?,
        None => writeln!(out, "- **Preferred attack site:** none")?,
    }
    match stats.duel_leaders().first() {
        Some((player, record)) => writeln!(
            out,
            "- **Top opening duelist:** {} (net {:+}, {} first {})",
            cell(player),
            record.net,
            record.first_kills,
            plural(record.first_kills, "kill", "kills")
        )?,
        None => writeln!(out, "- **Top opening duelist:** none")?,
    }
    Ok(())
}

const fn plural(count: u32, one: &'static str, many: &'static str) -> &'static str {
    if count == 1 { one } else { many }
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{CompositionTable, DuelRecord};

    fn sample_stats() -> AggregateStats {
        let mut stats = AggregateStats::default();
        stats.maps_played.insert("Bind".into(), 3);
        stats.maps_played.insert("Ascent".into(), 3);
        stats.maps_played.insert("Lotus".into(), 1);
        stats.comp_frequency.insert(
            "Bind".into(),
            CompositionTable {
                compositions: [("Jett+Sova".to_string(), 2), ("Omen+Raze".to_string(), 2)]
                    .into_iter()
                    .collect(),
                total: 4,
                insufficient_data: false,
            },
        );
        stats.comp_frequency.insert(
            "Lotus".into(),
            CompositionTable {
                compositions: [("Jett".to_string(), 1)].into_iter().collect(),
                total: 1,
                insufficient_data: true,
            },
        );
        stats.opening_duels.insert(
            "P1".into(),
            DuelRecord {
                first_kills: 1,
                first_deaths: 0,
                net: 1,
            },
        );
        stats.opening_duels.insert(
            "P2".into(),
            DuelRecord {
                first_kills: 0,
                first_deaths: 1,
                net: -1,
            },
        );
        stats
    }

    #[test]
    fn sections_appear_in_order() {
        let report = render_report(&sample_stats(), &["s1".to_string()]);
        let headings = [
            "# Tactical Scouting Report",
            "## Map Pool",
            "## Agent Compositions",
            "## Attack Site Preference",
            "## Spike Plant Sites",
            "## Opening Duel Leaders",
            "## Highlights",
        ];
        let positions: Vec<usize> = headings
            .iter()
            .map(|h| report.find(h).expect("heading present"))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(report.contains("**Series analyzed:** 1 (s1)"));
    }

    #[test]
    fn map_pool_ties_break_by_name() {
        let report = render_report(&sample_stats(), &[]);
        let ascent = report.find("| Ascent | 3 |").expect("ascent row");
        let bind = report.find("| Bind | 3 |").expect("bind row");
        assert!(ascent < bind);
        assert!(report.contains("- **Most played map:** Ascent (played 3 times)"));
    }

    #[test]
    fn insufficient_maps_are_flagged_not_tabled() {
        let report = render_report(&sample_stats(), &[]);
        assert!(report.contains("### Lotus\n\n*Insufficient composition data* (1 observed)"));
        assert!(!report.contains("| Jett | 1 |"));
        assert!(report.contains("| Jett+Sova | 2 |"));
    }

    #[test]
    fn duel_rows_show_signed_net_and_respect_limit() {
        let options = ReportOptions {
            duel_rows: 1,
            comps_per_map: 1,
        };
        let report = render_report_with(&sample_stats(), &[], &options);
        assert!(report.contains("| P1 | 1 | 0 | +1 |"));
        assert!(!report.contains("| P2 |"));
        assert!(!report.contains("| Omen+Raze | 2 |"));
        assert!(report.contains("- **Top opening duelist:** P1 (net +1, 1 first kill)"));
    }

    #[test]
    fn empty_stats_render_placeholders() {
        let report = render_report(&AggregateStats::default(), &[]);
        assert!(report.contains("_No maps recorded._"));
        assert!(report.contains("- **Preferred attack site:** none"));
        assert!(report.contains("- **Top opening duelist:** none"));
    }

    #[test]
    fn exclusions_list_each_failure() {
        assert!(render_exclusions(&[]).is_empty());
        let text = render_exclusions(&[SeriesFailure::new("s9", "not ready")]);
        assert_eq!(text, "## Excluded Series\n\n- `s9`: not ready\n\n");
    }

    #[test]
    fn cells_escape_pipes() {
        assert_eq!(cell("a|b"), "a\\|b");
    }
}
