use anyhow::Result;
use colored::Colorize;
use std::io::Write;

use tacscout_core::{ScoutReport, Site};

const CONSOLE_ROWS: usize = 5;

pub fn generate_console_report<W: Write + ?Sized>(
    out: &mut W,
    report: &ScoutReport,
) -> Result<()> {
    let stats = &report.stats;
    writeln!(out)?;
    writeln!(out, "{}", "📊 Scouting Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "===================".cyan())?;
    writeln!(
        out,
        "Series analyzed: {}",
        report.series_analyzed.len().to_string().green()
    )?;
    writeln!(
        out,
        "Series excluded: {}",
        report.failures.len().to_string().red()
    )?;
    writeln!(out)?;

    writeln!(out, "{}", "🗺️  Map Pool".bright_yellow().bold())?;
    let pool = stats.map_pool();
    if pool.is_empty() {
        writeln!(out, "   No maps recorded.")?;
    }
    for (map, count) in pool.iter().take(CONSOLE_ROWS) {
        let attack = stats
            .attack_site_preference
            .get(*map)
            .filter(|breakdown| breakdown.total > 0)
            .map(|breakdown| {
                format!(
                    "A {:.2}% / B {:.2}% / Other {:.2}%",
                    breakdown.percentage(Site::A),
                    breakdown.percentage(Site::B),
                    breakdown.percentage(Site::Other)
                )
            })
            .unwrap_or_else(|| "no plants".to_string());
        writeln!(out, "   {} x{count}  ({attack})", map.bold())?;
    }
    writeln!(out)?;

    writeln!(out, "{}", "⚔️  Opening Duels".bright_yellow().bold())?;
    let leaders = stats.duel_leaders();
    if leaders.is_empty() {
        writeln!(out, "   No opening duels recorded.")?;
    }
    for (player, record) in leaders.iter().take(CONSOLE_ROWS) {
        let net = format!("{:+}", record.net);
        let net = if record.net >= 0 { net.green() } else { net.red() };
        writeln!(
            out,
            "   {} {} FK / {} FD (net {net})",
            player.bold(),
            record.first_kills,
            record.first_deaths
        )?;
    }

    if !report.failures.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", "Excluded series".red().bold())?;
        for failure in &report.failures {
            writeln!(out, "   • {}: {}", failure.series_id.yellow(), failure.reason)?;
        }
    }

    let diagnostic_count: usize = report.diagnostics.values().map(Vec::len).sum();
    if diagnostic_count > 0 {
        writeln!(out)?;
        writeln!(
            out,
            "⚠️  {diagnostic_count} diagnostics across {} series (run with --verbose for detail)",
            report.diagnostics.len()
        )?;
    }
    Ok(())
}

pub fn generate_json_report<W: Write + ?Sized>(out: &mut W, report: &ScoutReport) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)?;
    Ok(())
}

pub fn generate_markdown_report<W: Write + ?Sized>(
    out: &mut W,
    report: &ScoutReport,
) -> Result<()> {
    out.write_all(report.markdown_report.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tacscout_core::{AggregateStats, DuelRecord, SeriesFailure};

    fn sample_report() -> ScoutReport {
        let mut stats = AggregateStats::default();
        stats.maps_played.insert("Bind".into(), 2);
        stats.opening_duels.insert(
            "Nova".into(),
            DuelRecord {
                first_kills: 2,
                first_deaths: 1,
                net: 1,
            },
        );
        ScoutReport {
            series_analyzed: vec!["1".into()],
            failures: vec![SeriesFailure::new("2", "not ready")],
            stats,
            diagnostics: Default::default(),
            markdown_report: "# Tactical Scouting Report\n".into(),
        }
    }

    #[test]
    fn console_report_lists_maps_duels_and_failures() {
        let mut buf = Vec::new();
        generate_console_report(&mut buf, &sample_report()).expect("console");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("Scouting Summary"));
        assert!(text.contains("Bind"));
        assert!(text.contains("no plants"));
        assert!(text.contains("Nova"));
        assert!(text.contains("not ready"));
    }

    #[test]
    fn json_report_round_trips_key_fields() {
        let mut buf = Vec::new();
        generate_json_report(&mut buf, &sample_report()).expect("json");
        let value: serde_json::Value = serde_json::from_slice(&buf).expect("valid json");
        assert_eq!(value["maps_played"]["Bind"], 2);
        assert_eq!(value["opening_duels"]["Nova"]["net"], 1);
        assert_eq!(value["failures"][0]["series_id"], "2");
    }

    #[test]
    fn markdown_report_is_written_verbatim() {
        let mut buf = Vec::new();
        generate_markdown_report(&mut buf, &sample_report()).expect("markdown");
        assert_eq!(buf, b"# Tactical Scouting Report\n");
    }
}
