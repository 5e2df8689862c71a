mod reports;
mod source;
mod util;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::fs::{self, File};
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};

use source::DirectorySource;
use tacscout_core::{LogSink, ScoutConfig, ScoutEngine, ScoutReport};
use util::split_csv;

#[derive(Debug, Parser)]
#[command(name = "tacscout", version)]
#[command(about = "Tactical scouting reports from cached series telemetry")]
struct Args {
    /// Series ids to scout (comma-separated)
    #[arg(long, default_value = "")]
    series: String,

    /// Telemetry cache directory (one sub-directory per series)
    #[arg(long, default_value = "./data/cache")]
    data_dir: PathBuf,

    /// Optional JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// List cached series ids and exit
    #[arg(long)]
    list_series: bool,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["console", "markdown", "json"])]
    report: String,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Worker threads used to assemble series (defaults to one per core)
    #[arg(long)]
    threads: Option<usize>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if maybe_list_series(&args)? {
        return Ok(());
    }

    let config = load_config(args.config.as_deref())?;
    configure_threads(args.threads)?;
    let series = split_csv(&args.series);

    if args.report == "console" {
        announce_banner();
    }

    let engine = ScoutEngine::new(DirectorySource::new(&args.data_dir), LogSink, config);
    let report = engine
        .scout(&series)
        .context("aggregated statistics failed their consistency checks")?;

    write_reports(&args, &report)?;

    if !series.is_empty() && report.series_analyzed.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn announce_banner() {
    println!("{}", "🎯 Tactical Scout".bright_cyan().bold());
    println!("{}", "=================".cyan());
}

fn maybe_list_series(args: &Args) -> Result<bool> {
    if !args.list_series {
        return Ok(false);
    }
    let ids = DirectorySource::new(&args.data_dir)
        .list_series()
        .with_context(|| format!("failed to read {}", args.data_dir.display()))?;
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Cached series:")?;
    for id in ids {
        writeln!(output_target.writer(), "  {id}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn load_config(path: Option<&Path>) -> Result<ScoutConfig> {
    let Some(path) = path else {
        return Ok(ScoutConfig::default());
    };
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    ScoutConfig::from_json(&text).with_context(|| format!("invalid config {}", path.display()))
}

fn configure_threads(threads: Option<usize>) -> Result<()> {
    let Some(threads) = threads else {
        return Ok(());
    };
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .context("failed to configure worker threads")
}

fn write_reports(args: &Args, report: &ScoutReport) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => reports::generate_json_report(&mut output_target, report)?,
        "markdown" => reports::generate_markdown_report(&mut output_target, report)?,
        _ => reports::generate_console_report(&mut output_target, report)?,
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
