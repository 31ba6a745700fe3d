//! trackspots CLI
//!
//! Finds spots in one wavelength of a DV time series, links them into
//! trajectories and prints a report.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use clap::{Args, Parser, Subcommand};
use log::info;
use spottrack_core::{ClipBox, ThresholdSpec, TimeRange, TrackingConfig, WaveSelector};
use spottrack_io::{
    track_file, Column, DvFileReader, ExtractionWindow, ReportFormat, ReportWriter,
};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use thiserror::Error;

/// Exit status of a failed run (`-1` as an unsigned byte).
const EXIT_FAILURE: u8 = 255;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    SpottrackIo(#[from] spottrack_io::Error),

    #[error("{0}")]
    Core(#[from] spottrack_core::Error),
}

/// Spot finding and tracking for DV microscopy stacks.
#[derive(Parser, Debug)]
#[command(name = "trackspots")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log progress to stderr (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find and link spots through every timepoint of a file
    Track(TrackArgs),

    /// Show the header of a DV file
    Info {
        /// Input DV file
        input: PathBuf,
    },
}

#[derive(Args, Debug)]
struct TrackArgs {
    /// Input DV file
    input: PathBuf,

    /// Detection wavelength: an id from the header or an index
    wavelength: Option<WaveSelector>,

    /// Threshold: an integer, mean, mean<N>s, gmean or gmean<N>s
    #[arg(allow_negative_numbers = true)]
    threshold: Option<ThresholdSpec>,

    /// Smallest spot kept, in voxels
    min_volume: Option<usize>,

    /// JSON tracking configuration; command-line values override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Inclusive timepoint range, e.g. 3-10 (legacy: -time3-10)
    #[arg(long, value_name = "A-B")]
    time: Option<TimeRange>,

    /// Weight of the mean-intensity difference when linking (legacy: -iwght)
    #[arg(long)]
    intensity_weight: Option<f64>,

    /// Largest spot kept, in voxels
    #[arg(long)]
    max_volume: Option<usize>,

    /// Largest physical distance a link may span
    #[arg(long)]
    max_distance: Option<f64>,

    /// Region to scan: x0,y0,z0,x1,y1,z1 (inclusive)
    #[arg(long, value_parser = parse_clip)]
    clip: Option<ClipBox>,

    /// Report column, repeatable: v, c=<w>, i=<w>, m=<w>, g=<w>, sd=<w>,
    /// ms=<w>, gs=<w>, mc, tv, td, tm, tSD, tt, th, ID, tID
    #[arg(long = "column", value_name = "COLUMN")]
    columns: Vec<Column>,

    /// One row per spot per timepoint instead of one row per timepoint
    #[arg(long, conflicts_with = "json")]
    db: bool,

    /// Write the full result as JSON
    #[arg(long)]
    json: bool,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Worker threads for extraction
    #[arg(long)]
    threads: Option<usize>,

    /// Fraction of available memory to use for decoded stacks
    #[arg(long)]
    memory_fraction: Option<f64>,
}

fn parse_clip(s: &str) -> std::result::Result<ClipBox, String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<usize>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| format!("bad clip box '{s}': {e}"))?;
    match values.as_slice() {
        &[x0, y0, z0, x1, y1, z1] => Ok(ClipBox::new([x0, y0, z0], [x1, y1, z1])),
        _ => Err(format!("clip box '{s}' needs six values")),
    }
}

/// Single-dash column flags of the legacy command line.
const LEGACY_COLUMNS: &[&str] = &[
    "v", "c", "i", "m", "g", "sd", "ms", "gs", "mc", "tv", "td", "tm", "tSD", "tt", "th", "ID",
    "tID",
];

/// Rewrites single-dash legacy flags into their long forms.
///
/// `-time3-10` becomes `--time 3-10`, `-iwght` becomes `--intensity-weight`,
/// `-db` becomes `--db`, and column flags such as `-c 528` become
/// `--column c=528`. Everything else passes through untouched.
fn normalize_legacy_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out = Vec::new();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let Some(flag) = arg.strip_prefix('-').filter(|f| !f.starts_with('-')) else {
            out.push(arg);
            continue;
        };
        if let Some(range) = flag.strip_prefix("time").filter(|r| !r.is_empty()) {
            out.push("--time".into());
            out.push(range.to_string());
        } else if flag == "time" {
            out.push("--time".into());
        } else if flag == "iwght" {
            out.push("--intensity-weight".into());
        } else if flag == "db" {
            out.push("--db".into());
        } else if LEGACY_COLUMNS.contains(&flag) {
            out.push("--column".into());
            if Column::takes_wave(flag) {
                match args.next() {
                    Some(wave) => out.push(format!("{flag}={wave}")),
                    None => out.push(flag.to_string()),
                }
            } else {
                out.push(flag.to_string());
            }
        } else {
            out.push(arg);
        }
    }
    out
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp_secs()
        .init();
}

fn tracking_config(args: &TrackArgs) -> Result<TrackingConfig> {
    let mut config = match &args.config {
        Some(path) => TrackingConfig::from_file(path)?,
        None => TrackingConfig::default(),
    };
    if let Some(wave) = args.wavelength {
        config.wave = wave;
    }
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(volume) = args.min_volume {
        config.min_volume = volume;
    }
    if let Some(volume) = args.max_volume {
        config.max_volume = Some(volume);
    }
    if let Some(weight) = args.intensity_weight {
        config.intensity_weight = weight;
    }
    if let Some(distance) = args.max_distance {
        config.max_link_distance = Some(distance);
    }
    if let Some(range) = args.time {
        config.time_range = Some(range);
    }
    if let Some(clip) = args.clip {
        config.clip = Some(clip);
    }
    config.validate()?;
    Ok(config)
}

fn run_track(args: &TrackArgs) -> Result<()> {
    let config = tracking_config(args)?;
    let mut window = ExtractionWindow::default();
    if let Some(fraction) = args.memory_fraction {
        window = window.with_memory_fraction(fraction);
    }
    if let Some(threads) = args.threads {
        window = window.with_parallelism(threads);
    }
    let format = if args.json {
        ReportFormat::Json
    } else if args.db {
        ReportFormat::Database
    } else {
        ReportFormat::TimeSeries
    };

    let start = Instant::now();
    let reader = DvFileReader::open(&args.input)?;
    let tracked = track_file(&reader, &config, &window)?;
    info!(
        "tracked {} in {:.2}s",
        args.input.display(),
        start.elapsed().as_secs_f64()
    );

    match &args.output {
        Some(path) => {
            let mut writer = ReportWriter::create(path)?
                .with_format(format)
                .with_columns(args.columns.clone());
            writer.write(&tracked)?;
            info!("report written to {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut writer = ReportWriter::new(BufWriter::new(stdout.lock()))
                .with_format(format)
                .with_columns(args.columns.clone());
            writer.write(&tracked)?;
        }
    }
    Ok(())
}

fn run_info(input: &Path) -> Result<()> {
    let reader = DvFileReader::open(input)?;
    let header = reader.header();
    let file_size = reader.file_size();
    let mut out = io::stdout().lock();

    writeln!(out, "File: {}", input.display())?;
    writeln!(
        out,
        "Size: {} bytes ({:.2} MB), {:?} byte order",
        file_size,
        file_size as f64 / 1_000_000.0,
        header.byte_order
    )?;
    writeln!(
        out,
        "Dimensions: {} x {} x {} voxels, {} timepoints, {:?} plane order",
        header.cols(),
        header.rows(),
        header.num_z(),
        header.num_times(),
        header.sequence()
    )?;
    let [dx, dy, dz] = header.voxel_size();
    writeln!(out, "Voxel size: {dx} x {dy} x {dz}")?;
    for (wave, id) in header.wave_ids().iter().enumerate() {
        match header.wave_range(wave) {
            Some((min, max)) => writeln!(out, "Wave {wave}: {id} nm, range {min} - {max}")?,
            None => writeln!(out, "Wave {wave}: {id} nm")?,
        }
    }
    let extended = reader.extended();
    if !extended.is_empty() {
        writeln!(out, "Extended header: {} bytes", extended.byte_len())?;
        if let Some(seconds) = reader.elapsed_seconds(reader.num_times().saturating_sub(1)) {
            writeln!(out, "Elapsed at last timepoint: {seconds:.3} s")?;
        }
    }
    for label in (0..header.num_labels.max(0)).filter_map(|i| header.label(i as usize)) {
        writeln!(out, "Label: {label}")?;
    }
    if file_size < header.expected_file_size() {
        writeln!(
            out,
            "Warning: file is {} bytes shorter than its header declares",
            header.expected_file_size() - file_size
        )?;
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Track(args) => run_track(&args),
        Commands::Info { input } => run_info(&input),
    }
}

/// Reports a failed run on stderr and maps it to the process exit status.
fn exit_status(result: &Result<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("trackspots: {e}");
            EXIT_FAILURE
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse_from(normalize_legacy_args(std::env::args())) {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            return ExitCode::from(EXIT_FAILURE);
        }
        Err(e) => e.exit(),
    };
    init_logging(cli.verbose);

    ExitCode::from(exit_status(&run(cli)))
}
