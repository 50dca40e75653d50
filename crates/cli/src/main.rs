//! CLI entry point for plex-transcode
//!
//! Parses command line arguments, layers them over the config file and
//! environment, runs the startup checks and then one batch.

use clap::Parser;
use plex_transcode::{run_startup_checks, Batch, RunConfig, SortKey};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Convert a media tree into Plex-friendly files with HandBrakeCLI
///
/// Without -r the run is a dry run: every file is checked and reported, nothing
/// is written.
#[derive(Parser, Debug)]
#[command(name = "plex-transcode")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML); defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input directory to scan
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output directory; outputs go next to their sources when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Workspace directory for staging copies and temp outputs
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    /// HandBrake preset name
    #[arg(short = 'q', long)]
    preset: Option<String>,

    /// Audio track to keep (1-5); all tracks when omitted
    #[arg(short = 'a', long)]
    audio_track: Option<u32>,

    /// Subtitle track to burn in (1-5); foreign audio scan when omitted
    #[arg(short = 'b', long)]
    subtitle_track: Option<u32>,

    /// Overwrite existing destinations
    #[arg(short, long)]
    force: bool,

    /// Delete the original after a successful transcode
    #[arg(short, long)]
    delete_original: bool,

    /// Actually transcode (default is a dry run)
    #[arg(short = 'r', long = "run")]
    execute: bool,

    /// Stop the batch when an output is larger than its source
    #[arg(long)]
    stop_larger: bool,

    /// Order files by name, duration, size or modified
    #[arg(long)]
    sort: Option<SortKey>,

    /// Reverse the sort order
    #[arg(long)]
    desc: bool,

    /// Glob of files to leave alone; may be repeated
    #[arg(long)]
    exclude: Vec<String>,

    /// Number of concurrent probes
    #[arg(long)]
    probe_workers: Option<usize>,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
}

/// Layer command line values over the loaded configuration.
fn apply_args(args: &Args, config: &mut RunConfig) {
    if let Some(input) = &args.input {
        config.paths.input = input.clone();
    }
    if let Some(output) = &args.output {
        config.paths.output = Some(output.clone());
    }
    if let Some(workspace) = &args.workspace {
        config.paths.workspace = Some(workspace.clone());
    }
    if let Some(preset) = &args.preset {
        config.encode.preset = preset.clone();
    }
    if args.audio_track.is_some() {
        config.encode.audio_track = args.audio_track;
    }
    if args.subtitle_track.is_some() {
        config.encode.subtitle_track = args.subtitle_track;
    }
    if let Some(sort) = args.sort {
        config.scan.sort = sort;
    }
    if let Some(workers) = args.probe_workers {
        config.probe.workers = workers;
    }
    config.scan.exclude.extend(args.exclude.iter().cloned());

    // Flags can only switch behaviour on
    config.encode.force |= args.force;
    config.encode.delete_original |= args.delete_original;
    config.encode.execute |= args.execute;
    config.encode.stop_larger |= args.stop_larger;
    config.scan.descending |= args.desc;
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = match &args.config {
        Some(path) => match RunConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => {
            let mut config = RunConfig::default();
            config.apply_env_overrides();
            config
        }
    };
    apply_args(&args, &mut config);

    let tools = match run_startup_checks(&config) {
        Ok(tools) => tools,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    info!(
        "Preset '{}', container '{}'",
        config.encode.preset, config.encode.container
    );

    let batch = Batch::new(config, tools);
    match batch.run().await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
