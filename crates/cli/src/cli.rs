use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use flacport_core::{ConvertConfig, StatsConfig};

#[derive(Parser, Debug)]
#[command(name = "flacport")]
#[command(author, version, about = "Batch FLAC to ALAC conversion and library statistics")]
pub struct Cli {
    /// Path to config file (defaults to ./flacport.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert every FLAC file under INPUT_DIR into a mirrored ALAC tree
    Convert(ConvertArgs),

    /// Tally audio formats and directory sizes, and list unconverted FLAC files
    Stats(StatsArgs),
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Directory containing FLAC files
    pub input_dir: PathBuf,

    /// Directory receiving converted files
    pub output_dir: PathBuf,

    /// Concurrent encoder processes [default: number of CPUs]
    #[arg(short, long, env = "FLACPORT_JOBS", value_parser = parse_workers)]
    pub jobs: Option<usize>,

    /// Per-file encoder deadline in seconds, 0 to disable
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Encoder binary
    #[arg(long, env = "FLACPORT_ENCODER")]
    pub encoder: Option<PathBuf>,

    /// Where to write the list of failed files
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

impl ConvertArgs {
    /// Command-line values take precedence over the config file.
    pub fn apply(&self, config: &mut ConvertConfig) {
        if let Some(jobs) = self.jobs {
            config.workers = Some(jobs);
        }
        if let Some(timeout) = self.timeout {
            config.job_timeout_secs = timeout;
        }
        if let Some(encoder) = &self.encoder {
            config.encoder = encoder.clone();
        }
        if let Some(report) = &self.report {
            config.report_path = report.clone();
        }
    }
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Directory to scan
    pub input_dir: PathBuf,

    /// Converted library checked for missing counterparts
    #[arg(long, value_name = "DIR")]
    pub converted_root: Option<PathBuf>,

    /// Directory receiving the listing files
    #[arg(long, value_name = "DIR")]
    pub listing_dir: Option<PathBuf>,

    /// How many of the largest directories to show
    #[arg(long, value_name = "N")]
    pub top: Option<usize>,

    /// Print the statistics as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsArgs {
    pub fn apply(&self, config: &mut StatsConfig) {
        if let Some(root) = &self.converted_root {
            config.converted_root = root.clone();
        }
        if let Some(dir) = &self.listing_dir {
            config.listing_dir = dir.clone();
        }
        if let Some(top) = self.top {
            config.top_directories = top;
        }
    }
}

/// Parse a worker count, which must be at least one.
pub fn parse_workers(value: &str) -> Result<usize, String> {
    let n: usize = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid worker count '{value}'"))?;
    if n == 0 {
        return Err("worker count must be at least 1".into());
    }
    Ok(n)
}
