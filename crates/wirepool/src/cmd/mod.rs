use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod pool;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode one frame and write it to stdout.
    Encode(EncodeArgs),
    /// Decode frames from a file or stdin and print them.
    Decode(DecodeArgs),
    /// Run framed jobs from stdin through a worker pool.
    Pool(PoolArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args),
        Command::Decode(args) => decode::run(args, format),
        Command::Pool(args) => pool::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Header JSON object.
    #[arg(long, default_value = "{}")]
    pub header: String,
    /// Body as a string.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read the body from a file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Write the header bytes exactly as given, without JSON validation.
    #[arg(long)]
    pub raw_header: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Input file. Reads stdin when omitted.
    pub file: Option<PathBuf>,
    /// Stop after N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Upper bound on frames extracted per parse pass.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_frames_per_parse: Option<u64>,
}

#[derive(Args, Debug)]
pub struct PoolArgs {
    /// Worker thread count. Overrides the config file.
    #[arg(long, short = 'w', value_parser = clap::value_parser!(u64).range(1..))]
    pub workers: Option<u64>,
    /// Queue pair count. Overrides the config file.
    #[arg(long, short = 'q', value_parser = clap::value_parser!(u64).range(1..))]
    pub queue_pairs: Option<u64>,
    /// Pool config JSON file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Simulated work per job, in milliseconds.
    #[arg(long, value_name = "MS", default_value = "0")]
    pub work_ms: u64,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
