use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "photomatch",
    version,
    about = "Photo compatibility calculator: ranks candidate photos against a reference"
)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify every candidate and rank them by compatibility
    Score(ScoreCommand),
    /// Classify a single photo and print the service's answer
    Classify(ClassifyCommand),
}

#[derive(Args)]
pub struct ScoreCommand {
    /// Reference photo the candidates are compared against
    #[arg(long)]
    pub reference: Option<PathBuf>,
    /// Candidate photo; repeat once per candidate slot
    #[arg(long = "candidate", value_name = "PATH")]
    pub candidates: Vec<PathBuf>,
    #[command(flatten)]
    pub service: ServiceArgs,
    #[arg(short, long, value_enum, default_value = "md")]
    pub format: ReportFormat,
    /// Seed for the scoring jitter, for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,
    /// Skip the reveal and celebration pauses
    #[arg(long)]
    pub no_pause: bool,
}

#[derive(Args)]
pub struct ClassifyCommand {
    pub path: PathBuf,
    #[command(flatten)]
    pub service: ServiceArgs,
}

#[derive(Args)]
pub struct ServiceArgs {
    /// Classification endpoint; overrides classifier.endpoint from config
    #[arg(long)]
    pub endpoint: Option<String>,
    /// Directory holding photomatch.toml (defaults to the current directory)
    #[arg(long)]
    pub config_dir: Option<PathBuf>,
}

#[derive(Clone, ValueEnum)]
pub enum ReportFormat {
    Json,
    Md,
}
