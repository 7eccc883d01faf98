//! CLI argument definitions for `cdr-ingest`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "cdr-ingest",
    version,
    about = "Unflatten EDC domain extracts into CDR staging tables",
    long_about = "Unflatten wide EDC domain extracts (Rave or InForm) into long\n\
                  question/answer events and stage them into stg_pred and\n\
                  stg_pred_del, routing audited deletions."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow subject identifiers and other row-level values in logs.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the pipeline over a directory of extracts.
    Run(RunArgs),

    /// List the extracts in a directory and how they would be treated.
    Domains(DomainsArgs),

    /// Validate a configuration file and print its effective settings.
    CheckConfig(CheckConfigArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// Directory holding one CSV extract per domain (e.g. sm_ae201.csv).
    #[arg(value_name = "EXTRACT_DIR")]
    pub extract_dir: PathBuf,

    /// Pipeline configuration (TOML).
    #[arg(long = "config", short = 'c', value_name = "TOML")]
    pub config: PathBuf,

    /// Directory holding dimension maps (map_item.csv, map_form.csv, ...).
    #[arg(long = "maps", value_name = "DIR")]
    pub maps: Option<PathBuf>,

    /// Staging table directory (default: <EXTRACT_DIR>/staging).
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Sample at most N rows per domain (overrides sample_limit).
    #[arg(long = "limit", value_name = "N")]
    pub limit: Option<usize>,

    /// Seed for row sampling (overrides sample_seed).
    #[arg(long = "seed", value_name = "SEED")]
    pub seed: Option<u64>,

    /// Run everything but leave the staging files untouched.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Write the run summary and all issues as JSON.
    #[arg(long = "report", value_name = "PATH")]
    pub report: Option<PathBuf>,
}

#[derive(Parser)]
pub struct DomainsArgs {
    #[arg(value_name = "EXTRACT_DIR")]
    pub extract_dir: PathBuf,

    /// Mark which domains the configuration would process.
    #[arg(long = "config", short = 'c', value_name = "TOML")]
    pub config: Option<PathBuf>,
}

#[derive(Parser)]
pub struct CheckConfigArgs {
    #[arg(value_name = "TOML")]
    pub config: PathBuf,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
