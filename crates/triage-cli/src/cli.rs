use clap::{Args, Parser, Subcommand};
use ligand_triage::core::models::report::Stage;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu, William A. Goddard III, Victor Wai Tak Kam",
    version,
    about = "Ligand Triage CLI - Policy-gated virtual screening: docking, minimization and MMGBSA sampling, with a policy deciding which candidates earn the next stage.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Number of parallel workers, each owning one shard of the ligand list.
    /// Overrides `pipeline.workers`; defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Screen ligands through the gated dock -> minimize -> sample funnel.
    Screen(ScreenArgs),
    /// Run a single stage over every ligand without gating, collecting one score table.
    Batch(BatchArgs),
}

/// Input and output options shared by all subcommands.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Ligand list: one `SMILES NAME` pair per line.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Receptor structure file handed to the docking program.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub receptor: PathBuf,

    /// Output directory; every candidate gets its own subdirectory inside it.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output: PathBuf,

    /// Path to the configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Skip the first line of the ligand list.
    #[arg(long)]
    pub header: bool,

    /// Field delimiter of the ligand list.
    #[arg(long, value_name = "CHAR", default_value_t = ' ')]
    pub delimiter: char,

    /// Only read the first N ligands.
    #[arg(short = 'n', long, value_name = "INT")]
    pub limit: Option<usize>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S policy.max-dock-score=-7.5
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `screen` subcommand.
#[derive(Args, Debug)]
pub struct ScreenArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Override the sampling iteration count.
    #[arg(long, value_name = "INT")]
    pub sampling_iterations: Option<usize>,

    /// Forward candidates whose previous stage failed instead of stopping them.
    #[arg(long)]
    pub accept_failed_scores: bool,
}

/// Arguments for the `batch` subcommand.
#[derive(Args, Debug)]
pub struct BatchArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Stage to run over every ligand: dock, minimize or sample.
    #[arg(short, long, default_value = "dock", value_name = "STAGE")]
    pub stage: Stage,

    /// Override the sampling iteration count (used by the `sample` stage).
    #[arg(long, value_name = "INT")]
    pub sampling_iterations: Option<usize>,
}
