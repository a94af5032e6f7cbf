// CLI argument definitions using Clap

use crate::report::ProgressMode;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Junit,
}

/// Allure results toolkit for Rust tests
#[derive(Parser, Debug)]
#[command(name = "allurectl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect, summarize and export Allure result directories", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose debug output
    #[arg(short = 'v', long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(short = 'c', long, global = true, default_value_t = false)]
    pub no_color: bool,

    /// Show current configuration and exit
    #[arg(long, default_value_t = false)]
    pub config: bool,

    /// Create default configuration file
    #[arg(long, value_name = "CONFIG_FILE")]
    pub init_config: Option<PathBuf>,

    /// Install shell completion (bash, zsh, fish, elvish, powershell)
    #[arg(long, value_name = "SHELL_TYPE", value_parser = ["bash", "zsh", "fish", "elvish", "powershell"])]
    pub completion: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print a summary of a results directory
    Summary(SummaryArgs),

    /// List test results in a results directory
    List(ListArgs),

    /// Convert a results directory to another report format
    Export(ExportArgs),

    /// Remove result files from a results directory
    Clean(CleanArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ResultsDirArgs {
    /// Results directory (defaults to the configured one)
    #[arg(value_name = "RESULTS_DIR")]
    pub results_dir: Option<PathBuf>,
}

impl ResultsDirArgs {
    pub fn resolve(&self, config: &crate::config::Config) -> PathBuf {
        self.results_dir
            .clone()
            .unwrap_or_else(|| config.results_directory())
    }
}

#[derive(Args, Debug, Clone)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub dir: ResultsDirArgs,

    /// Progress indicator style while replaying results
    #[arg(long, value_enum, default_value_t = ProgressMode::None)]
    pub progress: ProgressMode,

    /// Emit streaming JSON events instead of console output
    #[arg(long, default_value_t = false)]
    pub stream: bool,

    /// Exit with status 1 when any test failed or broke
    #[arg(long, default_value_t = false)]
    pub fail_on_problems: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[command(flatten)]
    pub dir: ResultsDirArgs,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub format: String,

    /// Only list results with this status
    #[arg(long)]
    pub status: Option<crate::model::Status>,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub dir: ResultsDirArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t = ExportFormat::Junit)]
    pub format: ExportFormat,

    /// Output file
    #[arg(short = 'o', long, value_name = "OUTPUT_FILE")]
    pub output: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct CleanArgs {
    #[command(flatten)]
    pub dir: ResultsDirArgs,

    /// Show files that would be removed without removing them
    #[arg(short = 'd', long, default_value_t = false)]
    pub dry_run: bool,
}

fn is_json_format(value: &str) -> bool {
    value.eq_ignore_ascii_case("json")
}

impl ListArgs {
    pub fn is_json(&self) -> bool {
        is_json_format(&self.format)
    }
}

impl Cli {
    /// Progress mode of the summary command, verbose when `-v` is set
    pub fn progress_mode(&self) -> ProgressMode {
        match &self.command {
            Some(Commands::Summary(args)) if args.progress == ProgressMode::None && self.verbose => {
                ProgressMode::Verbose
            }
            Some(Commands::Summary(args)) => args.progress,
            _ => ProgressMode::None,
        }
    }
}
