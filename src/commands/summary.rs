// Summary command - replays a results directory through a reporter

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::args::SummaryArgs;
use crate::config::Config;
use crate::report::{self, ConsoleReporter, ProgressMode, Reporter, StreamingJsonReporter};

/// Returns whether the run was free of failed and broken tests
pub fn handle_summary(args: &SummaryArgs, progress: ProgressMode, config: &Config) -> Result<bool> {
    let dir = args.dir.resolve(config);
    let results = super::load_results(&dir)?;

    for error in &results.errors {
        warn!("Skipped unreadable file: {}", error);
    }
    if results.results.is_empty() {
        warn!("No test results found in {}", dir.display());
    }
    info!(
        "Loaded {} results and {} containers from {}",
        results.results.len(),
        results.containers.len(),
        dir.display()
    );

    let reporter: Box<dyn Reporter> = if args.stream {
        Box::new(StreamingJsonReporter::new(Some(results.results.len())))
    } else {
        Box::new(ConsoleReporter::new(progress, dir.display().to_string()))
    };

    let summary = report::replay(&results, reporter.as_ref())?;
    Ok(summary.is_success())
}
