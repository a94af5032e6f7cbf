// Export command - converts a results directory to JSON or JUnit XML

use anyhow::Result;
use tracing::info;

use crate::cli::ExportFormat;
use crate::cli::args::ExportArgs;
use crate::config::Config;
use crate::report::{self, JsonReporter, JunitReporter, Reporter};

pub fn handle_export(args: &ExportArgs, config: &Config) -> Result<()> {
    let dir = args.dir.resolve(config);
    let results = super::load_results(&dir)?;

    let reporter: Box<dyn Reporter> = match args.format {
        ExportFormat::Json => Box::new(JsonReporter::new(args.output.clone())),
        ExportFormat::Junit => Box::new(JunitReporter::new(args.output.clone())),
    };
    let summary = report::replay(&results, reporter.as_ref())?;

    info!(
        "Exported {} results to {}",
        summary.total,
        args.output.display()
    );
    println!("Report written: {}", args.output.display());
    Ok(())
}
