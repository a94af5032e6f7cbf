// Report module - Console output and reporting

pub mod console;
pub mod json;
pub mod junit;
pub mod listener;
pub mod streaming;
pub mod summary;

use crate::model::TestResult;
use crate::reader::AllureResults;
use anyhow::Result;
pub use console::{ConsoleReporter, ProgressMode};
pub use json::JsonReporter;
pub use junit::JunitReporter;
pub use listener::ReporterListener;
pub use streaming::StreamingJsonReporter;
pub use summary::{ResultsSummary, SummaryEntry};

/// Reporter trait
pub trait Reporter: Send + Sync {
    /// Called when a test starts
    fn on_test_start(&self, result: &TestResult);

    /// Called when a test finishes
    fn on_test_end(&self, result: &TestResult);

    /// Called when the entire run finishes
    fn on_suite_end(&self, summary: &ResultsSummary) -> Result<()>;
}

/// Feeds results read from disk through a reporter, ordered by start time
pub fn replay(results: &AllureResults, reporter: &dyn Reporter) -> Result<ResultsSummary> {
    let mut ordered: Vec<&TestResult> = results.results.iter().collect();
    ordered.sort_by_key(|r| (r.start.unwrap_or(i64::MAX), r.uuid.clone()));

    let mut summary = ResultsSummary::new();
    for result in ordered {
        reporter.on_test_start(result);
        reporter.on_test_end(result);
        summary.add(result);
    }
    reporter.on_suite_end(&summary)?;
    Ok(summary)
}
