// JSON reporter - writes the run summary to a JSON file

use super::Reporter;
use super::summary::ResultsSummary;
use crate::model::TestResult;
use anyhow::{Context, Result};
use std::fs::File;
use std::path::PathBuf;

/// JSON reporter
pub struct JsonReporter {
    output_path: PathBuf,
}

impl JsonReporter {
    /// Create new JSON reporter
    pub fn new(output_path: PathBuf) -> Self {
        Self { output_path }
    }
}

impl Reporter for JsonReporter {
    fn on_test_start(&self, _result: &TestResult) {}

    fn on_test_end(&self, _result: &TestResult) {}

    fn on_suite_end(&self, summary: &ResultsSummary) -> Result<()> {
        let file = File::create(&self.output_path).with_context(|| {
            format!(
                "Failed to create JSON report file: {}",
                self.output_path.display()
            )
        })?;

        serde_json::to_writer_pretty(file, summary)
            .context("Failed to serialize results summary to JSON")?;

        Ok(())
    }
}
