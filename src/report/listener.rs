// Live reporting - forwards lifecycle test events to a reporter

use super::Reporter;
use super::summary::ResultsSummary;
use crate::lifecycle::TestLifecycleListener;
use crate::model::TestResult;
use anyhow::Result;
use std::sync::{Arc, Mutex};

/// Lifecycle listener that drives a `Reporter` while tests run.
/// Register it with `LifecycleNotifier::with_test_listener` and call
/// `finish` once every test has been written.
pub struct ReporterListener {
    reporter: Arc<dyn Reporter>,
    summary: Mutex<ResultsSummary>,
}

impl ReporterListener {
    pub fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self {
            reporter,
            summary: Mutex::new(ResultsSummary::new()),
        }
    }

    /// Snapshot of the results seen so far
    pub fn summary(&self) -> ResultsSummary {
        self.summary
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn finish(&self) -> Result<ResultsSummary> {
        let summary = self.summary();
        self.reporter.on_suite_end(&summary)?;
        Ok(summary)
    }
}

impl TestLifecycleListener for ReporterListener {
    fn after_test_start(&self, result: &mut TestResult) {
        self.reporter.on_test_start(result);
    }

    // Counted at write time, once status and stop are final
    fn before_test_write(&self, result: &mut TestResult) {
        self.reporter.on_test_end(result);
        self.summary
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .add(result);
    }
}
