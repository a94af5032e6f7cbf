use super::Reporter;
use super::summary::{ResultsSummary, display_name, duration_ms};
use crate::model::{Status, TestResult};
use crate::time::now_rfc3339;
use anyhow::Result;
use serde_json::json;
use std::io::{self, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Emits one JSON event per line as tests start and finish
pub struct StreamingJsonReporter<W: Write + Send = io::Stdout> {
    out: Mutex<W>,
    suite_started: AtomicBool,
    test_count: Option<usize>,
}

impl StreamingJsonReporter<io::Stdout> {
    pub fn new(test_count: Option<usize>) -> Self {
        Self::with_writer(io::stdout(), test_count)
    }
}

impl<W: Write + Send> StreamingJsonReporter<W> {
    pub fn with_writer(out: W, test_count: Option<usize>) -> Self {
        Self {
            out: Mutex::new(out),
            suite_started: AtomicBool::new(false),
            test_count,
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: &serde_json::Value) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        if let Ok(s) = serde_json::to_string(event) {
            let _ = writeln!(out, "{}", s);
        }
        let _ = out.flush();
    }

    fn ensure_suite_started(&self) {
        if !self.suite_started.swap(true, Ordering::SeqCst) {
            self.emit(&json!({
                "event": "suite_start",
                "testCount": self.test_count,
                "timestamp": now_rfc3339()
            }));
        }
    }
}

impl<W: Write + Send> Reporter for StreamingJsonReporter<W> {
    fn on_test_start(&self, result: &TestResult) {
        self.ensure_suite_started();
        self.emit(&json!({
            "event": "test_start",
            "testId": result.uuid,
            "name": display_name(result),
            "timestamp": now_rfc3339()
        }));
    }

    fn on_test_end(&self, result: &TestResult) {
        let event_type = match result.status {
            Some(Status::Passed) => "test_pass",
            Some(Status::Failed) => "test_fail",
            Some(Status::Broken) => "test_broken",
            Some(Status::Skipped) => "test_skip",
            None => "test_unknown",
        };

        let mut event = json!({
            "event": event_type,
            "testId": result.uuid,
            "name": display_name(result),
            "duration": duration_ms(result),
            "timestamp": now_rfc3339()
        });

        if let Some(msg) = result.status_details.as_ref().and_then(|d| d.message.as_ref()) {
            event["message"] = json!(msg);
        }

        self.emit(&event);
    }

    fn on_suite_end(&self, summary: &ResultsSummary) -> Result<()> {
        self.ensure_suite_started();
        self.emit(&json!({
            "event": "suite_end",
            "summary": {
                "total": summary.total,
                "passed": summary.passed,
                "failed": summary.failed,
                "broken": summary.broken,
                "skipped": summary.skipped,
                "duration": summary.duration_ms
            },
            "timestamp": now_rfc3339()
        }));

        Ok(())
    }
}
