// Tests for reporters and CLI commands - public API only

use allurectl::adapters::AllureHarness;
use allurectl::cli::ExportFormat;
use allurectl::cli::args::{ExportArgs, ResultsDirArgs};
use allurectl::commands::{handle_export, load_results};
use allurectl::config::Config;
use allurectl::lifecycle::{AllureLifecycle, LifecycleNotifier};
use allurectl::model::Status;
use allurectl::report::{
    self, JsonReporter, JunitReporter, Reporter, ReporterListener, ResultsSummary,
    StreamingJsonReporter,
};
use allurectl::writer::{FileSystemResultsWriter, InMemoryResultsWriter};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Writes three results (passed, failed, skipped) into `dir`
fn write_sample_results(dir: &Path) {
    let lifecycle = Arc::new(AllureLifecycle::new(Arc::new(FileSystemResultsWriter::new(
        dir,
    ))));
    let harness = AllureHarness::with_lifecycle(lifecycle).suite("billing");
    harness.test("creates invoice", || {});
    harness.test("rejects negative amount", || {
        let amount = -5;
        assert!(amount >= 0, "amount check failed for {}", amount);
    });
    harness.skip("sends reminder", "mail server not configured");
}

/// Reporter that records the calls it receives
#[derive(Default)]
struct RecordingReporter {
    events: Mutex<Vec<String>>,
}

impl Reporter for RecordingReporter {
    fn on_test_start(&self, result: &allurectl::model::TestResult) {
        self.events
            .lock()
            .unwrap()
            .push(format!("start {}", result.name.clone().unwrap_or_default()));
    }

    fn on_test_end(&self, result: &allurectl::model::TestResult) {
        self.events.lock().unwrap().push(format!(
            "end {} {:?}",
            result.name.clone().unwrap_or_default(),
            result.status
        ));
    }

    fn on_suite_end(&self, summary: &ResultsSummary) -> anyhow::Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(format!("suite {}", summary.total));
        Ok(())
    }
}

#[test]
fn test_replay_results_directory() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    write_sample_results(dir.path());
    let results = load_results(dir.path()).unwrap();
    let reporter = RecordingReporter::default();

    // Act
    let summary = report::replay(&results, &reporter).unwrap();

    // Assert
    assert_eq!(summary.total, 3);
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 1);
    let events = reporter.events.lock().unwrap();
    assert_eq!(events.len(), 7);
    assert_eq!(events.last().unwrap(), "suite 3");
}

#[test]
fn test_json_reporter_writes_summary() {
    let dir = tempfile::tempdir().unwrap();
    write_sample_results(dir.path());
    let output = dir.path().join("summary.json");

    let results = load_results(dir.path()).unwrap();
    report::replay(&results, &JsonReporter::new(output.clone())).unwrap();

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(summary["total"], 3);
    assert_eq!(summary["failed"], 1);
    let failed = summary["entries"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["status"] == "failed")
        .unwrap();
    assert_eq!(failed["fullName"], "billing.rejects negative amount");
    assert!(failed["message"].as_str().unwrap().contains("amount check"));
}

#[test]
fn test_export_command_writes_junit() {
    let dir = tempfile::tempdir().unwrap();
    write_sample_results(dir.path());
    let output = dir.path().join("junit.xml");

    let args = ExportArgs {
        dir: ResultsDirArgs {
            results_dir: Some(dir.path().to_path_buf()),
        },
        format: ExportFormat::Junit,
        output: output.clone(),
    };
    handle_export(&args, &Config::default()).unwrap();

    let xml = std::fs::read_to_string(&output).unwrap();
    assert!(xml.starts_with("<?xml"));
    assert!(xml.contains("<testsuite name=\"billing\""));
    assert!(xml.contains("tests=\"3\" failures=\"1\" errors=\"0\" skipped=\"1\""));
    assert!(xml.contains("<testcase name=\"creates invoice\" classname=\"billing\""));
    assert!(xml.contains("<skipped message=\"mail server not configured\" />"));
}

#[test]
fn test_junit_reporter_reports_unwritable_path() {
    let summary = ResultsSummary::new();
    let reporter = JunitReporter::new("/nonexistent-dir/for/sure/junit.xml".into());
    assert!(reporter.on_suite_end(&summary).is_err());
}

#[test]
fn test_live_reporting_through_listener() {
    let recorder = Arc::new(RecordingReporter::default());
    let listener = Arc::new(ReporterListener::new(recorder.clone()));
    let notifier = LifecycleNotifier::new().with_test_listener(listener.clone());
    let lifecycle = Arc::new(AllureLifecycle::with_notifier(
        Arc::new(InMemoryResultsWriter::new()),
        notifier,
    ));

    let harness = AllureHarness::with_lifecycle(lifecycle);
    harness.test("first", || {});
    harness.test("second", || panic!("nope"));
    let summary = listener.finish().unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.failed, 1);
    let events = recorder.events.lock().unwrap();
    assert_eq!(
        *events,
        [
            "start first".to_string(),
            format!("end first {:?}", Some(Status::Passed)),
            "start second".to_string(),
            format!("end second {:?}", Some(Status::Failed)),
            "suite 2".to_string(),
        ]
    );
}

#[test]
fn test_streaming_reporter_over_replay() {
    let dir = tempfile::tempdir().unwrap();
    write_sample_results(dir.path());
    let results = load_results(dir.path()).unwrap();

    let reporter = StreamingJsonReporter::with_writer(Vec::new(), Some(results.results.len()));
    report::replay(&results, &reporter).unwrap();

    let out = String::from_utf8(reporter.into_inner()).unwrap();
    let events: Vec<serde_json::Value> = out
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(events.first().unwrap()["event"], "suite_start");
    assert_eq!(events.last().unwrap()["event"], "suite_end");
    assert_eq!(
        events.iter().filter(|e| e["event"] == "test_fail").count(),
        1
    );
}

#[test]
fn test_load_results_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    assert!(load_results(&missing).is_err());
}
