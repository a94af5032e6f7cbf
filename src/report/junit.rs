// JUnit reporter - outputs test results in JUnit XML format

use super::Reporter;
use super::summary::{ResultsSummary, SummaryEntry};
use crate::model::{Status, TestResult};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

const DEFAULT_SUITE: &str = "default";

/// JUnit reporter
pub struct JunitReporter {
    output_path: PathBuf,
}

impl JunitReporter {
    /// Create new JUnit reporter
    pub fn new(output_path: PathBuf) -> Self {
        Self { output_path }
    }
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn seconds(ms: u64) -> f64 {
    ms as f64 / 1000.0
}

fn count(entries: &[&SummaryEntry], status: Status) -> usize {
    entries.iter().filter(|e| e.status == Some(status)).count()
}

/// Renders the summary as JUnit XML, one `testsuite` per `suite` label
pub fn render_junit(summary: &ResultsSummary) -> String {
    let mut suites: BTreeMap<&str, Vec<&SummaryEntry>> = BTreeMap::new();
    for entry in &summary.entries {
        suites
            .entry(entry.suite.as_deref().unwrap_or(DEFAULT_SUITE))
            .or_default()
            .push(entry);
    }

    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        xml,
        "<testsuites name=\"allure\" time=\"{:.3}\" tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\">",
        seconds(summary.duration_ms),
        summary.total,
        summary.failed,
        summary.broken,
        summary.skipped
    );

    for (suite, entries) in &suites {
        let time: u64 = entries.iter().map(|e| e.duration_ms).sum();
        let _ = writeln!(
            xml,
            "  <testsuite name=\"{}\" time=\"{:.3}\" tests=\"{}\" failures=\"{}\" errors=\"{}\" skipped=\"{}\">",
            escape_xml(suite),
            seconds(time),
            entries.len(),
            count(entries, Status::Failed),
            count(entries, Status::Broken),
            count(entries, Status::Skipped)
        );

        for entry in entries {
            let classname = entry
                .full_name
                .as_deref()
                .and_then(|full| full.rsplit_once('.').map(|(class, _)| class))
                .unwrap_or(suite);
            let _ = writeln!(
                xml,
                "    <testcase name=\"{}\" classname=\"{}\" time=\"{:.3}\">",
                escape_xml(&entry.name),
                escape_xml(classname),
                seconds(entry.duration_ms)
            );

            let message = entry.message.as_deref().map(escape_xml);
            match entry.status {
                Some(Status::Failed) => {
                    let msg = message.unwrap_or_else(|| "Test failed".to_string());
                    let _ = writeln!(
                        xml,
                        "      <failure message=\"{}\" type=\"AssertionError\">{}</failure>",
                        msg, msg
                    );
                }
                Some(Status::Broken) => {
                    let msg = message.unwrap_or_else(|| "Test broken".to_string());
                    let _ = writeln!(
                        xml,
                        "      <error message=\"{}\" type=\"Error\">{}</error>",
                        msg, msg
                    );
                }
                Some(Status::Skipped) => {
                    let msg = message.unwrap_or_else(|| "Test skipped".to_string());
                    let _ = writeln!(xml, "      <skipped message=\"{}\" />", msg);
                }
                Some(Status::Passed) | None => {}
            }

            xml.push_str("    </testcase>\n");
        }

        xml.push_str("  </testsuite>\n");
    }

    xml.push_str("</testsuites>\n");
    xml
}

impl Reporter for JunitReporter {
    fn on_test_start(&self, _result: &TestResult) {}

    fn on_test_end(&self, _result: &TestResult) {}

    fn on_suite_end(&self, summary: &ResultsSummary) -> Result<()> {
        let xml = render_junit(summary);

        let mut file = File::create(&self.output_path).with_context(|| {
            format!(
                "Failed to create JUnit report file: {}",
                self.output_path.display()
            )
        })?;

        file.write_all(xml.as_bytes())
            .context("Failed to write JUnit XML content")?;

        Ok(())
    }
}
