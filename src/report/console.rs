// Console reporter - pytest-style output

use std::fmt::Write as _;
use std::io::Write;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::summary::{ResultsSummary, display_name, duration_ms};
use crate::model::{Status, TestResult};
use console::Style;

const WIDE_RULE: &str =
    "════════════════════════════════════════════════════════════════════════════════";
const THIN_RULE: &str =
    "────────────────────────────────────────────────────────────────────────────────";
const DOTS_PER_LINE: usize = 80;

/// How much the console reporter prints while tests run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ProgressMode {
    /// One character per test
    #[default]
    Dots,
    /// One line per test
    Verbose,
    /// Summary only
    None,
}

/// Console reporter
pub struct ConsoleReporter {
    mode: ProgressMode,
    results_dir: String,
    slowest: usize,
    dots_lock: Mutex<()>,
    dots_count: AtomicUsize,
}

impl ConsoleReporter {
    pub fn new(mode: ProgressMode, results_dir: impl Into<String>) -> Self {
        Self {
            mode,
            results_dir: results_dir.into(),
            slowest: 5,
            dots_lock: Mutex::new(()),
            dots_count: AtomicUsize::new(0),
        }
    }

    /// Number of slowest tests listed in verbose mode
    pub fn with_slowest(mut self, limit: usize) -> Self {
        self.slowest = limit;
        self
    }

    fn status_char(status: Option<Status>) -> (char, Style) {
        match status {
            Some(Status::Passed) => ('.', Style::new().green()),
            Some(Status::Failed) => ('F', Style::new().red()),
            Some(Status::Broken) => ('B', Style::new().yellow()),
            Some(Status::Skipped) => ('S', Style::new().dim()),
            None => ('?', Style::new().dim()),
        }
    }

    fn print_dot(&self, status: Option<Status>) {
        let (ch, style) = Self::status_char(status);
        let _guard = self.dots_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "{}", style.apply_to(ch));
        let _ = stdout.flush();

        let count = self.dots_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count >= DOTS_PER_LINE {
            let _ = writeln!(stdout);
            self.dots_count.store(0, Ordering::Relaxed);
        }
    }
}

/// Plain-text summary block printed at the end of a run
pub fn render_summary(summary: &ResultsSummary, results_dir: &str, slowest: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", WIDE_RULE);
    if summary.is_success() {
        let _ = writeln!(
            out,
            "✅ PASSED ({} passed in {}ms)",
            summary.passed, summary.duration_ms
        );
    } else {
        let _ = writeln!(
            out,
            "❌ FAILED ({} failed, {} broken, {} passed in {}ms)",
            summary.failed, summary.broken, summary.passed, summary.duration_ms
        );
    }
    let _ = writeln!(out, "{}", THIN_RULE);
    let _ = writeln!(out, "📊 Execution Statistics:");
    let _ = writeln!(out, "   • Total tests: {}", summary.total);
    let _ = writeln!(out, "   • Passed: {}", summary.passed);
    let _ = writeln!(out, "   • Failed: {}", summary.failed);
    let _ = writeln!(out, "   • Broken: {}", summary.broken);
    let _ = writeln!(out, "   • Skipped: {}", summary.skipped);
    if summary.unknown > 0 {
        let _ = writeln!(out, "   • Unknown: {}", summary.unknown);
    }
    let _ = writeln!(out, "   • Duration: {}ms", summary.duration_ms);

    match summary.success_rate() {
        Some(rate) => {
            let executed = summary.total - summary.skipped;
            let _ = writeln!(
                out,
                "   • Success rate: {:.0}% ({}/{} executed)",
                rate, summary.passed, executed
            );
        }
        None => {
            let _ = writeln!(out, "   • Success rate: N/A (no tests executed)");
        }
    }
    let _ = writeln!(out, "{}", THIN_RULE);

    let failures: Vec<_> = summary.failures().collect();
    if !failures.is_empty() {
        let _ = writeln!(out, "❌ Failed Tests:");
        for entry in failures {
            let status = entry.status.map(|s| s.as_str()).unwrap_or("unknown");
            let _ = writeln!(
                out,
                "   • {} [{}] ({}ms)",
                entry.full_name.as_deref().unwrap_or(&entry.name),
                status,
                entry.duration_ms
            );
            if let Some(message) = &entry.message {
                let _ = writeln!(out, "      Error: {}", message);
            }
        }
    }

    if slowest > 0 && !summary.entries.is_empty() {
        let _ = writeln!(out, "🐢 Slowest Tests:");
        for (i, entry) in summary.slowest(slowest).iter().enumerate() {
            let _ = writeln!(out, "   {}. {} ({}ms)", i + 1, entry.name, entry.duration_ms);
        }
    }

    let _ = writeln!(out, "🔧 Environment:");
    let _ = writeln!(out, "   • Results: {}", results_dir);
    let _ = writeln!(out, "{}", WIDE_RULE);
    out
}

impl super::Reporter for ConsoleReporter {
    fn on_test_start(&self, result: &TestResult) {
        if matches!(self.mode, ProgressMode::Verbose) {
            println!("Testing {} ... ", display_name(result));
        }
    }

    fn on_test_end(&self, result: &TestResult) {
        match self.mode {
            ProgressMode::Dots => self.print_dot(result.status),
            ProgressMode::Verbose => {
                let message = result
                    .status_details
                    .as_ref()
                    .and_then(|d| d.message.as_deref());
                let took = duration_ms(result);
                match result.status {
                    Some(Status::Passed) => println!("✅ PASS ({}ms)", took),
                    Some(Status::Failed) => {
                        println!("❌ FAIL: {}", message.unwrap_or("Unknown error"))
                    }
                    Some(Status::Broken) => {
                        println!("💥 BROKEN: {}", message.unwrap_or("Unknown error"))
                    }
                    Some(Status::Skipped) => println!("🔍 SKIP"),
                    None => println!("❔ UNKNOWN"),
                }
            }
            ProgressMode::None => {}
        }
    }

    fn on_suite_end(&self, summary: &ResultsSummary) -> anyhow::Result<()> {
        // Ensure newline after dots
        if matches!(self.mode, ProgressMode::Dots) && self.dots_count.load(Ordering::Relaxed) > 0 {
            println!();
        }

        let slowest = if matches!(self.mode, ProgressMode::Verbose) {
            self.slowest
        } else {
            0
        };
        let text = render_summary(summary, &self.results_dir, slowest);
        let style = if summary.is_success() {
            Style::new().green()
        } else {
            Style::new().red()
        };
        for (i, line) in text.lines().enumerate() {
            // Colour the verdict line only
            if i == 2 {
                println!("{}", style.apply_to(line));
            } else {
                println!("{}", line);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StatusDetails;

    fn result(name: &str, status: Status, took: i64) -> TestResult {
        let mut r = TestResult::new(name).with_name(name);
        r.status = Some(status);
        r.start = Some(1_000);
        r.stop = Some(1_000 + took);
        r
    }

    #[test]
    fn test_render_summary_passed() {
        let summary = ResultsSummary::from_results(&[result("a", Status::Passed, 10)]);
        let text = render_summary(&summary, "allure-results", 0);
        assert!(text.contains("✅ PASSED (1 passed in 10ms)"));
        assert!(text.contains("Success rate: 100% (1/1 executed)"));
        assert!(text.contains("Results: allure-results"));
        assert!(!text.contains("Slowest"));
    }

    #[test]
    fn test_render_summary_lists_failures() {
        let mut failed = result("login", Status::Failed, 30);
        failed.full_name = Some("auth.login".into());
        failed.status_details = Some(StatusDetails::default().with_message("expected 200"));
        let summary =
            ResultsSummary::from_results(&[result("a", Status::Passed, 10), failed]);

        let text = render_summary(&summary, "out", 2);
        assert!(text.contains("❌ FAILED (1 failed, 0 broken, 1 passed"));
        assert!(text.contains("auth.login [failed] (30ms)"));
        assert!(text.contains("Error: expected 200"));
        assert!(text.contains("1. login (30ms)"));
    }
}
