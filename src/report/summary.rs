// Run summary - status counts and per-test entries

use crate::model::{Status, TestResult};
use serde::Serialize;

/// One reported test
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryEntry {
    pub uuid: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suite: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SummaryEntry {
    pub fn from_result(result: &TestResult) -> Self {
        Self {
            uuid: result.uuid.clone(),
            name: display_name(result),
            full_name: result.full_name.clone(),
            suite: result.label(crate::utils::SUITE_LABEL_NAME).map(str::to_string),
            status: result.status,
            duration_ms: duration_ms(result),
            message: result
                .status_details
                .as_ref()
                .and_then(|d| d.message.clone()),
        }
    }
}

/// Name, else full name, else uuid
pub fn display_name(result: &TestResult) -> String {
    result
        .name
        .clone()
        .or_else(|| result.full_name.clone())
        .unwrap_or_else(|| result.uuid.clone())
}

pub fn duration_ms(result: &TestResult) -> u64 {
    match (result.start, result.stop) {
        (Some(start), Some(stop)) if stop >= start => (stop - start) as u64,
        _ => 0,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub broken: usize,
    pub skipped: usize,
    /// Results without a status
    pub unknown: usize,
    /// Wall time from the earliest start to the latest stop
    pub duration_ms: u64,
    #[serde(skip)]
    first_start: Option<i64>,
    #[serde(skip)]
    last_stop: Option<i64>,
    pub entries: Vec<SummaryEntry>,
}

impl ResultsSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a TestResult>) -> Self {
        let mut summary = Self::new();
        for result in results {
            summary.add(result);
        }
        summary
    }

    pub fn add(&mut self, result: &TestResult) {
        self.total += 1;
        match result.status {
            Some(Status::Passed) => self.passed += 1,
            Some(Status::Failed) => self.failed += 1,
            Some(Status::Broken) => self.broken += 1,
            Some(Status::Skipped) => self.skipped += 1,
            None => self.unknown += 1,
        }

        if let Some(start) = result.start {
            self.first_start = Some(self.first_start.map_or(start, |s| s.min(start)));
        }
        if let Some(stop) = result.stop {
            self.last_stop = Some(self.last_stop.map_or(stop, |s| s.max(stop)));
        }
        if let (Some(start), Some(stop)) = (self.first_start, self.last_stop) {
            self.duration_ms = stop.saturating_sub(start).max(0) as u64;
        }

        self.entries.push(SummaryEntry::from_result(result));
    }

    /// Failed plus broken
    pub fn problems(&self) -> usize {
        self.failed + self.broken
    }

    pub fn is_success(&self) -> bool {
        self.problems() == 0
    }

    /// Passed share of executed (non-skipped) tests, in percent
    pub fn success_rate(&self) -> Option<f64> {
        let executed = self.total - self.skipped;
        (executed > 0).then(|| self.passed as f64 / executed as f64 * 100.0)
    }

    pub fn failures(&self) -> impl Iterator<Item = &SummaryEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.status, Some(Status::Failed) | Some(Status::Broken)))
    }

    /// Slowest entries first
    pub fn slowest(&self, limit: usize) -> Vec<&SummaryEntry> {
        let mut sorted: Vec<&SummaryEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| b.duration_ms.cmp(&a.duration_ms));
        sorted.truncate(limit);
        sorted
    }
}
