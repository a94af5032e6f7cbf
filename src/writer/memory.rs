// In-memory writer - keeps everything for later inspection

use super::{ResultsWriteError, ResultsWriter};
use crate::model::{TestResult, TestResultContainer};
use std::collections::HashMap;
use std::io::Read;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct InMemoryResultsWriter {
    results: Mutex<Vec<TestResult>>,
    containers: Mutex<Vec<TestResultContainer>>,
    attachments: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryResultsWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn test_results(&self) -> Vec<TestResult> {
        self.results.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn containers(&self) -> Vec<TestResultContainer> {
        self.containers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn attachments(&self) -> HashMap<String, Vec<u8>> {
        self.attachments
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Attachment content decoded as UTF-8
    pub fn attachment_text(&self, source: &str) -> Option<String> {
        self.attachments
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(source)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// First written result with the given name
    pub fn find_by_name(&self, name: &str) -> Option<TestResult> {
        self.test_results()
            .into_iter()
            .find(|r| r.name.as_deref() == Some(name))
    }
}

impl ResultsWriter for InMemoryResultsWriter {
    fn write_test_result(&self, result: &TestResult) -> Result<(), ResultsWriteError> {
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(result.clone());
        Ok(())
    }

    fn write_container(&self, container: &TestResultContainer) -> Result<(), ResultsWriteError> {
        self.containers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(container.clone());
        Ok(())
    }

    fn write_attachment(
        &self,
        source: &str,
        content: &mut dyn Read,
    ) -> Result<(), ResultsWriteError> {
        let mut buffer = Vec::new();
        content
            .read_to_end(&mut buffer)
            .map_err(|err| ResultsWriteError::Io {
                what: "attachment",
                path: source.into(),
                source: err,
            })?;
        self.attachments
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(source.to_string(), buffer);
        Ok(())
    }
}
