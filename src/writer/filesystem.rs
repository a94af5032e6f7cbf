// File system writer - one JSON file per result in the results directory

use super::{ResultsWriteError, ResultsWriter};
use crate::model::{container_file_name, test_result_file_name, TestResult, TestResultContainer};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

pub struct FileSystemResultsWriter {
    output_dir: PathBuf,
    indent_output: bool,
    clean_pending: AtomicBool,
}

impl FileSystemResultsWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            indent_output: false,
            clean_pending: AtomicBool::new(false),
        }
    }

    /// Pretty-print JSON files
    pub fn with_indent_output(mut self, indent: bool) -> Self {
        self.indent_output = indent;
        self
    }

    /// Delete the directory contents before the first write of this writer
    pub fn with_clean(self, clean: bool) -> Self {
        self.clean_pending.store(clean, Ordering::SeqCst);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn prepare_dir(&self) -> Result<(), ResultsWriteError> {
        if self.clean_pending.swap(false, Ordering::SeqCst) && self.output_dir.exists() {
            debug!("Cleaning results directory {}", self.output_dir.display());
            fs::remove_dir_all(&self.output_dir).map_err(|source| ResultsWriteError::Clean {
                path: self.output_dir.clone(),
                source,
            })?;
        }

        fs::create_dir_all(&self.output_dir).map_err(|source| ResultsWriteError::CreateDir {
            path: self.output_dir.clone(),
            source,
        })
    }

    fn write_json<T: Serialize>(
        &self,
        file_name: &str,
        value: &T,
        what: &'static str,
    ) -> Result<(), ResultsWriteError> {
        self.prepare_dir()?;
        let path = self.output_dir.join(file_name);

        let io_err = |source: io::Error| ResultsWriteError::Io {
            what,
            path: path.clone(),
            source,
        };

        let file = File::create(&path).map_err(io_err)?;
        let mut out = BufWriter::new(file);
        let serialized = if self.indent_output {
            serde_json::to_writer_pretty(&mut out, value)
        } else {
            serde_json::to_writer(&mut out, value)
        };
        serialized.map_err(|source| ResultsWriteError::Serialize { what, source })?;
        out.flush().map_err(io_err)?;

        debug!("Wrote {} to {}", what, path.display());
        Ok(())
    }
}

impl ResultsWriter for FileSystemResultsWriter {
    fn write_test_result(&self, result: &TestResult) -> Result<(), ResultsWriteError> {
        let uuid = if result.uuid.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            result.uuid.clone()
        };
        self.write_json(&test_result_file_name(&uuid), result, "test result")
    }

    fn write_container(&self, container: &TestResultContainer) -> Result<(), ResultsWriteError> {
        let uuid = if container.uuid.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            container.uuid.clone()
        };
        self.write_json(&container_file_name(&uuid), container, "test result container")
    }

    fn write_attachment(
        &self,
        source: &str,
        content: &mut dyn Read,
    ) -> Result<(), ResultsWriteError> {
        self.prepare_dir()?;
        let path = self.output_dir.join(source);

        let io_err = |source: io::Error| ResultsWriteError::Io {
            what: "attachment",
            path: path.clone(),
            source,
        };

        let mut file = File::create(&path).map_err(io_err)?;
        io::copy(content, &mut file).map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Status;

    #[test]
    fn test_writes_result_file_named_by_uuid() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileSystemResultsWriter::new(dir.path().join("allure-results"));

        let mut result = TestResult::new("abc").with_name("sample");
        result.status = Some(Status::Passed);
        writer.write_test_result(&result).unwrap();

        let path = dir.path().join("allure-results").join("abc-result.json");
        let content = std::fs::read_to_string(path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["name"], "sample");
        assert_eq!(value["status"], "passed");
        assert!(!content.contains('\n'));
    }

    #[test]
    fn test_indent_output() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileSystemResultsWriter::new(dir.path()).with_indent_output(true);
        writer
            .write_container(&TestResultContainer::new("c"))
            .unwrap();

        let content = std::fs::read_to_string(dir.path().join("c-container.json")).unwrap();
        assert!(content.contains('\n'));
    }

    #[test]
    fn test_clean_happens_once() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("results");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("stale-result.json"), "{}").unwrap();

        let writer = FileSystemResultsWriter::new(&out).with_clean(true);
        writer.write_test_result(&TestResult::new("first")).unwrap();
        writer.write_test_result(&TestResult::new("second")).unwrap();

        assert!(!out.join("stale-result.json").exists());
        assert!(out.join("first-result.json").exists());
        assert!(out.join("second-result.json").exists());
    }

    #[test]
    fn test_write_attachment_copies_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileSystemResultsWriter::new(dir.path());
        let mut body: &[u8] = b"hello";
        writer
            .write_attachment("x-attachment.txt", &mut body)
            .unwrap();

        let content = std::fs::read(dir.path().join("x-attachment.txt")).unwrap();
        assert_eq!(content, b"hello");
    }
}
