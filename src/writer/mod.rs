// Writer module - persists finished results

pub mod filesystem;
pub mod memory;

pub use filesystem::FileSystemResultsWriter;
pub use memory::InMemoryResultsWriter;

use crate::model::{TestResult, TestResultContainer};
use std::io::Read;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResultsWriteError {
    #[error("could not clean results directory {path}")]
    Clean {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not create results directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write {what} to {path}")]
    Io {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not serialize {what}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Destination for finished results
pub trait ResultsWriter: Send + Sync {
    fn write_test_result(&self, result: &TestResult) -> Result<(), ResultsWriteError>;

    fn write_container(&self, container: &TestResultContainer) -> Result<(), ResultsWriteError>;

    /// Stores attachment content under `source` (a bare file name)
    fn write_attachment(&self, source: &str, content: &mut dyn Read)
        -> Result<(), ResultsWriteError>;
}
