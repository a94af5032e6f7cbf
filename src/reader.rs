// Results reader - loads a results directory back into the model

use crate::model::{
    TestResult, TestResultContainer, ATTACHMENT_FILE_SUFFIX, TEST_RESULT_CONTAINER_FILE_SUFFIX,
    TEST_RESULT_FILE_SUFFIX,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("results directory {0} does not exist")]
    MissingDirectory(PathBuf),

    #[error("could not read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not list {path}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("could not parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Everything found in a results directory
#[derive(Debug, Default)]
pub struct AllureResults {
    pub results: Vec<TestResult>,
    pub containers: Vec<TestResultContainer>,
    /// Attachment content keyed by source file name
    pub attachments: BTreeMap<String, Vec<u8>>,
    /// Files that could not be read, the rest of the directory is still loaded
    pub errors: Vec<ReadError>,
}

impl AllureResults {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty() && self.containers.is_empty()
    }

    pub fn find_result(&self, uuid: &str) -> Option<&TestResult> {
        self.results.iter().find(|r| r.uuid == uuid)
    }

    pub fn attachment_text(&self, source: &str) -> Option<String> {
        self.attachments
            .get(source)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

pub struct FileSystemResultsReader {
    dir: PathBuf,
    with_attachments: bool,
}

impl FileSystemResultsReader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            with_attachments: true,
        }
    }

    /// Skip loading attachment content
    pub fn without_attachments(mut self) -> Self {
        self.with_attachments = false;
        self
    }

    pub fn read(&self) -> Result<AllureResults, ReadError> {
        if !self.dir.is_dir() {
            return Err(ReadError::MissingDirectory(self.dir.clone()));
        }

        let mut out = AllureResults::default();
        let walker = walkdir::WalkDir::new(&self.dir)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) => {
                    let path = source
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.dir.clone());
                    out.errors.push(ReadError::Walk { path, source });
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let name = entry.file_name().to_string_lossy();

            if name.ends_with(TEST_RESULT_FILE_SUFFIX) {
                match read_json::<TestResult>(path) {
                    Ok(result) => out.results.push(result),
                    Err(e) => out.errors.push(e),
                }
            } else if name.ends_with(TEST_RESULT_CONTAINER_FILE_SUFFIX) {
                match read_json::<TestResultContainer>(path) {
                    Ok(container) => out.containers.push(container),
                    Err(e) => out.errors.push(e),
                }
            } else if self.with_attachments && name.contains(ATTACHMENT_FILE_SUFFIX) {
                match std::fs::read(path) {
                    Ok(bytes) => {
                        out.attachments.insert(name.into_owned(), bytes);
                    }
                    Err(source) => out.errors.push(ReadError::Io {
                        path: path.to_path_buf(),
                        source,
                    }),
                }
            } else {
                debug!("Skipping unrelated file {}", path.display());
            }
        }

        for e in &out.errors {
            warn!("{}", e);
        }
        Ok(out)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ReadError> {
    let content = std::fs::read_to_string(path).map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ReadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
