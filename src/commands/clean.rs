// Clean command - removes result, container and attachment files

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::cli::args::CleanArgs;
use crate::config::Config;
use crate::model::{
    ATTACHMENT_FILE_SUFFIX, TEST_RESULT_CONTAINER_FILE_SUFFIX, TEST_RESULT_FILE_SUFFIX,
};

fn is_result_file(name: &str) -> bool {
    name.ends_with(TEST_RESULT_FILE_SUFFIX)
        || name.ends_with(TEST_RESULT_CONTAINER_FILE_SUFFIX)
        || name.contains(ATTACHMENT_FILE_SUFFIX)
}

/// Files of a results directory that `clean` removes. Other files are kept.
pub fn result_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| is_result_file(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.into_path())
        .collect()
}

pub fn handle_clean(args: &CleanArgs, config: &Config) -> Result<usize> {
    let dir = args.dir.resolve(config);
    if !dir.exists() {
        warn!("Results directory not found: {}", dir.display());
        return Ok(0);
    }

    let files = result_files(&dir);
    for file in &files {
        if args.dry_run {
            println!("Would remove {}", file.display());
            continue;
        }
        debug!("Removing {}", file.display());
        std::fs::remove_file(file)
            .with_context(|| format!("Failed to remove {}", file.display()))?;
    }

    if !args.dry_run {
        println!("Removed {} files from {}", files.len(), dir.display());
    }
    Ok(files.len())
}
