// Commands module - handles CLI command execution

use anyhow::{Context, Result};
use std::path::Path;

use crate::reader::{AllureResults, FileSystemResultsReader};

pub mod clean;
pub mod export;
pub mod list;
pub mod summary;

pub use clean::handle_clean;
pub use export::handle_export;
pub use list::handle_list;
pub use summary::handle_summary;

/// Handle shell completion
pub fn handle_completion(shell_type: &str) -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::{Shell, generate};

    let shell = match shell_type.to_lowercase().as_str() {
        "bash" => Shell::Bash,
        "zsh" => Shell::Zsh,
        "fish" => Shell::Fish,
        "elvish" => Shell::Elvish,
        "powershell" => Shell::PowerShell,
        _ => {
            anyhow::bail!(
                "Unsupported shell: {}. Supported: bash, zsh, fish, elvish, powershell",
                shell_type
            );
        }
    };

    let mut cmd = crate::cli::Cli::command();
    let name = cmd.get_name().to_string();
    let mut stdout = std::io::stdout();

    generate(shell, &mut cmd, name, &mut stdout);

    Ok(())
}

/// Reads a results directory, skipping attachment bodies
pub fn load_results(dir: &Path) -> Result<AllureResults> {
    FileSystemResultsReader::new(dir)
        .without_attachments()
        .read()
        .with_context(|| format!("Failed to read results directory: {}", dir.display()))
}

/// Truncate string to max length with ellipsis
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("short", 10), "short");
        assert_eq!(truncate_str("a much longer name", 10), "a much ...");
    }

    #[test]
    fn test_unsupported_shell() {
        assert!(handle_completion("tcsh").is_err());
    }
}
