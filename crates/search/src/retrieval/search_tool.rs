//! External full-text search tool
//!
//! Runs ripgrep as a subprocess listing files that contain a literal,
//! case-insensitive match. The process is killed when the call is dropped,
//! so a timeout or cancellation never leaves it running.

use async_trait::async_trait;
use noteforge_common::config::SearchConfig;
use noteforge_common::corpus::CorpusScanner;
use noteforge_common::errors::{AppError, Result};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Where and what to search
#[derive(Debug, Clone)]
pub struct SearchScope {
    /// Vault root
    pub root: PathBuf,

    /// Note extension, without the dot
    pub extension: String,

    /// Directory names skipped at any depth
    pub excluded_dirs: Vec<String>,
}

impl SearchScope {
    /// Scope covering exactly the files the scanner loads
    pub fn from_scanner(scanner: &CorpusScanner) -> Self {
        Self {
            root: scanner.root().to_path_buf(),
            extension: scanner.extension().to_string(),
            excluded_dirs: scanner.excluded_dirs().to_vec(),
        }
    }
}

/// Lists files matching a literal pattern
#[async_trait]
pub trait SearchTool: Send + Sync {
    /// Return one reported path per matching file.
    ///
    /// An empty list means no match. Errors mean the tool could not run and
    /// are treated as soft failures by callers.
    async fn search(&self, pattern: &str, scope: &SearchScope) -> Result<Vec<String>>;

    /// Tool name for logging
    fn name(&self) -> &str;
}

/// ripgrep-backed search tool
#[derive(Debug, Clone)]
pub struct RipgrepTool {
    binary: String,
    timeout: Duration,
}

impl RipgrepTool {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(
            config.tool_binary.clone(),
            Duration::from_secs(config.tool_timeout_secs),
        )
    }

    fn command(&self, pattern: &str, scope: &SearchScope) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--files-with-matches")
            .arg("--ignore-case")
            .arg("--fixed-strings")
            .arg("--max-count")
            .arg("1")
            .arg("--hidden")
            .arg("--no-ignore")
            .arg("--no-messages")
            .arg("--sort")
            .arg("path")
            .arg("--iglob")
            .arg(format!("*.{}", scope.extension.trim_start_matches('.')));

        for dir in &scope.excluded_dirs {
            cmd.arg("--glob").arg(format!("!{}", dir));
        }

        cmd.arg("--")
            .arg(pattern)
            .arg(&scope.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd
    }
}

#[async_trait]
impl SearchTool for RipgrepTool {
    async fn search(&self, pattern: &str, scope: &SearchScope) -> Result<Vec<String>> {
        let mut cmd = self.command(pattern, scope);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| AppError::SearchToolTimeout {
                timeout_ms: self.timeout.as_millis() as u64,
            })?
            .map_err(|e| AppError::SearchToolUnavailable {
                message: format!("{}: {}", self.binary, e),
            })?;

        match output.status.code() {
            Some(0) => Ok(String::from_utf8_lossy(&output.stdout)
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()),
            // ripgrep exits 1 when nothing matched
            Some(1) => Ok(Vec::new()),
            _ => Err(AppError::SearchToolUnavailable {
                message: format!(
                    "{} exited with {}: {}",
                    self.binary,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            }),
        }
    }

    fn name(&self) -> &str {
        &self.binary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> SearchScope {
        SearchScope {
            root: PathBuf::from("/vault"),
            extension: "md".to_string(),
            excluded_dirs: vec![".obsidian".to_string()],
        }
    }

    #[test]
    fn test_command_arguments() {
        let tool = RipgrepTool::new("rg", Duration::from_secs(20));
        let cmd = tool.command("borrow checker", &scope());
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert!(args.contains(&"--ignore-case".to_string()));
        assert!(args.contains(&"--fixed-strings".to_string()));
        let glob = args.iter().position(|a| a == "*.md").unwrap();
        assert_eq!(args[glob - 1], "--iglob");
        assert!(args.contains(&"!.obsidian".to_string()));

        let sep = args.iter().position(|a| a == "--").unwrap();
        assert_eq!(args[sep + 1], "borrow checker");
        assert_eq!(args[sep + 2], "/vault");
    }

    #[test]
    fn test_scope_matches_scanner_extension() {
        let dir = tempfile::tempdir().unwrap();
        let config = noteforge_common::config::CorpusConfig {
            root: dir.path().to_path_buf(),
            extension: ".md".to_string(),
            ..Default::default()
        };
        let scope = SearchScope::from_scanner(&CorpusScanner::new(&config).unwrap());
        assert_eq!(scope.extension, "md");
        assert_eq!(scope.root, dir.path().canonicalize().unwrap());

        let tool = RipgrepTool::new("rg", Duration::from_secs(20));
        let cmd = tool.command("x", &scope);
        assert!(cmd.as_std().get_args().any(|a| a == "*.md"));
        assert!(!cmd.as_std().get_args().any(|a| a == "*..md"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let tool = RipgrepTool::new("noteforge-no-such-binary", Duration::from_secs(5));
        let err = tool.search("anything", &scope()).await.unwrap_err();
        assert!(matches!(err, AppError::SearchToolUnavailable { .. }));
        assert!(err.is_unavailable());
    }
}
