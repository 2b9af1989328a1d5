use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use super::{IssueRepository, LabelStore, Result, TrackerError};
use crate::cache::TtlCache;
use crate::types::EpicStatus;

/// Tracker backed by the `bd` command-line tool.
///
/// Every call is a direct argument-vector spawn; nothing is interpolated
/// into a shell. Label reads are cached per epic and dropped whenever the
/// shared cache is invalidated.
pub struct BdTracker {
    binary: String,
    repos: Vec<PathBuf>,
    labels_cache: Arc<TtlCache<Vec<String>>>,
}

impl BdTracker {
    /// `repos` are the repositories searched by [`IssueRepository::resolve_repo_path`],
    /// in priority order.
    pub fn new(
        binary: impl Into<String>,
        repos: Vec<PathBuf>,
        labels_cache: Arc<TtlCache<Vec<String>>>,
    ) -> Self {
        Self {
            binary: binary.into(),
            repos,
            labels_cache,
        }
    }

    async fn run(&self, repo: &Path, args: &[&str]) -> Result<String> {
        tracing::debug!(binary = %self.binary, repo = %repo.display(), ?args, "running tracker");
        let output = Command::new(&self.binary)
            .args(args)
            .current_dir(repo)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| TrackerError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(TrackerError::Command {
                command: format!("{} {}", self.binary, args.join(" ")),
                stderr,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn cache_key(epic_id: &str, repo: &Path) -> String {
        format!("{}#{}", repo.display(), epic_id)
    }
}

#[async_trait]
impl LabelStore for BdTracker {
    async fn add_labels(&self, epic_id: &str, labels: &[String], repo: &Path) -> Result<()> {
        for label in labels {
            self.run(repo, &["label", "add", epic_id, label.as_str()]).await?;
        }
        self.labels_cache.invalidate(&Self::cache_key(epic_id, repo));
        Ok(())
    }

    async fn remove_labels(&self, epic_id: &str, labels: &[String], repo: &Path) -> Result<()> {
        for label in labels {
            self.run(repo, &["label", "remove", epic_id, label.as_str()]).await?;
        }
        self.labels_cache.invalidate(&Self::cache_key(epic_id, repo));
        Ok(())
    }

    async fn close_epic(&self, epic_id: &str, reason: &str, repo: &Path) -> Result<()> {
        self.run(repo, &["close", epic_id, "--reason", reason]).await?;
        Ok(())
    }

    async fn update_status(&self, epic_id: &str, status: EpicStatus, repo: &Path) -> Result<()> {
        self.run(repo, &["update", epic_id, "--status", status.as_str()])
            .await?;
        Ok(())
    }
}

#[async_trait]
impl IssueRepository for BdTracker {
    async fn resolve_repo_path(&self, epic_id: &str) -> Result<Option<PathBuf>> {
        for repo in &self.repos {
            match self.run(repo, &["show", epic_id, "--json"]).await {
                Ok(_) => return Ok(Some(repo.clone())),
                Err(TrackerError::Command { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    async fn epic_labels(&self, epic_id: &str, repo: &Path) -> Result<Vec<String>> {
        let key = Self::cache_key(epic_id, repo);
        if let Some(labels) = self.labels_cache.get(&key) {
            return Ok(labels);
        }
        let stdout = self.run(repo, &["show", epic_id, "--json"]).await?;
        let labels = parse_show_labels(&stdout)?;
        self.labels_cache.insert(key, labels.clone());
        Ok(labels)
    }

    async fn open_bug_count(&self, repo: &Path) -> Result<u32> {
        let stdout = self
            .run(repo, &["list", "--status=open", "--type=bug", "--json"])
            .await?;
        parse_list_count(&stdout)
    }
}

// ---------------------------------------------------------------------------
// Output parsing
// ---------------------------------------------------------------------------

/// `bd show --json` prints either a single issue object or a one-element array.
fn parse_show_labels(stdout: &str) -> Result<Vec<String>> {
    let value: Value =
        serde_json::from_str(stdout.trim()).map_err(|e| TrackerError::Parse(e.to_string()))?;
    let issue = match &value {
        Value::Array(items) => items
            .first()
            .ok_or_else(|| TrackerError::NotFound("empty show output".into()))?,
        other => other,
    };
    let labels = match issue.get("labels") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            return Err(TrackerError::Parse(format!("labels is not an array: {other}")));
        }
    };
    Ok(labels)
}

/// `bd list --json` prints an array of issues; an empty body means none.
fn parse_list_count(stdout: &str) -> Result<u32> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    let value: Value =
        serde_json::from_str(trimmed).map_err(|e| TrackerError::Parse(e.to_string()))?;
    match value {
        Value::Array(items) => Ok(items.len() as u32),
        Value::Null => Ok(0),
        other => Err(TrackerError::Parse(format!("expected an array, got {other}"))),
    }
}
