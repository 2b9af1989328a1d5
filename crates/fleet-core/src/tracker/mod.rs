//! Seams to the external ticket tracker.
//!
//! The pipeline never talks to the tracker directly: label writes go through a
//! [`LabelStore`], reads and lookups through an [`IssueRepository`]. The
//! [`bd::BdTracker`] implementation drives the `bd` CLI; tests substitute
//! in-memory fakes.

pub mod bd;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::types::{pipeline_labels, EpicStatus};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors surfaced by tracker collaborators.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// The tracker binary could not be started at all.
    #[error("failed to run {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// The tracker ran but reported failure.
    #[error("`{command}` failed: {stderr}")]
    Command { command: String, stderr: String },

    /// The tracker's output could not be understood.
    #[error("unexpected tracker output: {0}")]
    Parse(String),

    #[error("epic not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;

// ---------------------------------------------------------------------------
// LabelStore
// ---------------------------------------------------------------------------

/// Write side of the tracker: label and status mutations on an epic.
#[async_trait]
pub trait LabelStore: Send + Sync {
    async fn add_labels(&self, epic_id: &str, labels: &[String], repo: &Path) -> Result<()>;

    async fn remove_labels(&self, epic_id: &str, labels: &[String], repo: &Path) -> Result<()>;

    /// Remove every `pipeline:*` label found in `current_labels`.
    async fn remove_all_pipeline_labels(
        &self,
        epic_id: &str,
        current_labels: &[String],
        repo: &Path,
    ) -> Result<()> {
        let stale = pipeline_labels(current_labels);
        if stale.is_empty() {
            return Ok(());
        }
        self.remove_labels(epic_id, &stale, repo).await
    }

    async fn close_epic(&self, epic_id: &str, reason: &str, repo: &Path) -> Result<()>;

    async fn update_status(&self, epic_id: &str, status: EpicStatus, repo: &Path) -> Result<()>;
}

// ---------------------------------------------------------------------------
// IssueRepository
// ---------------------------------------------------------------------------

/// Read side of the tracker.
#[async_trait]
pub trait IssueRepository: Send + Sync {
    /// Repository that owns `epic_id`, if any known repository does.
    async fn resolve_repo_path(&self, epic_id: &str) -> Result<Option<PathBuf>>;

    /// Current label set of an epic.
    async fn epic_labels(&self, epic_id: &str, repo: &Path) -> Result<Vec<String>>;

    /// Number of open bug-typed issues in `repo` (filed by a QA pass).
    async fn open_bug_count(&self, repo: &Path) -> Result<u32>;
}
