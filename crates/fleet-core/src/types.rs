use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Label vocabulary
// ---------------------------------------------------------------------------

/// Prefix shared by every pipeline stage label.
pub const PIPELINE_PREFIX: &str = "pipeline:";
/// Present while an agent is believed to be working on the epic.
pub const AGENT_RUNNING: &str = "agent:running";
pub const PLAN_PENDING: &str = "plan:pending";
pub const PLAN_APPROVED: &str = "plan:approved";
/// Terminal marker added once the QA retry budget is exhausted.
pub const QA_NEEDS_REVIEW: &str = "qa:needs-review";
pub const QA_ROUND_PREFIX: &str = "qa:round-";
pub const SUBMISSION_PREFIX: &str = "submission:";

// ---------------------------------------------------------------------------
// EpicStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpicStatus {
    Open,
    InProgress,
    Closed,
}

impl EpicStatus {
    /// Wire form understood by the tracker CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            EpicStatus::Open => "open",
            EpicStatus::InProgress => "in_progress",
            EpicStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for EpicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PipelineStage
// ---------------------------------------------------------------------------

/// Stage of an epic, derived from its single `pipeline:*` label.
///
/// `Idea` has no label of its own: an epic without any pipeline label is an
/// idea that nobody has started on yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStage {
    Idea,
    Research,
    ResearchComplete,
    Development,
    Qa,
    SubmissionPrep,
    Submitted,
    KitManagement,
    Completed,
    BadIdea,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 10] = [
        PipelineStage::Idea,
        PipelineStage::Research,
        PipelineStage::ResearchComplete,
        PipelineStage::Development,
        PipelineStage::Qa,
        PipelineStage::SubmissionPrep,
        PipelineStage::Submitted,
        PipelineStage::KitManagement,
        PipelineStage::Completed,
        PipelineStage::BadIdea,
    ];

    /// The bare stage name, e.g. `research-complete`.
    pub fn slug(&self) -> &'static str {
        match self {
            PipelineStage::Idea => "idea",
            PipelineStage::Research => "research",
            PipelineStage::ResearchComplete => "research-complete",
            PipelineStage::Development => "development",
            PipelineStage::Qa => "qa",
            PipelineStage::SubmissionPrep => "submission-prep",
            PipelineStage::Submitted => "submitted",
            PipelineStage::KitManagement => "kit-management",
            PipelineStage::Completed => "completed",
            PipelineStage::BadIdea => "bad-idea",
        }
    }

    /// The `pipeline:<stage>` label, or `None` for [`PipelineStage::Idea`].
    pub fn label(&self) -> Option<String> {
        match self {
            PipelineStage::Idea => None,
            other => Some(format!("{PIPELINE_PREFIX}{}", other.slug())),
        }
    }

    /// Parse a `pipeline:<stage>` label.
    pub fn from_label(label: &str) -> Option<Self> {
        let slug = label.strip_prefix(PIPELINE_PREFIX)?;
        Self::ALL
            .into_iter()
            .find(|s| *s != PipelineStage::Idea && s.slug() == slug)
    }

    /// Derive the stage from a label set. Unknown or missing pipeline labels
    /// read as [`PipelineStage::Idea`].
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        labels
            .iter()
            .find_map(|l| Self::from_label(l.as_ref()))
            .unwrap_or(PipelineStage::Idea)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

// ---------------------------------------------------------------------------
// Epic
// ---------------------------------------------------------------------------

/// A unit of work tracked through the pipeline. Owned by the external
/// tracker; this crate only reads it and mutates labels/status through a
/// [`crate::tracker::LabelStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epic {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub status: EpicStatus,
}

impl Epic {
    pub fn stage(&self) -> PipelineStage {
        PipelineStage::from_labels(&self.labels)
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Highest `qa:round-N` on the epic, if any.
    pub fn qa_round(&self) -> Option<u32> {
        current_qa_round(&self.labels)
    }
}

// ---------------------------------------------------------------------------
// Label helpers
// ---------------------------------------------------------------------------

/// Every `pipeline:*` label in `labels`.
pub fn pipeline_labels<S: AsRef<str>>(labels: &[S]) -> Vec<String> {
    labels
        .iter()
        .map(AsRef::as_ref)
        .filter(|l| l.starts_with(PIPELINE_PREFIX))
        .map(str::to_string)
        .collect()
}

/// Every `qa:round-*` label in `labels`.
pub fn qa_round_labels<S: AsRef<str>>(labels: &[S]) -> Vec<String> {
    labels
        .iter()
        .map(AsRef::as_ref)
        .filter(|l| l.starts_with(QA_ROUND_PREFIX))
        .map(str::to_string)
        .collect()
}

/// The maximum `N` across all `qa:round-N` labels. Malformed round labels
/// are ignored.
pub fn current_qa_round<S: AsRef<str>>(labels: &[S]) -> Option<u32> {
    labels
        .iter()
        .filter_map(|l| l.as_ref().strip_prefix(QA_ROUND_PREFIX))
        .filter_map(|n| n.parse::<u32>().ok())
        .max()
}

/// Round number for a fresh QA attempt: one past the highest seen, or 1.
pub fn next_qa_round<S: AsRef<str>>(labels: &[S]) -> u32 {
    current_qa_round(labels).map_or(1, |n| n + 1)
}

pub fn qa_round_label(round: u32) -> String {
    format!("{QA_ROUND_PREFIX}{round}")
}
