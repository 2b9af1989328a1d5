//! What happens to an epic when its agent exits.
//!
//! [`plan_exit`] is the pure state machine: given the exited stage, whether
//! the run succeeded and (for QA) what the run found, it returns the label
//! changes and an optional chained action. [`TransitionResolver`] gathers the
//! QA findings, applies the plan through the [`LabelStore`] and hands the
//! chained action back to the orchestrator.

use std::path::Path;
use std::sync::Arc;

use fleet_core::tracker::{IssueRepository, LabelStore, TrackerError};
use fleet_core::types::{current_qa_round, PipelineStage, AGENT_RUNNING, PLAN_PENDING, QA_NEEDS_REVIEW};
use tracing::{debug, info};

use crate::actions::{ActionKind, WorkerStage};

// ---------------------------------------------------------------------------
// Pure plan
// ---------------------------------------------------------------------------

/// Outcome of a QA pass, queried from the tracker after the agent exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QaFindings {
    pub open_bugs: u32,
    pub round: u32,
}

/// Label changes and follow-up action for one agent exit. Does not include
/// the unconditional `agent:running` removal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExitPlan {
    pub remove: Vec<String>,
    pub add: Vec<String>,
    pub chain: Option<ActionKind>,
}

impl ExitPlan {
    fn advance(from: PipelineStage, to: PipelineStage) -> Self {
        Self {
            remove: from.label().into_iter().collect(),
            add: to.label().into_iter().collect(),
            chain: None,
        }
    }

    fn chain(action: ActionKind) -> Self {
        Self {
            chain: Some(action),
            ..Self::default()
        }
    }

    fn add(label: &str) -> Self {
        Self {
            add: vec![label.to_string()],
            ..Self::default()
        }
    }

    pub fn is_noop(&self) -> bool {
        self.remove.is_empty() && self.add.is_empty() && self.chain.is_none()
    }
}

/// The exit state machine.
///
/// A failed run never moves the epic. A QA exit without findings (the query
/// failed) does not move it either.
pub fn plan_exit(
    stage: WorkerStage,
    succeeded: bool,
    qa: Option<QaFindings>,
    max_qa_rounds: u32,
) -> ExitPlan {
    if !succeeded {
        return ExitPlan::default();
    }
    match stage {
        WorkerStage::Research => {
            ExitPlan::advance(PipelineStage::Research, PipelineStage::ResearchComplete)
        }
        WorkerStage::Planning => ExitPlan::add(PLAN_PENDING),
        WorkerStage::Development | WorkerStage::QaFixes => ExitPlan::chain(ActionKind::SendForQa),
        WorkerStage::Qa => match qa {
            None => ExitPlan::default(),
            Some(f) if f.open_bugs == 0 => {
                ExitPlan::advance(PipelineStage::Qa, PipelineStage::SubmissionPrep)
            }
            Some(f) if f.round >= max_qa_rounds => ExitPlan::add(QA_NEEDS_REVIEW),
            Some(_) => ExitPlan::chain(ActionKind::QaFixAndRetest),
        },
        WorkerStage::SubmissionPrep => {
            ExitPlan::advance(PipelineStage::SubmissionPrep, PipelineStage::Submitted)
        }
        WorkerStage::KitManagement => {
            ExitPlan::advance(PipelineStage::KitManagement, PipelineStage::Completed)
        }
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("failed to update labels after agent exit: {0}")]
    ExitLabelUpdate(#[source] TrackerError),

    #[error("failed to query QA findings: {0}")]
    QaQuery(#[source] TrackerError),
}

/// One exited agent, as seen by the resolver.
#[derive(Debug, Clone, Copy)]
pub struct ExitContext<'a> {
    pub epic_id: &'a str,
    pub stage: WorkerStage,
    pub succeeded: bool,
    /// Repository holding the epic's labels.
    pub label_repo: &'a Path,
    /// Repository the agent worked in; QA files its bugs here.
    pub work_repo: &'a Path,
}

pub struct TransitionResolver {
    labels: Arc<dyn LabelStore>,
    issues: Arc<dyn IssueRepository>,
    max_qa_rounds: u32,
}

impl TransitionResolver {
    pub fn new(
        labels: Arc<dyn LabelStore>,
        issues: Arc<dyn IssueRepository>,
        max_qa_rounds: u32,
    ) -> Self {
        Self {
            labels,
            issues,
            max_qa_rounds,
        }
    }

    pub fn max_qa_rounds(&self) -> u32 {
        self.max_qa_rounds
    }

    /// Apply the exit transition. Returns the action to chain, if any.
    pub async fn resolve(
        &self,
        ctx: &ExitContext<'_>,
    ) -> Result<Option<ActionKind>, TransitionError> {
        self.labels
            .remove_labels(ctx.epic_id, &[AGENT_RUNNING.to_string()], ctx.label_repo)
            .await
            .map_err(TransitionError::ExitLabelUpdate)?;

        if !ctx.succeeded {
            info!(epic_id = ctx.epic_id, stage = %ctx.stage, "agent failed; epic left in place");
            return Ok(None);
        }

        let findings = match ctx.stage {
            WorkerStage::Qa => Some(self.qa_findings(ctx).await?),
            _ => None,
        };
        let plan = plan_exit(ctx.stage, true, findings, self.max_qa_rounds);
        debug!(epic_id = ctx.epic_id, stage = %ctx.stage, ?findings, ?plan, "exit plan");

        if !plan.remove.is_empty() {
            self.labels
                .remove_labels(ctx.epic_id, &plan.remove, ctx.label_repo)
                .await
                .map_err(TransitionError::ExitLabelUpdate)?;
        }
        if !plan.add.is_empty() {
            self.labels
                .add_labels(ctx.epic_id, &plan.add, ctx.label_repo)
                .await
                .map_err(TransitionError::ExitLabelUpdate)?;
        }
        if plan.add.iter().any(|l| l == QA_NEEDS_REVIEW) {
            info!(epic_id = ctx.epic_id, "QA retry budget exhausted; needs review");
        }
        Ok(plan.chain)
    }

    async fn qa_findings(&self, ctx: &ExitContext<'_>) -> Result<QaFindings, TransitionError> {
        let open_bugs = self
            .issues
            .open_bug_count(ctx.work_repo)
            .await
            .map_err(TransitionError::QaQuery)?;
        let labels = self
            .issues
            .epic_labels(ctx.epic_id, ctx.label_repo)
            .await
            .map_err(TransitionError::QaQuery)?;
        let round = current_qa_round(&labels).unwrap_or(1);
        Ok(QaFindings { open_bugs, round })
    }
}
