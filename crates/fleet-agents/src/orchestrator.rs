use std::path::{Path, PathBuf};
use std::sync::Arc;

use fleet_core::app_name::resolve_app_name;
use fleet_core::cache::ReadCache;
use fleet_core::config::PipelineConfig;
use fleet_core::tracker::{IssueRepository, LabelStore, TrackerError};
use serde::Serialize;
use tracing::{info, warn};

use crate::actions::{ActionKind, AgentTemplate, TargetRepo, UnknownAction};
use crate::background::best_effort;
use crate::process::{
    AgentError, AgentProcessManager, AgentSession, ExitEvent, ExitHook, LaunchSpec, StopOutcome,
};
use crate::prompts::{build_prompt, PromptContext};
use crate::request::{ActionRequest, RequestError};
use crate::transitions::{ExitContext, TransitionResolver};

/// Close reason used by `deprioritise` when no feedback is given.
pub const DEFAULT_CLOSE_REASON: &str = "Deprioritised from fleet board";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    UnknownAction(#[from] UnknownAction),

    #[error("Agent already running (PID {pid}) in {repo_name}. Stop it first.")]
    AlreadyRunning { pid: u32, repo_name: String },

    #[error(transparent)]
    Collaborator(#[from] TrackerError),

    #[error(transparent)]
    Agent(AgentError),
}

impl PipelineError {
    /// Whether the caller sent something unusable.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::Validation(_) | PipelineError::UnknownAction(_))
    }
}

impl From<AgentError> for PipelineError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::AlreadyRunning { pid, repo_name } => {
                PipelineError::AlreadyRunning { pid, repo_name }
            }
            other => PipelineError::Agent(other),
        }
    }
}

impl From<RequestError> for PipelineError {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::InvalidAction(unknown) => PipelineError::UnknownAction(unknown),
            other => PipelineError::Validation(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub success: bool,
    pub action: ActionKind,
    pub epic_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<AgentSession>,
    #[serde(flatten)]
    pub stop: Option<StopOutcome>,
}

impl ActionOutcome {
    fn new(action: ActionKind, epic_id: &str) -> Self {
        Self {
            success: true,
            action,
            epic_id: epic_id.to_string(),
            session: None,
            stop: None,
        }
    }
}

/// Where an exited agent's epic lives, captured at launch.
#[derive(Debug, Clone)]
struct ExitTarget {
    epic_id: String,
    epic_title: String,
    label_repo: PathBuf,
}

// ---------------------------------------------------------------------------
// PipelineOrchestrator
// ---------------------------------------------------------------------------

/// Runs pipeline actions end to end: label changes, agent launch, and the
/// follow-up transition once the agent exits.
pub struct PipelineOrchestrator {
    pipeline: PipelineConfig,
    labels: Arc<dyn LabelStore>,
    issues: Arc<dyn IssueRepository>,
    cache: Arc<dyn ReadCache>,
    agents: Arc<AgentProcessManager>,
    resolver: TransitionResolver,
}

impl PipelineOrchestrator {
    pub fn new(
        pipeline: PipelineConfig,
        labels: Arc<dyn LabelStore>,
        issues: Arc<dyn IssueRepository>,
        cache: Arc<dyn ReadCache>,
        agents: Arc<AgentProcessManager>,
    ) -> Self {
        let resolver = TransitionResolver::new(
            Arc::clone(&labels),
            Arc::clone(&issues),
            pipeline.max_qa_rounds,
        );
        Self {
            pipeline,
            labels,
            issues,
            cache,
            agents,
            resolver,
        }
    }

    pub fn agents(&self) -> &Arc<AgentProcessManager> {
        &self.agents
    }

    /// Execute one validated action.
    ///
    /// Label removals are issued before additions. The call returns once the
    /// agent (if any) has started; exit handling happens in the background.
    pub async fn execute(
        self: &Arc<Self>,
        req: ActionRequest,
    ) -> Result<ActionOutcome, PipelineError> {
        let descriptor = req.action.descriptor();
        info!(epic_id = %req.epic_id, action = %req.action, "executing pipeline action");

        // Refuse before touching any labels.
        if descriptor.launches_agent() {
            self.agents.ensure_idle().await?;
        }

        let factory = self.factory_path(&req.epic_id).await?;
        let current = match (&req.current_labels, descriptor.needs_current_labels()) {
            (Some(labels), _) => labels.clone(),
            (None, true) => self.issues.epic_labels(&req.epic_id, &factory).await?,
            (None, false) => Vec::new(),
        };

        let changes = descriptor.label_changes(&current);
        if changes.clear_pipeline {
            self.labels
                .remove_all_pipeline_labels(&req.epic_id, &current, &factory)
                .await?;
        }
        if !changes.remove.is_empty() {
            self.labels
                .remove_labels(&req.epic_id, &changes.remove, &factory)
                .await?;
        }
        if !changes.add.is_empty() {
            self.labels
                .add_labels(&req.epic_id, &changes.add, &factory)
                .await?;
        }
        if let Some(status) = descriptor.status_update {
            self.labels
                .update_status(&req.epic_id, status, &factory)
                .await?;
        }
        if descriptor.closes_epic {
            let reason = req.feedback_or(DEFAULT_CLOSE_REASON);
            self.labels.close_epic(&req.epic_id, reason, &factory).await?;
        }
        self.cache.invalidate_all();

        let mut outcome = ActionOutcome::new(req.action, &req.epic_id);
        if req.action == ActionKind::StopAgent {
            outcome.stop = Some(self.agents.stop().await);
            return Ok(outcome);
        }

        if let Some(template) = &descriptor.agent {
            let app_name = resolve_app_name(&req.epic_title, &req.epic_id);
            let qa_round = descriptor.qa_round(&current);
            let spec = self.launch_spec(&req, template, &factory, &app_name, qa_round);
            let hook = exit_hook(
                Arc::clone(self),
                ExitTarget {
                    epic_id: req.epic_id.clone(),
                    epic_title: req.epic_title.clone(),
                    label_repo: factory,
                },
            );
            outcome.session = Some(self.agents.launch(spec, Some(hook)).await?);
        }
        Ok(outcome)
    }

    /// Repository holding the epic: whichever known repo has it, else the
    /// configured factory.
    async fn factory_path(&self, epic_id: &str) -> Result<PathBuf, TrackerError> {
        match self.issues.resolve_repo_path(epic_id).await? {
            Some(path) => Ok(path),
            None => Ok(self.pipeline.factory_repo.clone()),
        }
    }

    fn launch_spec(
        &self,
        req: &ActionRequest,
        template: &AgentTemplate,
        factory: &Path,
        app_name: &str,
        qa_round: Option<u32>,
    ) -> LaunchSpec {
        let (repo_path, repo_name) = match template.target {
            TargetRepo::Factory => (factory.to_path_buf(), self.pipeline.factory_repo_name.clone()),
            TargetRepo::PerApp => (self.pipeline.app_repo(app_name), app_name.to_string()),
        };
        let prompt = build_prompt(
            template,
            &PromptContext {
                epic_id: &req.epic_id,
                title: &req.epic_title,
                app_name,
                factory,
                qa_round,
                feedback: req.feedback.as_deref(),
            },
        );
        LaunchSpec {
            repo_path,
            repo_name: Some(repo_name),
            prompt,
            model: Some(template.model.to_string()),
            max_turns: Some(template.max_turns),
            allowed_tools: Some(template.allowed_tools.to_string()),
            epic_id: Some(req.epic_id.clone()),
            pipeline_stage: Some(template.stage),
        }
    }

    async fn on_agent_exit(self: Arc<Self>, target: ExitTarget, event: ExitEvent) {
        let Some(stage) = event.session.pipeline_stage else {
            return;
        };
        info!(
            epic_id = %target.epic_id,
            %stage,
            exit_code = ?event.exit_code,
            "handling agent exit"
        );
        let ctx = ExitContext {
            epic_id: &target.epic_id,
            stage,
            succeeded: event.succeeded(),
            label_repo: &target.label_repo,
            work_repo: &event.session.repo_path,
        };
        let chain = best_effort("exit-transition", &target.epic_id, self.resolver.resolve(&ctx))
            .await
            .flatten();
        self.cache.invalidate_all();

        let Some(action) = chain else {
            return;
        };
        info!(epic_id = %target.epic_id, %action, "chaining action");
        let req = ActionRequest::chained(&target.epic_id, &target.epic_title, action);
        if best_effort("chain-action", &target.epic_id, self.execute(req))
            .await
            .is_none()
        {
            warn!(epic_id = %target.epic_id, %action, "chained action did not run");
        }
    }
}

fn exit_hook(orchestrator: Arc<PipelineOrchestrator>, target: ExitTarget) -> ExitHook {
    Box::new(move |event| Box::pin(orchestrator.on_agent_exit(target, event)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_running_keeps_its_message() {
        let err: PipelineError = AgentError::AlreadyRunning {
            pid: 9,
            repo_name: "LensCycle".into(),
        }
        .into();
        assert!(matches!(err, PipelineError::AlreadyRunning { pid: 9, .. }));
        assert_eq!(
            err.to_string(),
            "Agent already running (PID 9) in LensCycle. Stop it first."
        );
        assert!(!err.is_client_error());
    }

    #[test]
    fn request_errors_are_client_errors() {
        let err: PipelineError = RequestError::Missing("epicId").into();
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "Missing epicId");

        let err: PipelineError = RequestError::InvalidAction(UnknownAction("x".into())).into();
        assert!(matches!(err, PipelineError::UnknownAction(_)));
        assert_eq!(err.to_string(), "Invalid action: x");
    }

    #[test]
    fn stop_outcome_is_flattened() {
        let mut outcome = ActionOutcome::new(ActionKind::StopAgent, "e1");
        outcome.stop = Some(StopOutcome {
            stopped: true,
            pid: Some(12),
        });
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": true,
                "action": "stop-agent",
                "epicId": "e1",
                "stopped": true,
                "pid": 12
            })
        );
    }
}
