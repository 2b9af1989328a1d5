//! The closed set of pipeline actions and their static recipes.
//!
//! Every action maps to exactly one [`PipelineAction`]: which labels to drop,
//! which to add, and optionally which agent to launch. Lookup is pure; the
//! orchestrator performs the side effects.

use std::fmt;
use std::str::FromStr;

use fleet_core::types::{
    next_qa_round, qa_round_label, qa_round_labels, EpicStatus, AGENT_RUNNING, PLAN_APPROVED,
    PLAN_PENDING, SUBMISSION_PREFIX,
};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    StartResearch,
    MoreResearch,
    Deprioritise,
    SendForDevelopment,
    GeneratePlan,
    ApprovePlan,
    ApproveAndBuild,
    RevisePlan,
    SkipToPlan,
    RevisePlanFromLaunch,
    ApproveSubmission,
    SendBackToDev,
    SendForQa,
    QaFixAndRetest,
    MarkAsLive,
    StopAgent,
}

impl ActionKind {
    pub const ALL: [ActionKind; 16] = [
        ActionKind::StartResearch,
        ActionKind::MoreResearch,
        ActionKind::Deprioritise,
        ActionKind::SendForDevelopment,
        ActionKind::GeneratePlan,
        ActionKind::ApprovePlan,
        ActionKind::ApproveAndBuild,
        ActionKind::RevisePlan,
        ActionKind::SkipToPlan,
        ActionKind::RevisePlanFromLaunch,
        ActionKind::ApproveSubmission,
        ActionKind::SendBackToDev,
        ActionKind::SendForQa,
        ActionKind::QaFixAndRetest,
        ActionKind::MarkAsLive,
        ActionKind::StopAgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::StartResearch => "start-research",
            ActionKind::MoreResearch => "more-research",
            ActionKind::Deprioritise => "deprioritise",
            ActionKind::SendForDevelopment => "send-for-development",
            ActionKind::GeneratePlan => "generate-plan",
            ActionKind::ApprovePlan => "approve-plan",
            ActionKind::ApproveAndBuild => "approve-and-build",
            ActionKind::RevisePlan => "revise-plan",
            ActionKind::SkipToPlan => "skip-to-plan",
            ActionKind::RevisePlanFromLaunch => "revise-plan-from-launch",
            ActionKind::ApproveSubmission => "approve-submission",
            ActionKind::SendBackToDev => "send-back-to-dev",
            ActionKind::SendForQa => "send-for-qa",
            ActionKind::QaFixAndRetest => "qa-fix-and-retest",
            ActionKind::MarkAsLive => "mark-as-live",
            ActionKind::StopAgent => "stop-agent",
        }
    }

    /// The static recipe for this action.
    pub fn descriptor(self) -> &'static PipelineAction {
        match self {
            ActionKind::StartResearch => &START_RESEARCH,
            ActionKind::MoreResearch => &MORE_RESEARCH,
            ActionKind::Deprioritise => &DEPRIORITISE,
            ActionKind::SendForDevelopment => &SEND_FOR_DEVELOPMENT,
            ActionKind::GeneratePlan => &GENERATE_PLAN,
            ActionKind::ApprovePlan => &APPROVE_PLAN,
            ActionKind::ApproveAndBuild => &APPROVE_AND_BUILD,
            ActionKind::RevisePlan => &REVISE_PLAN,
            ActionKind::SkipToPlan => &SKIP_TO_PLAN,
            ActionKind::RevisePlanFromLaunch => &REVISE_PLAN_FROM_LAUNCH,
            ActionKind::ApproveSubmission => &APPROVE_SUBMISSION,
            ActionKind::SendBackToDev => &SEND_BACK_TO_DEV,
            ActionKind::SendForQa => &SEND_FOR_QA,
            ActionKind::QaFixAndRetest => &QA_FIX_AND_RETEST,
            ActionKind::MarkAsLive => &MARK_AS_LIVE,
            ActionKind::StopAgent => &STOP_AGENT,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The action identifier is not one of [`ActionKind::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for ActionKind {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

/// Validate an action identifier and return its recipe. Performs no I/O.
pub fn lookup(action_id: &str) -> Result<&'static PipelineAction, UnknownAction> {
    action_id.parse::<ActionKind>().map(ActionKind::descriptor)
}

// ---------------------------------------------------------------------------
// WorkerStage
// ---------------------------------------------------------------------------

/// What an agent was launched to do. Recorded on the session so the exit
/// handler knows which transition to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerStage {
    Research,
    Planning,
    Development,
    QaFixes,
    Qa,
    SubmissionPrep,
    KitManagement,
}

impl WorkerStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStage::Research => "research",
            WorkerStage::Planning => "planning",
            WorkerStage::Development => "development",
            WorkerStage::QaFixes => "qa-fixes",
            WorkerStage::Qa => "qa",
            WorkerStage::SubmissionPrep => "submission-prep",
            WorkerStage::KitManagement => "kit-management",
        }
    }
}

impl fmt::Display for WorkerStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRepo {
    /// The shared factory repository that owns the epics.
    Factory,
    /// `apps_root/<AppName>`, created on demand.
    PerApp,
}

/// Label changes that depend on the epic's current labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicLabels {
    None,
    /// Drop every `pipeline:*` label.
    ClearPipeline,
    /// Drop old `qa:round-*` labels and add the next round.
    NextQaRound,
    /// Drop every `submission:*` label.
    ClearSubmission,
}

/// How to launch the agent for an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentTemplate {
    pub stage: WorkerStage,
    pub target: TargetRepo,
    pub model: &'static str,
    pub max_turns: u32,
    pub allowed_tools: &'static str,
    /// Prompt with `{placeholders}`, see [`crate::prompts`].
    pub prompt: &'static str,
    /// Appended as `{feedback_note}` when the request carries feedback.
    pub feedback_note: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineAction {
    pub kind: ActionKind,
    pub labels_to_remove: &'static [&'static str],
    pub labels_to_add: &'static [&'static str],
    pub dynamic: DynamicLabels,
    pub agent: Option<AgentTemplate>,
    pub status_update: Option<EpicStatus>,
    /// Close the epic with the feedback (or a default reason).
    pub closes_epic: bool,
}

/// Concrete label mutations for one action against one epic.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelChanges {
    pub clear_pipeline: bool,
    pub remove: Vec<String>,
    pub add: Vec<String>,
}

impl PipelineAction {
    /// Whether [`PipelineAction::label_changes`] reads the current labels.
    pub fn needs_current_labels(&self) -> bool {
        self.dynamic != DynamicLabels::None
    }

    pub fn launches_agent(&self) -> bool {
        self.agent.is_some()
    }

    /// Resolve the recipe against the epic's current labels.
    pub fn label_changes<S: AsRef<str>>(&self, current: &[S]) -> LabelChanges {
        let mut changes = LabelChanges {
            clear_pipeline: self.dynamic == DynamicLabels::ClearPipeline,
            remove: self.labels_to_remove.iter().map(|l| l.to_string()).collect(),
            add: self.labels_to_add.iter().map(|l| l.to_string()).collect(),
        };
        match self.dynamic {
            DynamicLabels::None | DynamicLabels::ClearPipeline => {}
            DynamicLabels::NextQaRound => {
                changes.remove.extend(qa_round_labels(current));
                changes.add.insert(1, qa_round_label(next_qa_round(current)));
            }
            DynamicLabels::ClearSubmission => {
                changes.remove.extend(
                    current
                        .iter()
                        .map(AsRef::as_ref)
                        .filter(|l| l.starts_with(SUBMISSION_PREFIX))
                        .map(str::to_string),
                );
            }
        }
        changes
    }

    /// Round a fresh QA pass will run as, when this action starts one.
    pub fn qa_round<S: AsRef<str>>(&self, current: &[S]) -> Option<u32> {
        (self.dynamic == DynamicLabels::NextQaRound).then(|| next_qa_round(current))
    }
}

// ---------------------------------------------------------------------------
// The table
// ---------------------------------------------------------------------------

const RESEARCH: &str = "pipeline:research";
const RESEARCH_COMPLETE: &str = "pipeline:research-complete";
const DEVELOPMENT: &str = "pipeline:development";
const QA: &str = "pipeline:qa";
const SUBMISSION_PREP: &str = "pipeline:submission-prep";
const SUBMITTED: &str = "pipeline:submitted";
const KIT_MANAGEMENT: &str = "pipeline:kit-management";
const BAD_IDEA: &str = "pipeline:bad-idea";

const HEAVY_MODEL: &str = "opus";
const LIGHT_MODEL: &str = "sonnet";
const RESEARCH_TOOLS: &str = "Bash,Read,Write,Edit,Glob,Grep,Task,WebSearch";
const BUILD_TOOLS: &str = "Bash,Read,Write,Edit,Glob,Grep,Task";
const SUBMISSION_TOOLS: &str = "Bash,Read,Write,Edit,Glob,Grep";

const RESEARCH_PROMPT: &str = "Research the app idea \"{title}\" (epic: {epic_id}).{feedback_note} \
Follow the research workflow instructions in CLAUDE.md.";
const MORE_RESEARCH_PROMPT: &str = "Research the app idea \"{title}\" (epic: {epic_id}). \
Previous research exists at apps/{app_name}/research/report.md.{feedback_note} \
Follow the research workflow instructions in CLAUDE.md.";
const DEVELOP_PROMPT: &str = "Develop the app \"{title}\" (epic: {epic_id}). \
Follow the development workflow instructions in {factory}/CLAUDE.md. \
Research report is at {factory}/apps/{app_name}/research/report.md.{feedback_note}";
const PLAN_PROMPT: &str = "Plan the app \"{title}\" (epic: {epic_id}). \
Follow the planning workflow in {factory}/CLAUDE.md. \
Research report is at {factory}/apps/{app_name}/research/report.md.";
const REVISE_PLAN_PROMPT: &str = "Revise the plan for \"{title}\" (epic: {epic_id}).{feedback_note} \
Review the existing plan and beads in the app repo and revise the plan. \
Follow the planning workflow in {factory}/CLAUDE.md. \
Research report is at {factory}/apps/{app_name}/research/report.md.";
const SKIP_TO_PLAN_PROMPT: &str = "Plan the app \"{title}\" (epic: {epic_id}). \
There is no research report; use the epic description as the specification. \
Follow the planning workflow in {factory}/CLAUDE.md.";
const REVISE_FROM_LAUNCH_PROMPT: &str = "Revise the plan for \"{title}\" (epic: {epic_id}).{feedback_note} \
Review existing beads in the app repo and revise the plan. \
Follow the planning workflow in {factory}/CLAUDE.md.";
const SUBMISSION_PROMPT: &str = "Prepare submission for \"{title}\" (epic: {epic_id}). \
Follow the submission workflow instructions in CLAUDE.md.";
const QA_PROMPT: &str = "Run QA round {qa_round} for the app \"{title}\" (epic: {epic_id}). \
File every defect you find as an open bug-typed issue in this repo. \
Follow the QA workflow in {factory}/CLAUDE.md.";
const QA_FIX_PROMPT: &str = "Fix the open QA bugs for the app \"{title}\" (epic: {epic_id}). \
Close each bug once it is fixed and verified. \
Follow the development workflow instructions in {factory}/CLAUDE.md.";
const KIT_PROMPT: &str = "Analyze \"{title}\" for kit enhancements (epic: {epic_id}). \
Follow the kit analysis workflow in CLAUDE.md.";

const RESEARCH_AGENT: AgentTemplate = AgentTemplate {
    stage: WorkerStage::Research,
    target: TargetRepo::Factory,
    model: HEAVY_MODEL,
    max_turns: 200,
    allowed_tools: RESEARCH_TOOLS,
    prompt: RESEARCH_PROMPT,
    feedback_note: None,
};

const DEVELOPMENT_AGENT: AgentTemplate = AgentTemplate {
    stage: WorkerStage::Development,
    target: TargetRepo::PerApp,
    model: HEAVY_MODEL,
    max_turns: 500,
    allowed_tools: BUILD_TOOLS,
    prompt: DEVELOP_PROMPT,
    feedback_note: None,
};

const PLANNING_AGENT: AgentTemplate = AgentTemplate {
    stage: WorkerStage::Planning,
    target: TargetRepo::PerApp,
    model: HEAVY_MODEL,
    max_turns: 200,
    allowed_tools: BUILD_TOOLS,
    prompt: PLAN_PROMPT,
    feedback_note: None,
};

pub const START_RESEARCH: PipelineAction = PipelineAction {
    kind: ActionKind::StartResearch,
    labels_to_remove: &[],
    labels_to_add: &[RESEARCH, AGENT_RUNNING],
    dynamic: DynamicLabels::None,
    agent: Some(RESEARCH_AGENT),
    status_update: Some(EpicStatus::InProgress),
    closes_epic: false,
};

pub const MORE_RESEARCH: PipelineAction = PipelineAction {
    kind: ActionKind::MoreResearch,
    labels_to_remove: &[RESEARCH_COMPLETE, PLAN_PENDING, PLAN_APPROVED],
    labels_to_add: &[RESEARCH, AGENT_RUNNING],
    dynamic: DynamicLabels::None,
    agent: Some(AgentTemplate {
        prompt: MORE_RESEARCH_PROMPT,
        feedback_note: Some(" Reviewer feedback: \"{feedback}\". Revise and extend the research."),
        ..RESEARCH_AGENT
    }),
    status_update: None,
    closes_epic: false,
};

pub const DEPRIORITISE: PipelineAction = PipelineAction {
    kind: ActionKind::Deprioritise,
    labels_to_remove: &[PLAN_PENDING, PLAN_APPROVED],
    labels_to_add: &[BAD_IDEA],
    dynamic: DynamicLabels::ClearPipeline,
    agent: None,
    status_update: None,
    closes_epic: true,
};

pub const SEND_FOR_DEVELOPMENT: PipelineAction = PipelineAction {
    kind: ActionKind::SendForDevelopment,
    labels_to_remove: &[RESEARCH_COMPLETE, PLAN_PENDING, PLAN_APPROVED],
    labels_to_add: &[DEVELOPMENT, AGENT_RUNNING],
    dynamic: DynamicLabels::None,
    agent: Some(DEVELOPMENT_AGENT),
    status_update: None,
    closes_epic: false,
};

pub const GENERATE_PLAN: PipelineAction = PipelineAction {
    kind: ActionKind::GeneratePlan,
    labels_to_remove: &[],
    labels_to_add: &[AGENT_RUNNING],
    dynamic: DynamicLabels::None,
    agent: Some(PLANNING_AGENT),
    status_update: None,
    closes_epic: false,
};

pub const APPROVE_PLAN: PipelineAction = PipelineAction {
    kind: ActionKind::ApprovePlan,
    labels_to_remove: &[PLAN_PENDING],
    labels_to_add: &[PLAN_APPROVED],
    dynamic: DynamicLabels::None,
    agent: None,
    status_update: None,
    closes_epic: false,
};

pub const APPROVE_AND_BUILD: PipelineAction = PipelineAction {
    kind: ActionKind::ApproveAndBuild,
    labels_to_remove: &[RESEARCH_COMPLETE, PLAN_PENDING],
    labels_to_add: &[PLAN_APPROVED, DEVELOPMENT, AGENT_RUNNING],
    dynamic: DynamicLabels::None,
    agent: Some(DEVELOPMENT_AGENT),
    status_update: None,
    closes_epic: false,
};

pub const REVISE_PLAN: PipelineAction = PipelineAction {
    kind: ActionKind::RevisePlan,
    labels_to_remove: &[PLAN_APPROVED, PLAN_PENDING],
    labels_to_add: &[AGENT_RUNNING],
    dynamic: DynamicLabels::None,
    agent: Some(AgentTemplate {
        prompt: REVISE_PLAN_PROMPT,
        feedback_note: Some(" Reviewer feedback: \"{feedback}\"."),
        ..PLANNING_AGENT
    }),
    status_update: None,
    closes_epic: false,
};

pub const SKIP_TO_PLAN: PipelineAction = PipelineAction {
    kind: ActionKind::SkipToPlan,
    labels_to_remove: &[],
    labels_to_add: &[RESEARCH_COMPLETE, AGENT_RUNNING],
    dynamic: DynamicLabels::None,
    agent: Some(AgentTemplate {
        prompt: SKIP_TO_PLAN_PROMPT,
        ..PLANNING_AGENT
    }),
    status_update: Some(EpicStatus::InProgress),
    closes_epic: false,
};

pub const REVISE_PLAN_FROM_LAUNCH: PipelineAction = PipelineAction {
    kind: ActionKind::RevisePlanFromLaunch,
    labels_to_remove: &[SUBMISSION_PREP],
    labels_to_add: &[RESEARCH_COMPLETE, AGENT_RUNNING],
    dynamic: DynamicLabels::None,
    agent: Some(AgentTemplate {
        prompt: REVISE_FROM_LAUNCH_PROMPT,
        feedback_note: Some(" Reviewer feedback: \"{feedback}\"."),
        ..PLANNING_AGENT
    }),
    status_update: None,
    closes_epic: false,
};

pub const APPROVE_SUBMISSION: PipelineAction = PipelineAction {
    kind: ActionKind::ApproveSubmission,
    labels_to_remove: &[],
    labels_to_add: &[AGENT_RUNNING],
    dynamic: DynamicLabels::None,
    agent: Some(AgentTemplate {
        stage: WorkerStage::SubmissionPrep,
        target: TargetRepo::Factory,
        model: LIGHT_MODEL,
        max_turns: 100,
        allowed_tools: SUBMISSION_TOOLS,
        prompt: SUBMISSION_PROMPT,
        feedback_note: None,
    }),
    status_update: None,
    closes_epic: false,
};

pub const SEND_BACK_TO_DEV: PipelineAction = PipelineAction {
    kind: ActionKind::SendBackToDev,
    labels_to_remove: &[SUBMISSION_PREP],
    labels_to_add: &[DEVELOPMENT, AGENT_RUNNING],
    dynamic: DynamicLabels::None,
    agent: Some(AgentTemplate {
        feedback_note: Some(
            " Reviewer feedback on the current build: \"{feedback}\". Address these issues.",
        ),
        ..DEVELOPMENT_AGENT
    }),
    status_update: None,
    closes_epic: false,
};

pub const SEND_FOR_QA: PipelineAction = PipelineAction {
    kind: ActionKind::SendForQa,
    labels_to_remove: &[DEVELOPMENT],
    labels_to_add: &[QA, AGENT_RUNNING],
    dynamic: DynamicLabels::NextQaRound,
    agent: Some(AgentTemplate {
        stage: WorkerStage::Qa,
        target: TargetRepo::PerApp,
        model: HEAVY_MODEL,
        max_turns: 200,
        allowed_tools: BUILD_TOOLS,
        prompt: QA_PROMPT,
        feedback_note: None,
    }),
    status_update: None,
    closes_epic: false,
};

pub const QA_FIX_AND_RETEST: PipelineAction = PipelineAction {
    kind: ActionKind::QaFixAndRetest,
    labels_to_remove: &[QA],
    labels_to_add: &[DEVELOPMENT, AGENT_RUNNING],
    dynamic: DynamicLabels::None,
    agent: Some(AgentTemplate {
        stage: WorkerStage::QaFixes,
        prompt: QA_FIX_PROMPT,
        ..DEVELOPMENT_AGENT
    }),
    status_update: None,
    closes_epic: false,
};

pub const MARK_AS_LIVE: PipelineAction = PipelineAction {
    kind: ActionKind::MarkAsLive,
    labels_to_remove: &[SUBMITTED],
    labels_to_add: &[KIT_MANAGEMENT, AGENT_RUNNING],
    dynamic: DynamicLabels::ClearSubmission,
    agent: Some(AgentTemplate {
        stage: WorkerStage::KitManagement,
        target: TargetRepo::Factory,
        model: HEAVY_MODEL,
        max_turns: 200,
        allowed_tools: BUILD_TOOLS,
        prompt: KIT_PROMPT,
        feedback_note: None,
    }),
    status_update: None,
    closes_epic: false,
};

pub const STOP_AGENT: PipelineAction = PipelineAction {
    kind: ActionKind::StopAgent,
    labels_to_remove: &[AGENT_RUNNING],
    labels_to_add: &[],
    dynamic: DynamicLabels::None,
    agent: None,
    status_update: None,
    closes_epic: false,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_maps_to_its_own_descriptor() {
        for kind in ActionKind::ALL {
            assert_eq!(kind.descriptor().kind, kind);
            assert_eq!(kind.as_str().parse::<ActionKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_action_is_rejected() {
        let err = lookup("fly-to-moon").unwrap_err();
        assert_eq!(err.to_string(), "Invalid action: fly-to-moon");
    }

    #[test]
    fn serde_uses_kebab_case() {
        let json = serde_json::to_string(&ActionKind::RevisePlanFromLaunch).unwrap();
        assert_eq!(json, "\"revise-plan-from-launch\"");
        let parsed: ActionKind = serde_json::from_str("\"qa-fix-and-retest\"").unwrap();
        assert_eq!(parsed, ActionKind::QaFixAndRetest);
    }

    #[test]
    fn non_launching_actions() {
        let silent: Vec<_> = ActionKind::ALL
            .into_iter()
            .filter(|k| !k.descriptor().launches_agent())
            .collect();
        assert_eq!(
            silent,
            vec![ActionKind::Deprioritise, ActionKind::ApprovePlan, ActionKind::StopAgent]
        );
    }

    #[test]
    fn launching_actions_add_agent_running() {
        for kind in ActionKind::ALL {
            let d = kind.descriptor();
            assert_eq!(
                d.launches_agent(),
                d.labels_to_add.contains(&AGENT_RUNNING),
                "{kind}"
            );
        }
    }

    #[test]
    fn send_for_qa_rotates_round() {
        let current = ["pipeline:development", "qa:round-1", "qa:round-2"];
        let changes = SEND_FOR_QA.label_changes(&current);
        assert_eq!(
            changes.remove,
            vec!["pipeline:development", "qa:round-1", "qa:round-2"]
        );
        assert_eq!(changes.add, vec!["pipeline:qa", "qa:round-3", "agent:running"]);
        assert_eq!(SEND_FOR_QA.qa_round(&current), Some(3));
    }

    #[test]
    fn first_qa_round_is_one() {
        let current = ["pipeline:development"];
        let changes = SEND_FOR_QA.label_changes(&current);
        assert_eq!(changes.remove, vec!["pipeline:development"]);
        assert_eq!(changes.add, vec!["pipeline:qa", "qa:round-1", "agent:running"]);
    }

    #[test]
    fn mark_as_live_drops_submission_labels() {
        let current = [
            "pipeline:submitted",
            "submission:in-review",
            "submission:approved",
            "qa:round-2",
        ];
        let changes = MARK_AS_LIVE.label_changes(&current);
        assert_eq!(
            changes.remove,
            vec!["pipeline:submitted", "submission:in-review", "submission:approved"]
        );
        assert_eq!(changes.add, vec!["pipeline:kit-management", "agent:running"]);
    }

    #[test]
    fn deprioritise_clears_pipeline() {
        let changes = DEPRIORITISE.label_changes(&["pipeline:research-complete"]);
        assert!(changes.clear_pipeline);
        assert_eq!(changes.remove, vec!["plan:pending", "plan:approved"]);
        assert_eq!(changes.add, vec!["pipeline:bad-idea"]);
        assert!(DEPRIORITISE.closes_epic);
    }

    #[test]
    fn approve_and_build_combines_approval_and_development() {
        let changes = APPROVE_AND_BUILD.label_changes::<&str>(&[]);
        assert_eq!(changes.remove, vec!["pipeline:research-complete", "plan:pending"]);
        assert_eq!(
            changes.add,
            vec!["plan:approved", "pipeline:development", "agent:running"]
        );
    }

    #[test]
    fn targets_and_models() {
        let research = START_RESEARCH.agent.unwrap();
        assert_eq!(research.target, TargetRepo::Factory);
        assert!(research.allowed_tools.contains("WebSearch"));

        let submission = APPROVE_SUBMISSION.agent.unwrap();
        assert_eq!(submission.model, "sonnet");
        assert_eq!(submission.max_turns, 100);

        let dev = SEND_FOR_DEVELOPMENT.agent.unwrap();
        assert_eq!(dev.target, TargetRepo::PerApp);
        assert_eq!(dev.max_turns, 500);

        assert_eq!(QA_FIX_AND_RETEST.agent.unwrap().stage, WorkerStage::QaFixes);
        assert_eq!(GENERATE_PLAN.agent.unwrap().stage, WorkerStage::Planning);
    }
}
