//! TransitionResolver against an in-memory tracker.

#![cfg(unix)]

mod support;

use std::path::Path;

use fleet_agents::actions::{ActionKind, WorkerStage};
use fleet_agents::transitions::{ExitContext, TransitionError, TransitionResolver};
use support::{Call, FakeTracker};

const EPIC: &str = "epic-9";

fn ctx(stage: WorkerStage, succeeded: bool) -> ExitContext<'static> {
    ExitContext {
        epic_id: EPIC,
        stage,
        succeeded,
        label_repo: Path::new("/factory"),
        work_repo: Path::new("/apps/LensCycle"),
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ===========================================================================
// Failure policy
// ===========================================================================

#[tokio::test]
async fn test_failure_removes_only_agent_running() {
    let tracker = FakeTracker::new();
    let before = ["pipeline:qa", "qa:round-2", "plan:approved", "agent:running"];
    tracker.set_labels(EPIC, &before);
    let resolver = TransitionResolver::new(tracker.clone(), tracker.clone(), 3);

    for stage in [WorkerStage::Qa, WorkerStage::Development, WorkerStage::Research] {
        let chain = resolver.resolve(&ctx(stage, false)).await.unwrap();
        assert_eq!(chain, None);
    }
    assert_eq!(
        tracker.labels(EPIC),
        vec!["pipeline:qa", "qa:round-2", "plan:approved"]
    );
    assert!(tracker
        .calls()
        .iter()
        .all(|c| *c == Call::Remove(strings(&["agent:running"]))));
}

// ===========================================================================
// QA branch
// ===========================================================================

#[tokio::test]
async fn test_round_three_with_bugs_needs_review() {
    let tracker = FakeTracker::new();
    tracker.set_labels(EPIC, &["pipeline:qa", "qa:round-3", "agent:running"]);
    tracker.set_open_bugs(4);
    let resolver = TransitionResolver::new(tracker.clone(), tracker.clone(), 3);

    let chain = resolver.resolve(&ctx(WorkerStage::Qa, true)).await.unwrap();

    assert_eq!(chain, None);
    assert_eq!(
        tracker.labels(EPIC),
        vec!["pipeline:qa", "qa:round-3", "qa:needs-review"]
    );
}

#[tokio::test]
async fn test_round_one_with_bugs_chains_fix_and_retest() {
    let tracker = FakeTracker::new();
    tracker.set_labels(EPIC, &["pipeline:qa", "qa:round-1", "agent:running"]);
    tracker.set_open_bugs(1);
    let resolver = TransitionResolver::new(tracker.clone(), tracker.clone(), 3);

    let chain = resolver.resolve(&ctx(WorkerStage::Qa, true)).await.unwrap();

    assert_eq!(chain, Some(ActionKind::QaFixAndRetest));
    assert!(!tracker.has_label(EPIC, "qa:needs-review"));
    assert_eq!(tracker.labels(EPIC), vec!["pipeline:qa", "qa:round-1"]);
}

#[tokio::test]
async fn test_missing_round_label_counts_as_round_one() {
    let tracker = FakeTracker::new();
    tracker.set_labels(EPIC, &["pipeline:qa", "agent:running"]);
    tracker.set_open_bugs(1);
    let resolver = TransitionResolver::new(tracker.clone(), tracker.clone(), 2);

    let chain = resolver.resolve(&ctx(WorkerStage::Qa, true)).await.unwrap();
    assert_eq!(chain, Some(ActionKind::QaFixAndRetest));
}

#[tokio::test]
async fn test_zero_bugs_advances_without_chain() {
    let tracker = FakeTracker::new();
    tracker.set_labels(EPIC, &["pipeline:qa", "qa:round-2", "agent:running"]);
    tracker.set_open_bugs(0);
    let resolver = TransitionResolver::new(tracker.clone(), tracker.clone(), 3);

    let chain = resolver.resolve(&ctx(WorkerStage::Qa, true)).await.unwrap();

    assert_eq!(chain, None);
    assert_eq!(
        tracker.labels(EPIC),
        vec!["qa:round-2", "pipeline:submission-prep"]
    );
    // Removal of the old stage precedes the new one.
    let calls = tracker.calls();
    assert_eq!(
        &calls[1..],
        &[
            Call::Remove(strings(&["pipeline:qa"])),
            Call::Add(strings(&["pipeline:submission-prep"])),
        ]
    );
}

#[tokio::test]
async fn test_bug_query_failure_is_reported() {
    let tracker = FakeTracker::new();
    tracker.set_labels(EPIC, &["pipeline:qa", "qa:round-1", "agent:running"]);
    tracker.fail_bug_query();
    let resolver = TransitionResolver::new(tracker.clone(), tracker.clone(), 3);

    let err = resolver
        .resolve(&ctx(WorkerStage::Qa, true))
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::QaQuery(_)));
    assert_eq!(tracker.labels(EPIC), vec!["pipeline:qa", "qa:round-1"]);
}

// ===========================================================================
// Other stages
// ===========================================================================

#[tokio::test]
async fn test_development_chains_send_for_qa_without_static_advance() {
    let tracker = FakeTracker::new();
    tracker.set_labels(EPIC, &["pipeline:development", "agent:running"]);
    let resolver = TransitionResolver::new(tracker.clone(), tracker.clone(), 3);

    let chain = resolver
        .resolve(&ctx(WorkerStage::Development, true))
        .await
        .unwrap();

    assert_eq!(chain, Some(ActionKind::SendForQa));
    assert_eq!(tracker.labels(EPIC), vec!["pipeline:development"]);
    assert_eq!(tracker.calls().len(), 1);
}

#[tokio::test]
async fn test_kit_management_completes() {
    let tracker = FakeTracker::new();
    tracker.set_labels(EPIC, &["pipeline:kit-management", "agent:running"]);
    let resolver = TransitionResolver::new(tracker.clone(), tracker.clone(), 3);

    let chain = resolver
        .resolve(&ctx(WorkerStage::KitManagement, true))
        .await
        .unwrap();

    assert_eq!(chain, None);
    assert_eq!(tracker.labels(EPIC), vec!["pipeline:completed"]);
}
