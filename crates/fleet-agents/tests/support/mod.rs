//! Shared fakes for the fleet-agents integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fleet_agents::orchestrator::PipelineOrchestrator;
use fleet_agents::process::AgentProcessManager;
use fleet_core::cache::ReadCache;
use fleet_core::config::{AgentConfig, PipelineConfig};
use fleet_core::tracker::{IssueRepository, LabelStore, Result, TrackerError};
use fleet_core::types::EpicStatus;
use tempfile::TempDir;

// ===========================================================================
// Tracker fake
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Add(Vec<String>),
    Remove(Vec<String>),
    Close(String),
    Status(EpicStatus),
}

/// In-memory tracker recording every mutation in order.
#[derive(Default)]
pub struct FakeTracker {
    labels: Mutex<HashMap<String, Vec<String>>>,
    calls: Mutex<Vec<(Call, PathBuf)>>,
    repo: Mutex<Option<PathBuf>>,
    open_bugs: AtomicU32,
    fail_bug_query: AtomicBool,
}

impl FakeTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_repo(repo: &Path) -> Arc<Self> {
        let tracker = Self::default();
        *tracker.repo.lock().unwrap() = Some(repo.to_path_buf());
        Arc::new(tracker)
    }

    pub fn set_labels(&self, epic_id: &str, labels: &[&str]) {
        self.labels.lock().unwrap().insert(
            epic_id.to_string(),
            labels.iter().map(|l| l.to_string()).collect(),
        );
    }

    pub fn labels(&self, epic_id: &str) -> Vec<String> {
        self.labels
            .lock()
            .unwrap()
            .get(epic_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_label(&self, epic_id: &str, label: &str) -> bool {
        self.labels(epic_id).iter().any(|l| l == label)
    }

    pub fn set_open_bugs(&self, n: u32) {
        self.open_bugs.store(n, Ordering::SeqCst);
    }

    pub fn fail_bug_query(&self) {
        self.fail_bug_query.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn call_repos(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().iter().map(|(_, r)| r.clone()).collect()
    }

    fn record(&self, call: Call, repo: &Path) {
        self.calls.lock().unwrap().push((call, repo.to_path_buf()));
    }
}

#[async_trait]
impl LabelStore for FakeTracker {
    async fn add_labels(&self, epic_id: &str, labels: &[String], repo: &Path) -> Result<()> {
        self.record(Call::Add(labels.to_vec()), repo);
        let mut map = self.labels.lock().unwrap();
        let entry = map.entry(epic_id.to_string()).or_default();
        for label in labels {
            if !entry.contains(label) {
                entry.push(label.clone());
            }
        }
        Ok(())
    }

    async fn remove_labels(&self, epic_id: &str, labels: &[String], repo: &Path) -> Result<()> {
        self.record(Call::Remove(labels.to_vec()), repo);
        if let Some(entry) = self.labels.lock().unwrap().get_mut(epic_id) {
            entry.retain(|l| !labels.contains(l));
        }
        Ok(())
    }

    async fn close_epic(&self, _epic_id: &str, reason: &str, repo: &Path) -> Result<()> {
        self.record(Call::Close(reason.to_string()), repo);
        Ok(())
    }

    async fn update_status(&self, _epic_id: &str, status: EpicStatus, repo: &Path) -> Result<()> {
        self.record(Call::Status(status), repo);
        Ok(())
    }
}

#[async_trait]
impl IssueRepository for FakeTracker {
    async fn resolve_repo_path(&self, _epic_id: &str) -> Result<Option<PathBuf>> {
        Ok(self.repo.lock().unwrap().clone())
    }

    async fn epic_labels(&self, epic_id: &str, _repo: &Path) -> Result<Vec<String>> {
        Ok(self.labels(epic_id))
    }

    async fn open_bug_count(&self, _repo: &Path) -> Result<u32> {
        if self.fail_bug_query.load(Ordering::SeqCst) {
            return Err(TrackerError::Command {
                command: "bd list".into(),
                stderr: "database locked".into(),
            });
        }
        Ok(self.open_bugs.load(Ordering::SeqCst))
    }
}

#[derive(Default)]
pub struct CountingCache {
    invalidations: AtomicUsize,
}

impl CountingCache {
    pub fn count(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}

impl ReadCache for CountingCache {
    fn invalidate_all(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}

// ===========================================================================
// Stand-in workers
// ===========================================================================

/// Emits one thought and a result, then exits 0.
pub const SUCCEEDING_WORKER: &str = r#"echo 'otel noise'
echo '{"type":"system","subtype":"init"}'
echo '{"type":"assistant","message":{"content":[{"type":"text","text":"working on it"},{"type":"tool_use","name":"Read","input":{"file_path":"README.md"}}]}}'
echo '{"type":"result","result":"done","cost_usd":0.25}'
exit 0
"#;

pub const FAILING_WORKER: &str = r#"echo '{"type":"assistant","message":{"content":[{"type":"text","text":"giving up"}]}}'
exit 1
"#;

pub const SLEEPING_WORKER: &str = "sleep 30\n";

/// Write an executable `/bin/sh` script into `dir`.
pub fn worker_script(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("worker.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub fn agent_config(dir: &Path, script: &Path) -> AgentConfig {
    AgentConfig {
        binary: script.display().to_string(),
        log_dir: dir.join("logs"),
        ..AgentConfig::default()
    }
}

// ===========================================================================
// Harness
// ===========================================================================

pub struct Harness {
    pub dir: TempDir,
    pub factory: PathBuf,
    pub apps_root: PathBuf,
    pub tracker: Arc<FakeTracker>,
    pub cache: Arc<CountingCache>,
    pub agents: Arc<AgentProcessManager>,
    pub orchestrator: Arc<PipelineOrchestrator>,
}

impl Harness {
    pub fn new(worker: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let factory = dir.path().join("factory");
        let apps_root = dir.path().join("apps");
        std::fs::create_dir_all(&factory).unwrap();

        let script = worker_script(dir.path(), worker);
        let tracker = FakeTracker::with_repo(&factory);
        let cache = Arc::new(CountingCache::default());
        let agents = Arc::new(AgentProcessManager::new(agent_config(dir.path(), &script)));
        let pipeline = PipelineConfig {
            factory_repo: dir.path().join("unused-factory"),
            factory_repo_name: "cycle-apps-factory".into(),
            apps_root: apps_root.clone(),
            max_qa_rounds: 3,
        };
        let orchestrator = Arc::new(PipelineOrchestrator::new(
            pipeline,
            tracker.clone(),
            tracker.clone(),
            cache.clone(),
            agents.clone(),
        ));
        Self {
            dir,
            factory,
            apps_root,
            tracker,
            cache,
            agents,
            orchestrator,
        }
    }

    /// Wait until no agent is running and the epic carries no
    /// `agent:running` label.
    pub async fn settle(&self, epic_id: &str) {
        let agents = self.agents.clone();
        let tracker = self.tracker.clone();
        let epic_id = epic_id.to_string();
        eventually(move || {
            let agents = agents.clone();
            let tracker = tracker.clone();
            let epic_id = epic_id.clone();
            async move {
                agents.active_session().await.is_none()
                    && !tracker.has_label(&epic_id, "agent:running")
            }
        })
        .await;
    }
}

/// Poll `check` until it holds, failing the test after ten seconds.
pub async fn eventually<F, Fut>(check: F)
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if check().await {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 10s"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Read a transcript once it contains the exit line.
pub async fn finished_transcript(path: &Path) -> String {
    let path = path.to_path_buf();
    eventually(|| {
        let path = path.clone();
        async move {
            std::fs::read_to_string(&path)
                .map(|t| t.contains("Agent exited"))
                .unwrap_or(false)
        }
    })
    .await;
    std::fs::read_to_string(&path).unwrap()
}

impl Harness {
    /// Every recorded tracker call targeted the factory repository.
    pub fn call_repos_are_factory(&self) -> bool {
        self.tracker.call_repos().iter().all(|r| r == &self.factory)
    }
}
