//! The single worker slot.
//!
//! At most one agent process runs at a time. [`AgentProcessManager`] owns
//! the slot, spawns the worker in its own process group, turns its stdout
//! event stream into a transcript file and fires an [`ExitHook`] once the
//! process ends on its own.
//!
//! ```text
//! launch ─▶ spawn worker ─┬─▶ reader task: stdout lines ─▶ transcript
//!                         └─▶ monitor task: wait ─▶ release slot ─▶ hook
//! ```

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use fleet_core::config::AgentConfig;
use futures::future::BoxFuture;
use serde::Serialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::actions::WorkerStage;
use crate::event_log;

/// How long to wait for buffered stdout after the worker exits.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Agent already running (PID {pid}) in {repo_name}. Stop it first.")]
    AlreadyRunning { pid: u32, repo_name: String },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("worker exited before reporting a pid")]
    MissingPid,
}

pub type Result<T> = std::result::Result<T, AgentError>;

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> AgentError + '_ {
    move |source| AgentError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What to run. Unset fields fall back to the [`AgentConfig`] defaults.
#[derive(Debug, Clone, Default)]
pub struct LaunchSpec {
    pub repo_path: PathBuf,
    /// Defaults to the last component of `repo_path`.
    pub repo_name: Option<String>,
    pub prompt: String,
    pub model: Option<String>,
    pub max_turns: Option<u32>,
    pub allowed_tools: Option<String>,
    pub epic_id: Option<String>,
    pub pipeline_stage: Option<WorkerStage>,
}

/// Record of the running worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSession {
    pub pid: u32,
    pub repo_path: PathBuf,
    pub repo_name: String,
    pub prompt: String,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub log_file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epic_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_stage: Option<WorkerStage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    pub running: bool,
    pub session: Option<AgentSession>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_log: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StopOutcome {
    pub stopped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

/// Delivered to the [`ExitHook`] when a worker ends without being stopped.
#[derive(Debug, Clone)]
pub struct ExitEvent {
    pub session: AgentSession,
    /// `None` when the worker was killed by a signal.
    pub exit_code: Option<i32>,
}

impl ExitEvent {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

pub type ExitHook = Box<dyn FnOnce(ExitEvent) -> BoxFuture<'static, ()> + Send>;

struct ActiveAgent {
    session: AgentSession,
    monitor: JoinHandle<()>,
}

// ---------------------------------------------------------------------------
// AgentProcessManager
// ---------------------------------------------------------------------------

pub struct AgentProcessManager {
    config: AgentConfig,
    binary: String,
    slot: Arc<Mutex<Option<ActiveAgent>>>,
}

impl AgentProcessManager {
    pub fn new(config: AgentConfig) -> Self {
        let binary = config.resolved_binary();
        Self {
            config,
            binary,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// The session occupying the slot, if any.
    pub async fn active_session(&self) -> Option<AgentSession> {
        let mut slot = self.slot.lock().await;
        reconcile(&mut slot);
        slot.as_ref().map(|a| a.session.clone())
    }

    /// Fail with [`AgentError::AlreadyRunning`] when the slot is taken.
    pub async fn ensure_idle(&self) -> Result<()> {
        match self.active_session().await {
            Some(s) => Err(AgentError::AlreadyRunning {
                pid: s.pid,
                repo_name: s.repo_name,
            }),
            None => Ok(()),
        }
    }

    /// Start a worker. The hook runs once, after the worker exits, unless
    /// [`AgentProcessManager::stop`] cleared the slot first.
    pub async fn launch(&self, spec: LaunchSpec, on_exit: Option<ExitHook>) -> Result<AgentSession> {
        let mut slot = self.slot.lock().await;
        reconcile(&mut slot);
        if let Some(active) = slot.as_ref() {
            return Err(AgentError::AlreadyRunning {
                pid: active.session.pid,
                repo_name: active.session.repo_name.clone(),
            });
        }

        let model = spec
            .model
            .clone()
            .unwrap_or_else(|| self.config.default_model.clone());
        let max_turns = spec.max_turns.unwrap_or(self.config.default_max_turns);
        let allowed_tools = spec
            .allowed_tools
            .clone()
            .unwrap_or_else(|| self.config.default_allowed_tools.clone());
        let repo_name = spec.repo_name.clone().unwrap_or_else(|| {
            spec.repo_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| spec.repo_path.display().to_string())
        });

        tokio::fs::create_dir_all(&spec.repo_path)
            .await
            .map_err(io_err(&spec.repo_path))?;
        tokio::fs::create_dir_all(&self.config.log_dir)
            .await
            .map_err(io_err(&self.config.log_dir))?;

        let started_at = Utc::now();
        let log_file = self.config.log_dir.join(log_file_name(&repo_name, started_at));
        let mut log = File::create(&log_file).await.map_err(io_err(&log_file))?;
        let header = event_log::header_lines(&model, &repo_name, &spec.prompt).join("\n") + "\n";
        log.write_all(header.as_bytes())
            .await
            .map_err(io_err(&log_file))?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg("-p")
            .arg(&spec.prompt)
            .arg("--allowedTools")
            .arg(&allowed_tools)
            .arg("--output-format")
            .arg(&self.config.output_format)
            .arg("--verbose")
            .arg("--max-turns")
            .arg(max_turns.to_string())
            .arg("--model")
            .arg(&model)
            .current_dir(&spec.repo_path)
            .env_remove("CLAUDECODE")
            .env("NO_COLOR", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        if let Some(extra) = &self.config.extra_path {
            let path = std::env::var("PATH").unwrap_or_default();
            cmd.env("PATH", format!("{extra}:{path}"));
        }
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| AgentError::Spawn {
            binary: self.binary.clone(),
            source,
        })?;
        let Some(pid) = child.id() else {
            let _ = child.start_kill();
            return Err(AgentError::MissingPid);
        };

        let session = AgentSession {
            pid,
            repo_path: spec.repo_path,
            repo_name,
            prompt: spec.prompt,
            model,
            started_at,
            log_file,
            epic_id: spec.epic_id,
            pipeline_stage: spec.pipeline_stage,
        };

        let reader = child
            .stdout
            .take()
            .map(|stdout| tokio::spawn(pump_events(stdout, log)));
        let monitor = tokio::spawn(monitor(
            Arc::clone(&self.slot),
            child,
            reader,
            session.clone(),
            on_exit,
        ));

        info!(
            pid,
            repo = %session.repo_name,
            model = %session.model,
            stage = ?session.pipeline_stage,
            log = %session.log_file.display(),
            "agent launched"
        );
        *slot = Some(ActiveAgent {
            session: session.clone(),
            monitor,
        });
        Ok(session)
    }

    /// Whether a worker is running, plus the tail of its transcript.
    pub async fn status(&self) -> AgentStatus {
        let Some(session) = self.active_session().await else {
            return AgentStatus {
                running: false,
                session: None,
                recent_log: None,
            };
        };
        let recent_log = read_tail(&session.log_file, self.config.log_tail_bytes).await;
        AgentStatus {
            running: true,
            session: Some(session),
            recent_log,
        }
    }

    /// Terminate the worker's process group and clear the slot. The exit
    /// hook does not run for a stopped worker.
    pub async fn stop(&self) -> StopOutcome {
        let mut slot = self.slot.lock().await;
        let Some(active) = slot.take() else {
            return StopOutcome {
                stopped: false,
                pid: None,
            };
        };
        let pid = active.session.pid;
        terminate(pid);
        info!(pid, repo = %active.session.repo_name, "agent stopped");
        StopOutcome {
            stopped: true,
            pid: Some(pid),
        }
    }
}

// ---------------------------------------------------------------------------
// Worker tasks
// ---------------------------------------------------------------------------

type Slot = Arc<Mutex<Option<ActiveAgent>>>;

/// Clear a slot whose monitor ended without releasing it.
fn reconcile(slot: &mut Option<ActiveAgent>) {
    if slot.as_ref().is_some_and(|a| a.monitor.is_finished()) {
        if let Some(stale) = slot.take() {
            warn!(pid = stale.session.pid, "clearing stale agent session");
        }
    }
}

/// Copy recognised events from the worker's stdout into the transcript.
/// Returns the log handle so the monitor can append the exit line.
async fn pump_events(stdout: ChildStdout, mut log: File) -> Option<File> {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let entries = event_log::format_line(&line, &event_log::clock());
                if entries.is_empty() {
                    continue;
                }
                let chunk = entries.join("\n") + "\n";
                if let Err(e) = log.write_all(chunk.as_bytes()).await {
                    warn!(error = %e, "failed to write agent transcript");
                    return None;
                }
                let _ = log.flush().await;
            }
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "agent stdout closed with error");
                break;
            }
        }
    }
    Some(log)
}

async fn monitor(
    slot: Slot,
    mut child: Child,
    reader: Option<JoinHandle<Option<File>>>,
    session: AgentSession,
    on_exit: Option<ExitHook>,
) {
    let pid = session.pid;
    let exit_code = match child.wait().await {
        Ok(status) => status.code(),
        Err(e) => {
            warn!(pid, error = %e, "failed to wait on agent");
            None
        }
    };
    let log = drain(reader, &session.log_file).await;

    // A stop() followed by a new launch leaves someone else in the slot.
    let released = {
        let mut slot = slot.lock().await;
        match slot.as_ref() {
            Some(active) if active.session.pid == pid => {
                *slot = None;
                true
            }
            _ => false,
        }
    };
    info!(pid, ?exit_code, released, "agent exited");

    if released {
        if let Some(hook) = on_exit {
            hook(ExitEvent {
                session: session.clone(),
                exit_code,
            })
            .await;
        }
    }

    if let Some(mut log) = log {
        let line = format!("\n{}\n", event_log::exit_line(exit_code));
        if let Err(e) = log.write_all(line.as_bytes()).await {
            warn!(pid, error = %e, "failed to finalize agent transcript");
        }
        let _ = log.flush().await;
    }
}

/// Wait briefly for the reader to hit EOF. Grandchildren holding stdout open
/// must not keep the transcript from being finalized.
async fn drain(reader: Option<JoinHandle<Option<File>>>, path: &Path) -> Option<File> {
    if let Some(mut handle) = reader {
        match tokio::time::timeout(DRAIN_TIMEOUT, &mut handle).await {
            Ok(Ok(Some(log))) => return Some(log),
            Ok(_) => {}
            Err(_) => {
                debug!(log = %path.display(), "agent stdout still open; detaching reader");
                handle.abort();
            }
        }
    }
    OpenOptions::new().append(true).open(path).await.ok()
}

#[cfg(unix)]
fn terminate(pid: u32) {
    let Ok(pid) = i32::try_from(pid) else {
        return;
    };
    // SAFETY: signal delivery only; the worker leads its own process group.
    let group = unsafe { libc::killpg(pid, libc::SIGTERM) };
    if group != 0 {
        // SAFETY: as above, for the bare process.
        let single = unsafe { libc::kill(pid, libc::SIGTERM) };
        if single != 0 {
            debug!(pid, "agent already gone");
        }
    }
}

#[cfg(not(unix))]
fn terminate(pid: u32) {
    warn!(pid, "process-group termination is only supported on unix");
}

// ---------------------------------------------------------------------------
// Transcript files
// ---------------------------------------------------------------------------

pub fn log_file_name(repo_name: &str, started_at: DateTime<Utc>) -> String {
    let stamp = started_at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("agent-{repo_name}-{stamp}.log")
}

/// Last `max_bytes` of a file, or `None` if it cannot be read.
pub async fn read_tail(path: &Path, max_bytes: u64) -> Option<String> {
    let mut file = File::open(path).await.ok()?;
    let len = file.metadata().await.ok()?.len();
    let start = len.saturating_sub(max_bytes);
    file.seek(SeekFrom::Start(start)).await.ok()?;
    let mut buf = Vec::with_capacity((len - start) as usize);
    file.read_to_end(&mut buf).await.ok()?;
    Some(String::from_utf8_lossy(&buf).into_owned())
}
