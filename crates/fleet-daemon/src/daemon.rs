use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use fleet_agents::orchestrator::PipelineOrchestrator;
use fleet_agents::process::AgentProcessManager;
use fleet_bridge::http_api::{api_router, ApiState};
use fleet_core::cache::{ReadCache, TtlCache};
use fleet_core::config::Config;
use fleet_core::tracker::bd::BdTracker;
use fleet_core::tracker::{IssueRepository, LabelStore};
use tokio::net::TcpListener;
use tracing::info;

use crate::shutdown::ShutdownSignal;

/// The fleet daemon: one orchestrator behind one HTTP listener.
pub struct Daemon {
    config: Config,
    orchestrator: Arc<PipelineOrchestrator>,
    shutdown: ShutdownSignal,
}

impl Daemon {
    /// Build a daemon backed by the `bd` tracker named in `config`.
    pub fn new(config: Config) -> Result<Self> {
        config.validate().context("invalid configuration")?;
        let cache = Arc::new(TtlCache::new(Duration::from_secs(
            config.tracker.cache_ttl_secs,
        )));
        let tracker = Arc::new(BdTracker::new(
            config.tracker.binary.clone(),
            vec![config.pipeline.factory_repo.clone()],
            Arc::clone(&cache),
        ));
        Ok(Self::with_collaborators(
            config,
            tracker.clone(),
            tracker,
            cache,
        ))
    }

    /// Build a daemon over caller-supplied tracker collaborators.
    pub fn with_collaborators(
        config: Config,
        labels: Arc<dyn LabelStore>,
        issues: Arc<dyn IssueRepository>,
        cache: Arc<dyn ReadCache>,
    ) -> Self {
        let agents = Arc::new(AgentProcessManager::new(config.agent.clone()));
        let orchestrator = Arc::new(PipelineOrchestrator::new(
            config.pipeline.clone(),
            labels,
            issues,
            cache,
            agents,
        ));
        Self {
            config,
            orchestrator,
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Returns a handle that can be used to trigger shutdown from another task.
    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn orchestrator(&self) -> &Arc<PipelineOrchestrator> {
        &self.orchestrator
    }

    pub fn router(&self) -> axum::Router {
        api_router(Arc::new(ApiState::new(Arc::clone(&self.orchestrator))))
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<()> {
        let bind_addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("failed to bind {bind_addr}"))?;
        self.run_with_listener(listener).await
    }

    /// Serve on an already-bound listener until shutdown.
    ///
    /// A running worker is left alone: it leads its own process group and
    /// keeps going after the daemon exits.
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr().context("listener has no address")?;
        info!(
            %addr,
            factory = %self.config.pipeline.factory_repo.display(),
            max_qa_rounds = self.config.pipeline.max_qa_rounds,
            "fleet API listening"
        );

        let shutdown = self.shutdown.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await
            .context("API server error")?;

        if let Some(session) = self.orchestrator.agents().active_session().await {
            info!(
                pid = session.pid,
                repo = %session.repo_name,
                epic_id = ?session.epic_id,
                "leaving agent running after shutdown"
            );
        }
        info!("daemon stopped");
        Ok(())
    }
}
