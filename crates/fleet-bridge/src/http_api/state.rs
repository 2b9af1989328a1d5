use std::sync::Arc;

use fleet_agents::orchestrator::PipelineOrchestrator;

/// Shared state handed to every handler.
pub struct ApiState {
    pub orchestrator: Arc<PipelineOrchestrator>,
}

impl ApiState {
    pub fn new(orchestrator: Arc<PipelineOrchestrator>) -> Self {
        Self { orchestrator }
    }
}
