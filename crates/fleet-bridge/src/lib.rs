//! HTTP surface of the fleet pipeline.
//!
//! Thin Axum handlers over [`fleet_agents::orchestrator::PipelineOrchestrator`].
//! All error bodies share the `{"error": "..."}` shape from [`api_error`].

pub mod api_error;
pub mod http_api;
