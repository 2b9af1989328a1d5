//! Pipeline orchestration engine.
//!
//! ```text
//! request ─▶ PipelineOrchestrator ─▶ ActionRegistry lookup
//!                 │                    └─▶ label mutations (LabelStore)
//!                 └─▶ AgentProcessManager::launch ─▶ worker process
//!                                                     │ exit
//!                 TransitionResolver ◀────────────────┘
//!                 └─▶ label mutations and/or chained action
//! ```

pub mod actions;
pub mod background;
pub mod event_log;
pub mod orchestrator;
pub mod process;
pub mod prompts;
pub mod request;
pub mod transitions;
