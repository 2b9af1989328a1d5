//! Fire-and-forget work that has nobody to report to.
//!
//! Agent exit handling runs long after the request that launched the agent
//! has been answered. Failures there are logged and dropped.

use std::fmt::Display;
use std::future::Future;

/// Await `fut`, logging an error under `task` if it fails.
pub async fn best_effort<T, E, F>(task: &'static str, epic_id: &str, fut: F) -> Option<T>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match fut.await {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!(task, epic_id, error = %e, "background task failed");
            None
        }
    }
}
