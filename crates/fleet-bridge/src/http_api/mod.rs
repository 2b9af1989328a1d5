// ---------------------------------------------------------------------------
// HTTP API module directory
// ---------------------------------------------------------------------------
//
// `fleet` holds the handlers, `state` the shared application state. This
// file owns the Axum router and its middleware stack.

mod fleet;
pub mod state;


pub use state::ApiState;

pub use self::router::api_router;

// ---------------------------------------------------------------------------
// Router + middleware
// ---------------------------------------------------------------------------

mod router {
    use super::*;
    use axum::{
        http::{HeaderValue, Method},
        routing::{get, post},
        Router,
    };
    use std::sync::Arc;
    use tower_http::cors::{AllowOrigin, CorsLayer};
    use tower_http::trace::TraceLayer;

    /// Only the board served from this machine may call the API.
    fn is_local_origin(origin: &HeaderValue) -> bool {
        origin.to_str().is_ok_and(|o| {
            o.starts_with("http://localhost")
                || o.starts_with("http://127.0.0.1")
                || o.starts_with("https://localhost")
                || o.starts_with("https://127.0.0.1")
        })
    }

    /// Build the fleet API router.
    pub fn api_router(state: Arc<ApiState>) -> Router {
        Router::new()
            .route("/api/health", get(fleet::health))
            .route("/api/fleet/action", post(fleet::execute_action))
            .route("/api/fleet/status", get(fleet::agent_status))
            .layer(TraceLayer::new_for_http())
            .layer(
                CorsLayer::new()
                    .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _parts| {
                        is_local_origin(origin)
                    }))
                    .allow_methods([Method::GET, Method::POST])
                    .allow_headers([axum::http::header::CONTENT_TYPE]),
            )
            .with_state(state)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn local_origins_only() {
            assert!(is_local_origin(&HeaderValue::from_static("http://localhost:3000")));
            assert!(is_local_origin(&HeaderValue::from_static("http://127.0.0.1:5173")));
            assert!(!is_local_origin(&HeaderValue::from_static("https://example.com")));
        }
    }
}
