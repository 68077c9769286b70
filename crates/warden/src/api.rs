//! HTTP status handlers
//!
//! Two read-only endpoints over the shared child state. Both always answer
//! 200 with a JSON body and never block on the child process; they only
//! snapshot the state cell.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use warden_core::StateCell;

/// Response body for `GET /`
#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: String,
    pub status: &'static str,
    pub node_server: &'static str,
}

/// Response body for `GET /health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub node_server: &'static str,
}

/// State shared with the handlers
#[derive(Clone)]
pub struct ApiState {
    pub state: StateCell,
    pub message: String,
}

/// Creates the status API router
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

async fn root_handler(State(api): State<ApiState>) -> Json<RootResponse> {
    let child = api.state.snapshot();
    Json(RootResponse {
        message: api.message.clone(),
        status: "running",
        node_server: child.liveness(),
    })
}

async fn health_handler(State(api): State<ApiState>) -> Json<HealthResponse> {
    let child = api.state.snapshot();
    Json(HealthResponse {
        status: "healthy",
        node_server: child.health(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt; // for `oneshot`
    use warden_core::{ChildState, ProcessId};

    fn api_with(child: ChildState) -> ApiState {
        let cell = StateCell::new();
        if child != ChildState::Unstarted {
            cell.advance(child);
        }
        ApiState {
            state: cell,
            message: "test supervisor".to_string(),
        }
    }

    async fn get_json(api: ApiState, uri: &str) -> (StatusCode, serde_json::Value) {
        let app = create_router(api);
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_reports_running_child() {
        let api = api_with(ChildState::running(Some(ProcessId(42))));
        let (status, body) = get_json(api, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["node_server"], "running");
    }

    #[tokio::test]
    async fn test_health_reports_stopped_before_start() {
        let api = api_with(ChildState::Unstarted);
        let (status, body) = get_json(api, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["node_server"], "stopped");
    }

    #[tokio::test]
    async fn test_root_reports_active_child() {
        let api = api_with(ChildState::running(Some(ProcessId(42))));
        let (status, body) = get_json(api, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "test supervisor");
        assert_eq!(body["status"], "running");
        assert_eq!(body["node_server"], "active");
    }

    #[tokio::test]
    async fn test_root_reports_inactive_after_exit() {
        let api = api_with(ChildState::stopped(Some(1)));
        let (status, body) = get_json(api, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["node_server"], "inactive");
    }

    #[tokio::test]
    async fn test_endpoints_stay_200_after_launch_failure() {
        let api = api_with(ChildState::failed("no such file"));

        let (status, body) = get_json(api.clone(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["node_server"], "stopped");

        let (status, body) = get_json(api, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["node_server"], "inactive");
    }
}
