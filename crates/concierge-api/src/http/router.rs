//! Axum router configuration with middleware.
//!
//! Middleware: CORS, tracing.

use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the fulfillment router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/fulfillment/booking", post(handlers::fulfillment::booking))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Liveness probe.
async fn health_check(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "region": state.config.region,
        "started_at": state.started_at.to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use concierge_types::config::DeploymentConfig;
    use tower::ServiceExt;

    fn router() -> Router {
        build_router(AppState::new(DeploymentConfig::default()))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_region() {
        let response = router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["region"], "us-east-1");
    }

    #[tokio::test]
    async fn test_booking_closes_intent() {
        let event = r#"{"sessionState":{"intent":{"name":"BookRoom"},"sessionAttributes":{"x":"1"}}}"#;
        let response = router()
            .oneshot(
                Request::post("/fulfillment/booking")
                    .header("content-type", "application/json")
                    .body(Body::from(event))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["sessionState"]["intent"]["name"], "BookRoom");
        assert_eq!(body["sessionState"]["sessionAttributes"]["x"], "1");
        assert_eq!(body["sessionState"]["sessionAttributes"]["escalated"], "true");
        assert_eq!(
            body["messages"][0]["content"],
            "This request has been forwarded to a hotel agent."
        );
    }

    #[tokio::test]
    async fn test_booking_accepts_null_session_attributes() {
        let event = r#"{"sessionState":{"intent":{"name":"BookRoom"},"sessionAttributes":null}}"#;
        let response = router()
            .oneshot(
                Request::post("/fulfillment/booking")
                    .header("content-type", "application/json")
                    .body(Body::from(event))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(
            body["sessionState"]["sessionAttributes"],
            serde_json::json!({ "escalated": "true" })
        );
    }

    #[tokio::test]
    async fn test_malformed_event_is_bad_request() {
        let response = router()
            .oneshot(
                Request::post("/fulfillment/booking")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["errors"][0]["code"], "VALIDATION_ERROR");
    }
}
