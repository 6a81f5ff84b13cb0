//! Axum router construction.
//!
//! Two routes: `/metrics` renders the currently published gauge set in
//! the text exposition format, `/health` is a trivial liveness probe.
//! Scrapes can arrive at any time; consistency against the concurrently
//! running refresh loop is handled inside [`PublishedMetrics`].
//!
//! [`PublishedMetrics`]: crate::metrics::PublishedMetrics

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::error;

use crate::AppState;

/// Build the axum [`Router`]. Ready to be passed to `axum::serve`.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// `GET /health` -- liveness probe.
async fn health_check() -> &'static str {
    "OK"
}

/// `GET /metrics` -- Prometheus text exposition of the published gauges.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "encoding error").into_response()
        }
    }
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::PublishedMetrics;
    use crate::snapshot::{BucketStats, Snapshot};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        let metrics = Arc::new(PublishedMetrics::new().unwrap());
        let mut snapshot = Snapshot::default();
        snapshot.buckets.insert(
            "logs".to_string(),
            BucketStats {
                total_size: 150,
                object_count: 2,
                latest_timestamp: Some(2000),
            },
        );
        metrics.publish(&snapshot);
        Arc::new(AppState { metrics })
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = app(test_state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_serves_exposition() {
        let app = app(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "text/plain; version=0.0.4"
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("backblaze_b2_total_size{bucket=\"logs\"} 150"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = app(test_state());
        let response = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
