//! Metrics HTTP server.
//!
//! Serves the Prometheus text exposition on `/metrics` and a JSON liveness
//! probe on `/healthz`. Every scrape renders the aggregate store as it is at
//! request time.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::Registry;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::ingest::{IngestCounts, IngestStats};
use crate::publisher::render;
use crate::store::AggregateStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    pub store: AggregateStore,
    pub stats: Arc<IngestStats>,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    sensors: usize,
    ingest: IngestCounts,
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let app_state = Arc::new(state);

    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .with_state(app_state)
}

/// Serve `router` on `listener` until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
}

/// Prometheus scrape endpoint.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match render(&state.registry) {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)).into_response()
        }
    }
}

/// Liveness probe with ingestion counters.
async fn healthz_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        sensors: state.store.len(),
        ingest: state.stats.counts(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::Ingestor;
    use crate::publisher::{DEFAULT_NAMESPACE, registry_for};
    use crate::staleness::StalenessChecker;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    fn create_test_state() -> (AppState, Ingestor) {
        let store = AggregateStore::new();
        let ingestor = Ingestor::new(store.clone(), StalenessChecker::default());
        let state = AppState {
            registry: registry_for(store.clone(), DEFAULT_NAMESPACE).unwrap(),
            store,
            stats: ingestor.stats(),
        };
        (state, ingestor)
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (
            status,
            content_type,
            String::from_utf8_lossy(&bytes).into_owned(),
        )
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (state, ingestor) = create_test_state();
        ingestor
            .ingest_line(r#"{"model":"X","id":"1","channel":"A","temperature_C":21.5}"#)
            .unwrap();

        let (status, content_type, body) = get_body(create_router(state), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some(prometheus::TEXT_FORMAT));
        assert!(body.contains(r#"rtl_433_temperature{channel="A",id="1",model="X"} 21.5"#));
    }

    #[tokio::test]
    async fn test_healthz_endpoint() {
        let (state, ingestor) = create_test_state();
        ingestor.ingest_line(r#"{"model":"X"}"#).unwrap();
        let _ = ingestor.ingest_line("garbage");

        let (status, _, body) = get_body(create_router(state), "/healthz").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["sensors"], 1);
        assert_eq!(json["ingest"]["lines"], 2);
        assert_eq!(json["ingest"]["malformed"], 1);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (state, _ingestor) = create_test_state();
        let (status, _, _) = get_body(create_router(state), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
