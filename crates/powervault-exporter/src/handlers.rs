use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use tracing::error;

use crate::state::AppState;

pub(crate) fn router(state: AppState) -> Router {
    let metrics_path = state.metrics_path.clone();
    Router::new()
        .route(&metrics_path, get(handle_metrics))
        .route("/", get(handle_landing))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Current registry contents in the text exposition format.
pub(crate) async fn handle_metrics(State(state): State<AppState>) -> Response {
    match state.registry.encode() {
        Ok(body) => ([(header::CONTENT_TYPE, state.registry.content_type())], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}

pub(crate) async fn handle_landing(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<html>\n\
         <head><title>Dell PowerVault MD Exporter</title></head>\n\
         <body>\n\
         <h1>Dell PowerVault MD Exporter</h1>\n\
         <p>Version {}</p>\n\
         <p><a href=\"{}\">Metrics</a></p>\n\
         </body>\n\
         </html>\n",
        powervault_core::VERSION,
        state.metrics_path
    ))
}

pub(crate) async fn handle_health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use powervault_core::{Metric, MetricRegistry};
    use tower::ServiceExt;

    use super::*;

    fn state(path: &str) -> AppState {
        AppState {
            registry: Arc::new(MetricRegistry::new().unwrap()),
            metrics_path: Arc::from(path),
        }
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
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_serves_registry() {
        let state = state("/metrics");
        state
            .registry
            .set(Metric::PhysicalDiskStatus, &["0", "1", "4"], -1.0)
            .unwrap();
        let (status, content_type, body) = get_body(router(state), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.unwrap().starts_with("text/plain"));
        assert!(body.contains(
            "dell_powervault_md_exporter_Physical_Disk_Status{Drawer=\"1\",Enclosure=\"0\",Slot=\"4\"} -1"
        ));
    }

    #[tokio::test]
    async fn test_metrics_before_first_pass() {
        let (status, _, body) = get_body(router(state("/metrics")), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body.contains("Physical_Disk_Latency{"));
    }

    #[tokio::test]
    async fn test_custom_telemetry_path() {
        let app = router(state("/probe"));
        let (status, _, _) = get_body(app.clone(), "/probe").await;
        assert_eq!(status, StatusCode::OK);
        let (status, _, _) = get_body(app, "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_landing_links_metrics() {
        let (status, _, body) = get_body(router(state("/probe")), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<a href=\"/probe\">Metrics</a>"));
    }

    #[tokio::test]
    async fn test_health() {
        let (status, _, body) = get_body(router(state("/metrics")), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }
}
