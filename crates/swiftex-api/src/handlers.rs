//! Scrape API handlers.
//!
//! Every handler takes one store snapshot and answers from it alone.

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse};
use serde::Serialize;
use tracing::error;

use swiftex_store::{CONTENT_TYPE, render_exposition};

use crate::ApiState;

// ── Metrics ────────────────────────────────────────────────────

/// GET <metrics_path>
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let snapshot = state.store.snapshot();
    match render_exposition(&snapshot) {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to render exposition");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to render metrics: {e}\n"),
            )
                .into_response()
        }
    }
}

// ── Health ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct HealthReport {
    status: &'static str,
    families: Vec<FamilyHealth>,
}

#[derive(Debug, Serialize)]
struct FamilyHealth {
    family: String,
    published: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    age_secs: Option<f64>,
    consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    disabled: Option<String>,
}

/// GET /healthz
///
/// Always 200 while the process serves requests; `status` is `degraded`
/// when any family is disabled or has never published.
pub async fn healthz(State(state): State<ApiState>) -> impl IntoResponse {
    let snapshot = state.store.snapshot();
    let families: Vec<FamilyHealth> = snapshot
        .families()
        .map(|(name, family)| FamilyHealth {
            family: name.to_string(),
            published: family.samples.is_some(),
            age_secs: snapshot.age_secs(name),
            consecutive_failures: family.consecutive_failures,
            disabled: family.disabled.clone(),
        })
        .collect();

    let degraded = families
        .iter()
        .any(|f| f.disabled.is_some() || !f.published);

    Json(HealthReport {
        status: if degraded { "degraded" } else { "ok" },
        families,
    })
}

// ── Index ──────────────────────────────────────────────────────

/// GET /
pub async fn index(State(state): State<ApiState>) -> impl IntoResponse {
    let path = &state.options.metrics_path;
    Html(format!(
        "<html><head><title>Swift Exporter</title></head><body>\
         <h1>Swift Exporter</h1><p><a href=\"{path}\">Metrics</a></p>\
         </body></html>"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use swiftex_store::{MetricStore, SampleSetBuilder, labels};

    use crate::ServeOptions;

    fn test_state() -> ApiState {
        ApiState {
            store: MetricStore::new(),
            options: Arc::new(ServeOptions::default()),
        }
    }

    async fn body_string(resp: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn metrics_empty_store() {
        let resp = prometheus_metrics(State(test_state())).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            CONTENT_TYPE
        );
        assert_eq!(body_string(resp).await, "# EOF\n");
    }

    #[tokio::test]
    async fn metrics_render_published_samples() {
        let state = test_state();
        let mut b = SampleSetBuilder::new();
        b.push("swift_async_pending", labels([("node", "s1:6000")]), 7u64);
        state.store.publish("async_pending", b.build());

        let resp = prometheus_metrics(State(state)).await.into_response();
        let body = body_string(resp).await;
        assert!(body.contains("swift_async_pending{node=\"s1:6000\"} 7\n"));
    }

    #[tokio::test]
    async fn healthz_reports_family_status() {
        let state = test_state();
        state.store.publish("load", SampleSetBuilder::new().build());
        state.store.mark_disabled("ring_md5", "malformed target list");

        let resp = healthz(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["families"][0]["family"], "load");
        assert_eq!(json["families"][0]["published"], true);
        assert_eq!(json["families"][1]["disabled"], "malformed target list");
    }

    #[tokio::test]
    async fn index_links_metrics_path() {
        let state = ApiState {
            store: MetricStore::new(),
            options: Arc::new(ServeOptions {
                metrics_path: "/swift/metrics".to_string(),
            }),
        };
        let body = body_string(index(State(state)).await.into_response()).await;
        assert!(body.contains("href=\"/swift/metrics\""));
    }
}
