use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use hr_compliance::compliance::{
    compliance_router, AlertRepository, ComplianceRunner, RuleRepository,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_compliance_routes<RR, AR>(runner: Arc<ComplianceRunner<RR, AR>>) -> axum::Router
where
    RR: RuleRepository + 'static,
    AR: AlertRepository + 'static,
{
    compliance_router(runner)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{build_runner, OutboxTransport};
    use axum::body::Body;
    use axum::http::Request;
    use chrono::NaiveDate;
    use hr_compliance::clock::FixedClock;
    use hr_compliance::compliance::SnapshotSource;
    use hr_compliance::config::ComplianceConfig;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn state(ready: bool) -> AppState {
        let recorder = PrometheusBuilder::new().build_recorder();
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(recorder.handle()),
        }
    }

    fn app(ready: bool) -> axum::Router {
        let clock = Arc::new(FixedClock::on(
            NaiveDate::from_ymd_opt(2025, 3, 1).expect("valid date"),
        ));
        let runner = build_runner(
            &ComplianceConfig::default(),
            SnapshotSource::new(),
            Arc::new(OutboxTransport::default()),
            clock,
        );
        with_compliance_routes(Arc::new(runner)).layer(Extension(state(ready)))
    }

    #[tokio::test]
    async fn readiness_reflects_startup_flag() {
        let pending = app(false)
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request builds"))
            .await
            .expect("route executes");
        assert_eq!(pending.status(), StatusCode::SERVICE_UNAVAILABLE);

        let ready = app(true)
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request builds"))
            .await
            .expect("route executes");
        assert_eq!(ready.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn compliance_routes_are_mounted_next_to_health() {
        let health = app(true)
            .oneshot(Request::get("/health").body(Body::empty()).expect("request builds"))
            .await
            .expect("route executes");
        assert_eq!(health.status(), StatusCode::OK);

        let alerts = app(true)
            .oneshot(
                Request::get("/api/v1/compliance/alerts")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("route executes");
        assert_eq!(alerts.status(), StatusCode::OK);
        let body = axum::body::to_bytes(alerts.into_body(), 1024)
            .await
            .expect("read body");
        assert_eq!(&body[..], b"[]");
    }
}
