use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::alerts::AlertError;
use super::domain::{NewRule, RuleId, RuleType};
use super::repository::{AlertRepository, RuleRepository};
use super::rules::RuleError;
use super::runner::{ComplianceError, ComplianceRunner};

#[derive(Debug, Clone, Deserialize)]
pub struct AssignRequest {
    pub assignee: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloseRequest {
    pub resolver: String,
    #[serde(default)]
    pub comment: String,
}

/// Router builder exposing compliance runs, rule definitions and the alert workflow.
pub fn compliance_router<RR, AR>(runner: Arc<ComplianceRunner<RR, AR>>) -> Router
where
    RR: RuleRepository + 'static,
    AR: AlertRepository + 'static,
{
    Router::new()
        .route("/api/v1/compliance/runs", post(run_all_handler::<RR, AR>))
        .route(
            "/api/v1/compliance/runs/:rule_type",
            post(run_one_handler::<RR, AR>),
        )
        .route(
            "/api/v1/compliance/rules",
            get(rules_handler::<RR, AR>).post(create_rule_handler::<RR, AR>),
        )
        .route(
            "/api/v1/compliance/rules/:id",
            delete(retire_rule_handler::<RR, AR>),
        )
        .route("/api/v1/compliance/alerts", get(open_alerts_handler::<RR, AR>))
        .route(
            "/api/v1/compliance/alerts/:reference",
            get(alert_handler::<RR, AR>),
        )
        .route(
            "/api/v1/compliance/alerts/:reference/assign",
            post(assign_handler::<RR, AR>),
        )
        .route(
            "/api/v1/compliance/alerts/:reference/resolve",
            post(resolve_handler::<RR, AR>),
        )
        .route(
            "/api/v1/compliance/alerts/:reference/ignore",
            post(ignore_handler::<RR, AR>),
        )
        .with_state(runner)
}

pub(crate) async fn run_all_handler<RR, AR>(
    State(runner): State<Arc<ComplianceRunner<RR, AR>>>,
) -> Response
where
    RR: RuleRepository + 'static,
    AR: AlertRepository + 'static,
{
    let report = runner.run_all().await;
    (StatusCode::OK, axum::Json(report)).into_response()
}

pub(crate) async fn run_one_handler<RR, AR>(
    State(runner): State<Arc<ComplianceRunner<RR, AR>>>,
    Path(rule_type): Path<String>,
) -> Response
where
    RR: RuleRepository + 'static,
    AR: AlertRepository + 'static,
{
    let rule_type = match rule_type.parse::<RuleType>() {
        Ok(rule_type) => rule_type,
        Err(err) => {
            let payload = json!({
                "error": err.to_string(),
            });
            return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
        }
    };

    match runner.run_one(rule_type).await {
        Ok(outcome) => {
            let payload = json!({
                "rule_type": rule_type,
                "outcome": outcome,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(ComplianceError::UnsupportedRuleType(_)) => {
            let payload = json!({
                "error": format!("no evaluator registered for rule type {rule_type}"),
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({
                "rule_type": rule_type,
                "error": other.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn rules_handler<RR, AR>(
    State(runner): State<Arc<ComplianceRunner<RR, AR>>>,
) -> Response
where
    RR: RuleRepository + 'static,
    AR: AlertRepository + 'static,
{
    match runner.rules().all() {
        Ok(rules) => (StatusCode::OK, axum::Json(rules)).into_response(),
        Err(err) => rule_error_response(err),
    }
}

pub(crate) async fn create_rule_handler<RR, AR>(
    State(runner): State<Arc<ComplianceRunner<RR, AR>>>,
    axum::Json(request): axum::Json<NewRule>,
) -> Response
where
    RR: RuleRepository + 'static,
    AR: AlertRepository + 'static,
{
    match runner.rules().create(request) {
        Ok(rule) => (StatusCode::CREATED, axum::Json(rule)).into_response(),
        Err(err) => rule_error_response(err),
    }
}

pub(crate) async fn retire_rule_handler<RR, AR>(
    State(runner): State<Arc<ComplianceRunner<RR, AR>>>,
    Path(id): Path<u64>,
) -> Response
where
    RR: RuleRepository + 'static,
    AR: AlertRepository + 'static,
{
    match runner.retire_rule(RuleId(id)) {
        Ok(detached) => {
            let payload = json!({
                "rule": id,
                "detached_alerts": detached,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(ComplianceError::Rules(err)) => rule_error_response(err),
        Err(other) => {
            let payload = json!({
                "error": other.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn open_alerts_handler<RR, AR>(
    State(runner): State<Arc<ComplianceRunner<RR, AR>>>,
) -> Response
where
    RR: RuleRepository + 'static,
    AR: AlertRepository + 'static,
{
    match runner.alerts().open_alerts() {
        Ok(alerts) => (StatusCode::OK, axum::Json(alerts)).into_response(),
        Err(err) => alert_error_response(err),
    }
}

pub(crate) async fn alert_handler<RR, AR>(
    State(runner): State<Arc<ComplianceRunner<RR, AR>>>,
    Path(reference): Path<String>,
) -> Response
where
    RR: RuleRepository + 'static,
    AR: AlertRepository + 'static,
{
    match runner.alerts().get(&reference) {
        Ok(alert) => (StatusCode::OK, axum::Json(alert)).into_response(),
        Err(err) => alert_error_response(err),
    }
}

pub(crate) async fn assign_handler<RR, AR>(
    State(runner): State<Arc<ComplianceRunner<RR, AR>>>,
    Path(reference): Path<String>,
    axum::Json(request): axum::Json<AssignRequest>,
) -> Response
where
    RR: RuleRepository + 'static,
    AR: AlertRepository + 'static,
{
    match runner.alerts().assign(&reference, &request.assignee) {
        Ok(alert) => (StatusCode::OK, axum::Json(alert)).into_response(),
        Err(err) => alert_error_response(err),
    }
}

pub(crate) async fn resolve_handler<RR, AR>(
    State(runner): State<Arc<ComplianceRunner<RR, AR>>>,
    Path(reference): Path<String>,
    axum::Json(request): axum::Json<CloseRequest>,
) -> Response
where
    RR: RuleRepository + 'static,
    AR: AlertRepository + 'static,
{
    match runner
        .alerts()
        .resolve(&reference, &request.resolver, &request.comment)
    {
        Ok(alert) => (StatusCode::OK, axum::Json(alert)).into_response(),
        Err(err) => alert_error_response(err),
    }
}

pub(crate) async fn ignore_handler<RR, AR>(
    State(runner): State<Arc<ComplianceRunner<RR, AR>>>,
    Path(reference): Path<String>,
    axum::Json(request): axum::Json<CloseRequest>,
) -> Response
where
    RR: RuleRepository + 'static,
    AR: AlertRepository + 'static,
{
    match runner
        .alerts()
        .ignore(&reference, &request.resolver, &request.comment)
    {
        Ok(alert) => (StatusCode::OK, axum::Json(alert)).into_response(),
        Err(err) => alert_error_response(err),
    }
}

fn rule_error_response(err: RuleError) -> Response {
    let status = match &err {
        RuleError::DuplicateCode(_) | RuleError::CodeImmutable { .. } => StatusCode::CONFLICT,
        RuleError::InvalidRecipient { .. } | RuleError::LookaheadOutOfRange(_) => {
            StatusCode::BAD_REQUEST
        }
        RuleError::NotFound(_) => StatusCode::NOT_FOUND,
        RuleError::Unavailable | RuleError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({
        "error": err.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}

fn alert_error_response(err: AlertError) -> Response {
    let status = match &err {
        AlertError::NotFound(_) => StatusCode::NOT_FOUND,
        AlertError::InvalidTransition { .. } => StatusCode::CONFLICT,
        AlertError::Unavailable | AlertError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = match &err {
        AlertError::InvalidTransition {
            reference, from, ..
        } => json!({
            "error": err.to_string(),
            "reference": reference,
            "status": from.label(),
        }),
        _ => json!({
            "error": err.to_string(),
        }),
    };
    (status, axum::Json(payload)).into_response()
}
