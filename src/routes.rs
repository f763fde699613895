use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Local, NaiveDate};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::certificate::{
    CertificateEngine, EvaluationContext, FieldKey, FieldMutation, FieldValue, FormSession,
    Reminder, ValidationIssue,
};
use crate::error::AppError;
use crate::mortality::{
    DashboardView, MortalityDashboard, MortalityQuery, RecordFilter, ReportingPeriod,
};
use crate::remote::CertificateRecord;

#[derive(Clone)]
pub struct AppState {
    pub readiness: Arc<AtomicBool>,
    pub metrics: PrometheusHandle,
    pub engine: Arc<CertificateEngine>,
    pub dashboard: MortalityDashboard,
    pub top_causes_limit: usize,
}

/// Health, metrics and the certificate and mortality endpoints.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/certificate/rules", get(rules_endpoint))
        .route("/api/v1/certificate/evaluate", post(evaluate_endpoint))
        .route("/api/v1/mortality/top-causes", post(top_causes_endpoint))
        .with_state(state)
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
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

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

async fn rules_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let rules = state.engine.evaluator().rules();
    Json(json!({ "count": rules.len(), "rules": rules }))
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    /// Values already on the form.
    #[serde(default)]
    pub values: BTreeMap<FieldKey, FieldValue>,
    pub changed: FieldKey,
    pub value: FieldValue,
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub mutations: Vec<FieldMutation>,
    pub can_submit: bool,
    pub issues: Vec<ValidationIssue>,
    pub reminders: Vec<Reminder>,
}

/// Replays the stored values into a throwaway session, then applies one change.
async fn evaluate_endpoint(
    State(state): State<AppState>,
    Json(request): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, AppError> {
    let today = request.today.unwrap_or_else(|| Local::now().date_naive());
    let record = CertificateRecord {
        event: None,
        org_unit: String::new(),
        event_date: today,
        values: request.values,
    };

    let mut session = FormSession::edit(
        Arc::clone(&state.engine),
        &record,
        EvaluationContext::new(today),
    )?;
    let change = session.on_field_change(request.changed.as_str(), request.value)?;
    debug!(
        field = %request.changed,
        mutations = change.mutations.len(),
        "evaluated field change"
    );

    Ok(Json(EvaluateResponse {
        mutations: change.mutations,
        can_submit: change.can_submit,
        issues: session.validation_issues(),
        reminders: session.reminders(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct TopCausesRequest {
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
    #[serde(default)]
    pub organisation_unit: Option<String>,
    #[serde(default)]
    pub organisation_unit_name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub filters: Vec<RecordFilter>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Without explicit bounds the report covers the year up to `end` or today.
async fn top_causes_endpoint(
    State(state): State<AppState>,
    Json(request): Json<TopCausesRequest>,
) -> Result<Json<DashboardView>, AppError> {
    let period = match (request.start, request.end) {
        (Some(start), Some(end)) => ReportingPeriod::new(start, end)?,
        (_, end) => {
            ReportingPeriod::trailing_year(end.unwrap_or_else(|| Local::now().date_naive()))?
        }
    };
    let query = MortalityQuery {
        filters: request.filters,
        category: request.category,
        limit: request.limit.unwrap_or(state.top_causes_limit),
        organisation_unit_name: request.organisation_unit_name,
    };

    let view = state
        .dashboard
        .refresh(period, request.organisation_unit, &query)
        .await?;
    Ok(Json(view))
}
