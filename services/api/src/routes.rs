use crate::infra::AppState;
use agwater::error::AppError;
use agwater::workflows::lab_results::{LabResultsImporter, WaterQualityProfile};
use agwater::workflows::water_assessment::thresholds::{GM_THRESHOLD, STV_THRESHOLD};
use agwater::workflows::water_assessment::{
    assessment_router, AssessmentService, AssessmentStore,
};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub(crate) struct LabSummaryRequest {
    pub(crate) csv: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct LabSummaryResponse {
    pub(crate) gm_threshold: f64,
    pub(crate) stv_threshold: f64,
    pub(crate) profiles: Vec<WaterQualityProfile>,
}

pub(crate) fn with_assessment_routes<S>(service: Arc<AssessmentService<S>>) -> axum::Router
where
    S: AssessmentStore + 'static,
{
    assessment_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/lab-results/summary",
            axum::routing::post(lab_summary_endpoint),
        )
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

pub(crate) async fn lab_summary_endpoint(
    Json(payload): Json<LabSummaryRequest>,
) -> Result<Json<LabSummaryResponse>, AppError> {
    let reader = Cursor::new(payload.csv.into_bytes());
    let profiles = LabResultsImporter::from_reader(reader)?;
    Ok(Json(LabSummaryResponse {
        gm_threshold: GM_THRESHOLD,
        stv_threshold: STV_THRESHOLD,
        profiles,
    }))
}
