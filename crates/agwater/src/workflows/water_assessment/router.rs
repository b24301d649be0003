use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::domain::{
    AssessmentId, AssessmentUpdate, EnvironmentalInput, FieldId, FieldPracticeInput,
    NewAssessment, Signature, SourceConditionInput, WaterSourceId,
};
use super::evaluation::estimate_die_off;
use super::repository::AssessmentStore;
use super::service::{AssessmentError, AssessmentService};
use super::wizard::{AssessmentWorkflow, WizardAction, WizardState, WorkflowError};

type SharedService<S> = State<Arc<AssessmentService<S>>>;

/// Router builder exposing the assessment, die-off, and wizard endpoints.
pub fn assessment_router<S>(service: Arc<AssessmentService<S>>) -> Router
where
    S: AssessmentStore + 'static,
{
    Router::new()
        .route("/api/v1/water-assessments", post(create_handler::<S>))
        .route(
            "/api/v1/water-assessments/:assessment_id",
            get(get_handler::<S>).patch(update_handler::<S>),
        )
        .route(
            "/api/v1/water-assessments/:assessment_id/sources/:water_source_id",
            put(source_handler::<S>),
        )
        .route(
            "/api/v1/water-assessments/:assessment_id/fields/:field_id",
            put(field_handler::<S>),
        )
        .route(
            "/api/v1/water-assessments/:assessment_id/environmental",
            put(environmental_handler::<S>),
        )
        .route(
            "/api/v1/water-assessments/:assessment_id/risk",
            post(risk_handler::<S>),
        )
        .route(
            "/api/v1/water-assessments/:assessment_id/submit",
            post(submit_handler::<S>),
        )
        .route(
            "/api/v1/water-assessments/:assessment_id/approve",
            post(approve_handler::<S>),
        )
        .route("/api/v1/die-off", post(die_off_handler))
        .route("/api/v1/assessment-wizard", post(wizard_handler::<S>))
        .with_state(service)
}

pub(crate) fn status_for(error: &AssessmentError) -> StatusCode {
    match error {
        AssessmentError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AssessmentError::NotFound { .. } => StatusCode::NOT_FOUND,
        AssessmentError::IncompleteData(_)
        | AssessmentError::ImmutableState(_)
        | AssessmentError::InvalidTransition { .. } => StatusCode::CONFLICT,
        AssessmentError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub(crate) fn error_response(error: AssessmentError) -> Response {
    let status = status_for(&error);
    let payload = match &error {
        AssessmentError::Validation(errors) => json!({
            "error": error.to_string(),
            "fields": errors.fields,
        }),
        _ => json!({
            "error": error.to_string(),
        }),
    };
    if status.is_server_error() {
        warn!(error = %error, "assessment request failed");
    }
    (status, Json(payload)).into_response()
}

fn respond<T: serde::Serialize>(status: StatusCode, result: Result<T, AssessmentError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_handler<S>(
    State(service): SharedService<S>,
    Json(input): Json<NewAssessment>,
) -> Response
where
    S: AssessmentStore + 'static,
{
    respond(StatusCode::CREATED, service.create_assessment(input))
}

pub(crate) async fn get_handler<S>(
    State(service): SharedService<S>,
    Path(assessment_id): Path<String>,
) -> Response
where
    S: AssessmentStore + 'static,
{
    let id = AssessmentId(assessment_id);
    match service.get_assessment(&id) {
        Ok(record) => {
            let summary = record.status_view();
            (
                StatusCode::OK,
                Json(json!({ "summary": summary, "record": record })),
            )
                .into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_handler<S>(
    State(service): SharedService<S>,
    Path(assessment_id): Path<String>,
    Json(update): Json<AssessmentUpdate>,
) -> Response
where
    S: AssessmentStore + 'static,
{
    let id = AssessmentId(assessment_id);
    respond(StatusCode::OK, service.update_assessment(&id, update))
}

pub(crate) async fn source_handler<S>(
    State(service): SharedService<S>,
    Path((assessment_id, water_source_id)): Path<(String, String)>,
    Json(input): Json<SourceConditionInput>,
) -> Response
where
    S: AssessmentStore + 'static,
{
    let id = AssessmentId(assessment_id);
    respond(
        StatusCode::OK,
        service.upsert_source_assessment(&id, WaterSourceId(water_source_id), input),
    )
}

pub(crate) async fn field_handler<S>(
    State(service): SharedService<S>,
    Path((assessment_id, field_id)): Path<(String, String)>,
    Json(input): Json<FieldPracticeInput>,
) -> Response
where
    S: AssessmentStore + 'static,
{
    let id = AssessmentId(assessment_id);
    respond(
        StatusCode::OK,
        service.upsert_field_assessment(&id, FieldId(field_id), input),
    )
}

pub(crate) async fn environmental_handler<S>(
    State(service): SharedService<S>,
    Path(assessment_id): Path<String>,
    Json(input): Json<EnvironmentalInput>,
) -> Response
where
    S: AssessmentStore + 'static,
{
    let id = AssessmentId(assessment_id);
    respond(
        StatusCode::OK,
        service.upsert_environmental_assessment(&id, input),
    )
}

pub(crate) async fn risk_handler<S>(
    State(service): SharedService<S>,
    Path(assessment_id): Path<String>,
) -> Response
where
    S: AssessmentStore + 'static,
{
    let id = AssessmentId(assessment_id);
    respond(StatusCode::OK, service.compute_risk(&id))
}

pub(crate) async fn submit_handler<S>(
    State(service): SharedService<S>,
    Path(assessment_id): Path<String>,
    Json(signature): Json<Signature>,
) -> Response
where
    S: AssessmentStore + 'static,
{
    let id = AssessmentId(assessment_id);
    respond(StatusCode::OK, service.submit_assessment(&id, signature))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApprovalRequest {
    approved_by: String,
}

pub(crate) async fn approve_handler<S>(
    State(service): SharedService<S>,
    Path(assessment_id): Path<String>,
    Json(request): Json<ApprovalRequest>,
) -> Response
where
    S: AssessmentStore + 'static,
{
    let id = AssessmentId(assessment_id);
    respond(
        StatusCode::OK,
        service.approve_assessment(&id, &request.approved_by),
    )
}

#[derive(Debug, Deserialize)]
pub(crate) struct DieOffRequest {
    ecoli_gm: f64,
    #[serde(default)]
    ecoli_stv: Option<f64>,
}

pub(crate) async fn die_off_handler(Json(request): Json<DieOffRequest>) -> Response {
    respond(
        StatusCode::OK,
        estimate_die_off(request.ecoli_gm, request.ecoli_stv).map_err(AssessmentError::from),
    )
}

#[derive(Debug, Deserialize)]
pub(crate) struct WizardRequest {
    #[serde(default)]
    state: WizardState,
    #[serde(flatten)]
    action: WizardAction,
}

pub(crate) async fn wizard_handler<S>(
    State(service): SharedService<S>,
    Json(request): Json<WizardRequest>,
) -> Response
where
    S: AssessmentStore + 'static,
{
    let workflow = AssessmentWorkflow::new(service);
    match workflow.apply(request.state, request.action) {
        Ok(state) => (StatusCode::OK, Json(json!({ "state": state }))).into_response(),
        Err((state, error)) => {
            let (status, report) = match &error {
                WorkflowError::Gate { .. } => (StatusCode::CONFLICT, None),
                WorkflowError::StepSave(report) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, Some(report.clone()))
                }
                WorkflowError::Risk(inner)
                | WorkflowError::Submit(inner)
                | WorkflowError::Resume(inner) => (status_for(inner), None),
            };
            let payload = json!({
                "state": state,
                "error": error.to_string(),
                "report": report,
            });
            (status, Json(payload)).into_response()
        }
    }
}
