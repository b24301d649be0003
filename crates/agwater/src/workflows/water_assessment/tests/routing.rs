use super::common::*;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::workflows::water_assessment::router::{create_handler, risk_handler};
use crate::workflows::water_assessment::AssessmentService;

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn new_assessment_body() -> Value {
    json!({
        "farm_id": "farm-17",
        "season_year": 2025,
        "assessment_date": "2025-05-01",
    })
}

#[tokio::test]
async fn create_route_returns_created_assessment() {
    let (service, _) = build_service();
    let router = assessment_router_with_service(service);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/water-assessments",
            new_assessment_body(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    assert_eq!(body["status"], "draft");
    assert_eq!(body["farm_id"], "farm-17");
}

#[tokio::test]
async fn create_handler_maps_validation_to_unprocessable() {
    let (service, _) = build_service();
    let mut input = new_assessment();
    input.season_year = 1950;

    let response = create_handler::<MemoryStore>(State(Arc::new(service)), axum::Json(input)).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert_eq!(body["fields"][0]["field"], "season_year");
}

#[tokio::test]
async fn create_handler_maps_store_outage_to_service_unavailable() {
    let service = AssessmentService::new(Arc::new(UnavailableStore), evaluation_config());

    let response =
        create_handler::<UnavailableStore>(State(Arc::new(service)), axum::Json(new_assessment()))
            .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn risk_handler_reports_incomplete_data_as_conflict() {
    let (service, _) = build_service();
    let assessment = service
        .create_assessment(new_assessment())
        .expect("create assessment");

    let response = risk_handler::<MemoryStore>(
        State(Arc::new(service)),
        Path(assessment.id.to_string()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_assessment_is_not_found() {
    let (service, _) = build_service();
    let router = assessment_router_with_service(service);

    let response = router
        .oneshot(
            Request::get("/api/v1/water-assessments/wra-000000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sub_entity_routes_drive_a_full_assessment() {
    let (service, _) = build_service();
    let assessment = service
        .create_assessment(new_assessment())
        .expect("create assessment");
    let base = format!("/api/v1/water-assessments/{}", assessment.id);
    let router = assessment_router_with_service(service);

    let requests = [
        json_request(
            "PUT",
            &format!("{base}/sources/canal"),
            json!({
                "physical_condition": "good",
                "testing_frequency": "annual",
                "ecoli_gm": 500.0,
            }),
        ),
        json_request(
            "PUT",
            &format!("{base}/fields/north-40"),
            json!({
                "application_method": "overhead",
                "crop_contact_type": "direct",
                "die_off_period_adequate": false,
            }),
        ),
        json_request(
            "PUT",
            &format!("{base}/environmental"),
            json!({ "wildlife_pressure": "medium" }),
        ),
    ];
    for request in requests {
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = router
        .clone()
        .oneshot(json_request("POST", &format!("{base}/risk"), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let risk = read_json_body(response).await;
    assert_eq!(risk["fda_determination"], "die_off_required");
    assert_eq!(risk["required_die_off_days"], 2);

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("{base}/approve"),
            json!({ "approved_by": "Food Safety Manager" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("{base}/submit"),
            json!({ "signer_name": "Rosa Delgado", "signature_blob": "sig:rosa" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(
            Request::get(base.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = read_json_body(response).await;
    assert_eq!(body["summary"]["status"], "submitted");
    assert_eq!(body["record"]["sources"][0]["meets_gm_threshold"], false);
}

#[tokio::test]
async fn die_off_route_computes_interval() {
    let (service, _) = build_service();
    let router = assessment_router_with_service(service);

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/die-off",
            json!({ "ecoli_gm": 252.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["required_die_off_days"], 1);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/die-off",
            json!({ "ecoli_gm": 0.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn wizard_route_applies_actions_and_reports_gates() {
    let (service, _) = build_service();
    let router = assessment_router_with_service(service);

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/assessment-wizard",
            json!({
                "action": "advance",
                "state": { "farm_id": "farm-17", "season_year": 2025 },
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["state"]["step"], "source_selection");
    let state = body["state"].clone();

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/assessment-wizard",
            json!({ "action": "advance", "state": state }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = read_json_body(response).await;
    assert_eq!(body["state"]["step"], "source_selection");
    assert!(body["error"]
        .as_str()
        .expect("error message")
        .contains("select at least one water source"));
}
