use super::common::*;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::matching::domain::PatientId;
use crate::matching::gateway::PatientRepository;
use crate::matching::request::MatchingRequest;
use crate::matching::router::{
    match_handler, matching_router, stored_patient_handler, update_patient_handler, MatchPayload,
};

fn json_request(method: &str, uri: &str, body: Value) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn matching_route_returns_ranked_results() {
    let repository = Arc::new(MemoryProtocolRepository::with_protocols(vec![
        egfr_protocol("nsclc-osimertinib"),
        protocol("nsclc-platinum"),
    ]));
    let (service, _) = build_service(repository);
    let router = matching_router(Arc::new(service));

    let body = json!({
        "patient": patient(),
        "options": { "max_results": 5 },
    });
    let response = router
        .oneshot(json_request("POST", "/api/v1/matching", body))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(
        payload.get("patient_id").and_then(Value::as_str),
        Some("pt-001")
    );
    let results = payload
        .get("results")
        .and_then(Value::as_array)
        .expect("results array");
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|result| {
        result
            .get("match_score")
            .and_then(Value::as_f64)
            .is_some_and(|score| (0.0..=1.0).contains(&score))
    }));
    assert!(results[0].get("rationale").and_then(Value::as_str).is_some());
}

#[tokio::test]
async fn match_handler_rejects_blank_cancer_type() {
    let repository = Arc::new(MemoryProtocolRepository::with_protocols(vec![protocol(
        "nsclc-platinum",
    )]));
    let (service, _) = build_service(repository.clone());
    let mut patient = patient();
    patient.disease_status.primary_cancer_type = Some("   ".to_string());

    let response = match_handler::<MemoryProtocolRepository, MemoryPatientRepository>(
        State(Arc::new(service)),
        axum::Json(MatchPayload {
            patient,
            options: MatchingRequest::default(),
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(repository.calls(), 0);
    let payload = read_json_body(response).await;
    assert!(payload
        .get("error")
        .and_then(Value::as_str)
        .is_some_and(|message| message.contains("cancer type")));
}

#[tokio::test]
async fn stored_patient_handler_returns_not_found_for_unknown_patient() {
    let repository = Arc::new(MemoryProtocolRepository::default());
    let (service, _) = build_service(repository);

    let response = stored_patient_handler::<MemoryProtocolRepository, MemoryPatientRepository>(
        State(Arc::new(service)),
        Path("pt-404".to_string()),
        axum::Json(MatchingRequest::default()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert_eq!(
        payload.get("error").and_then(Value::as_str),
        Some("patient pt-404 not found")
    );
}

#[tokio::test]
async fn updated_patient_can_be_matched_by_id() {
    let repository = Arc::new(MemoryProtocolRepository::with_protocols(vec![protocol(
        "nsclc-platinum",
    )]));
    let (service, patients) = build_service(repository);
    let router = matching_router(Arc::new(service));

    let response = router
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/v1/patients/pt-001",
            serde_json::to_value(patient()).unwrap(),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let stored = patients
        .fetch_patient(&PatientId("pt-001".to_string()))
        .await
        .expect("fetch succeeds");
    assert!(stored.is_some());

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/patients/pt-001/matches",
            json!({}),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let results = payload
        .get("results")
        .and_then(Value::as_array)
        .expect("results array");
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].get("protocol_id").and_then(Value::as_str),
        Some("nsclc-platinum")
    );
}

#[tokio::test]
async fn update_handler_rejects_mismatched_patient_id() {
    let repository = Arc::new(MemoryProtocolRepository::default());
    let (service, patients) = build_service(repository);

    let response = update_patient_handler::<MemoryProtocolRepository, MemoryPatientRepository>(
        State(Arc::new(service)),
        Path("pt-999".to_string()),
        axum::Json(patient()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(patients.records.lock().unwrap().is_empty());
}

#[tokio::test]
async fn match_handler_reports_gateway_timeout() {
    let (service, _) = build_service(Arc::new(SlowProtocolRepository));

    let response = match_handler::<SlowProtocolRepository, MemoryPatientRepository>(
        State(Arc::new(service)),
        axum::Json(MatchPayload {
            patient: patient(),
            options: MatchingRequest::default(),
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn match_handler_reports_bad_gateway_when_registry_is_down() {
    let (service, _) = build_service(Arc::new(UnavailableProtocolRepository));

    let response = match_handler::<UnavailableProtocolRepository, MemoryPatientRepository>(
        State(Arc::new(service)),
        axum::Json(MatchPayload {
            patient: patient(),
            options: MatchingRequest::default(),
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let payload = read_json_body(response).await;
    let message = payload
        .get("error")
        .and_then(Value::as_str)
        .expect("error message");
    assert!(message.contains("protocol registry offline"), "{message}");
}
