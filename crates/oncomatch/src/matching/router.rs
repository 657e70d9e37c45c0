use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{PatientId, PatientProfile};
use super::engine::MatchingError;
use super::gateway::{GatewayError, PatientRepository, ProtocolRepository, RepositoryError};
use super::outcome::MatchingResult;
use super::request::MatchingRequest;
use super::service::{MatchingServiceError, ProtocolMatchingService};

/// Ad-hoc matching payload: a full patient snapshot plus request options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchPayload {
    pub patient: PatientProfile,
    #[serde(default)]
    pub options: MatchingRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResponse {
    pub patient_id: PatientId,
    pub results: Vec<MatchingResult>,
}

/// Router builder exposing the matching endpoints.
pub fn matching_router<R, P>(service: Arc<ProtocolMatchingService<R, P>>) -> Router
where
    R: ProtocolRepository + 'static,
    P: PatientRepository + 'static,
{
    Router::new()
        .route("/api/v1/matching", post(match_handler::<R, P>))
        .route(
            "/api/v1/patients/:patient_id/matches",
            post(stored_patient_handler::<R, P>),
        )
        .route(
            "/api/v1/patients/:patient_id",
            put(update_patient_handler::<R, P>),
        )
        .with_state(service)
}

pub(crate) async fn match_handler<R, P>(
    State(service): State<Arc<ProtocolMatchingService<R, P>>>,
    axum::Json(payload): axum::Json<MatchPayload>,
) -> Response
where
    R: ProtocolRepository + 'static,
    P: PatientRepository + 'static,
{
    match service.match_profile(&payload.patient, &payload.options).await {
        Ok(results) => {
            let body = MatchResponse {
                patient_id: payload.patient.patient_id,
                results,
            };
            (StatusCode::OK, axum::Json(body)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn stored_patient_handler<R, P>(
    State(service): State<Arc<ProtocolMatchingService<R, P>>>,
    Path(patient_id): Path<String>,
    axum::Json(options): axum::Json<MatchingRequest>,
) -> Response
where
    R: ProtocolRepository + 'static,
    P: PatientRepository + 'static,
{
    let id = PatientId(patient_id);
    match service.match_patient(&id, &options).await {
        Ok(results) => {
            let body = MatchResponse {
                patient_id: id,
                results,
            };
            (StatusCode::OK, axum::Json(body)).into_response()
        }
        Err(MatchingServiceError::Repository(RepositoryError::NotFound)) => {
            let payload = json!({
                "error": format!("patient {} not found", id),
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_patient_handler<R, P>(
    State(service): State<Arc<ProtocolMatchingService<R, P>>>,
    Path(patient_id): Path<String>,
    axum::Json(patient): axum::Json<PatientProfile>,
) -> Response
where
    R: ProtocolRepository + 'static,
    P: PatientRepository + 'static,
{
    if patient.patient_id.0 != patient_id {
        let payload = json!({
            "error": format!(
                "path patient {} does not match body patient {}",
                patient_id, patient.patient_id
            ),
        });
        return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response();
    }

    match service.update_patient(patient).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: MatchingServiceError) -> Response {
    let status = match &error {
        MatchingServiceError::Matching(MatchingError::Validation(_)) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        MatchingServiceError::Matching(MatchingError::Upstream(GatewayError::Timeout(_))) => {
            StatusCode::GATEWAY_TIMEOUT
        }
        MatchingServiceError::Matching(MatchingError::Upstream(_)) => StatusCode::BAD_GATEWAY,
        MatchingServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        MatchingServiceError::Matching(MatchingError::AllCandidatesRejected { .. })
        | MatchingServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
