use std::sync::Arc;

use tracing::debug;

use super::domain::{PatientId, PatientProfile};
use super::engine::{MatchingEngine, MatchingError};
use super::gateway::{PatientRepository, ProtocolRepository, RepositoryError};
use super::outcome::MatchingResult;
use super::request::MatchingRequest;

/// Service composing the matching engine with the patient record store.
pub struct ProtocolMatchingService<R, P> {
    engine: Arc<MatchingEngine<R>>,
    patients: Arc<P>,
}

impl<R, P> ProtocolMatchingService<R, P>
where
    R: ProtocolRepository + 'static,
    P: PatientRepository + 'static,
{
    pub fn new(engine: Arc<MatchingEngine<R>>, patients: Arc<P>) -> Self {
        Self { engine, patients }
    }

    pub fn engine(&self) -> &MatchingEngine<R> {
        &self.engine
    }

    /// Match a caller-supplied profile without touching the patient store.
    pub async fn match_profile(
        &self,
        patient: &PatientProfile,
        request: &MatchingRequest,
    ) -> Result<Vec<MatchingResult>, MatchingServiceError> {
        let results = self.engine.find_matching_protocols(patient, request).await?;
        Ok(results)
    }

    /// Load a stored patient and match it.
    pub async fn match_patient(
        &self,
        patient_id: &PatientId,
        request: &MatchingRequest,
    ) -> Result<Vec<MatchingResult>, MatchingServiceError> {
        let patient = self.patient(patient_id).await?;
        self.match_profile(&patient, request).await
    }

    pub async fn patient(&self, patient_id: &PatientId) -> Result<PatientProfile, MatchingServiceError> {
        let patient = self
            .patients
            .fetch_patient(patient_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        Ok(patient)
    }

    /// Replace the stored record; cached protocol snapshots are unaffected.
    pub async fn update_patient(&self, patient: PatientProfile) -> Result<(), MatchingServiceError> {
        debug!(patient_id = %patient.patient_id, "updating patient record");
        self.patients.update_patient(patient).await?;
        Ok(())
    }
}

/// Error raised by the matching service.
#[derive(Debug, thiserror::Error)]
pub enum MatchingServiceError {
    #[error(transparent)]
    Matching(#[from] MatchingError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
