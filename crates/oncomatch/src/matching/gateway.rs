use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cache::ProtocolCache;
use super::domain::{PatientId, PatientProfile, TreatmentProtocol};
use super::terminology::same_cancer_type;

/// Query sent to the protocol store; also the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProtocolFilters {
    pub cancer_type_ids: BTreeSet<String>,
    pub line_of_therapy: Option<u8>,
    pub is_active: Option<bool>,
    pub include_experimental: bool,
}

impl ProtocolFilters {
    pub fn new(cancer_type_ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            cancer_type_ids: cancer_type_ids.into_iter().collect(),
            line_of_therapy: None,
            is_active: Some(true),
            include_experimental: false,
        }
    }

    /// Stable textual form used in logs.
    pub fn signature(&self) -> String {
        let ids: Vec<&str> = self.cancer_type_ids.iter().map(String::as_str).collect();
        format!(
            "types={};line={};active={};experimental={}",
            ids.join(","),
            self.line_of_therapy
                .map(|line| line.to_string())
                .unwrap_or_else(|| "any".to_string()),
            self.is_active
                .map(|active| active.to_string())
                .unwrap_or_else(|| "any".to_string()),
            self.include_experimental
        )
    }

    /// Whether a protocol satisfies these filters; stores may use this as their query predicate.
    pub fn admits(&self, protocol: &TreatmentProtocol) -> bool {
        let type_matches = protocol.cancer_types.iter().any(|cancer_type| {
            self.cancer_type_ids
                .iter()
                .any(|id| same_cancer_type(id, cancer_type))
        });
        let line_matches = match (self.line_of_therapy, protocol.line_of_therapy) {
            (Some(requested), Some(declared)) => requested == declared,
            _ => true,
        };
        let active_matches = self
            .is_active
            .map(|active| protocol.is_active == active)
            .unwrap_or(true);
        let experimental_matches = self.include_experimental || !protocol.is_experimental;

        type_matches && line_matches && active_matches && experimental_matches
    }
}

/// Read contract of the external protocol store.
#[async_trait]
pub trait ProtocolRepository: Send + Sync {
    async fn fetch_protocols(
        &self,
        filters: &ProtocolFilters,
    ) -> Result<Vec<TreatmentProtocol>, RepositoryError>;
}

/// Patient record contract of the external data store.
#[async_trait]
pub trait PatientRepository: Send + Sync {
    async fn fetch_patient(&self, id: &PatientId) -> Result<Option<PatientProfile>, RepositoryError>;
    async fn update_patient(&self, patient: PatientProfile) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("protocol fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("protocol fetch failed: {0}")]
    Repository(#[from] RepositoryError),
}

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Read-through cache in front of a [`ProtocolRepository`].
pub struct CachedProtocolGateway<R> {
    repository: Arc<R>,
    cache: ProtocolCache,
    fetch_timeout: Duration,
}

impl<R> CachedProtocolGateway<R>
where
    R: ProtocolRepository + 'static,
{
    pub fn new(repository: Arc<R>, cache: ProtocolCache, fetch_timeout: Duration) -> Self {
        Self {
            repository,
            cache,
            fetch_timeout,
        }
    }

    pub fn cache(&self) -> &ProtocolCache {
        &self.cache
    }

    pub async fn protocols(
        &self,
        filters: &ProtocolFilters,
    ) -> Result<Arc<Vec<TreatmentProtocol>>, GatewayError> {
        if let Some(hit) = self.cache.get(filters) {
            debug!(filters = %filters.signature(), count = hit.len(), "protocol cache hit");
            return Ok(hit);
        }

        debug!(filters = %filters.signature(), "protocol cache miss");
        let fetched = tokio::time::timeout(
            self.fetch_timeout,
            self.repository.fetch_protocols(filters),
        )
        .await
        .map_err(|_| GatewayError::Timeout(self.fetch_timeout))??;

        Ok(self.cache.insert(filters.clone(), fetched))
    }
}
