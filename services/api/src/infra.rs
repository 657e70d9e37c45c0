use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use oncomatch::error::AppError;
use oncomatch::matching::{
    PatientId, PatientProfile, PatientRepository, ProtocolCatalog, ProtocolFilters,
    ProtocolRepository, RepositoryError, TreatmentProtocol,
};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, RwLock};
use tracing::info;

const DEMO_CATALOG: &str = include_str!("../data/demo_catalog.json");
const DEMO_PATIENT: &str = include_str!("../data/demo_patient.json");

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Protocol registry held in memory and filtered the way a registry query would be.
#[derive(Default, Clone)]
pub(crate) struct InMemoryProtocolRepository {
    protocols: Arc<RwLock<Vec<TreatmentProtocol>>>,
}

impl InMemoryProtocolRepository {
    pub(crate) fn new(protocols: Vec<TreatmentProtocol>) -> Self {
        Self {
            protocols: Arc::new(RwLock::new(protocols)),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.protocols
            .read()
            .expect("protocol registry lock poisoned")
            .len()
    }
}

#[async_trait]
impl ProtocolRepository for InMemoryProtocolRepository {
    async fn fetch_protocols(
        &self,
        filters: &ProtocolFilters,
    ) -> Result<Vec<TreatmentProtocol>, RepositoryError> {
        let guard = self
            .protocols
            .read()
            .expect("protocol registry lock poisoned");
        Ok(guard
            .iter()
            .filter(|protocol| filters.admits(protocol))
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryPatientRepository {
    records: Arc<Mutex<HashMap<PatientId, PatientProfile>>>,
}

#[async_trait]
impl PatientRepository for InMemoryPatientRepository {
    async fn fetch_patient(&self, id: &PatientId) -> Result<Option<PatientProfile>, RepositoryError> {
        let guard = self.records.lock().expect("patient mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    async fn update_patient(&self, patient: PatientProfile) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("patient mutex poisoned");
        guard.insert(patient.patient_id.clone(), patient);
        Ok(())
    }
}

/// Load the configured catalog, or the bundled demo catalog when none is set.
pub(crate) fn load_protocols(catalog_path: Option<&Path>) -> Result<Vec<TreatmentProtocol>, AppError> {
    match catalog_path {
        Some(path) => {
            let protocols = ProtocolCatalog::from_path(path)?;
            info!(path = %path.display(), protocols = protocols.len(), "loaded protocol catalog");
            Ok(protocols)
        }
        None => demo_protocols(),
    }
}

pub(crate) fn demo_protocols() -> Result<Vec<TreatmentProtocol>, AppError> {
    Ok(ProtocolCatalog::from_reader(Cursor::new(DEMO_CATALOG))?)
}

pub(crate) fn demo_patient() -> Result<PatientProfile, AppError> {
    Ok(serde_json::from_str(DEMO_PATIENT)?)
}

pub(crate) fn read_patient(path: &Path) -> Result<PatientProfile, AppError> {
    let file = std::fs::File::open(path)?;
    Ok(serde_json::from_reader(file)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_demo_data_parses() {
        let protocols = demo_protocols().expect("demo catalog is valid");
        assert_eq!(protocols.len(), 6);
        let patient = demo_patient().expect("demo patient is valid");
        assert_eq!(patient.primary_cancer_type(), Some("lung_adenocarcinoma"));
    }

    #[tokio::test]
    async fn registry_applies_gateway_filters() {
        let repository = InMemoryProtocolRepository::new(demo_protocols().expect("catalog"));
        let mut filters = ProtocolFilters::new(["lung_adenocarcinoma".to_string()]);
        filters.line_of_therapy = Some(1);

        let protocols = repository
            .fetch_protocols(&filters)
            .await
            .expect("fetch succeeds");

        assert!(!protocols.is_empty());
        assert!(protocols
            .iter()
            .all(|protocol| !protocol.is_experimental && protocol.line_of_therapy == Some(1)));
        assert_eq!(repository.len(), 6);
    }

    #[test]
    fn missing_catalog_file_is_an_io_error() {
        let error = load_protocols(Some(Path::new("/nonexistent/catalog.json")))
            .expect_err("missing file rejected");
        assert!(matches!(
            error,
            AppError::Catalog(oncomatch::matching::CatalogError::Io(_))
        ));
    }
}
