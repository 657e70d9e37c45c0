use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{TimeZone, Utc};
use serde_json::Value;

use crate::matching::cache::ManualClock;
use crate::matching::domain::{
    AgeRange, BiomarkerRequirement, BiomarkerResult, BiomarkerStatus, Demographics, DiseaseStatus,
    EcogRange, EligibilityCriteria, EvidenceLevel, HematologicPanel, HepaticPanel,
    LaboratoryValues, OrganFunctionThresholds, PatientId, PatientProfile, PerformanceMetrics,
    ProtocolDrug, ProtocolId, RenalPanel, Sex, ToxicityProfile, TreatmentProtocol,
};
use crate::matching::engine::{MatchingEngine, MatchingSettings};
use crate::matching::gateway::{
    PatientRepository, ProtocolFilters, ProtocolRepository, RepositoryError,
};
use crate::matching::service::ProtocolMatchingService;

pub(super) fn patient() -> PatientProfile {
    let mut biomarkers = BTreeMap::new();
    biomarkers.insert(
        "EGFR".to_string(),
        BiomarkerResult::new(BiomarkerStatus::Positive),
    );

    PatientProfile {
        patient_id: PatientId("pt-001".to_string()),
        demographics: Demographics {
            age: Some(62),
            sex: Some(Sex::Female),
        },
        disease_status: DiseaseStatus {
            primary_cancer_type: Some("lung_adenocarcinoma".to_string()),
            stage: Some("II".to_string()),
            biomarkers,
        },
        performance: PerformanceMetrics { ecog: Some(0) },
        laboratory: LaboratoryValues {
            renal: RenalPanel {
                creatinine: Some(0.9),
                creatinine_clearance: Some(88.0),
            },
            hepatic: HepaticPanel {
                bilirubin: Some(0.6),
                alt: Some(22.0),
                ast: Some(25.0),
            },
            hematologic: HematologicPanel {
                anc: Some(3.2),
                platelets: Some(240.0),
                hemoglobin: Some(13.1),
            },
        },
        comorbidities: Vec::new(),
        treatment_history: Vec::new(),
    }
}

/// Platinum doublet for stage II-III lung adenocarcinoma; a perfect fit for [`patient`].
pub(super) fn protocol(id: &str) -> TreatmentProtocol {
    TreatmentProtocol {
        id: ProtocolId(id.to_string()),
        name: format!("Protocol {id}"),
        cancer_types: vec!["lung_adenocarcinoma".to_string()],
        line_of_therapy: Some(1),
        treatment_intent: None,
        is_active: true,
        is_experimental: false,
        eligibility: EligibilityCriteria {
            stages: vec!["II".to_string(), "III".to_string()],
            ecog_range: Some(EcogRange { min: 0, max: 2 }),
            age_range: Some(AgeRange { min: 18, max: 85 }),
            organ_function: OrganFunctionThresholds {
                creatinine_max: Some(1.5),
                bilirubin_max: Some(1.5),
                anc_min: Some(1.5),
            },
        },
        biomarker_requirements: Vec::new(),
        drugs: vec![
            ProtocolDrug {
                name: "cisplatin".to_string(),
                drug_class: Some("platinum".to_string()),
            },
            ProtocolDrug {
                name: "pemetrexed".to_string(),
                drug_class: Some("antifolate".to_string()),
            },
        ],
        evidence_level: EvidenceLevel::A,
        contraindications: Vec::new(),
        toxicity: ToxicityProfile {
            grade_3_4_rate: Some(0.25),
            discontinuation_rate: Some(0.1),
            hospitalization_rate: Some(0.12),
        },
        clinical_trial: None,
    }
}

pub(super) fn egfr_protocol(id: &str) -> TreatmentProtocol {
    let mut protocol = protocol(id);
    protocol.name = "Osimertinib".to_string();
    protocol.drugs = vec![ProtocolDrug {
        name: "osimertinib".to_string(),
        drug_class: Some("EGFR TKI".to_string()),
    }];
    protocol.biomarker_requirements = vec![BiomarkerRequirement {
        biomarker_id: "EGFR".to_string(),
        required_status: BiomarkerStatus::Positive,
    }];
    protocol
}

pub(super) fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
    ))
}

pub(super) fn settings() -> MatchingSettings {
    MatchingSettings {
        fetch_timeout: Duration::from_millis(50),
        ..MatchingSettings::default()
    }
}

pub(super) fn engine_with<R: ProtocolRepository + 'static>(repository: Arc<R>) -> MatchingEngine<R> {
    MatchingEngine::with_clock(repository, settings(), clock())
}

pub(super) fn build_engine(
    protocols: Vec<TreatmentProtocol>,
) -> (MatchingEngine<MemoryProtocolRepository>, Arc<MemoryProtocolRepository>) {
    let repository = Arc::new(MemoryProtocolRepository::with_protocols(protocols));
    (engine_with(repository.clone()), repository)
}

pub(super) fn build_service<R: ProtocolRepository + 'static>(
    repository: Arc<R>,
) -> (
    ProtocolMatchingService<R, MemoryPatientRepository>,
    Arc<MemoryPatientRepository>,
) {
    let patients = Arc::new(MemoryPatientRepository::default());
    let service = ProtocolMatchingService::new(Arc::new(engine_with(repository)), patients.clone());
    (service, patients)
}

/// Protocol store answering with every stored protocol the filters admit.
#[derive(Default)]
pub(super) struct MemoryProtocolRepository {
    protocols: Mutex<Vec<TreatmentProtocol>>,
    calls: AtomicUsize,
}

impl MemoryProtocolRepository {
    pub(super) fn with_protocols(protocols: Vec<TreatmentProtocol>) -> Self {
        Self {
            protocols: Mutex::new(protocols),
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProtocolRepository for MemoryProtocolRepository {
    async fn fetch_protocols(
        &self,
        filters: &ProtocolFilters,
    ) -> Result<Vec<TreatmentProtocol>, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let guard = self.protocols.lock().expect("protocol mutex poisoned");
        Ok(guard
            .iter()
            .filter(|protocol| filters.admits(protocol))
            .cloned()
            .collect())
    }
}

/// Returns every stored protocol regardless of filters, including defective ones.
pub(super) struct RawProtocolRepository(pub(super) Vec<TreatmentProtocol>);

#[async_trait]
impl ProtocolRepository for RawProtocolRepository {
    async fn fetch_protocols(
        &self,
        _filters: &ProtocolFilters,
    ) -> Result<Vec<TreatmentProtocol>, RepositoryError> {
        Ok(self.0.clone())
    }
}

pub(super) struct UnavailableProtocolRepository;

#[async_trait]
impl ProtocolRepository for UnavailableProtocolRepository {
    async fn fetch_protocols(
        &self,
        _filters: &ProtocolFilters,
    ) -> Result<Vec<TreatmentProtocol>, RepositoryError> {
        Err(RepositoryError::Unavailable("protocol registry offline".to_string()))
    }
}

/// Never answers within the test fetch timeout.
pub(super) struct SlowProtocolRepository;

#[async_trait]
impl ProtocolRepository for SlowProtocolRepository {
    async fn fetch_protocols(
        &self,
        _filters: &ProtocolFilters,
    ) -> Result<Vec<TreatmentProtocol>, RepositoryError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryPatientRepository {
    pub(super) records: Arc<Mutex<HashMap<PatientId, PatientProfile>>>,
}

#[async_trait]
impl PatientRepository for MemoryPatientRepository {
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

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
