//! Treatment protocol matching for oncology patients.
//!
//! A [`MatchingEngine`] fetches candidate protocols through a cached gateway,
//! scores each candidate against the patient on nine clinical criteria, checks
//! hard eligibility rules and contraindications, estimates toxicity risk, and
//! returns explainable results ranked by match score.

pub mod cache;
pub mod catalog;
pub mod contraindications;
pub mod domain;
pub mod eligibility;
pub mod engine;
pub mod gateway;
pub mod outcome;
pub mod report;
pub mod request;
pub mod router;
pub mod safety;
pub mod scoring;
pub mod service;
pub mod terminology;

#[cfg(test)]
mod tests;

pub use cache::{Clock, ManualClock, ProtocolCache, SystemClock};
pub use catalog::{CatalogError, ProtocolCatalog};
pub use contraindications::{
    Contraindication, ContraindicationDetector, ContraindicationKind, ContraindicationSource,
};
pub use domain::{
    AgeRange, BiomarkerRequirement, BiomarkerResult, BiomarkerStatus, ClinicalImpact,
    ClinicalTrialLink, Comorbidity, ComorbiditySeverity, Demographics, DiseaseStatus, EcogRange,
    EligibilityCriteria, EvidenceLevel, HematologicPanel, HepaticPanel, LaboratoryValues,
    OrganFunctionThresholds, PatientId, PatientProfile, PerformanceMetrics, PriorTreatment,
    ProtocolContraindication, ProtocolDefect, ProtocolDrug, ProtocolId, RenalPanel, Sex,
    ToxicityProfile, TreatmentImpact, TreatmentIntent, TreatmentProtocol, TreatmentResponse,
};
pub use eligibility::{
    EligibilityAssessment, EligibilityAssessor, EligibilityRule, EligibilityViolation,
    ViolationSeverity,
};
pub use engine::{
    rank_results, MatchingEngine, MatchingError, MatchingSettings, ValidationError,
    DEFAULT_MAX_RESULTS, MINIMUM_MATCH_SCORE,
};
pub use gateway::{
    CachedProtocolGateway, GatewayError, PatientRepository, ProtocolFilters, ProtocolRepository,
    RepositoryError,
};
pub use outcome::{derive_confidence, ConfidenceLevel, MatchingResult};
pub use request::MatchingRequest;
pub use router::{matching_router, MatchPayload, MatchResponse};
pub use safety::{MonitoringIntensity, RiskLevel, SafetyAssessment, SafetyAssessor};
pub use scoring::{Criterion, CriterionWeights, ScoreBreakdown, ScoreCalculator, ScoreComponent};
pub use service::{MatchingServiceError, ProtocolMatchingService};
pub use terminology::{ConditionCode, ConditionMatchMode, ConditionMatcher, MatchBasis};
