use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for patient records held by the external data store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatientId(pub String);

/// Identifier wrapper for treatment protocols.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProtocolId(pub String);

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of a patient's clinical state at scoring time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub patient_id: PatientId,
    #[serde(default)]
    pub demographics: Demographics,
    #[serde(default)]
    pub disease_status: DiseaseStatus,
    #[serde(default)]
    pub performance: PerformanceMetrics,
    #[serde(default)]
    pub laboratory: LaboratoryValues,
    #[serde(default)]
    pub comorbidities: Vec<Comorbidity>,
    #[serde(default)]
    pub treatment_history: Vec<PriorTreatment>,
}

impl PatientProfile {
    /// Primary cancer type with blank values treated as missing.
    pub fn primary_cancer_type(&self) -> Option<&str> {
        self.disease_status
            .primary_cancer_type
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn ecog(&self) -> Option<u8> {
        self.performance.ecog
    }

    /// Look up a biomarker result, falling back to a case-insensitive key match.
    pub fn biomarker(&self, biomarker_id: &str) -> Option<&BiomarkerResult> {
        let biomarkers = &self.disease_status.biomarkers;
        biomarkers.get(biomarker_id).or_else(|| {
            biomarkers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(biomarker_id))
                .map(|(_, result)| result)
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demographics {
    pub age: Option<u8>,
    pub sex: Option<Sex>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Female,
    Male,
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiseaseStatus {
    pub primary_cancer_type: Option<String>,
    pub stage: Option<String>,
    #[serde(default)]
    pub biomarkers: BTreeMap<String, BiomarkerResult>,
}

/// Recorded biomarker test result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomarkerResult {
    pub status: BiomarkerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tested_on: Option<NaiveDate>,
}

impl BiomarkerResult {
    pub fn new(status: BiomarkerStatus) -> Self {
        Self {
            status,
            value: None,
            tested_on: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiomarkerStatus {
    Positive,
    Negative,
    Pending,
    Equivocal,
}

impl BiomarkerStatus {
    pub const fn label(self) -> &'static str {
        match self {
            BiomarkerStatus::Positive => "positive",
            BiomarkerStatus::Negative => "negative",
            BiomarkerStatus::Pending => "pending",
            BiomarkerStatus::Equivocal => "equivocal",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub ecog: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaboratoryValues {
    #[serde(default)]
    pub renal: RenalPanel,
    #[serde(default)]
    pub hepatic: HepaticPanel,
    #[serde(default)]
    pub hematologic: HematologicPanel,
}

/// Serum creatinine in mg/dL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenalPanel {
    pub creatinine: Option<f64>,
    pub creatinine_clearance: Option<f64>,
}

/// Total bilirubin in mg/dL, transaminases in U/L.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HepaticPanel {
    pub bilirubin: Option<f64>,
    pub alt: Option<f64>,
    pub ast: Option<f64>,
}

/// Absolute neutrophil count in 10^9/L.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HematologicPanel {
    pub anc: Option<f64>,
    pub platelets: Option<f64>,
    pub hemoglobin: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comorbidity {
    pub condition: String,
    pub severity: ComorbiditySeverity,
    pub impact: TreatmentImpact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComorbiditySeverity {
    Mild,
    Moderate,
    Severe,
}

/// How strongly a comorbidity is expected to interfere with treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreatmentImpact {
    None,
    Minimal,
    Moderate,
    Significant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorTreatment {
    pub protocol_id: ProtocolId,
    pub best_response: Option<TreatmentResponse>,
    pub discontinuation_reason: Option<String>,
}

impl PriorTreatment {
    pub fn ended_in_progression(&self) -> bool {
        self.best_response == Some(TreatmentResponse::ProgressiveDisease)
    }

    pub fn discontinued_for_resistance(&self) -> bool {
        self.discontinuation_reason
            .as_deref()
            .map(|reason| reason.to_ascii_lowercase().contains("resist"))
            .unwrap_or(false)
    }
}

/// RECIST-style best response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreatmentResponse {
    CompleteResponse,
    PartialResponse,
    StableDisease,
    ProgressiveDisease,
}

/// Declarative description of an eligible treatment regimen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentProtocol {
    pub id: ProtocolId,
    pub name: String,
    pub cancer_types: Vec<String>,
    #[serde(default)]
    pub line_of_therapy: Option<u8>,
    #[serde(default)]
    pub treatment_intent: Option<TreatmentIntent>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub is_experimental: bool,
    #[serde(default)]
    pub eligibility: EligibilityCriteria,
    #[serde(default)]
    pub biomarker_requirements: Vec<BiomarkerRequirement>,
    #[serde(default)]
    pub drugs: Vec<ProtocolDrug>,
    pub evidence_level: EvidenceLevel,
    #[serde(default)]
    pub contraindications: Vec<ProtocolContraindication>,
    #[serde(default)]
    pub toxicity: ToxicityProfile,
    #[serde(default)]
    pub clinical_trial: Option<ClinicalTrialLink>,
}

fn default_active() -> bool {
    true
}

impl TreatmentProtocol {
    /// Reject records whose declared criteria cannot be evaluated.
    pub fn validate(&self) -> Result<(), ProtocolDefect> {
        if self
            .cancer_types
            .iter()
            .all(|cancer_type| cancer_type.trim().is_empty())
        {
            return Err(ProtocolDefect::NoCancerTypes);
        }

        if let Some(range) = &self.eligibility.ecog_range {
            if range.min > range.max || range.max > 4 {
                return Err(ProtocolDefect::InvalidEcogRange {
                    min: range.min,
                    max: range.max,
                });
            }
        }

        if let Some(range) = &self.eligibility.age_range {
            if range.min > range.max {
                return Err(ProtocolDefect::InvalidAgeRange {
                    min: range.min,
                    max: range.max,
                });
            }
        }

        let organ = &self.eligibility.organ_function;
        for (name, threshold) in [
            ("creatinine_max", organ.creatinine_max),
            ("bilirubin_max", organ.bilirubin_max),
            ("anc_min", organ.anc_min),
        ] {
            if let Some(value) = threshold {
                if !value.is_finite() || value <= 0.0 {
                    return Err(ProtocolDefect::InvalidOrganThreshold { name, value });
                }
            }
        }

        for rate in [
            self.toxicity.grade_3_4_rate,
            self.toxicity.discontinuation_rate,
            self.toxicity.hospitalization_rate,
        ]
        .into_iter()
        .flatten()
        {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ProtocolDefect::InvalidToxicityRate(rate));
            }
        }

        Ok(())
    }

    pub fn accepts_any_stage(&self) -> bool {
        self.eligibility
            .stages
            .iter()
            .any(|stage| stage.trim().eq_ignore_ascii_case("any"))
    }
}

/// Reasons a single protocol record is unusable for scoring.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolDefect {
    #[error("protocol declares no cancer types")]
    NoCancerTypes,
    #[error("ECOG range {min}..={max} is not a valid 0-4 range")]
    InvalidEcogRange { min: u8, max: u8 },
    #[error("age range {min}..={max} is inverted")]
    InvalidAgeRange { min: u8, max: u8 },
    #[error("organ threshold {name} has unusable value {value}")]
    InvalidOrganThreshold { name: &'static str, value: f64 },
    #[error("toxicity rate {0} is outside 0..=1")]
    InvalidToxicityRate(f64),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EligibilityCriteria {
    #[serde(default)]
    pub stages: Vec<String>,
    #[serde(default)]
    pub ecog_range: Option<EcogRange>,
    #[serde(default)]
    pub age_range: Option<AgeRange>,
    #[serde(default)]
    pub organ_function: OrganFunctionThresholds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcogRange {
    pub min: u8,
    pub max: u8,
}

impl EcogRange {
    pub fn contains(&self, ecog: u8) -> bool {
        (self.min..=self.max).contains(&ecog)
    }

    /// Distance from `ecog` to the nearest bound, zero when inside.
    pub fn distance(&self, ecog: u8) -> u8 {
        if ecog < self.min {
            self.min - ecog
        } else {
            ecog.saturating_sub(self.max)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeRange {
    pub min: u8,
    pub max: u8,
}

impl AgeRange {
    pub fn contains(&self, age: u8) -> bool {
        (self.min..=self.max).contains(&age)
    }

    pub fn distance(&self, age: u8) -> u8 {
        if age < self.min {
            self.min - age
        } else {
            age.saturating_sub(self.max)
        }
    }
}

/// Laboratory thresholds a protocol requires before dosing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganFunctionThresholds {
    pub creatinine_max: Option<f64>,
    pub bilirubin_max: Option<f64>,
    pub anc_min: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiomarkerRequirement {
    pub biomarker_id: String,
    pub required_status: BiomarkerStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolDrug {
    pub name: String,
    #[serde(default)]
    pub drug_class: Option<String>,
}

/// Ordinal evidence rating; `A` is the strongest and sorts first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum EvidenceLevel {
    A,
    B,
    C,
    D,
    E,
}

impl EvidenceLevel {
    pub const fn label(self) -> &'static str {
        match self {
            EvidenceLevel::A => "A",
            EvidenceLevel::B => "B",
            EvidenceLevel::C => "C",
            EvidenceLevel::D => "D",
            EvidenceLevel::E => "E",
        }
    }

    /// True when `self` is weaker evidence than `minimum`.
    pub fn is_weaker_than(self, minimum: EvidenceLevel) -> bool {
        self > minimum
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreatmentIntent {
    Curative,
    Palliative,
    Adjuvant,
    Neoadjuvant,
    Maintenance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolContraindication {
    pub condition: String,
    pub impact: ClinicalImpact,
    #[serde(default)]
    pub alternative_approach: Option<String>,
}

/// Clinical weight a protocol assigns to a declared contraindication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClinicalImpact {
    Absolute,
    Relative,
    MonitoringRequired,
}

/// Published toxicity rates for the regimen, when known.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToxicityProfile {
    pub grade_3_4_rate: Option<f64>,
    pub discontinuation_rate: Option<f64>,
    pub hospitalization_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalTrialLink {
    pub registry_id: String,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub recruiting: bool,
}
