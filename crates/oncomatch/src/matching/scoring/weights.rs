use serde::{Deserialize, Serialize};

use super::super::domain::EvidenceLevel;
use super::Criterion;

/// Fixed contribution of each additive criterion to the weighted sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionWeights {
    pub cancer_type: f64,
    pub stage: f64,
    pub biomarker: f64,
    pub performance_status: f64,
    pub organ_function: f64,
    pub prior_treatment: f64,
    pub comorbidity: f64,
    pub age: f64,
}

impl Default for CriterionWeights {
    fn default() -> Self {
        Self {
            cancer_type: 0.25,
            stage: 0.20,
            biomarker: 0.20,
            performance_status: 0.15,
            organ_function: 0.10,
            prior_treatment: 0.05,
            comorbidity: 0.03,
            age: 0.02,
        }
    }
}

impl CriterionWeights {
    /// Weight for an additive criterion; evidence quality is a multiplier and weighs zero here.
    pub fn weight(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::CancerType => self.cancer_type,
            Criterion::Stage => self.stage,
            Criterion::Biomarker => self.biomarker,
            Criterion::PerformanceStatus => self.performance_status,
            Criterion::OrganFunction => self.organ_function,
            Criterion::PriorTreatment => self.prior_treatment,
            Criterion::Comorbidity => self.comorbidity,
            Criterion::Age => self.age,
            Criterion::EvidenceQuality => 0.0,
        }
    }

    pub fn total(&self) -> f64 {
        self.cancer_type
            + self.stage
            + self.biomarker
            + self.performance_status
            + self.organ_function
            + self.prior_treatment
            + self.comorbidity
            + self.age
    }

    /// Weights must sum to 1.0 so a perfect profile scores exactly the evidence bonus.
    pub fn validate(&self) -> bool {
        (self.total() - 1.0).abs() < 1e-9
    }
}

/// Multiplier applied to the weighted sum for the protocol's evidence level.
pub fn evidence_bonus(level: EvidenceLevel) -> f64 {
    match level {
        EvidenceLevel::A => 1.00,
        EvidenceLevel::B => 0.85,
        EvidenceLevel::C => 0.70,
        EvidenceLevel::D => 0.55,
        EvidenceLevel::E => 0.40,
    }
}
