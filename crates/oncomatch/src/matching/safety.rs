//! Advisory toxicity estimate. Never feeds the primary match score; the
//! orchestrator only uses it for the optional maximum-risk filter and for
//! required-modification hints.

use serde::{Deserialize, Serialize};

use super::contraindications::{Contraindication, ContraindicationKind};
use super::domain::{PatientProfile, TreatmentImpact, TreatmentProtocol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl RiskLevel {
    fn from_probability(probability: f64) -> Self {
        if probability < 0.2 {
            RiskLevel::Low
        } else if probability < 0.4 {
            RiskLevel::Moderate
        } else if probability < 0.6 {
            RiskLevel::High
        } else {
            RiskLevel::VeryHigh
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringIntensity {
    Standard,
    Enhanced,
    Intensive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyAssessment {
    pub overall_safety_score: f64,
    pub risk_level: RiskLevel,
    pub grade_3_4_toxicity_probability: f64,
    pub discontinuation_probability: f64,
    pub hospitalization_probability: f64,
    pub monitoring_intensity: MonitoringIntensity,
    pub dose_modification_likelihood: f64,
    pub risk_factors: Vec<String>,
}

const PROBABILITY_CAP: f64 = 0.95;

#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyAssessor;

impl SafetyAssessor {
    pub fn assess(
        &self,
        protocol: &TreatmentProtocol,
        patient: &PatientProfile,
        contraindications: &[Contraindication],
    ) -> SafetyAssessment {
        let toxicity = &protocol.toxicity;
        let base_grade_3_4 = toxicity
            .grade_3_4_rate
            .unwrap_or_else(|| regimen_baseline(protocol.drugs.len()));

        let mut multiplier = 1.0;
        let mut risk_factors = Vec::new();

        match patient.demographics.age {
            Some(age) if age >= 75 => {
                multiplier *= 1.3;
                risk_factors.push(format!("age {age}"));
            }
            Some(age) if age >= 65 => {
                multiplier *= 1.15;
                risk_factors.push(format!("age {age}"));
            }
            _ => {}
        }

        if let Some(ecog) = patient.ecog().filter(|ecog| *ecog >= 2) {
            multiplier *= 1.25;
            risk_factors.push(format!("ECOG {ecog}"));
        }

        for comorbidity in &patient.comorbidities {
            if comorbidity.impact == TreatmentImpact::Significant {
                multiplier *= 1.1;
                risk_factors.push(comorbidity.condition.clone());
            }
        }

        let organ_breaches = organ_breaches(protocol, patient);
        for breach in &organ_breaches {
            multiplier *= 1.2;
            risk_factors.push(breach.to_string());
        }

        for contraindication in contraindications {
            match contraindication.kind {
                ContraindicationKind::Absolute => multiplier *= 1.5,
                ContraindicationKind::Relative => multiplier *= 1.15,
                ContraindicationKind::MonitoringRequired => {}
            }
        }

        let grade_3_4 = (base_grade_3_4 * multiplier).clamp(0.0, PROBABILITY_CAP);
        let discontinuation = (toxicity
            .discontinuation_rate
            .unwrap_or(base_grade_3_4 * 0.4)
            * multiplier)
            .clamp(0.0, PROBABILITY_CAP);
        let hospitalization = (toxicity
            .hospitalization_rate
            .unwrap_or(base_grade_3_4 * 0.5)
            * multiplier)
            .clamp(0.0, PROBABILITY_CAP);

        let risk_level = RiskLevel::from_probability(grade_3_4);
        let mut monitoring_intensity = match risk_level {
            RiskLevel::Low => MonitoringIntensity::Standard,
            RiskLevel::Moderate => MonitoringIntensity::Enhanced,
            RiskLevel::High | RiskLevel::VeryHigh => MonitoringIntensity::Intensive,
        };
        if contraindications
            .iter()
            .any(|finding| finding.kind == ContraindicationKind::MonitoringRequired)
        {
            monitoring_intensity = monitoring_intensity.max(MonitoringIntensity::Enhanced);
        }

        let dose_modification_likelihood =
            (grade_3_4 * 1.2 + 0.1 * organ_breaches.len() as f64).clamp(0.0, PROBABILITY_CAP);

        SafetyAssessment {
            overall_safety_score: 1.0 - grade_3_4,
            risk_level,
            grade_3_4_toxicity_probability: grade_3_4,
            discontinuation_probability: discontinuation,
            hospitalization_probability: hospitalization,
            monitoring_intensity,
            dose_modification_likelihood,
            risk_factors,
        }
    }
}

/// Grade 3-4 baseline when the protocol publishes no rate: combinations are more toxic.
fn regimen_baseline(drug_count: usize) -> f64 {
    let extra_agents = drug_count.saturating_sub(1) as f64;
    (0.15 + 0.1 * extra_agents).min(0.6)
}

fn organ_breaches(protocol: &TreatmentProtocol, patient: &PatientProfile) -> Vec<&'static str> {
    let organ = &protocol.eligibility.organ_function;
    let labs = &patient.laboratory;
    let mut breaches = Vec::new();

    if matches!((organ.creatinine_max, labs.renal.creatinine), (Some(max), Some(value)) if value > max)
    {
        breaches.push("elevated creatinine");
    }
    if matches!((organ.bilirubin_max, labs.hepatic.bilirubin), (Some(max), Some(value)) if value > max)
    {
        breaches.push("elevated bilirubin");
    }
    if matches!((organ.anc_min, labs.hematologic.anc), (Some(min), Some(value)) if value < min) {
        breaches.push("low neutrophil count");
    }

    breaches
}
