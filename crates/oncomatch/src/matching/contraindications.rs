use serde::{Deserialize, Serialize};

use super::domain::{
    ClinicalImpact, ComorbiditySeverity, PatientProfile, TreatmentImpact, TreatmentProtocol,
};
use super::terminology::{ConditionMatcher, MatchBasis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContraindicationKind {
    Absolute,
    Relative,
    MonitoringRequired,
}

impl From<ClinicalImpact> for ContraindicationKind {
    fn from(impact: ClinicalImpact) -> Self {
        match impact {
            ClinicalImpact::Absolute => ContraindicationKind::Absolute,
            ClinicalImpact::Relative => ContraindicationKind::Relative,
            ClinicalImpact::MonitoringRequired => ContraindicationKind::MonitoringRequired,
        }
    }
}

/// Where a contraindication finding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContraindicationSource {
    ProtocolExclusion,
    OrganDysfunction,
    Comorbidity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contraindication {
    pub condition: String,
    pub kind: ContraindicationKind,
    pub source: ContraindicationSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_on: Option<MatchBasis>,
    pub override_possible: bool,
    pub alternative_approaches: Vec<String>,
}

impl Contraindication {
    pub fn is_absolute(&self) -> bool {
        self.kind == ContraindicationKind::Absolute
    }
}

/// Organ dysfunction at this multiple of a declared maximum is a relative contraindication.
const ORGAN_DYSFUNCTION_FACTOR: f64 = 1.5;

/// Flags contraindications from declared exclusions, organ dysfunction, and comorbidity burden.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContraindicationDetector {
    matcher: ConditionMatcher,
}

impl ContraindicationDetector {
    pub fn new(matcher: ConditionMatcher) -> Self {
        Self { matcher }
    }

    /// Findings ordered absolute, relative, monitoring; declaration order within a kind.
    pub fn detect(
        &self,
        protocol: &TreatmentProtocol,
        patient: &PatientProfile,
    ) -> Vec<Contraindication> {
        let mut findings = Vec::new();
        let mut covered = vec![false; patient.comorbidities.len()];

        for declared in &protocol.contraindications {
            for (index, comorbidity) in patient.comorbidities.iter().enumerate() {
                let Some(basis) = self
                    .matcher
                    .matches(&comorbidity.condition, &declared.condition)
                else {
                    continue;
                };
                covered[index] = true;

                let kind = ContraindicationKind::from(declared.impact);
                let mut alternative_approaches = Vec::new();
                if let Some(approach) = &declared.alternative_approach {
                    alternative_approaches.push(approach.clone());
                }
                alternative_approaches.extend(default_approaches(kind, &declared.condition));

                findings.push(Contraindication {
                    condition: format!("{} ({})", declared.condition, comorbidity.condition),
                    kind,
                    source: ContraindicationSource::ProtocolExclusion,
                    matched_on: Some(basis),
                    override_possible: kind != ContraindicationKind::Absolute,
                    alternative_approaches,
                });
                break;
            }
        }

        findings.extend(self.organ_dysfunction(protocol, patient));

        for (comorbidity, covered) in patient.comorbidities.iter().zip(covered) {
            if covered {
                continue;
            }
            if comorbidity.severity == ComorbiditySeverity::Severe
                && comorbidity.impact == TreatmentImpact::Significant
            {
                findings.push(Contraindication {
                    condition: comorbidity.condition.clone(),
                    kind: ContraindicationKind::MonitoringRequired,
                    source: ContraindicationSource::Comorbidity,
                    matched_on: None,
                    override_possible: true,
                    alternative_approaches: vec![format!(
                        "Specialist co-management of {}",
                        comorbidity.condition
                    )],
                });
            }
        }

        findings.sort_by_key(|finding| finding.kind);
        findings
    }

    fn organ_dysfunction(
        &self,
        protocol: &TreatmentProtocol,
        patient: &PatientProfile,
    ) -> Vec<Contraindication> {
        let organ = &protocol.eligibility.organ_function;
        let labs = &patient.laboratory;
        let mut findings = Vec::new();

        let maxima = [
            ("renal impairment", organ.creatinine_max, labs.renal.creatinine),
            ("hepatic impairment", organ.bilirubin_max, labs.hepatic.bilirubin),
        ];
        for (condition, threshold, actual) in maxima {
            if let (Some(threshold), Some(actual)) = (threshold, actual) {
                if actual > threshold * ORGAN_DYSFUNCTION_FACTOR {
                    findings.push(organ_finding(condition));
                }
            }
        }

        if let (Some(threshold), Some(actual)) = (organ.anc_min, labs.hematologic.anc) {
            if actual < threshold / ORGAN_DYSFUNCTION_FACTOR {
                findings.push(organ_finding("neutropenia"));
            }
        }

        findings
    }
}

fn organ_finding(condition: &str) -> Contraindication {
    Contraindication {
        condition: condition.to_string(),
        kind: ContraindicationKind::Relative,
        source: ContraindicationSource::OrganDysfunction,
        matched_on: None,
        override_possible: true,
        alternative_approaches: vec![
            format!("Dose-reduced schedule for {condition}"),
            "Reassess laboratory values before cycle 1".to_string(),
        ],
    }
}

fn default_approaches(kind: ContraindicationKind, condition: &str) -> Vec<String> {
    match kind {
        ContraindicationKind::Absolute => {
            vec!["Select a protocol without this exclusion".to_string()]
        }
        ContraindicationKind::Relative => vec![format!(
            "Proceed only after risk-benefit review of {condition}"
        )],
        ContraindicationKind::MonitoringRequired => {
            vec![format!("Scheduled monitoring for {condition}")]
        }
    }
}
