use serde::{Deserialize, Serialize};

use super::domain::{BiomarkerStatus, PatientProfile, TreatmentProtocol};

/// Which rule produced an eligibility violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum EligibilityRule {
    PerformanceStatus,
    Biomarker(String),
    Age,
    OrganFunction(String),
}

impl EligibilityRule {
    pub fn label(&self) -> String {
        match self {
            EligibilityRule::PerformanceStatus => "performance_status".to_string(),
            EligibilityRule::Biomarker(id) => format!("biomarker:{id}"),
            EligibilityRule::Age => "age".to_string(),
            EligibilityRule::OrganFunction(name) => format!("organ_function:{name}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Exclusionary,
    Major,
    Minor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityViolation {
    pub rule: EligibilityRule,
    pub severity: ViolationSeverity,
    pub description: String,
    pub override_possible: bool,
}

impl EligibilityViolation {
    pub fn is_exclusionary(&self) -> bool {
        self.severity == ViolationSeverity::Exclusionary
    }
}

/// Outcome of the hard-rule check for one protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityAssessment {
    pub eligible: bool,
    pub violations: Vec<EligibilityViolation>,
    pub required_assessments: Vec<String>,
}

impl EligibilityAssessment {
    fn from_findings(violations: Vec<EligibilityViolation>, required_assessments: Vec<String>) -> Self {
        let eligible = !violations.iter().any(EligibilityViolation::is_exclusionary);
        Self {
            eligible,
            violations,
            required_assessments,
        }
    }

    pub fn summary(&self) -> String {
        let exclusions: Vec<&str> = self
            .violations
            .iter()
            .filter(|violation| violation.is_exclusionary())
            .map(|violation| violation.description.as_str())
            .collect();

        if !exclusions.is_empty() {
            format!("ineligible: {}", exclusions.join("; "))
        } else if !self.required_assessments.is_empty() {
            format!(
                "eligible pending {}",
                self.required_assessments.join(", ")
            )
        } else {
            "eligible".to_string()
        }
    }
}

/// Evaluates hard eligibility rules; missing data becomes a required assessment, not a violation.
#[derive(Debug, Clone, Copy, Default)]
pub struct EligibilityAssessor;

impl EligibilityAssessor {
    pub fn assess(
        &self,
        protocol: &TreatmentProtocol,
        patient: &PatientProfile,
    ) -> EligibilityAssessment {
        let mut violations = Vec::new();
        let mut required_assessments = Vec::new();
        let criteria = &protocol.eligibility;

        if let Some(range) = criteria.ecog_range {
            match patient.ecog() {
                Some(ecog) if !range.contains(ecog) => violations.push(EligibilityViolation {
                    rule: EligibilityRule::PerformanceStatus,
                    severity: ViolationSeverity::Exclusionary,
                    description: format!(
                        "ECOG {ecog} outside required range {}-{}",
                        range.min, range.max
                    ),
                    override_possible: false,
                }),
                Some(_) => {}
                None => required_assessments.push("ECOG performance status".to_string()),
            }
        }

        for requirement in &protocol.biomarker_requirements {
            let id = &requirement.biomarker_id;
            match patient.biomarker(id) {
                None => required_assessments.push(format!("{id} biomarker test")),
                Some(result) if result.status == BiomarkerStatus::Pending => {
                    required_assessments.push(format!("{id} biomarker result (pending)"))
                }
                Some(result) if result.status != requirement.required_status => {
                    violations.push(EligibilityViolation {
                        rule: EligibilityRule::Biomarker(id.clone()),
                        severity: ViolationSeverity::Exclusionary,
                        description: format!(
                            "{id} is {} but protocol requires {}",
                            result.status.label(),
                            requirement.required_status.label()
                        ),
                        override_possible: false,
                    })
                }
                Some(_) => {}
            }
        }

        if let (Some(range), Some(age)) = (criteria.age_range, patient.demographics.age) {
            if !range.contains(age) {
                violations.push(EligibilityViolation {
                    rule: EligibilityRule::Age,
                    severity: ViolationSeverity::Major,
                    description: format!("age {age} outside {}-{}", range.min, range.max),
                    override_possible: true,
                });
            }
        }

        let organ = &criteria.organ_function;
        let labs = &patient.laboratory;
        let organ_checks = [
            ("creatinine", organ.creatinine_max, labs.renal.creatinine, true),
            ("bilirubin", organ.bilirubin_max, labs.hepatic.bilirubin, true),
            ("anc", organ.anc_min, labs.hematologic.anc, false),
        ];
        for (name, threshold, actual, is_maximum) in organ_checks {
            let (Some(threshold), Some(actual)) = (threshold, actual) else {
                continue;
            };
            let breached = if is_maximum {
                actual > threshold
            } else {
                actual < threshold
            };
            if breached {
                let direction = if is_maximum { "above maximum" } else { "below minimum" };
                violations.push(EligibilityViolation {
                    rule: EligibilityRule::OrganFunction(name.to_string()),
                    severity: ViolationSeverity::Major,
                    description: format!("{name} {actual} {direction} {threshold}"),
                    override_possible: true,
                });
            }
        }

        EligibilityAssessment::from_findings(violations, required_assessments)
    }
}
