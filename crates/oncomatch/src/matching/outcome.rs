use serde::{Deserialize, Serialize};

use super::contraindications::{Contraindication, ContraindicationKind};
use super::domain::{EvidenceLevel, ProtocolId};
use super::eligibility::{EligibilityAssessment, EligibilityRule};
use super::safety::{RiskLevel, SafetyAssessment};
use super::scoring::ScoreBreakdown;

/// Five-level summary of how strongly a protocol is recommended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ConfidenceLevel {
    pub const fn label(self) -> &'static str {
        match self {
            ConfidenceLevel::VeryLow => "very_low",
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::High => "high",
            ConfidenceLevel::VeryHigh => "very_high",
        }
    }

    fn from_score(match_score: f64) -> Self {
        if match_score >= 0.90 {
            ConfidenceLevel::VeryHigh
        } else if match_score >= 0.75 {
            ConfidenceLevel::High
        } else if match_score >= 0.60 {
            ConfidenceLevel::Medium
        } else if match_score >= 0.45 {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::VeryLow
        }
    }
}

/// Ineligibility and absolute contraindications are terminal; pending
/// assessments cap the tier at medium; otherwise score bands decide.
pub fn derive_confidence(
    match_score: f64,
    eligibility: &EligibilityAssessment,
    contraindications: &[Contraindication],
) -> ConfidenceLevel {
    if !eligibility.eligible || contraindications.iter().any(Contraindication::is_absolute) {
        return ConfidenceLevel::VeryLow;
    }

    let by_score = ConfidenceLevel::from_score(match_score);
    if eligibility.required_assessments.is_empty() {
        by_score
    } else {
        by_score.min(ConfidenceLevel::Medium)
    }
}

/// Engine output for one protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingResult {
    pub protocol_id: ProtocolId,
    pub protocol_name: String,
    pub evidence_level: EvidenceLevel,
    pub match_score: f64,
    pub score_breakdown: ScoreBreakdown,
    pub eligibility: EligibilityAssessment,
    pub confidence: ConfidenceLevel,
    pub contraindications: Vec<Contraindication>,
    pub required_modifications: Vec<String>,
    pub alternative_protocols: Vec<ProtocolId>,
    pub safety: SafetyAssessment,
    pub rationale: String,
}

impl MatchingResult {
    pub fn has_absolute_contraindication(&self) -> bool {
        self.contraindications
            .iter()
            .any(Contraindication::is_absolute)
    }
}

pub(crate) fn required_modifications(
    eligibility: &EligibilityAssessment,
    contraindications: &[Contraindication],
    safety: &SafetyAssessment,
) -> Vec<String> {
    let mut modifications = Vec::new();

    for violation in &eligibility.violations {
        match &violation.rule {
            EligibilityRule::OrganFunction(name) => modifications.push(format!(
                "Dose adjustment for {name}: {}",
                violation.description
            )),
            EligibilityRule::Age => modifications.push(format!(
                "Geriatric or pediatric dosing review ({})",
                violation.description
            )),
            EligibilityRule::PerformanceStatus | EligibilityRule::Biomarker(_) => {}
        }
    }

    for contraindication in contraindications {
        if contraindication.kind == ContraindicationKind::Relative {
            modifications.push(format!("Mitigation plan for {}", contraindication.condition));
        }
    }

    if safety.risk_level >= RiskLevel::High {
        modifications.push(format!(
            "Toxicity prophylaxis and {:?} monitoring (grade 3-4 risk {:.0}%)",
            safety.monitoring_intensity,
            safety.grade_3_4_toxicity_probability * 100.0
        ));
    }

    modifications.dedup();
    modifications
}

pub(crate) fn rationale(
    breakdown: &ScoreBreakdown,
    match_score: f64,
    eligibility: &EligibilityAssessment,
    contraindications: &[Contraindication],
    confidence: ConfidenceLevel,
) -> String {
    let mut parts: Vec<String> = breakdown
        .components
        .iter()
        .map(|component| format!("{} {:.2}: {}", component.criterion.label(), component.score, component.notes))
        .collect();

    parts.push(format!("match score {match_score:.2}"));
    parts.push(eligibility.summary());

    let absolute: Vec<&str> = contraindications
        .iter()
        .filter(|finding| finding.is_absolute())
        .map(|finding| finding.condition.as_str())
        .collect();
    if !absolute.is_empty() {
        parts.push(format!("absolute contraindication: {}", absolute.join(", ")));
    }

    parts.push(format!("confidence {}", confidence.label()));
    parts.join("; ")
}
