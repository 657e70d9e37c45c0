//! Multi-criteria scoring of a protocol against a patient.
//!
//! Each additive criterion is a pure function registered in [`CRITERIA`]
//! together with its [`Criterion`] tag. The weighted sum is multiplied by the
//! evidence bonus of the protocol. That multiplication compounds evidence
//! quality with clinical fit; it is kept as-is and pinned by tests.

mod criteria;
mod weights;

pub use weights::{evidence_bonus, CriterionWeights};

use serde::{Deserialize, Serialize};

use super::domain::{PatientProfile, TreatmentProtocol};
use super::terminology::ConditionMatcher;
use criteria::{CriterionScore, ScoringContext};

/// The nine scoring criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    CancerType,
    Stage,
    Biomarker,
    PerformanceStatus,
    OrganFunction,
    PriorTreatment,
    Comorbidity,
    Age,
    EvidenceQuality,
}

impl Criterion {
    pub const fn label(self) -> &'static str {
        match self {
            Criterion::CancerType => "cancer_type",
            Criterion::Stage => "stage",
            Criterion::Biomarker => "biomarker",
            Criterion::PerformanceStatus => "performance_status",
            Criterion::OrganFunction => "organ_function",
            Criterion::PriorTreatment => "prior_treatment",
            Criterion::Comorbidity => "comorbidity",
            Criterion::Age => "age",
            Criterion::EvidenceQuality => "evidence_quality",
        }
    }
}

type Scorer = fn(&ScoringContext<'_>) -> CriterionScore;

/// Dispatch table for the additive criteria, in breakdown order.
const CRITERIA: [(Criterion, Scorer); 8] = [
    (Criterion::CancerType, criteria::cancer_type),
    (Criterion::Stage, criteria::stage),
    (Criterion::Biomarker, criteria::biomarker),
    (Criterion::PerformanceStatus, criteria::performance_status),
    (Criterion::OrganFunction, criteria::organ_function),
    (Criterion::PriorTreatment, criteria::prior_treatment),
    (Criterion::Comorbidity, criteria::comorbidity),
    (Criterion::Age, criteria::age),
];

/// Discrete contribution to a match score, kept for audits and rationale text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub criterion: Criterion,
    pub score: f64,
    pub weight: f64,
    pub notes: String,
}

/// Per-criterion scores and the combined weighted score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub cancer_type_score: f64,
    pub stage_score: f64,
    pub biomarker_score: f64,
    pub performance_score: f64,
    pub organ_function_score: f64,
    pub prior_treatment_score: f64,
    pub comorbidity_score: f64,
    pub age_score: f64,
    pub evidence_bonus: f64,
    pub total_weighted_score: f64,
    pub components: Vec<ScoreComponent>,
}

impl ScoreBreakdown {
    pub fn score_for(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::CancerType => self.cancer_type_score,
            Criterion::Stage => self.stage_score,
            Criterion::Biomarker => self.biomarker_score,
            Criterion::PerformanceStatus => self.performance_score,
            Criterion::OrganFunction => self.organ_function_score,
            Criterion::PriorTreatment => self.prior_treatment_score,
            Criterion::Comorbidity => self.comorbidity_score,
            Criterion::Age => self.age_score,
            Criterion::EvidenceQuality => self.evidence_bonus,
        }
    }

    /// Final match score, `total_weighted_score` capped to `[0, 1]`.
    pub fn match_score(&self) -> f64 {
        self.total_weighted_score.clamp(0.0, 1.0)
    }
}

/// Stateless calculator applying the weight table to a (protocol, patient) pair.
#[derive(Debug, Clone, Default)]
pub struct ScoreCalculator {
    weights: CriterionWeights,
    matcher: ConditionMatcher,
}

impl ScoreCalculator {
    pub fn new(weights: CriterionWeights, matcher: ConditionMatcher) -> Self {
        Self { weights, matcher }
    }

    pub fn score(&self, protocol: &TreatmentProtocol, patient: &PatientProfile) -> ScoreBreakdown {
        let ctx = ScoringContext {
            protocol,
            patient,
            matcher: &self.matcher,
        };

        let mut components = Vec::with_capacity(CRITERIA.len() + 1);
        let mut weighted_sum = 0.0;
        for (criterion, scorer) in CRITERIA {
            let CriterionScore { score, notes } = scorer(&ctx);
            let weight = self.weights.weight(criterion);
            weighted_sum += score * weight;
            components.push(ScoreComponent {
                criterion,
                score,
                weight,
                notes,
            });
        }

        let bonus = evidence_bonus(protocol.evidence_level);
        components.push(ScoreComponent {
            criterion: Criterion::EvidenceQuality,
            score: bonus,
            weight: 0.0,
            notes: format!(
                "evidence level {} (x{bonus:.2})",
                protocol.evidence_level.label()
            ),
        });

        let lookup = |criterion: Criterion| {
            components
                .iter()
                .find(|component| component.criterion == criterion)
                .map(|component| component.score)
                .unwrap_or(0.0)
        };

        ScoreBreakdown {
            cancer_type_score: lookup(Criterion::CancerType),
            stage_score: lookup(Criterion::Stage),
            biomarker_score: lookup(Criterion::Biomarker),
            performance_score: lookup(Criterion::PerformanceStatus),
            organ_function_score: lookup(Criterion::OrganFunction),
            prior_treatment_score: lookup(Criterion::PriorTreatment),
            comorbidity_score: lookup(Criterion::Comorbidity),
            age_score: lookup(Criterion::Age),
            evidence_bonus: bonus,
            total_weighted_score: weighted_sum * bonus,
            components,
        }
    }
}
