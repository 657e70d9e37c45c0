use super::super::domain::{
    BiomarkerStatus, ComorbiditySeverity, PatientProfile, TreatmentImpact, TreatmentProtocol,
};
use super::super::terminology::{
    same_cancer_family, same_cancer_type, same_stage, stage_number, ConditionMatcher, MatchBasis,
};

/// Inputs shared by every criterion scorer.
pub(crate) struct ScoringContext<'a> {
    pub protocol: &'a TreatmentProtocol,
    pub patient: &'a PatientProfile,
    pub matcher: &'a ConditionMatcher,
}

/// Score in `[0, 1]` plus the note explaining it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CriterionScore {
    pub score: f64,
    pub notes: String,
}

impl CriterionScore {
    fn new(score: f64, notes: impl Into<String>) -> Self {
        Self {
            score: score.clamp(0.0, 1.0),
            notes: notes.into(),
        }
    }
}

const NEUTRAL: f64 = 0.5;

pub(crate) fn cancer_type(ctx: &ScoringContext<'_>) -> CriterionScore {
    let Some(patient_type) = ctx.patient.primary_cancer_type() else {
        return CriterionScore::new(0.0, "no primary cancer type recorded");
    };

    let declared = &ctx.protocol.cancer_types;
    if declared
        .iter()
        .any(|cancer_type| same_cancer_type(cancer_type, patient_type))
    {
        return CriterionScore::new(1.0, format!("cancer type {patient_type} is an exact match"));
    }

    if let Some(related) = declared
        .iter()
        .find(|cancer_type| same_cancer_family(cancer_type, patient_type))
    {
        return CriterionScore::new(
            0.7,
            format!("cancer type {patient_type} shares a family with {related}"),
        );
    }

    CriterionScore::new(
        0.0,
        format!("cancer type {patient_type} not covered by protocol"),
    )
}

pub(crate) fn stage(ctx: &ScoringContext<'_>) -> CriterionScore {
    let stages = &ctx.protocol.eligibility.stages;
    let patient_stage = ctx
        .patient
        .disease_status
        .stage
        .as_deref()
        .map(str::trim)
        .filter(|stage| !stage.is_empty());

    let Some(patient_stage) = patient_stage else {
        return CriterionScore::new(NEUTRAL, "no recorded stage");
    };
    if stages.is_empty() {
        return CriterionScore::new(NEUTRAL, "protocol declares no stage requirement");
    }

    if ctx.protocol.accepts_any_stage() {
        return CriterionScore::new(1.0, "protocol accepts any stage");
    }
    if stages.iter().any(|stage| same_stage(stage, patient_stage)) {
        return CriterionScore::new(1.0, format!("stage {patient_stage} accepted"));
    }

    let Some(patient_number) = stage_number(patient_stage) else {
        return CriterionScore::new(0.0, format!("stage {patient_stage} could not be compared"));
    };
    let distance = stages
        .iter()
        .filter_map(|stage| stage_number(stage))
        .map(|number| number.abs_diff(patient_number))
        .min();

    match distance {
        Some(1) => CriterionScore::new(0.6, format!("stage {patient_stage} one stage from accepted")),
        Some(2) => CriterionScore::new(0.3, format!("stage {patient_stage} two stages from accepted")),
        _ => CriterionScore::new(0.0, format!("stage {patient_stage} outside accepted stages")),
    }
}

pub(crate) fn biomarker(ctx: &ScoringContext<'_>) -> CriterionScore {
    let requirements = &ctx.protocol.biomarker_requirements;
    if requirements.is_empty() {
        return CriterionScore::new(1.0, "no biomarker requirements");
    }

    let mut total = 0.0;
    let mut details = Vec::with_capacity(requirements.len());
    for requirement in requirements {
        let id = &requirement.biomarker_id;
        match ctx.patient.biomarker(id) {
            Some(result) if result.status == requirement.required_status => {
                total += 1.0;
                details.push(format!("{id} {} as required", result.status.label()));
            }
            Some(result) if result.status == BiomarkerStatus::Pending => {
                total += 0.5;
                details.push(format!("{id} pending"));
            }
            Some(result) => details.push(format!(
                "{id} {} (requires {})",
                result.status.label(),
                requirement.required_status.label()
            )),
            None => details.push(format!("{id} not tested")),
        }
    }

    let score = total / requirements.len() as f64;
    CriterionScore::new(score, format!("biomarkers: {}", details.join(", ")))
}

pub(crate) fn performance_status(ctx: &ScoringContext<'_>) -> CriterionScore {
    let (Some(ecog), Some(range)) = (ctx.patient.ecog(), ctx.protocol.eligibility.ecog_range)
    else {
        return CriterionScore::new(NEUTRAL, "performance status not assessable");
    };

    if !range.contains(ecog) {
        let distance = range.distance(ecog) as f64;
        let score = (0.5 - 0.2 * distance).max(0.0);
        return CriterionScore::new(
            score,
            format!("ECOG {ecog} outside {}-{}", range.min, range.max),
        );
    }

    let score = if range.max == 0 {
        1.0
    } else {
        ((range.max - ecog) as f64 / range.max as f64).max(0.7)
    };
    CriterionScore::new(
        score,
        format!("ECOG {ecog} within {}-{}", range.min, range.max),
    )
}

pub(crate) fn organ_function(ctx: &ScoringContext<'_>) -> CriterionScore {
    let thresholds = &ctx.protocol.eligibility.organ_function;
    let labs = &ctx.patient.laboratory;

    let assessments = [
        (
            "creatinine",
            thresholds.creatinine_max,
            labs.renal.creatinine,
            Bound::Maximum,
        ),
        (
            "bilirubin",
            thresholds.bilirubin_max,
            labs.hepatic.bilirubin,
            Bound::Maximum,
        ),
        (
            "ANC",
            thresholds.anc_min,
            labs.hematologic.anc,
            Bound::Minimum,
        ),
    ];

    let mut scores = Vec::new();
    let mut details = Vec::new();
    for (name, threshold, actual, bound) in assessments {
        let (Some(threshold), Some(actual)) = (threshold, actual) else {
            continue;
        };
        let score = threshold_score(threshold, actual, bound);
        if score >= 1.0 {
            details.push(format!("{name} {actual} meets {threshold}"));
        } else {
            details.push(format!("{name} {actual} misses {threshold}"));
        }
        scores.push(score);
    }

    if scores.is_empty() {
        return CriterionScore::new(NEUTRAL, "organ function not assessable");
    }

    let average = scores.iter().sum::<f64>() / scores.len() as f64;
    CriterionScore::new(average, format!("organ function: {}", details.join(", ")))
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Bound {
    Maximum,
    Minimum,
}

/// 1.0 when the lab value satisfies the bound, otherwise `max(0, ratio - 0.2)`.
pub(crate) fn threshold_score(threshold: f64, actual: f64, bound: Bound) -> f64 {
    let (meets, ratio) = match bound {
        Bound::Maximum => (actual <= threshold, threshold / actual),
        Bound::Minimum => (actual >= threshold, actual / threshold),
    };
    if meets {
        1.0
    } else if ratio.is_finite() {
        (ratio - 0.2).max(0.0)
    } else {
        0.0
    }
}

pub(crate) fn prior_treatment(ctx: &ScoringContext<'_>) -> CriterionScore {
    let history = &ctx.patient.treatment_history;
    if history.is_empty() {
        return CriterionScore::new(1.0, "no prior treatment");
    }

    let mut score: f64 = 1.0;
    let mut progressions = 0;
    let mut resistances = 0;
    for prior in history {
        if prior.ended_in_progression() {
            score *= 0.8;
            progressions += 1;
        }
        if prior.discontinued_for_resistance() {
            score *= 0.6;
            resistances += 1;
        }
    }

    CriterionScore::new(
        score.max(0.2),
        format!(
            "{} prior line(s), {progressions} with progression, {resistances} stopped for resistance",
            history.len()
        ),
    )
}

pub(crate) fn comorbidity(ctx: &ScoringContext<'_>) -> CriterionScore {
    let comorbidities = &ctx.patient.comorbidities;
    if comorbidities.is_empty() {
        return CriterionScore::new(1.0, "no comorbidities");
    }

    let mut score: f64 = 1.0;
    let mut details = Vec::new();
    for comorbidity in comorbidities {
        let matched = ctx
            .protocol
            .contraindications
            .iter()
            .find_map(|declared| {
                ctx.matcher
                    .matches(&comorbidity.condition, &declared.condition)
                    .map(|basis| (declared, basis))
            });

        match matched {
            Some((declared, basis)) => {
                let qualifier = match basis {
                    MatchBasis::Coded(_) => "",
                    MatchBasis::Substring => " (text match)",
                };
                match comorbidity.severity {
                    ComorbiditySeverity::Severe => {
                        return CriterionScore::new(
                            0.0,
                            format!(
                                "severe {} is contraindicated ({}){qualifier}",
                                comorbidity.condition, declared.condition
                            ),
                        );
                    }
                    ComorbiditySeverity::Moderate => score *= 0.3,
                    ComorbiditySeverity::Mild => score *= 0.7,
                }
                details.push(format!(
                    "{} matches contraindication {}{qualifier}",
                    comorbidity.condition, declared.condition
                ));
            }
            None => match comorbidity.impact {
                TreatmentImpact::Significant => {
                    score *= 0.8;
                    details.push(format!("{} has significant impact", comorbidity.condition));
                }
                TreatmentImpact::Moderate => {
                    score *= 0.9;
                    details.push(format!("{} has moderate impact", comorbidity.condition));
                }
                TreatmentImpact::Minimal | TreatmentImpact::None => {}
            },
        }
    }

    let notes = if details.is_empty() {
        "comorbidities without treatment impact".to_string()
    } else {
        format!("comorbidities: {}", details.join(", "))
    };
    CriterionScore::new(score.max(0.1), notes)
}

pub(crate) fn age(ctx: &ScoringContext<'_>) -> CriterionScore {
    let Some(range) = ctx.protocol.eligibility.age_range else {
        return CriterionScore::new(1.0, "no age restriction");
    };
    let Some(age) = ctx.patient.demographics.age else {
        return CriterionScore::new(NEUTRAL, "age not recorded");
    };

    if range.contains(age) {
        return CriterionScore::new(1.0, format!("age {age} within {}-{}", range.min, range.max));
    }

    let score = match range.distance(age) {
        0..=5 => 0.8,
        6..=10 => 0.6,
        11..=15 => 0.4,
        _ => 0.2,
    };
    CriterionScore::new(
        score,
        format!("age {age} outside {}-{}", range.min, range.max),
    )
}
