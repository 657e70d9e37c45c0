//! Static clinical lookups: cancer families, stage parsing, and coded
//! comorbidity terminology.
//!
//! Condition matching resolves free-text condition names to [`ConditionCode`]s
//! first. Substring containment is only consulted in the fallback modes and is
//! reported as [`MatchBasis::Substring`] so callers can treat it as a weaker
//! signal.

use serde::{Deserialize, Serialize};

const CANCER_FAMILIES: &[(&str, &[&str])] = &[
    (
        "lung",
        &[
            "lung_adenocarcinoma",
            "lung_squamous_cell_carcinoma",
            "non_small_cell_lung_cancer",
            "small_cell_lung_cancer",
            "large_cell_lung_carcinoma",
        ],
    ),
    (
        "breast",
        &[
            "breast_cancer",
            "hr_positive_breast_cancer",
            "her2_positive_breast_cancer",
            "triple_negative_breast_cancer",
            "invasive_ductal_carcinoma",
            "invasive_lobular_carcinoma",
        ],
    ),
    (
        "colorectal",
        &["colorectal_cancer", "colon_cancer", "rectal_cancer"],
    ),
    (
        "upper_gastrointestinal",
        &[
            "gastric_cancer",
            "esophageal_adenocarcinoma",
            "esophageal_squamous_cell_carcinoma",
            "gastroesophageal_junction_cancer",
        ],
    ),
    (
        "lymphoma",
        &[
            "diffuse_large_b_cell_lymphoma",
            "follicular_lymphoma",
            "mantle_cell_lymphoma",
            "hodgkin_lymphoma",
        ],
    ),
    (
        "leukemia",
        &[
            "acute_myeloid_leukemia",
            "acute_lymphoblastic_leukemia",
            "chronic_lymphocytic_leukemia",
            "chronic_myeloid_leukemia",
        ],
    ),
    (
        "gynecologic",
        &["ovarian_cancer", "endometrial_cancer", "cervical_cancer"],
    ),
    (
        "genitourinary",
        &[
            "prostate_cancer",
            "renal_cell_carcinoma",
            "urothelial_carcinoma",
            "bladder_cancer",
        ],
    ),
    (
        "head_and_neck",
        &[
            "head_and_neck_squamous_cell_carcinoma",
            "nasopharyngeal_carcinoma",
            "oropharyngeal_cancer",
        ],
    ),
    ("melanoma", &["cutaneous_melanoma", "uveal_melanoma", "mucosal_melanoma"]),
];

fn normalize_term(value: &str) -> String {
    value
        .trim()
        .to_ascii_lowercase()
        .replace([' ', '-'], "_")
}

/// Family grouping for a cancer type id, if it is catalogued.
pub fn cancer_family(cancer_type: &str) -> Option<&'static str> {
    let normalized = normalize_term(cancer_type);
    CANCER_FAMILIES
        .iter()
        .find(|(_, members)| members.iter().any(|member| *member == normalized))
        .map(|(family, _)| *family)
}

/// Every catalogued cancer type sharing a family with `cancer_type`, itself included.
pub fn family_members(cancer_type: &str) -> Vec<String> {
    let normalized = normalize_term(cancer_type);
    match CANCER_FAMILIES
        .iter()
        .find(|(_, members)| members.iter().any(|member| *member == normalized))
    {
        Some((_, members)) => members.iter().map(|member| member.to_string()).collect(),
        None => vec![normalized],
    }
}

pub fn same_cancer_type(left: &str, right: &str) -> bool {
    normalize_term(left) == normalize_term(right)
}

pub fn same_cancer_family(left: &str, right: &str) -> bool {
    match (cancer_family(left), cancer_family(right)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Numeric stage extracted from labels such as `"IIIA"`, `"IB2"`, `"stage_2"`, or `"4"`.
///
/// Only the leading stage group counts; sub-stage letters and digits after it are ignored.
pub fn stage_number(label: &str) -> Option<u8> {
    let lowered = stage_label(label);
    let body = lowered.as_str();

    let arabic: String = body.chars().take_while(char::is_ascii_digit).collect();
    if !arabic.is_empty() {
        return arabic.parse().ok();
    }

    let roman: String = body.chars().take_while(|c| matches!(c, 'i' | 'v')).collect();
    let substage = body[roman.len()..].chars().next();
    if !matches!(substage, None | Some('a'..='c') | Some('0'..='9')) {
        return None;
    }
    match roman.as_str() {
        "i" => Some(1),
        "ii" => Some(2),
        "iii" => Some(3),
        "iv" => Some(4),
        _ => None,
    }
}

/// Labels are equal once case and any leading "stage" word are ignored.
pub fn same_stage(left: &str, right: &str) -> bool {
    stage_label(left) == stage_label(right)
}

fn stage_label(label: &str) -> String {
    let lowered = label.trim().to_ascii_lowercase();
    lowered
        .strip_prefix("stage")
        .unwrap_or(&lowered)
        .trim_start_matches([' ', '_', '-'])
        .to_string()
}

/// Coded comorbidity terminology used for contraindication matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionCode {
    HeartFailure,
    CoronaryArteryDisease,
    Arrhythmia,
    InterstitialLungDisease,
    AutoimmuneDisease,
    ChronicKidneyDisease,
    HepaticImpairment,
    PeripheralNeuropathy,
    ActiveInfection,
    Diabetes,
    Hypertension,
    Pregnancy,
    OrganTransplant,
    BleedingDisorder,
}

const CONDITION_SYNONYMS: &[(ConditionCode, &[&str])] = &[
    (
        ConditionCode::HeartFailure,
        &["heart failure", "congestive heart failure", "chf", "reduced ejection fraction", "cardiomyopathy"],
    ),
    (
        ConditionCode::CoronaryArteryDisease,
        &["coronary artery disease", "cad", "ischemic heart disease", "myocardial infarction"],
    ),
    (
        ConditionCode::Arrhythmia,
        &["arrhythmia", "atrial fibrillation", "qt prolongation", "long qt"],
    ),
    (
        ConditionCode::InterstitialLungDisease,
        &["interstitial lung disease", "ild", "pneumonitis", "pulmonary fibrosis"],
    ),
    (
        ConditionCode::AutoimmuneDisease,
        &["autoimmune", "lupus", "rheumatoid arthritis", "crohn", "ulcerative colitis", "multiple sclerosis"],
    ),
    (
        ConditionCode::ChronicKidneyDisease,
        &["chronic kidney disease", "ckd", "renal insufficiency", "renal impairment", "renal failure"],
    ),
    (
        ConditionCode::HepaticImpairment,
        &["hepatic impairment", "cirrhosis", "liver failure", "hepatic insufficiency"],
    ),
    (
        ConditionCode::PeripheralNeuropathy,
        &["peripheral neuropathy", "neuropathy"],
    ),
    (
        ConditionCode::ActiveInfection,
        &["active infection", "hepatitis b", "hepatitis c", "hiv", "tuberculosis", "sepsis"],
    ),
    (
        ConditionCode::Diabetes,
        &["diabetes", "diabetes mellitus", "type 2 diabetes", "type 1 diabetes"],
    ),
    (
        ConditionCode::Hypertension,
        &["hypertension", "high blood pressure"],
    ),
    (ConditionCode::Pregnancy, &["pregnancy", "pregnant"]),
    (
        ConditionCode::OrganTransplant,
        &["organ transplant", "solid organ transplant", "transplant recipient"],
    ),
    (
        ConditionCode::BleedingDisorder,
        &["bleeding disorder", "coagulopathy", "hemophilia"],
    ),
];

impl ConditionCode {
    /// Resolve free text to a code by whole-phrase synonym lookup.
    pub fn classify(text: &str) -> Option<ConditionCode> {
        let normalized = text
            .trim()
            .to_ascii_lowercase()
            .replace(['_', '-'], " ");
        if normalized.is_empty() {
            return None;
        }

        // Longest synonym wins so "congestive heart failure" beats "heart failure".
        CONDITION_SYNONYMS
            .iter()
            .flat_map(|(code, synonyms)| synonyms.iter().map(move |synonym| (*code, *synonym)))
            .filter(|(_, synonym)| contains_phrase(&normalized, synonym))
            .max_by_key(|(_, synonym)| synonym.len())
            .map(|(code, _)| code)
    }
}

fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    haystack
        .match_indices(phrase)
        .any(|(start, matched)| {
            let end = start + matched.len();
            let before_ok = haystack[..start]
                .chars()
                .next_back()
                .map(|c| !c.is_ascii_alphanumeric())
                .unwrap_or(true);
            let after_ok = haystack[end..]
                .chars()
                .next()
                .map(|c| !c.is_ascii_alphanumeric())
                .unwrap_or(true);
            before_ok && after_ok
        })
}

/// How condition names are compared when matching comorbidities to exclusions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionMatchMode {
    /// Only coded matches count.
    Coded,
    /// Coded match first; substring containment when either side is uncoded.
    #[default]
    CodedWithFallback,
    /// Case-insensitive substring containment only.
    Substring,
}

impl ConditionMatchMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "coded" => Some(Self::Coded),
            "coded_with_fallback" | "fallback" => Some(Self::CodedWithFallback),
            "substring" => Some(Self::Substring),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchBasis {
    Coded(ConditionCode),
    Substring,
}

/// Adapter comparing patient conditions with protocol-declared conditions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionMatcher {
    mode: ConditionMatchMode,
}

impl ConditionMatcher {
    pub fn new(mode: ConditionMatchMode) -> Self {
        Self { mode }
    }

    pub fn matches(&self, patient_condition: &str, declared_condition: &str) -> Option<MatchBasis> {
        match self.mode {
            ConditionMatchMode::Substring => substring_match(patient_condition, declared_condition),
            ConditionMatchMode::Coded => coded_match(patient_condition, declared_condition)
                .and_then(|result| result),
            ConditionMatchMode::CodedWithFallback => {
                match coded_match(patient_condition, declared_condition) {
                    Some(result) => result,
                    None => substring_match(patient_condition, declared_condition),
                }
            }
        }
    }
}

/// `None` when either side is uncoded; `Some(None)` when both are coded differently.
fn coded_match(left: &str, right: &str) -> Option<Option<MatchBasis>> {
    let left_code = ConditionCode::classify(left)?;
    let right_code = ConditionCode::classify(right)?;
    Some((left_code == right_code).then_some(MatchBasis::Coded(left_code)))
}

fn substring_match(left: &str, right: &str) -> Option<MatchBasis> {
    let left = left.trim().to_ascii_lowercase();
    let right = right.trim().to_ascii_lowercase();
    if left.is_empty() || right.is_empty() {
        return None;
    }
    (left.contains(&right) || right.contains(&left)).then_some(MatchBasis::Substring)
}
