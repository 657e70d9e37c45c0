use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, info, warn};

use super::cache::{Clock, ProtocolCache, SystemClock, DEFAULT_CACHE_TTL_SECS};
use super::contraindications::ContraindicationDetector;
use super::domain::{PatientProfile, ProtocolId, TreatmentProtocol};
use super::eligibility::EligibilityAssessor;
use super::gateway::{
    CachedProtocolGateway, GatewayError, ProtocolFilters, ProtocolRepository,
    DEFAULT_FETCH_TIMEOUT,
};
use super::outcome::{self, derive_confidence, MatchingResult};
use super::request::MatchingRequest;
use super::safety::SafetyAssessor;
use super::scoring::{CriterionWeights, ScoreCalculator};
use super::terminology::{family_members, ConditionMatchMode, ConditionMatcher};

pub const DEFAULT_MAX_RESULTS: usize = 10;

/// Results scoring below this are never returned.
pub const MINIMUM_MATCH_SCORE: f64 = 0.30;

const MAX_ALTERNATIVES: usize = 3;

/// Tunables for a [`MatchingEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct MatchingSettings {
    pub default_max_results: usize,
    pub condition_mode: ConditionMatchMode,
    pub cache_ttl: chrono::Duration,
    pub fetch_timeout: Duration,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            default_max_results: DEFAULT_MAX_RESULTS,
            condition_mode: ConditionMatchMode::default(),
            cache_ttl: chrono::Duration::seconds(DEFAULT_CACHE_TTL_SECS),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// Patient or request problems detected before any protocol is fetched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("patient has no primary cancer type")]
    MissingCancerType,
    #[error("ECOG performance status {0} is outside 0-4")]
    InvalidEcog(u8),
    #[error("max_results must be at least 1")]
    InvalidMaxResults,
}

#[derive(Debug, thiserror::Error)]
pub enum MatchingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("protocol source failed: {0}")]
    Upstream(#[from] GatewayError),
    #[error("all {candidates} candidate protocols were rejected as defective")]
    AllCandidatesRejected { candidates: usize },
}

/// Orchestrates fetch, evaluation, filtering, and ranking of protocols for a patient.
pub struct MatchingEngine<R> {
    gateway: CachedProtocolGateway<R>,
    calculator: ScoreCalculator,
    assessor: EligibilityAssessor,
    detector: ContraindicationDetector,
    safety: SafetyAssessor,
    default_max_results: usize,
}

impl<R> MatchingEngine<R>
where
    R: ProtocolRepository + 'static,
{
    pub fn new(repository: Arc<R>, settings: MatchingSettings) -> Self {
        Self::with_clock(repository, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(repository: Arc<R>, settings: MatchingSettings, clock: Arc<dyn Clock>) -> Self {
        let matcher = ConditionMatcher::new(settings.condition_mode);
        let cache = ProtocolCache::new(settings.cache_ttl, clock);

        Self {
            gateway: CachedProtocolGateway::new(repository, cache, settings.fetch_timeout),
            calculator: ScoreCalculator::new(CriterionWeights::default(), matcher),
            assessor: EligibilityAssessor,
            detector: ContraindicationDetector::new(matcher),
            safety: SafetyAssessor,
            default_max_results: settings.default_max_results,
        }
    }

    pub fn gateway(&self) -> &CachedProtocolGateway<R> {
        &self.gateway
    }

    /// Score, assess, and explain a single protocol. Alternatives are left empty.
    pub fn evaluate(&self, protocol: &TreatmentProtocol, patient: &PatientProfile) -> MatchingResult {
        let breakdown = self.calculator.score(protocol, patient);
        let match_score = breakdown.match_score();
        let eligibility = self.assessor.assess(protocol, patient);
        let contraindications = self.detector.detect(protocol, patient);
        let safety = self.safety.assess(protocol, patient, &contraindications);
        let confidence = derive_confidence(match_score, &eligibility, &contraindications);
        let required_modifications =
            outcome::required_modifications(&eligibility, &contraindications, &safety);
        let rationale = outcome::rationale(
            &breakdown,
            match_score,
            &eligibility,
            &contraindications,
            confidence,
        );

        MatchingResult {
            protocol_id: protocol.id.clone(),
            protocol_name: protocol.name.clone(),
            evidence_level: protocol.evidence_level,
            match_score,
            score_breakdown: breakdown,
            eligibility,
            confidence,
            contraindications,
            required_modifications,
            alternative_protocols: Vec::new(),
            safety,
            rationale,
        }
    }

    /// Ranked protocols for `patient`, best first.
    pub async fn find_matching_protocols(
        &self,
        patient: &PatientProfile,
        request: &MatchingRequest,
    ) -> Result<Vec<MatchingResult>, MatchingError> {
        let started = Instant::now();
        let (cancer_type, max_results) = self.validate(patient, request)?;

        let filters = fetch_filters(cancer_type, request);
        let protocols = self.gateway.protocols(&filters).await?;
        debug!(
            patient_id = %patient.patient_id,
            filters = %filters.signature(),
            fetched = protocols.len(),
            "fetched candidate protocols"
        );

        let evaluated: Vec<(&TreatmentProtocol, MatchingResult)> = off_worker(|| {
            protocols
                .par_iter()
                .filter_map(|protocol| match protocol.validate() {
                    Ok(()) => Some((protocol, self.evaluate(protocol, patient))),
                    Err(defect) => {
                        warn!(protocol_id = %protocol.id, reason = %defect, "dropping defective protocol");
                        None
                    }
                })
                .collect()
        });

        if evaluated.is_empty() && !protocols.is_empty() {
            return Err(MatchingError::AllCandidatesRejected {
                candidates: protocols.len(),
            });
        }
        let evaluated_count = evaluated.len();

        let mut results: Vec<MatchingResult> = evaluated
            .into_iter()
            .filter(|(protocol, result)| passes_filters(protocol, result, patient, request))
            .map(|(_, result)| result)
            .collect();
        debug!(
            evaluated = evaluated_count,
            retained = results.len(),
            "applied result filters"
        );

        rank_results(&mut results);
        attach_alternatives(&mut results);
        results.truncate(max_results);

        info!(
            patient_id = %patient.patient_id,
            candidates = protocols.len(),
            returned = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "protocol matching complete"
        );

        Ok(results)
    }

    fn validate<'p>(
        &self,
        patient: &'p PatientProfile,
        request: &MatchingRequest,
    ) -> Result<(&'p str, usize), ValidationError> {
        let cancer_type = patient
            .primary_cancer_type()
            .ok_or(ValidationError::MissingCancerType)?;

        if let Some(ecog) = patient.ecog().filter(|ecog| *ecog > 4) {
            return Err(ValidationError::InvalidEcog(ecog));
        }

        let max_results = request.max_results.unwrap_or(self.default_max_results);
        if max_results == 0 {
            return Err(ValidationError::InvalidMaxResults);
        }

        Ok((cancer_type, max_results))
    }
}

/// Run CPU-bound scoring without stalling the async worker. `block_in_place` is only
/// legal on the multi-threaded runtime; elsewhere the work runs inline.
fn off_worker<T>(work: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(work)
        }
        _ => work(),
    }
}

/// Gateway query for a patient: the primary cancer type and its family siblings.
pub fn fetch_filters(cancer_type: &str, request: &MatchingRequest) -> ProtocolFilters {
    let mut filters = ProtocolFilters::new(family_members(cancer_type));
    filters.line_of_therapy = request.treatment_line;
    filters.include_experimental = request.include_experimental;
    filters
}

fn passes_filters(
    protocol: &TreatmentProtocol,
    result: &MatchingResult,
    patient: &PatientProfile,
    request: &MatchingRequest,
) -> bool {
    if result.match_score < MINIMUM_MATCH_SCORE {
        return false;
    }

    if let Some(minimum) = request.minimum_evidence_level {
        if result.evidence_level.is_weaker_than(minimum) {
            return false;
        }
    }

    if request.exclude_contraindicated && result.has_absolute_contraindication() {
        return false;
    }

    if let (Some(threshold), Some(ecog)) = (request.performance_status_threshold, patient.ecog()) {
        if ecog > threshold {
            return false;
        }
    }

    if let (Some(wanted), Some(declared)) = (request.treatment_intent, protocol.treatment_intent) {
        if wanted != declared {
            return false;
        }
    }

    if let Some(maximum) = request.maximum_risk_level {
        if result.safety.risk_level > maximum {
            return false;
        }
    }

    true
}

/// Descending match score, then stronger evidence, then protocol id.
pub fn rank_results(results: &mut [MatchingResult]) {
    results.sort_by(|left, right| {
        right
            .match_score
            .total_cmp(&left.match_score)
            .then_with(|| left.evidence_level.cmp(&right.evidence_level))
            .then_with(|| left.protocol_id.cmp(&right.protocol_id))
    });
}

fn attach_alternatives(results: &mut [MatchingResult]) {
    let viable: Vec<ProtocolId> = results
        .iter()
        .filter(|result| result.eligibility.eligible && !result.has_absolute_contraindication())
        .map(|result| result.protocol_id.clone())
        .collect();

    for result in results.iter_mut() {
        result.alternative_protocols = viable
            .iter()
            .filter(|id| **id != result.protocol_id)
            .take(MAX_ALTERNATIVES)
            .cloned()
            .collect();
    }
}
