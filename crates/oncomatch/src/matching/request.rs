use serde::{Deserialize, Serialize};

use super::domain::{EvidenceLevel, TreatmentIntent};
use super::safety::RiskLevel;

/// Caller options for one matching run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingRequest {
    pub treatment_line: Option<u8>,
    pub treatment_intent: Option<TreatmentIntent>,
    /// Falls back to the engine's configured default when unset.
    pub max_results: Option<usize>,
    pub include_experimental: bool,
    pub minimum_evidence_level: Option<EvidenceLevel>,
    pub performance_status_threshold: Option<u8>,
    pub exclude_contraindicated: bool,
    pub maximum_risk_level: Option<RiskLevel>,
}

impl MatchingRequest {
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn with_treatment_line(mut self, line: u8) -> Self {
        self.treatment_line = Some(line);
        self
    }

    pub fn with_minimum_evidence(mut self, level: EvidenceLevel) -> Self {
        self.minimum_evidence_level = Some(level);
        self
    }

    pub fn with_performance_threshold(mut self, ecog: u8) -> Self {
        self.performance_status_threshold = Some(ecog);
        self
    }

    pub fn excluding_contraindicated(mut self) -> Self {
        self.exclude_contraindicated = true;
        self
    }

    pub fn including_experimental(mut self) -> Self {
        self.include_experimental = true;
        self
    }
}
