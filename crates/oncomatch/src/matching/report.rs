//! Flat CSV export of ranked matching results for spreadsheets and tumour boards.

use std::io::Write;

use serde::Serialize;

use super::outcome::MatchingResult;

#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    #[serde(rename = "Rank")]
    rank: usize,
    #[serde(rename = "Protocol")]
    protocol_id: &'a str,
    #[serde(rename = "Name")]
    protocol_name: &'a str,
    #[serde(rename = "Evidence")]
    evidence_level: &'static str,
    #[serde(rename = "Match Score")]
    match_score: String,
    #[serde(rename = "Confidence")]
    confidence: &'static str,
    #[serde(rename = "Eligible")]
    eligible: bool,
    #[serde(rename = "Risk Level")]
    risk_level: String,
    #[serde(rename = "Contraindications")]
    contraindications: String,
    #[serde(rename = "Required Assessments")]
    required_assessments: String,
    #[serde(rename = "Alternatives")]
    alternatives: String,
}

impl<'a> ReportRow<'a> {
    fn new(rank: usize, result: &'a MatchingResult) -> Self {
        Self {
            rank,
            protocol_id: &result.protocol_id.0,
            protocol_name: &result.protocol_name,
            evidence_level: result.evidence_level.label(),
            match_score: format!("{:.3}", result.match_score),
            confidence: result.confidence.label(),
            eligible: result.eligibility.eligible,
            risk_level: format!("{:?}", result.safety.risk_level),
            contraindications: result
                .contraindications
                .iter()
                .map(|finding| finding.condition.as_str())
                .collect::<Vec<_>>()
                .join(" | "),
            required_assessments: result.eligibility.required_assessments.join(" | "),
            alternatives: result
                .alternative_protocols
                .iter()
                .map(|id| id.0.as_str())
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }
}

/// Write one row per result, in the order given, with a header row.
pub fn write_results<W: Write>(results: &[MatchingResult], writer: W) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for (index, result) in results.iter().enumerate() {
        csv_writer.serialize(ReportRow::new(index + 1, result))?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn render_results(results: &[MatchingResult]) -> Result<String, csv::Error> {
    let mut buffer = Vec::new();
    write_results(results, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
