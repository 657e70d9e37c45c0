use crate::infra::{demo_patient, demo_protocols, load_protocols, read_patient, InMemoryProtocolRepository};
use clap::{Args, ValueEnum};
use oncomatch::config::AppConfig;
use oncomatch::error::AppError;
use oncomatch::matching::report::render_results;
use oncomatch::matching::{
    EvidenceLevel, MatchResponse, MatchingEngine, MatchingRequest, MatchingResult,
    MatchingSettings, PatientProfile, RiskLevel, TreatmentIntent, TreatmentProtocol,
};
use serde::de::DeserializeOwned;
use oncomatch::telemetry;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Csv,
    Json,
}

/// Request options shared by the `match` and `demo` commands.
#[derive(Args, Debug, Default)]
pub(crate) struct MatchOptions {
    /// Maximum number of ranked protocols to return
    #[arg(long)]
    pub(crate) max_results: Option<usize>,
    /// Only consider protocols for this line of therapy
    #[arg(long)]
    pub(crate) treatment_line: Option<u8>,
    /// Only keep protocols with this intent (curative, palliative, adjuvant, neoadjuvant, maintenance)
    #[arg(long, value_parser = parse_keyword::<TreatmentIntent>)]
    pub(crate) treatment_intent: Option<TreatmentIntent>,
    /// Weakest evidence level to accept (A-E)
    #[arg(long, value_parser = parse_evidence)]
    pub(crate) minimum_evidence: Option<EvidenceLevel>,
    /// Drop results when the patient's ECOG exceeds this value
    #[arg(long)]
    pub(crate) performance_threshold: Option<u8>,
    /// Drop protocols whose toxicity risk exceeds this level (low, moderate, high, very-high)
    #[arg(long, value_parser = parse_keyword::<RiskLevel>)]
    pub(crate) maximum_risk_level: Option<RiskLevel>,
    /// Drop protocols with an absolute contraindication
    #[arg(long)]
    pub(crate) exclude_contraindicated: bool,
    /// Include investigational protocols
    #[arg(long)]
    pub(crate) include_experimental: bool,
}

impl MatchOptions {
    fn to_request(&self) -> MatchingRequest {
        let mut request = MatchingRequest {
            max_results: self.max_results,
            treatment_line: self.treatment_line,
            treatment_intent: self.treatment_intent,
            minimum_evidence_level: self.minimum_evidence,
            performance_status_threshold: self.performance_threshold,
            maximum_risk_level: self.maximum_risk_level,
            ..MatchingRequest::default()
        };
        if self.exclude_contraindicated {
            request = request.excluding_contraindicated();
        }
        if self.include_experimental {
            request = request.including_experimental();
        }
        request
    }
}

#[derive(Args, Debug)]
pub(crate) struct MatchArgs {
    /// Patient profile JSON file
    #[arg(long)]
    pub(crate) patient: PathBuf,
    /// Protocol catalog JSON; defaults to PROTOCOL_CATALOG_PATH, then the bundled demo catalog
    #[arg(long)]
    pub(crate) catalog: Option<PathBuf>,
    #[command(flatten)]
    pub(crate) options: MatchOptions,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub(crate) format: OutputFormat,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    #[command(flatten)]
    pub(crate) options: MatchOptions,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub(crate) format: OutputFormat,
}

pub(crate) fn parse_evidence(raw: &str) -> Result<EvidenceLevel, String> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "A" => Ok(EvidenceLevel::A),
        "B" => Ok(EvidenceLevel::B),
        "C" => Ok(EvidenceLevel::C),
        "D" => Ok(EvidenceLevel::D),
        "E" => Ok(EvidenceLevel::E),
        _ => Err(format!("'{raw}' is not an evidence level (expected A-E)")),
    }
}

/// Parse a snake_case wire keyword; hyphens are accepted in place of underscores.
pub(crate) fn parse_keyword<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    let keyword = raw.trim().to_ascii_lowercase().replace('-', "_");
    serde_json::from_value(serde_json::Value::String(keyword))
        .map_err(|_| format!("'{raw}' is not a recognised value"))
}

pub(crate) async fn run_match(args: MatchArgs) -> Result<(), AppError> {
    let MatchArgs {
        patient,
        catalog,
        options,
        format,
    } = args;

    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let catalog = catalog.or_else(|| config.matching.catalog_path.clone());
    let protocols = load_protocols(catalog.as_deref())?;
    let patient = read_patient(&patient)?;

    let results = match_patient(protocols, &patient, &options, config.matching.settings()).await?;
    print_results(format, &patient, results)
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { options, format } = args;

    let patient = demo_patient()?;
    let protocols = demo_protocols()?;

    if format == OutputFormat::Table {
        println!("Protocol matching demo");
        println!(
            "- Patient {}: {} {}, ECOG {}",
            patient.patient_id,
            patient.primary_cancer_type().unwrap_or("unknown cancer type"),
            patient.disease_status.stage.as_deref().unwrap_or("unstaged"),
            patient
                .ecog()
                .map(|ecog| ecog.to_string())
                .unwrap_or_else(|| "not assessed".to_string())
        );
        println!("- Catalog: {} protocols\n", protocols.len());
    }

    let results = match_patient(protocols, &patient, &options, MatchingSettings::default()).await?;
    print_results(format, &patient, results)
}

async fn match_patient(
    protocols: Vec<TreatmentProtocol>,
    patient: &PatientProfile,
    options: &MatchOptions,
    settings: MatchingSettings,
) -> Result<Vec<MatchingResult>, AppError> {
    let repository = Arc::new(InMemoryProtocolRepository::new(protocols));
    let engine = MatchingEngine::new(repository, settings);
    let results = engine
        .find_matching_protocols(patient, &options.to_request())
        .await?;
    Ok(results)
}

fn print_results(
    format: OutputFormat,
    patient: &PatientProfile,
    results: Vec<MatchingResult>,
) -> Result<(), AppError> {
    match format {
        OutputFormat::Table => {
            for line in summary_lines(&results) {
                println!("{line}");
            }
        }
        OutputFormat::Csv => print!("{}", render_results(&results)?),
        OutputFormat::Json => {
            let response = MatchResponse {
                patient_id: patient.patient_id.clone(),
                results,
            };
            let rendered =
                serde_json::to_string_pretty(&response).map_err(std::io::Error::from)?;
            println!("{rendered}");
        }
    }
    Ok(())
}

pub(crate) fn summary_lines(results: &[MatchingResult]) -> Vec<String> {
    if results.is_empty() {
        return vec!["No protocols matched.".to_string()];
    }

    let mut lines = Vec::new();
    for (index, result) in results.iter().enumerate() {
        lines.push(format!(
            "{}. {} ({}) score {:.3} | evidence {} | confidence {} | risk {:?}",
            index + 1,
            result.protocol_name,
            result.protocol_id,
            result.match_score,
            result.evidence_level.label(),
            result.confidence.label(),
            result.safety.risk_level
        ));
        if !result.eligibility.eligible || !result.eligibility.required_assessments.is_empty() {
            lines.push(format!("   Eligibility: {}", result.eligibility.summary()));
        }
        for finding in &result.contraindications {
            lines.push(format!(
                "   Contraindication ({:?}): {}",
                finding.kind, finding.condition
            ));
        }
        for modification in &result.required_modifications {
            lines.push(format!("   Modification: {modification}"));
        }
        if !result.alternative_protocols.is_empty() {
            let alternatives: Vec<&str> = result
                .alternative_protocols
                .iter()
                .map(|id| id.0.as_str())
                .collect();
            lines.push(format!("   Alternatives: {}", alternatives.join(", ")));
        }
    }
    lines
}
