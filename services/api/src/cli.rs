use crate::demo::{run_demo, run_match, DemoArgs, MatchArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use oncomatch::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Oncology Protocol Matcher",
    about = "Match oncology patients to treatment protocols over HTTP or from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Match a patient record file against a protocol catalog
    Match(MatchArgs),
    /// Match the bundled demo patient against the bundled demo catalog
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Protocol catalog JSON; overrides PROTOCOL_CATALOG_PATH
    #[arg(long)]
    pub(crate) catalog: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Match(args) => run_match(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_defaults_to_serve() {
        let cli = Cli::try_parse_from(["oncomatch-api"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn match_command_accepts_request_options() {
        let cli = Cli::try_parse_from([
            "oncomatch-api",
            "match",
            "--patient",
            "patient.json",
            "--max-results",
            "3",
            "--minimum-evidence",
            "b",
            "--exclude-contraindicated",
            "--format",
            "csv",
        ])
        .expect("parses");

        let Some(Command::Match(args)) = cli.command else {
            panic!("expected match command");
        };
        assert_eq!(args.patient, PathBuf::from("patient.json"));
        assert_eq!(args.options.max_results, Some(3));
        assert!(args.options.exclude_contraindicated);
        assert_eq!(
            args.options.minimum_evidence,
            Some(oncomatch::matching::EvidenceLevel::B)
        );
    }

    #[test]
    fn demo_command_accepts_intent_and_risk_filters() {
        let cli = Cli::try_parse_from([
            "oncomatch-api",
            "demo",
            "--treatment-intent",
            "curative",
            "--maximum-risk-level",
            "very-high",
        ])
        .expect("parses");

        let Some(Command::Demo(args)) = cli.command else {
            panic!("expected demo command");
        };
        assert_eq!(
            args.options.treatment_intent,
            Some(oncomatch::matching::TreatmentIntent::Curative)
        );
        assert_eq!(
            args.options.maximum_risk_level,
            Some(oncomatch::matching::RiskLevel::VeryHigh)
        );
        assert!(Cli::try_parse_from(["oncomatch-api", "demo", "--treatment-intent", "cure"]).is_err());
    }

    #[test]
    fn zero_max_results_is_rejected_by_the_engine_not_the_parser() {
        let cli = Cli::try_parse_from(["oncomatch-api", "demo", "--max-results", "0"])
            .expect("parses");
        let Some(Command::Demo(args)) = cli.command else {
            panic!("expected demo command");
        };
        assert_eq!(args.options.max_results, Some(0));
    }
}
