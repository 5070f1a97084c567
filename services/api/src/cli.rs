use crate::demo::{run_demo, DemoArgs};
use crate::infra::{apply_rule_definitions, load_snapshot, open_runner, LogTransport};
use crate::server;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use hr_compliance::clock::{Clock, FixedClock, SystemClock};
use hr_compliance::compliance::RuleType;
use hr_compliance::config::{AppConfig, ComplianceConfig};
use hr_compliance::error::AppError;
use hr_compliance::telemetry;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "HR Compliance",
    about = "Evaluate HR compliance rules and manage the resulting alerts",
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
    /// Evaluate compliance rules once, for an external scheduler
    Run(RunArgs),
    /// Walk through detection, notification and alert follow-up on seeded records
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
    /// Directory of CSV exports to evaluate
    #[arg(long)]
    pub(crate) data: Option<PathBuf>,
    /// Directory holding the rule and alert tables (defaults to COMPLIANCE_STATE_DIR)
    #[arg(long)]
    pub(crate) state: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// Directory of CSV exports to evaluate
    #[arg(long)]
    pub(crate) data: Option<PathBuf>,
    /// Restrict the run to one rule type (e.g. contract, medical-visit)
    #[arg(long, value_parser = parse_rule_type)]
    pub(crate) rule_type: Option<RuleType>,
    /// Evaluation date (defaults to today)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Directory holding the rule and alert tables (defaults to COMPLIANCE_STATE_DIR)
    #[arg(long)]
    pub(crate) state: Option<PathBuf>,
}

fn parse_rule_type(raw: &str) -> Result<RuleType, String> {
    raw.parse::<RuleType>().map_err(|err| err.to_string())
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Run(args) => run_once(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}

async fn run_once(args: RunArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let payload = scheduled_run(&args, &config.compliance).await?;
    match serde_json::to_string_pretty(&payload) {
        Ok(json) => println!("{json}"),
        Err(err) => println!("run report unavailable: {err}"),
    }
    Ok(())
}

/// One evaluation pass over the stored state: apply `rules.csv`, run, report as JSON.
pub(crate) async fn scheduled_run(
    args: &RunArgs,
    config: &ComplianceConfig,
) -> Result<serde_json::Value, AppError> {
    let snapshot = load_snapshot(args.data.as_deref())?;
    let clock: Arc<dyn Clock> = match args.today {
        Some(today) => Arc::new(FixedClock::on(today)),
        None => Arc::new(SystemClock),
    };
    let transport = Arc::new(LogTransport::new(config.sender.clone()));
    let state_dir = args.state.as_deref().unwrap_or(config.state_dir.as_path());
    let runner = open_runner(config, state_dir, snapshot, transport, clock)?;
    apply_rule_definitions(&runner, args.data.as_deref())?;

    let payload = match args.rule_type {
        Some(rule_type) => {
            let outcome = runner.run_one(rule_type).await?;
            serde_json::json!({ "rule_type": rule_type, "outcome": outcome })
        }
        None => serde_json::json!(runner.run_all().await),
    };
    Ok(payload)
}
