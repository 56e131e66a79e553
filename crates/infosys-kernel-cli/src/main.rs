use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use infosys_kernel_api::{CompareRequest, InfosysKernelApi};
use infosys_kernel_core::{DiffOptions, RecordId, VersionId, ViewSession, ViewState};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

const CLI_CONTRACT_VERSION: &str = "cli.v1";
const LOG_ENV: &str = "ISK_LOG";

#[derive(Debug, Parser)]
#[command(name = "isk")]
#[command(about = "Information system version kernel CLI")]
struct Cli {
    /// JSON dataset of the form `{ "records": [...] }`.
    #[arg(long, global = true, env = "ISK_RECORDS", default_value = "./records.json")]
    records: PathBuf,

    /// Count a change of resource kind as a modification. The env value is falsey
    /// for `0`, `n`, `no`, `f`, `false` and `off`; anything else enables it.
    #[arg(
        long,
        global = true,
        env = "ISK_INCLUDE_RESOURCE_KIND",
        value_parser = clap::builder::FalseyValueParser::new(),
        default_value_t = false
    )]
    include_resource_kind: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Record {
        #[command(subcommand)]
        command: Box<RecordCommand>,
    },
    Version {
        #[command(subcommand)]
        command: Box<VersionCommand>,
    },
    Diff(DiffArgs),
    View(ViewArgs),
}

#[derive(Debug, Subcommand)]
enum RecordCommand {
    List,
    Show(RecordArgs),
}

#[derive(Debug, Subcommand)]
enum VersionCommand {
    List(RecordArgs),
    Show(VersionShowArgs),
}

#[derive(Debug, Args)]
struct RecordArgs {
    #[arg(long)]
    record: String,
}

#[derive(Debug, Args)]
struct VersionShowArgs {
    #[arg(long)]
    record: String,
    /// Omit for the current version. Unknown ids fall back to current.
    #[arg(long)]
    version: Option<String>,
}

#[derive(Debug, Args)]
struct DiffArgs {
    #[arg(long)]
    record: String,
    /// Defaults to the newest history entry.
    #[arg(long)]
    baseline: Option<String>,
    /// Defaults to the current version.
    #[arg(long)]
    candidate: Option<String>,
}

#[derive(Debug, Args)]
struct ViewArgs {
    #[arg(long)]
    record: String,
    /// Transition to replay, in order. Repeatable.
    #[arg(long = "step")]
    steps: Vec<ViewStep>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ViewStep {
    ViewHistory(VersionId),
    ReturnToLatest,
    StartCompare,
    CompareTarget(VersionId),
    ExitCompare,
}

impl FromStr for ViewStep {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.split_once('=') {
            Some(("view-history", id)) if !id.is_empty() => {
                Ok(Self::ViewHistory(VersionId::new(id)))
            }
            Some(("compare-target", id)) if !id.is_empty() => {
                Ok(Self::CompareTarget(VersionId::new(id)))
            }
            None if value == "return-to-latest" => Ok(Self::ReturnToLatest),
            None if value == "start-compare" => Ok(Self::StartCompare),
            None if value == "exit-compare" => Ok(Self::ExitCompare),
            _ => Err(format!(
                "unsupported step `{value}`; expected view-history=<id>, return-to-latest, \
                 start-compare, compare-target=<id> or exit-compare"
            )),
        }
    }
}

impl ViewStep {
    fn label(&self) -> String {
        match self {
            Self::ViewHistory(id) => format!("view-history={id}"),
            Self::ReturnToLatest => "return-to-latest".to_string(),
            Self::StartCompare => "start-compare".to_string(),
            Self::CompareTarget(id) => format!("compare-target={id}"),
            Self::ExitCompare => "exit-compare".to_string(),
        }
    }

    fn apply(&self, session: &mut ViewSession<'_>) -> Result<(), String> {
        match self {
            Self::ViewHistory(id) => session.view_history(id),
            Self::ReturnToLatest => session.return_to_latest(),
            Self::StartCompare => session.start_compare(),
            Self::CompareTarget(id) => {
                return session.change_compare_target(id).map_err(|err| err.to_string());
            }
            Self::ExitCompare => session.exit_compare(),
        }
        Ok(())
    }
}

/// Session state observed right after one replayed step.
#[derive(Debug, Serialize)]
struct StepOutcome {
    step: String,
    error: Option<String>,
    state: ViewState,
    displayed_version_id: VersionId,
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let options = DiffOptions { include_resource_kind: cli.include_resource_kind };
    let api = InfosysKernelApi::open(&cli.records, options)?;

    match cli.command {
        Command::Record { command } => run_record(*command, &api),
        Command::Version { command } => run_version(*command, &api),
        Command::Diff(args) => run_diff(&args, &api),
        Command::View(args) => run_view(&args, &api),
    }
}

fn run_record(command: RecordCommand, api: &InfosysKernelApi) -> Result<()> {
    match command {
        RecordCommand::List => {
            let records = api.list_records();
            emit_json(serde_json::json!({
                "dataset_id": api.dataset_id(),
                "count": records.len(),
                "records": records
            }))
        }
        RecordCommand::Show(args) => {
            let record = api.get_record(&RecordId::new(args.record))?;
            emit_json(serde_json::json!({ "record": record }))
        }
    }
}

fn run_version(command: VersionCommand, api: &InfosysKernelApi) -> Result<()> {
    match command {
        VersionCommand::List(args) => {
            let record_id = RecordId::new(args.record);
            let versions = api.versions(&record_id)?;
            emit_json(serde_json::json!({
                "record_id": record_id,
                "versions": versions
            }))
        }
        VersionCommand::Show(args) => {
            let requested = args.version.map(VersionId::new);
            let shown = api.show_version(&RecordId::new(args.record), requested.as_ref())?;
            emit_json(serde_json::to_value(shown)?)
        }
    }
}

fn run_diff(args: &DiffArgs, api: &InfosysKernelApi) -> Result<()> {
    let envelope = api.compare(&CompareRequest {
        record_id: RecordId::new(args.record.as_str()),
        baseline: args.baseline.as_deref().map(VersionId::new),
        candidate: args.candidate.as_deref().map(VersionId::new),
    })?;
    emit_json(serde_json::to_value(envelope)?)
}

fn run_view(args: &ViewArgs, api: &InfosysKernelApi) -> Result<()> {
    let mut session = api.open_viewer(&RecordId::new(args.record.as_str()))?;

    let mut steps = Vec::with_capacity(args.steps.len());
    for step in &args.steps {
        let error = step.apply(&mut session).err();
        if let Some(message) = &error {
            tracing::warn!(step = %step.label(), error = %message, "view step rejected");
        }
        steps.push(StepOutcome {
            step: step.label(),
            error,
            state: session.state().clone(),
            displayed_version_id: session.displayed_version().version_id.clone(),
        });
    }

    emit_json(serde_json::json!({
        "record_id": session.record().id,
        "steps": steps,
        "final": session.report()
    }))
}
