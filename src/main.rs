use anyhow::{anyhow, Context, Result};
use change_intake::presentation::cli_summary::{
    print_duplicate, print_perf_summary, print_request, print_requests,
};
use change_intake::presentation::json::{render_request, render_requests};
use change_intake::{
    init_schema, init_tracing, intake_service, open_store, AppConfig, ChangeRequestStore,
    ChangeStatus, DraftRequest, EnvActor, IntakeError, LogLevel, PerfReport, ResourceType,
};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Exit status of a draft rejected as a duplicate.
const EXIT_DUPLICATE: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "change-intake",
    about = "Record governed changes as pending requests, with field diffs and duplicate detection."
)]
struct Cli {
    /// Config file. Defaults to the per-user config file when it exists.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the change_request table.
    Init,

    /// Record a new pending change request.
    Draft {
        #[arg(long = "type")]
        resource_type: String,
        #[arg(long)]
        action: String,
        #[arg(long)]
        id: Option<String>,
        /// Proposed state: inline JSON or @path.
        #[arg(long)]
        after: Option<String>,
        /// Current state: inline JSON or @path.
        #[arg(long)]
        before: Option<String>,
        #[arg(long)]
        reason: Option<String>,
        /// Print store timings.
        #[arg(long)]
        timings: bool,
    },

    /// List change requests.
    List {
        #[arg(long = "type")]
        resource_type: Option<String>,
        #[arg(long)]
        status: Option<ChangeStatus>,
        #[arg(long)]
        json: bool,
    },

    /// Show one change request with its diff.
    Show {
        id: Uuid,
        #[arg(long)]
        json: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    match path {
        Some(p) => AppConfig::load(p),
        None => match AppConfig::default_path().filter(|p| p.exists()) {
            Some(p) => AppConfig::load(p),
            None => Ok(AppConfig::default()),
        },
    }
}

/// Parse a payload argument: inline JSON, or `@path` to read it from a file.
fn read_payload_arg(arg: Option<&str>) -> Result<Option<Value>> {
    let Some(arg) = arg else {
        return Ok(None);
    };
    let text = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read payload file: {}", path))?,
        None => arg.to_string(),
    };
    let value = serde_json::from_str(&text).with_context(|| "Payload is not valid JSON")?;
    Ok(Some(value))
}

async fn open(cfg: &AppConfig) -> Result<(Arc<dyn ChangeRequestStore>, Arc<Mutex<PerfReport>>)> {
    let report = PerfReport::new();
    let store = open_store(&cfg.store, Arc::clone(&report)).await?;
    Ok((store, report))
}

fn snapshot(report: &Mutex<PerfReport>) -> PerfReport {
    report.lock().map(|r| r.clone()).unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_tracing(match (cli.verbose, cli.quiet) {
        (true, _) => LogLevel::Debug,
        (_, true) => LogLevel::Error,
        _ => LogLevel::Info,
    });

    let cfg = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Init => {
            init_schema(&cfg.store).await?;
            println!("Schema ready ({})", cfg.store.driver);
        }

        Command::Draft {
            resource_type,
            action,
            id,
            after,
            before,
            reason,
            timings,
        } => {
            let request = DraftRequest {
                resource_type: Some(resource_type),
                action: Some(action),
                resource_id: id,
                after: read_payload_arg(after.as_deref())?,
                before: read_payload_arg(before.as_deref())?,
                reason,
            };
            let (store, report) = open(&cfg).await?;
            let service = intake_service(&cfg, store, Arc::new(EnvActor));
            let outcome = service.draft(request).await;
            if timings {
                print_perf_summary(&snapshot(&report));
            }
            match outcome {
                Ok(cr) => print_request(&cr),
                Err(IntakeError::DuplicateConflict { message, .. }) => {
                    print_duplicate(&message);
                    return Ok(ExitCode::from(EXIT_DUPLICATE));
                }
                Err(err) => return Err(err.into()),
            }
        }

        Command::List {
            resource_type,
            status,
            json,
        } => {
            let (store, report) = open(&cfg).await?;
            let resource_type = resource_type.map(|t| ResourceType::normalize(Some(&t)));
            let requests = store.list(resource_type.as_ref(), status).await?;
            if json {
                println!("{}", render_requests(&requests, Some(&snapshot(&report)))?);
            } else {
                print_requests(&requests);
            }
        }

        Command::Show { id, json } => {
            let (store, _) = open(&cfg).await?;
            let cr = store
                .find_by_id(id)
                .await?
                .ok_or_else(|| anyhow!("Change request {} not found", id))?;
            if json {
                println!("{}", render_request(&cr)?);
            } else {
                print_request(&cr);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
