use anyhow::Result;
use std::sync::{Arc, Mutex};

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

// ─── Log level ────────────────────────────────────────────────────────────────

/// Controls the verbosity of change-intake's internal tracing output.
///
/// Pass to [`init_tracing`] before calling any async entry point.
///
/// | Variant | `tracing` level | When to use                                  |
/// |---------|-----------------|----------------------------------------------|
/// | `Error` | `error`         | `--quiet` / CI scripting                     |
/// | `Info`  | `info`          | Default: drafts, duplicates, store timings   |
/// | `Debug` | `debug`         | `--verbose`: normalization and SQL too       |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    /// Default `EnvFilter` directive for this level.
    pub fn filter(self) -> &'static str {
        match self {
            LogLevel::Error => "change_intake=error",
            LogLevel::Info => "change_intake=info",
            LogLevel::Debug => "change_intake=debug",
        }
    }
}

/// Initialise the global `tracing` subscriber.
///
/// Respects `RUST_LOG` when set, falling back to `level` otherwise. Call
/// this once at startup; library consumers that manage their own subscriber
/// should skip it.
///
/// Only available with the `cli` feature (pulls in `tracing-subscriber`).
#[cfg(feature = "cli")]
pub fn init_tracing(level: LogLevel) {
    use tracing_subscriber::fmt::format::FmtSpan;

    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level.filter().into()),
        )
        .init();
}

// ─── Public API Facade ───

pub use application::conflict::duplicate_message;
pub use application::diff::build_diff;
pub use application::intake::{ChangeRequestService, IntakePolicy, ACTIVE_STATUSES};
pub use application::monitoring::{MonitoringStore, PerfReport};
pub use domain::change_request::{Category, ChangeRequest, ChangeStatus};
pub use domain::draft::DraftRequest;
pub use domain::error::{IntakeError, IntakeResult};
pub use domain::fingerprint::fingerprint;
pub use domain::payload::{normalize_payload, to_payload, Payload};
pub use domain::ports::{ActorResolver, ApprovalLinkage, ChangeRequestStore, PayloadSerializer};
pub use domain::snapshot::{ChangeSnapshot, FieldChange};
pub use domain::value_objects::{Action, Fingerprint, ResourceType};
pub use infrastructure::actor::{EnvActor, StaticActor};
pub use infrastructure::config::{AppConfig, DbConfig, IntakeConfig};
pub use infrastructure::memory::InMemoryChangeRequestStore;
pub use infrastructure::serializer::JsonSerializer;

use crate::infrastructure::db::client::connect;

// ─── Public entry points ───

/// Create the `change_request` table and its indexes if they are missing.
pub async fn init_schema(cfg: &DbConfig) -> Result<()> {
    connect(cfg).await?.ensure_schema().await
}

/// Connect to the configured database and wrap the store in the monitoring
/// decorator. Every call made through the returned store is timed into
/// `report`.
pub async fn open_store(
    cfg: &DbConfig,
    report: Arc<Mutex<PerfReport>>,
) -> Result<Arc<dyn ChangeRequestStore>> {
    let store = Arc::new(connect(cfg).await?);
    Ok(Arc::new(MonitoringStore::new(store, report)))
}

/// Intake service over `store`, with the dedup policy taken from `cfg`.
pub fn intake_service(
    cfg: &AppConfig,
    store: Arc<dyn ChangeRequestStore>,
    actor: Arc<dyn ActorResolver>,
) -> ChangeRequestService {
    ChangeRequestService::new(store, actor, IntakePolicy::from(&cfg.intake))
}
