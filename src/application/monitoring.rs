use crate::domain::change_request::{ChangeRequest, ChangeStatus};
use crate::domain::ports::ChangeRequestStore;
use crate::domain::value_objects::ResourceType;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, instrument};
use uuid::Uuid;

// ─── PerfReport ──────────────────────────────────────────────────────────────

/// A single timed store operation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OpTiming {
    /// Operation name: "find_active", "save", "find_by_id" or "list".
    pub operation: &'static str,
    /// Resource type the operation was scoped to, if any.
    pub resource_type: String,
    /// Elapsed wall time in milliseconds.
    pub duration_ms: u128,
    /// Number of requests read or written.
    pub rows: usize,
}

/// Accumulated store timings, shared by every decorator built for one
/// service via `Arc<Mutex<_>>`.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct PerfReport {
    pub timings: Vec<OpTiming>,
    pub total_rows_read: usize,
    pub total_ms: u128,
}

impl PerfReport {
    pub fn new() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::default()))
    }

    fn record(report: &Arc<Mutex<Self>>, timing: OpTiming) {
        if let Ok(mut r) = report.lock() {
            r.total_ms += timing.duration_ms;
            if timing.operation != "save" {
                r.total_rows_read += timing.rows;
            }
            r.timings.push(timing);
        }
    }
}

// ─── MonitoringStore ─────────────────────────────────────────────────────────

/// Decorator: wraps any `ChangeRequestStore`, measures wall time per call,
/// and appends the result to the shared `PerfReport`.
pub struct MonitoringStore {
    inner: Arc<dyn ChangeRequestStore>,
    report: Arc<Mutex<PerfReport>>,
}

impl MonitoringStore {
    pub fn new(inner: Arc<dyn ChangeRequestStore>, report: Arc<Mutex<PerfReport>>) -> Self {
        Self { inner, report }
    }

    fn finish(&self, operation: &'static str, resource_type: &str, start: Instant, rows: usize) {
        let duration_ms = start.elapsed().as_millis();
        info!(operation, resource_type, rows, duration_ms, "store call completed");
        PerfReport::record(
            &self.report,
            OpTiming {
                operation,
                resource_type: resource_type.to_string(),
                duration_ms,
                rows,
            },
        );
    }
}

#[async_trait]
impl ChangeRequestStore for MonitoringStore {
    #[instrument(
        name = "find_active",
        skip(self, resource_type, statuses),
        fields(cr.resource_type = %resource_type),
        level = "info"
    )]
    async fn find_active(
        &self,
        resource_type: &ResourceType,
        statuses: &[ChangeStatus],
    ) -> Result<Vec<ChangeRequest>> {
        let start = Instant::now();
        let rows = self.inner.find_active(resource_type, statuses).await?;
        self.finish("find_active", resource_type.as_str(), start, rows.len());
        Ok(rows)
    }

    #[instrument(
        name = "save",
        skip(self, request),
        fields(cr.resource_type = %request.resource_type, cr.status = %request.status),
        level = "info"
    )]
    async fn save(&self, request: ChangeRequest) -> Result<ChangeRequest> {
        let start = Instant::now();
        let resource_type = request.resource_type.0.clone();
        let saved = self.inner.save(request).await?;
        self.finish("save", &resource_type, start, 1);
        Ok(saved)
    }

    #[instrument(name = "find_by_id", skip(self), level = "debug")]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ChangeRequest>> {
        let start = Instant::now();
        let found = self.inner.find_by_id(id).await?;
        self.finish("find_by_id", "", start, usize::from(found.is_some()));
        Ok(found)
    }

    #[instrument(name = "list", skip(self), level = "debug")]
    async fn list(
        &self,
        resource_type: Option<&ResourceType>,
        status: Option<ChangeStatus>,
    ) -> Result<Vec<ChangeRequest>> {
        let start = Instant::now();
        let rows = self.inner.list(resource_type, status).await?;
        let scope = resource_type.map(ResourceType::as_str).unwrap_or("");
        self.finish("list", scope, start, rows.len());
        Ok(rows)
    }
}
