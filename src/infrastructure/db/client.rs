use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::any::{AnyPoolOptions, AnyQueryResult};
use sqlx::AnyPool;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::domain::change_request::{ChangeRequest, ChangeStatus};
use crate::domain::error::DedupKeyTaken;
use crate::domain::ports::ChangeRequestStore;
use crate::domain::value_objects::ResourceType;
use crate::infrastructure::config::DbConfig;
use crate::infrastructure::db::dialect::{from_driver, QueryDialect};
use crate::infrastructure::db::row_mapper::{request_to_params, row_to_request};
use crate::infrastructure::db::sql_utils::{
    build_find_active_query, build_find_by_id_query, build_insert_query, build_list_query,
    build_update_query,
};

pub struct SqlxChangeRequestStore {
    pool: AnyPool,
    dialect: Arc<dyn QueryDialect>,
}

/// Connect to the database described in `cfg` and return a `SqlxChangeRequestStore`.
///
/// The schema is not touched; call [`SqlxChangeRequestStore::ensure_schema`]
/// once per database.
pub async fn connect(cfg: &DbConfig) -> Result<SqlxChangeRequestStore> {
    sqlx::any::install_default_drivers();

    let pool = AnyPoolOptions::new()
        .max_connections(cfg.max_connections.max(1))
        .connect(&cfg.url())
        .await
        .with_context(|| {
            format!(
                "Failed to connect to {} (driver: {})",
                cfg.dbname, cfg.driver
            )
        })?;

    debug!(
        "Connected to {}/{} via {} driver",
        cfg.host, cfg.dbname, cfg.driver
    );

    Ok(SqlxChangeRequestStore {
        pool,
        dialect: Arc::from(from_driver(&cfg.driver)),
    })
}

/// Turn a unique-index violation (only `dedup_key` can produce one for a
/// freshly generated id) into [`DedupKeyTaken`].
fn map_write_error(err: sqlx::Error, request: &ChangeRequest) -> anyhow::Error {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            if let Some(key) = &request.dedup_key {
                return DedupKeyTaken {
                    dedup_key: key.clone(),
                }
                .into();
            }
        }
    }
    anyhow::Error::new(err).context("Failed to write change_request")
}

impl SqlxChangeRequestStore {
    pub fn driver(&self) -> &'static str {
        self.dialect.name()
    }

    /// Create the `change_request` table and its indexes when missing.
    pub async fn ensure_schema(&self) -> Result<()> {
        for stmt in self.dialect.schema_statements() {
            debug!("Executing: {}", stmt);
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to create schema ({})", self.dialect.name()))?;
        }
        Ok(())
    }

    async fn execute(&self, sql: &str, params: Vec<Option<String>>) -> sqlx::Result<AnyQueryResult> {
        debug!("Executing: {}", sql);
        let mut query = sqlx::query(sql);
        for p in params {
            query = query.bind(p);
        }
        query.execute(&self.pool).await
    }

    async fn fetch(&self, sql: &str, params: Vec<String>) -> Result<Vec<ChangeRequest>> {
        debug!("Executing: {}", sql);
        let mut query = sqlx::query(sql);
        for p in params {
            query = query.bind(p);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .context("Failed to query change_request")?;
        rows.iter().map(row_to_request).collect()
    }
}

#[async_trait]
impl ChangeRequestStore for SqlxChangeRequestStore {
    async fn find_active(
        &self,
        resource_type: &ResourceType,
        statuses: &[ChangeStatus],
    ) -> Result<Vec<ChangeRequest>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let sql = build_find_active_query(self.dialect.as_ref(), statuses.len());
        let mut params = vec![resource_type.as_str().to_string()];
        params.extend(statuses.iter().map(|s| s.as_str().to_string()));
        self.fetch(&sql, params).await
    }

    async fn save(&self, mut request: ChangeRequest) -> Result<ChangeRequest> {
        request.dedup_key = request.active_dedup_key().map(str::to_string);
        match request.id {
            None => {
                let id = Uuid::new_v4();
                let sql = build_insert_query(self.dialect.as_ref());
                self.execute(&sql, request_to_params(id, &request))
                    .await
                    .map_err(|e| map_write_error(e, &request))?;
                request.id = Some(id);
            }
            Some(id) => {
                let mut params = request_to_params(id, &request);
                params.rotate_left(1);
                let sql = build_update_query(self.dialect.as_ref());
                let result = self
                    .execute(&sql, params)
                    .await
                    .map_err(|e| map_write_error(e, &request))?;
                if result.rows_affected() == 0 {
                    bail!("Change request {} does not exist", id);
                }
            }
        }
        Ok(request)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ChangeRequest>> {
        let sql = build_find_by_id_query(self.dialect.as_ref());
        Ok(self.fetch(&sql, vec![id.to_string()]).await?.into_iter().next())
    }

    async fn list(
        &self,
        resource_type: Option<&ResourceType>,
        status: Option<ChangeStatus>,
    ) -> Result<Vec<ChangeRequest>> {
        let sql = build_list_query(
            self.dialect.as_ref(),
            resource_type.is_some(),
            status.is_some(),
        );
        let params = resource_type
            .map(|t| t.as_str().to_string())
            .into_iter()
            .chain(status.map(|s| s.as_str().to_string()))
            .collect();
        self.fetch(&sql, params).await
    }
}
