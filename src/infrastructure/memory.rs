use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::domain::change_request::{ChangeRequest, ChangeStatus};
use crate::domain::error::DedupKeyTaken;
use crate::domain::ports::ChangeRequestStore;
use crate::domain::value_objects::ResourceType;

/// In-memory implementation of [`ChangeRequestStore`].
///
/// Enforces the same `dedup_key` uniqueness as the SQL store, so tests
/// exercise the race guard without a database.
#[derive(Debug, Default)]
pub struct InMemoryChangeRequestStore {
    rows: Mutex<Vec<ChangeRequest>>,
}

impl InMemoryChangeRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing requests (ids are assigned where missing).
    pub fn with_requests(requests: Vec<ChangeRequest>) -> Self {
        let rows = requests
            .into_iter()
            .map(|mut r| {
                r.id.get_or_insert_with(Uuid::new_v4);
                r
            })
            .collect();
        Self {
            rows: Mutex::new(rows),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every stored request, in insertion order.
    pub fn all(&self) -> Vec<ChangeRequest> {
        self.rows.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn rows(&self) -> Result<MutexGuard<'_, Vec<ChangeRequest>>> {
        self.rows
            .lock()
            .map_err(|_| anyhow!("change request store lock poisoned"))
    }
}

#[async_trait]
impl ChangeRequestStore for InMemoryChangeRequestStore {
    async fn find_active(
        &self,
        resource_type: &ResourceType,
        statuses: &[ChangeStatus],
    ) -> Result<Vec<ChangeRequest>> {
        Ok(self
            .rows()?
            .iter()
            .filter(|r| &r.resource_type == resource_type && statuses.contains(&r.status))
            .cloned()
            .collect())
    }

    async fn save(&self, mut request: ChangeRequest) -> Result<ChangeRequest> {
        request.dedup_key = request.active_dedup_key().map(str::to_string);
        let mut rows = self.rows()?;

        if let Some(key) = &request.dedup_key {
            let taken = rows
                .iter()
                .any(|r| r.id != request.id && r.dedup_key.as_ref() == Some(key));
            if taken {
                return Err(DedupKeyTaken {
                    dedup_key: key.clone(),
                }
                .into());
            }
        }

        match request.id {
            None => {
                request.id = Some(Uuid::new_v4());
                rows.push(request.clone());
            }
            Some(id) => match rows.iter_mut().find(|r| r.id == Some(id)) {
                Some(slot) => *slot = request.clone(),
                None => bail!("Change request {} does not exist", id),
            },
        }
        Ok(request)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ChangeRequest>> {
        Ok(self.rows()?.iter().find(|r| r.id == Some(id)).cloned())
    }

    async fn list(
        &self,
        resource_type: Option<&ResourceType>,
        status: Option<ChangeStatus>,
    ) -> Result<Vec<ChangeRequest>> {
        let mut rows: Vec<ChangeRequest> = self
            .rows()?
            .iter()
            .filter(|r| resource_type.map_or(true, |t| &r.resource_type == t))
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.requested_at);
        Ok(rows)
    }
}
