use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::activity::{ActivityEntry, ActivityKind, ActivityQuery, NewActivity};
use crate::domain::call::CallResult;
use crate::domain::status::{TicketStatus, default_statuses};
use crate::domain::ticket::Ticket;
use crate::domain::workgroup::Workgroup;
use crate::error::{AppError, AppResult};
use crate::infra::memory::{InMemoryStore, StoreSnapshot};
use crate::services::{ActivitySubscription, TicketChange, TicketStore};

/// An in-memory store mirrored to a JSON file after every write.
pub struct LocalStore {
    file_path: PathBuf,
    inner: InMemoryStore,
}

impl LocalStore {
    pub fn open(path: &Path) -> AppResult<Self> {
        let snapshot = match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str::<StoreSnapshot>(&contents).map_err(|err| {
                AppError::Store(format!("invalid data file {}: {err}", path.display()))
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => StoreSnapshot {
                statuses: default_statuses(),
                ..StoreSnapshot::default()
            },
            Err(err) => return Err(AppError::Io(err)),
        };

        Ok(Self {
            file_path: path.to_path_buf(),
            inner: InMemoryStore::from_snapshot(snapshot),
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn memory(&self) -> &InMemoryStore {
        &self.inner
    }

    pub async fn save(&self) -> AppResult<()> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let snapshot = self.inner.snapshot().await;
        let data = serde_json::to_string_pretty(&snapshot)
            .map_err(|err| AppError::Store(format!("failed to encode data file: {err}")))?;
        fs::write(&self.file_path, data)?;
        Ok(())
    }
}

#[async_trait]
impl TicketStore for LocalStore {
    async fn fetch_ticket(&self, ticket_id: &str) -> AppResult<Ticket> {
        self.inner.fetch_ticket(ticket_id).await
    }

    async fn list_statuses(&self) -> AppResult<Vec<TicketStatus>> {
        self.inner.list_statuses().await
    }

    async fn fetch_status(&self, status_id: &str) -> AppResult<TicketStatus> {
        self.inner.fetch_status(status_id).await
    }

    async fn list_workgroups(&self) -> AppResult<Vec<Workgroup>> {
        self.inner.list_workgroups().await
    }

    async fn fetch_workgroup(&self, group_id: &str) -> AppResult<Workgroup> {
        self.inner.fetch_workgroup(group_id).await
    }

    async fn create_workgroup_if_absent(&self, group: &Workgroup) -> AppResult<bool> {
        let created = self.inner.create_workgroup_if_absent(group).await?;
        if created {
            self.save().await?;
        }
        Ok(created)
    }

    async fn commit(&self, change: TicketChange) -> AppResult<(Ticket, ActivityEntry)> {
        let outcome = self.inner.commit(change).await?;
        self.save().await?;
        Ok(outcome)
    }

    async fn append_activity(
        &self,
        ticket_id: &str,
        activity: NewActivity,
    ) -> AppResult<ActivityEntry> {
        let entry = self.inner.append_activity(ticket_id, activity).await?;
        self.save().await?;
        Ok(entry)
    }

    async fn fetch_activity(&self, ticket_id: &str, entry_id: &str) -> AppResult<ActivityEntry> {
        self.inner.fetch_activity(ticket_id, entry_id).await
    }

    async fn query_activity(
        &self,
        ticket_id: &str,
        query: &ActivityQuery,
    ) -> AppResult<Vec<ActivityEntry>> {
        self.inner.query_activity(ticket_id, query).await
    }

    async fn count_activity(&self, ticket_id: &str, kind: ActivityKind) -> AppResult<usize> {
        self.inner.count_activity(ticket_id, kind).await
    }

    async fn subscribe_activity(&self, ticket_id: &str) -> AppResult<ActivitySubscription> {
        self.inner.subscribe_activity(ticket_id).await
    }

    async fn append_call_result(&self, ticket_id: &str, record: CallResult) -> AppResult<()> {
        self.inner.append_call_result(ticket_id, record).await?;
        self.save().await
    }

    async fn list_call_results(&self, ticket_id: &str) -> AppResult<Vec<CallResult>> {
        self.inner.list_call_results(ticket_id).await
    }
}
