use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::domain::activity::{ActivityEntry, ActivityKind, ActivityQuery, NewActivity};
use crate::domain::call::CallResult;
use crate::domain::status::TicketStatus;
use crate::domain::ticket::{Ticket, TicketPatch};
use crate::domain::workgroup::Workgroup;
use crate::error::AppResult;

/// Everything one lifecycle transition writes, committed as a unit.
#[derive(Debug, Clone)]
pub struct TicketChange {
    pub ticket_id: String,
    /// The version read before the change; a mismatch fails with `Conflict`.
    pub expected_version: u64,
    pub patch: TicketPatch,
    /// Upserted under its deterministic id before the patch is applied.
    pub ensure_group: Option<Workgroup>,
    pub activity: NewActivity,
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn fetch_ticket(&self, ticket_id: &str) -> AppResult<Ticket>;
    async fn list_statuses(&self) -> AppResult<Vec<TicketStatus>>;
    async fn fetch_status(&self, status_id: &str) -> AppResult<TicketStatus>;
    async fn list_workgroups(&self) -> AppResult<Vec<Workgroup>>;
    async fn fetch_workgroup(&self, group_id: &str) -> AppResult<Workgroup>;
    /// Returns `true` if the group was created, `false` if it already existed.
    async fn create_workgroup_if_absent(&self, group: &Workgroup) -> AppResult<bool>;
    async fn commit(&self, change: TicketChange) -> AppResult<(Ticket, ActivityEntry)>;
    async fn append_activity(
        &self,
        ticket_id: &str,
        activity: NewActivity,
    ) -> AppResult<ActivityEntry>;
    async fn fetch_activity(&self, ticket_id: &str, entry_id: &str) -> AppResult<ActivityEntry>;
    async fn query_activity(
        &self,
        ticket_id: &str,
        query: &ActivityQuery,
    ) -> AppResult<Vec<ActivityEntry>>;
    async fn count_activity(&self, ticket_id: &str, kind: ActivityKind) -> AppResult<usize>;
    async fn subscribe_activity(&self, ticket_id: &str) -> AppResult<ActivitySubscription>;
    async fn append_call_result(&self, ticket_id: &str, record: CallResult) -> AppResult<()>;
    async fn list_call_results(&self, ticket_id: &str) -> AppResult<Vec<CallResult>>;
}

/// Live view of a ticket's activity; each update is the full ordered entry set.
///
/// Dropping the subscription tears it down, including any background feeder.
pub struct ActivitySubscription {
    receiver: watch::Receiver<Vec<ActivityEntry>>,
    feeder: Option<JoinHandle<()>>,
}

impl ActivitySubscription {
    pub fn new(receiver: watch::Receiver<Vec<ActivityEntry>>) -> Self {
        Self {
            receiver,
            feeder: None,
        }
    }

    pub fn with_feeder(receiver: watch::Receiver<Vec<ActivityEntry>>, feeder: JoinHandle<()>) -> Self {
        Self {
            receiver,
            feeder: Some(feeder),
        }
    }

    pub fn current(&self) -> Vec<ActivityEntry> {
        self.receiver.borrow().clone()
    }

    /// Waits for the next snapshot; `None` once the source has gone away.
    pub async fn next_snapshot(&mut self) -> Option<Vec<ActivityEntry>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    pub fn close(self) {}
}

impl Drop for ActivitySubscription {
    fn drop(&mut self) {
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
    }
}
