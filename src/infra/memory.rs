use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, watch};
use uuid::Uuid;

use crate::domain::activity::{
    ActivityEntry, ActivityKind, ActivityQuery, NewActivity, feed_order,
};
use crate::domain::call::CallResult;
use crate::domain::status::TicketStatus;
use crate::domain::ticket::Ticket;
use crate::domain::workgroup::Workgroup;
use crate::error::{AppError, AppResult};
use crate::services::{ActivitySubscription, TicketChange, TicketStore};

/// The full contents of a store, as persisted by the local backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub tickets: BTreeMap<String, Ticket>,
    #[serde(default)]
    pub statuses: Vec<TicketStatus>,
    #[serde(default)]
    pub workgroups: BTreeMap<String, Workgroup>,
    #[serde(default)]
    pub activity: BTreeMap<String, Vec<ActivityEntry>>,
    #[serde(default)]
    pub calls: BTreeMap<String, Vec<CallResult>>,
}

impl StoreSnapshot {
    fn ordered_activity(&self, ticket_id: &str) -> Vec<ActivityEntry> {
        let mut entries = self.activity.get(ticket_id).cloned().unwrap_or_default();
        entries.sort_by(feed_order);
        entries
    }

    /// Timestamps within one ticket's trail are strictly increasing and
    /// microsecond-aligned, matching the precision of feed cursor tokens.
    fn next_timestamp(&self, ticket_id: &str) -> DateTime<Utc> {
        let now = Utc::now().trunc_subsecs(6);
        let latest = self
            .activity
            .get(ticket_id)
            .and_then(|entries| entries.iter().map(|entry| entry.created_at).max());
        match latest {
            Some(latest) if latest >= now => latest + Duration::microseconds(1),
            _ => now,
        }
    }

    fn push_activity(&mut self, ticket_id: &str, activity: NewActivity) -> ActivityEntry {
        let created_at = self.next_timestamp(ticket_id);
        let entry = activity.into_entry(Uuid::new_v4().to_string(), created_at);
        self.activity
            .entry(ticket_id.to_string())
            .or_default()
            .push(entry.clone());
        entry
    }
}

pub struct InMemoryStore {
    state: RwLock<StoreSnapshot>,
    feeds: Mutex<HashMap<String, watch::Sender<Vec<ActivityEntry>>>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::from_snapshot(StoreSnapshot::default())
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
            feeds: Mutex::new(HashMap::new()),
        }
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.state.read().await.clone()
    }

    pub async fn insert_ticket(&self, ticket: Ticket) {
        self.state
            .write()
            .await
            .tickets
            .insert(ticket.id.clone(), ticket);
    }

    pub async fn insert_status(&self, status: TicketStatus) {
        let mut state = self.state.write().await;
        state.statuses.retain(|existing| existing.id != status.id);
        state.statuses.push(status);
    }

    pub async fn insert_workgroup(&self, group: Workgroup) {
        self.state
            .write()
            .await
            .workgroups
            .insert(group.id.clone(), group);
    }

    fn publish(&self, ticket_id: &str, state: &StoreSnapshot) -> AppResult<()> {
        let mut feeds = self
            .feeds
            .lock()
            .map_err(|_| AppError::Store("activity feed registry poisoned".to_string()))?;
        if let Some(sender) = feeds.get(ticket_id) {
            if sender.receiver_count() == 0 {
                feeds.remove(ticket_id);
            } else {
                sender.send_replace(state.ordered_activity(ticket_id));
            }
        }
        Ok(())
    }

    fn ensure_ticket(state: &StoreSnapshot, ticket_id: &str) -> AppResult<()> {
        if state.tickets.contains_key(ticket_id) {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("ticket '{ticket_id}'")))
        }
    }
}

#[async_trait]
impl TicketStore for InMemoryStore {
    async fn fetch_ticket(&self, ticket_id: &str) -> AppResult<Ticket> {
        self.state
            .read()
            .await
            .tickets
            .get(ticket_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("ticket '{ticket_id}'")))
    }

    async fn list_statuses(&self) -> AppResult<Vec<TicketStatus>> {
        Ok(self.state.read().await.statuses.clone())
    }

    async fn fetch_status(&self, status_id: &str) -> AppResult<TicketStatus> {
        self.state
            .read()
            .await
            .statuses
            .iter()
            .find(|status| status.id == status_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("status '{status_id}'")))
    }

    async fn list_workgroups(&self) -> AppResult<Vec<Workgroup>> {
        Ok(self.state.read().await.workgroups.values().cloned().collect())
    }

    async fn fetch_workgroup(&self, group_id: &str) -> AppResult<Workgroup> {
        self.state
            .read()
            .await
            .workgroups
            .get(group_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("workgroup '{group_id}'")))
    }

    async fn create_workgroup_if_absent(&self, group: &Workgroup) -> AppResult<bool> {
        let mut state = self.state.write().await;
        if state.workgroups.contains_key(&group.id) {
            return Ok(false);
        }
        state.workgroups.insert(group.id.clone(), group.clone());
        Ok(true)
    }

    async fn commit(&self, change: TicketChange) -> AppResult<(Ticket, ActivityEntry)> {
        let mut state = self.state.write().await;
        let current = state
            .tickets
            .get(&change.ticket_id)
            .ok_or_else(|| AppError::NotFound(format!("ticket '{}'", change.ticket_id)))?;
        if current.version != change.expected_version {
            return Err(AppError::Conflict(format!(
                "ticket '{}' changed since it was read (expected version {}, found {})",
                change.ticket_id, change.expected_version, current.version
            )));
        }

        if let Some(group) = change.ensure_group {
            state.workgroups.entry(group.id.clone()).or_insert(group);
        }

        let now = Utc::now();
        let ticket = match state.tickets.get_mut(&change.ticket_id) {
            Some(ticket) => {
                change.patch.apply(ticket, now);
                ticket.clone()
            }
            None => return Err(AppError::NotFound(format!("ticket '{}'", change.ticket_id))),
        };
        let entry = state.push_activity(&change.ticket_id, change.activity);
        self.publish(&change.ticket_id, &state)?;
        Ok((ticket, entry))
    }

    async fn append_activity(
        &self,
        ticket_id: &str,
        activity: NewActivity,
    ) -> AppResult<ActivityEntry> {
        let mut state = self.state.write().await;
        Self::ensure_ticket(&state, ticket_id)?;
        let entry = state.push_activity(ticket_id, activity);
        self.publish(ticket_id, &state)?;
        Ok(entry)
    }

    async fn fetch_activity(&self, ticket_id: &str, entry_id: &str) -> AppResult<ActivityEntry> {
        self.state
            .read()
            .await
            .activity
            .get(ticket_id)
            .and_then(|entries| entries.iter().find(|entry| entry.id == entry_id))
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("activity entry '{entry_id}'")))
    }

    async fn query_activity(
        &self,
        ticket_id: &str,
        query: &ActivityQuery,
    ) -> AppResult<Vec<ActivityEntry>> {
        let state = self.state.read().await;
        Self::ensure_ticket(&state, ticket_id)?;
        Ok(state
            .ordered_activity(ticket_id)
            .into_iter()
            .filter(|entry| query.admits(entry))
            .take(query.limit)
            .collect())
    }

    async fn count_activity(&self, ticket_id: &str, kind: ActivityKind) -> AppResult<usize> {
        let state = self.state.read().await;
        Self::ensure_ticket(&state, ticket_id)?;
        Ok(state
            .activity
            .get(ticket_id)
            .map(|entries| entries.iter().filter(|entry| entry.kind == kind).count())
            .unwrap_or(0))
    }

    async fn subscribe_activity(&self, ticket_id: &str) -> AppResult<ActivitySubscription> {
        let state = self.state.read().await;
        Self::ensure_ticket(&state, ticket_id)?;
        let mut feeds = self
            .feeds
            .lock()
            .map_err(|_| AppError::Store("activity feed registry poisoned".to_string()))?;
        let receiver = match feeds.get(ticket_id) {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = watch::channel(state.ordered_activity(ticket_id));
                feeds.insert(ticket_id.to_string(), sender);
                receiver
            }
        };
        Ok(ActivitySubscription::new(receiver))
    }

    async fn append_call_result(&self, ticket_id: &str, record: CallResult) -> AppResult<()> {
        let mut state = self.state.write().await;
        Self::ensure_ticket(&state, ticket_id)?;
        state
            .calls
            .entry(ticket_id.to_string())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn list_call_results(&self, ticket_id: &str) -> AppResult<Vec<CallResult>> {
        let state = self.state.read().await;
        Self::ensure_ticket(&state, ticket_id)?;
        let mut records = state.calls.get(ticket_id).cloned().unwrap_or_default();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}
