use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ClaimPolicy;
use crate::context::AppContext;
use crate::domain::activity::{
    ActivityEntry, ActivityKind, NewActivity, SystemEvent, SystemLogDetails, compose_system_line,
};
use crate::domain::actor::Actor;
use crate::domain::call::{CallAttempt, CallResult};
use crate::domain::quote::quote_body;
use crate::domain::ticket::{CoarseStatus, Reference, Ticket, TicketPatch};
use crate::domain::workgroup::Workgroup;
use crate::error::{AppError, AppResult};
use crate::services::{TicketChange, TicketStore};

/// Result of a lifecycle transition.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub ticket: Ticket,
    /// `None` when the call changed nothing (re-claiming your own ticket).
    pub entry: Option<ActivityEntry>,
}

/// Enforces who may claim, re-status, transfer or comment on a ticket and
/// records every change in the ticket's activity trail.
pub struct TicketLifecycle {
    store: Arc<dyn TicketStore>,
    closed_group: Workgroup,
    claim_policy: ClaimPolicy,
}

impl TicketLifecycle {
    pub fn new(
        store: Arc<dyn TicketStore>,
        closed_group_name: &str,
        claim_policy: ClaimPolicy,
    ) -> Self {
        Self {
            store,
            closed_group: Workgroup::closed(closed_group_name),
            claim_policy,
        }
    }

    pub fn from_context(ctx: &AppContext) -> Self {
        Self::new(
            ctx.store.clone(),
            &ctx.config.closed_group_name,
            ctx.config.claim_policy,
        )
    }

    pub fn closed_group(&self) -> &Workgroup {
        &self.closed_group
    }

    pub async fn claim(&self, ticket_id: &str, actor: &Actor) -> AppResult<TransitionOutcome> {
        let result = self.claim_inner(ticket_id, actor).await;
        report("claim", ticket_id, actor, result)
    }

    pub async fn update_status(
        &self,
        ticket_id: &str,
        actor: &Actor,
        target_status_id: Option<&str>,
    ) -> AppResult<TransitionOutcome> {
        let result = self
            .update_status_inner(ticket_id, actor, target_status_id)
            .await;
        report("update_status", ticket_id, actor, result)
    }

    pub async fn transfer_group(
        &self,
        ticket_id: &str,
        actor: &Actor,
        target_group_id: Option<&str>,
    ) -> AppResult<TransitionOutcome> {
        let result = self
            .transfer_group_inner(ticket_id, actor, target_group_id)
            .await;
        report("transfer_group", ticket_id, actor, result)
    }

    /// Posts a log line or comment as the ticket's current assignee.
    ///
    /// With `quoted_body`, the quoted text is rendered as a `> ` block above the new body.
    pub async fn append_activity(
        &self,
        ticket_id: &str,
        actor: &Actor,
        body: &str,
        kind: ActivityKind,
        quoted_body: Option<&str>,
    ) -> AppResult<ActivityEntry> {
        let result = self
            .append_activity_inner(ticket_id, actor, body, kind, quoted_body)
            .await;
        report("append_activity", ticket_id, actor, result)
    }

    /// Writes a `system` entry; not gated by ticket state or ownership.
    pub async fn append_system_log(
        &self,
        ticket_id: &str,
        event: &SystemEvent,
        details: SystemLogDetails,
    ) -> AppResult<ActivityEntry> {
        let line = compose_system_line(event, &details);
        let result = self
            .store
            .append_activity(ticket_id, NewActivity::system(line))
            .await;
        report("append_system_log", ticket_id, &Actor::system(), result)
    }

    pub async fn record_call_result(
        &self,
        ticket_id: &str,
        actor: &Actor,
        phone_number: &str,
        reached: bool,
        fail_reason: Option<&str>,
    ) -> AppResult<CallResult> {
        let result = async {
            let attempt = CallAttempt::new(phone_number, reached, fail_reason)?;
            let record = attempt.into_record(Uuid::new_v4().to_string(), actor, Utc::now());
            self.store
                .append_call_result(ticket_id, record.clone())
                .await?;
            Ok::<_, AppError>(record)
        }
        .await;
        report("record_call_result", ticket_id, actor, result)
    }

    /// Creates the reserved closed-tickets group unless it already exists.
    pub async fn ensure_closed_group_exists(&self) -> AppResult<bool> {
        let created = self
            .store
            .create_workgroup_if_absent(&self.closed_group)
            .await
            .inspect_err(|err| {
                error!(group_id = %self.closed_group.id, error = %err, "failed to ensure closed group");
            })?;
        if created {
            info!(group_id = %self.closed_group.id, name = %self.closed_group.name, "created closed group");
        }
        Ok(created)
    }

    async fn open_ticket(&self, ticket_id: &str) -> AppResult<Ticket> {
        let ticket = self.store.fetch_ticket(ticket_id).await?;
        if ticket.is_closed() {
            return Err(AppError::StateConflict(format!(
                "ticket {} is closed ({})",
                ticket.number,
                ticket.display_status()
            )));
        }
        Ok(ticket)
    }

    async fn claim_inner(&self, ticket_id: &str, actor: &Actor) -> AppResult<TransitionOutcome> {
        let ticket = self.open_ticket(ticket_id).await?;
        if ticket.is_assigned_to(actor) {
            return Ok(TransitionOutcome {
                ticket,
                entry: None,
            });
        }

        let mut details = SystemLogDetails::default().actor(actor.name.clone());
        if let Some(holder) = &ticket.assignee {
            match self.claim_policy {
                ClaimPolicy::Reject => {
                    return Err(AppError::StateConflict(format!(
                        "ticket {} is already claimed by {}",
                        ticket.number, holder.name
                    )));
                }
                ClaimPolicy::Warn => {
                    warn!(
                        ticket_id,
                        previous = %holder.name,
                        actor_id = %actor.id,
                        "claim overrides current assignee"
                    );
                }
                ClaimPolicy::Allow => {}
            }
            details = details.change(holder.name.clone(), actor.name.clone());
        }

        let line = compose_system_line(&SystemEvent::TicketClaimed, &details);
        self.commit(
            &ticket,
            TicketPatch {
                assignee: Some(Some(Reference::from(actor))),
                ..TicketPatch::default()
            },
            None,
            line,
        )
        .await
    }

    async fn update_status_inner(
        &self,
        ticket_id: &str,
        actor: &Actor,
        target_status_id: Option<&str>,
    ) -> AppResult<TransitionOutcome> {
        let target = required_selection(target_status_id, "select a status first")?;
        let ticket = self.open_ticket(ticket_id).await?;
        let status = self.store.fetch_status(target).await?;

        let closing = status.is_closing();
        let coarse = match CoarseStatus::from_status_name(&status.name) {
            Some(coarse) if closing && !coarse.is_closed_equivalent() => Some(CoarseStatus::Closed),
            None if closing => Some(CoarseStatus::Closed),
            // A name outside the closed set must not close the ticket through the coarse field.
            Some(coarse) if !closing && coarse.is_closed_equivalent() => None,
            other => other,
        };

        let mut patch = TicketPatch {
            status: coarse,
            status_ref: Some(status.reference()),
            ..TicketPatch::default()
        };
        let mut ensure_group = None;
        let details = if closing {
            patch.group = Some(self.closed_group.reference());
            patch.assignee = Some(None);
            ensure_group = Some(self.closed_group.clone());
            format!("Status: {}, Group: {}", status.name, self.closed_group.name)
        } else {
            format!("Status: {}", status.name)
        };

        let line = compose_system_line(
            &SystemEvent::StatusChanged,
            &SystemLogDetails::default()
                .details(details)
                .actor(actor.name.clone())
                .change(ticket.display_status(), status.name.clone()),
        );
        self.commit(&ticket, patch, ensure_group, line).await
    }

    async fn transfer_group_inner(
        &self,
        ticket_id: &str,
        actor: &Actor,
        target_group_id: Option<&str>,
    ) -> AppResult<TransitionOutcome> {
        let target = required_selection(target_group_id, "select a group first")?;
        let ticket = self.open_ticket(ticket_id).await?;
        let group = self.store.fetch_workgroup(target).await?;

        let line = compose_system_line(
            &SystemEvent::GroupTransferred,
            &SystemLogDetails::default()
                .actor(actor.name.clone())
                .change(ticket.group.name.clone(), group.name.clone()),
        );
        self.commit(
            &ticket,
            TicketPatch {
                group: Some(group.reference()),
                assignee: Some(None),
                ..TicketPatch::default()
            },
            None,
            line,
        )
        .await
    }

    async fn append_activity_inner(
        &self,
        ticket_id: &str,
        actor: &Actor,
        body: &str,
        kind: ActivityKind,
        quoted_body: Option<&str>,
    ) -> AppResult<ActivityEntry> {
        let body = body.trim();
        if body.is_empty() {
            return Err(AppError::Validation("message body is empty".to_string()));
        }
        if kind == ActivityKind::System {
            return Err(AppError::Validation(
                "system entries are written by the system log only".to_string(),
            ));
        }

        let ticket = self.open_ticket(ticket_id).await?;
        if !ticket.is_assigned_to(actor) {
            return Err(AppError::StateConflict(format!(
                "only the assignee of ticket {} may post to it",
                ticket.number
            )));
        }

        let text = match quoted_body.map(str::trim).filter(|quoted| !quoted.is_empty()) {
            Some(quoted) => quote_body(quoted, body),
            None => body.to_string(),
        };
        self.store
            .append_activity(ticket_id, NewActivity::by(actor, text, kind))
            .await
    }

    async fn commit(
        &self,
        ticket: &Ticket,
        patch: TicketPatch,
        ensure_group: Option<Workgroup>,
        line: String,
    ) -> AppResult<TransitionOutcome> {
        let (ticket, entry) = self
            .store
            .commit(TicketChange {
                ticket_id: ticket.id.clone(),
                expected_version: ticket.version,
                patch,
                ensure_group,
                activity: NewActivity::system(line),
            })
            .await?;
        info!(ticket_id = %ticket.id, version = ticket.version, entry = %entry.body, "ticket updated");
        Ok(TransitionOutcome {
            ticket,
            entry: Some(entry),
        })
    }
}

fn required_selection<'a>(value: Option<&'a str>, message: &str) -> AppResult<&'a str> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Validation(message.to_string()))
}

/// Sends every failure to the diagnostic log before handing it back.
fn report<T>(operation: &str, ticket_id: &str, actor: &Actor, result: AppResult<T>) -> AppResult<T> {
    if let Err(err) = &result {
        if err.is_rejection() {
            warn!(operation, ticket_id, actor_id = %actor.id, error = %err, "operation rejected");
        } else {
            error!(operation, ticket_id, actor_id = %actor.id, error = %err, "operation failed");
        }
    }
    result
}
