mod common;

use ticketdesk::config::ClaimPolicy;
use ticketdesk::domain::activity::{
    ActivityEntry, ActivityFilter, ActivityKind, ActivityQuery, SystemEvent, SystemLogDetails,
};
use ticketdesk::domain::actor::{Actor, SYSTEM_ACTOR_ID};
use ticketdesk::domain::status::TicketStatus;
use ticketdesk::domain::ticket::{CoarseStatus, Reference};
use ticketdesk::domain::workgroup::{DEFAULT_CLOSED_GROUP_NAME, Workgroup};
use ticketdesk::error::ErrorKind;
use ticketdesk::infra::memory::InMemoryStore;
use ticketdesk::services::TicketStore;

use common::{alice, bob, desk, desk_with_policy};

async fn entries(store: &InMemoryStore, ticket_id: &str) -> Vec<ActivityEntry> {
    store
        .query_activity(
            ticket_id,
            &ActivityQuery {
                filter: ActivityFilter::All,
                start_after: None,
                limit: usize::MAX,
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn claim_then_resolve_then_claim_again_is_rejected() {
    let desk = desk().await;

    let claimed = desk.lifecycle.claim("T1", &alice()).await.unwrap();
    assert_eq!(claimed.ticket.assignee, Some(Reference::new("u-alice", "Alice")));
    let entry = claimed.entry.unwrap();
    assert_eq!(entry.kind, ActivityKind::System);
    assert_eq!(entry.author_id, SYSTEM_ACTOR_ID);
    assert!(entry.body.starts_with("Ticket claimed"));
    assert!(entry.body.contains("(User: Alice)"));

    let resolved = desk
        .lifecycle
        .update_status("T1", &alice(), Some("resolved"))
        .await
        .unwrap();
    let ticket = resolved.ticket;
    assert_eq!(ticket.status_name(), Some("Resolved"));
    assert_eq!(ticket.status, CoarseStatus::Resolved);
    assert_eq!(ticket.group.id, Workgroup::closed(DEFAULT_CLOSED_GROUP_NAME).id);
    assert!(ticket.assignee.is_none());

    let before = desk.store.fetch_ticket("T1").await.unwrap();
    let err = desk.lifecycle.claim("T1", &bob()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateConflict);
    assert_eq!(desk.store.fetch_ticket("T1").await.unwrap(), before);
}

#[tokio::test]
async fn closed_ticket_rejects_every_mutation_without_side_effects() {
    let desk = desk().await;
    desk.lifecycle.claim("T1", &alice()).await.unwrap();
    desk.lifecycle
        .update_status("T1", &alice(), Some("closed"))
        .await
        .unwrap();

    let ticket_before = desk.store.fetch_ticket("T1").await.unwrap();
    let entries_before = entries(&desk.store, "T1").await;

    let errors = vec![
        desk.lifecycle.claim("T1", &alice()).await.unwrap_err(),
        desk.lifecycle
            .update_status("T1", &alice(), Some("open"))
            .await
            .unwrap_err(),
        desk.lifecycle
            .transfer_group("T1", &alice(), Some("billing"))
            .await
            .unwrap_err(),
        desk.lifecycle
            .append_activity("T1", &alice(), "still here", ActivityKind::Comment, None)
            .await
            .unwrap_err(),
    ];
    for err in errors {
        assert_eq!(err.kind(), ErrorKind::StateConflict, "{err}");
    }

    assert_eq!(desk.store.fetch_ticket("T1").await.unwrap(), ticket_before);
    assert_eq!(entries(&desk.store, "T1").await, entries_before);
}

#[tokio::test]
async fn coarse_closed_status_alone_locks_the_ticket() {
    let desk = desk().await;
    let mut ticket = common::open_ticket("T9");
    ticket.status_ref = None;
    ticket.status = CoarseStatus::Closed;
    desk.store.insert_ticket(ticket).await;

    let err = desk.lifecycle.claim("T9", &alice()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateConflict);
}

#[tokio::test]
async fn closing_status_moves_ticket_to_closed_group_with_one_entry() {
    let desk = desk().await;
    desk.lifecycle.claim("T1", &alice()).await.unwrap();
    let before = entries(&desk.store, "T1").await.len();

    let outcome = desk
        .lifecycle
        .update_status("T1", &alice(), Some("resolved"))
        .await
        .unwrap();

    let closed_group = desk.lifecycle.closed_group().clone();
    assert!(outcome.ticket.assignee.is_none());
    assert_eq!(outcome.ticket.group, closed_group.reference());
    assert!(outcome.ticket.is_closed());

    let after = entries(&desk.store, "T1").await;
    assert_eq!(after.len(), before + 1);
    let newest = &after[0];
    assert_eq!(newest.kind, ActivityKind::System);
    assert!(newest.body.contains("Resolved"));
    assert!(newest.body.contains(DEFAULT_CLOSED_GROUP_NAME));

    let groups = desk.store.list_workgroups().await.unwrap();
    assert!(groups.contains(&closed_group));
}

#[tokio::test]
async fn localized_closing_status_sets_closed_equivalent_coarse_status() {
    let desk = desk().await;
    desk.store
        .insert_status(TicketStatus::new("kapandi", "Kapandı"))
        .await;

    let outcome = desk
        .lifecycle
        .update_status("T1", &alice(), Some("kapandi"))
        .await
        .unwrap();
    assert_eq!(outcome.ticket.status, CoarseStatus::Closed);
    assert!(outcome.ticket.is_closed());
}

#[tokio::test]
async fn unrecognized_closing_free_status_keeps_coarse_status() {
    let desk = desk().await;
    desk.store
        .insert_status(TicketStatus::new("waiting", "Waiting on customer"))
        .await;
    desk.lifecycle.claim("T1", &alice()).await.unwrap();

    let outcome = desk
        .lifecycle
        .update_status("T1", &alice(), Some("waiting"))
        .await
        .unwrap();
    assert_eq!(outcome.ticket.status, CoarseStatus::Open);
    assert_eq!(outcome.ticket.status_name(), Some("Waiting on customer"));
}

#[tokio::test]
async fn uppercase_closed_name_outside_the_closed_set_leaves_ticket_open() {
    let desk = desk().await;
    desk.store
        .insert_status(TicketStatus::new("shout", "RESOLVED"))
        .await;
    desk.lifecycle.claim("T1", &alice()).await.unwrap();

    let outcome = desk
        .lifecycle
        .update_status("T1", &alice(), Some("shout"))
        .await
        .unwrap();
    assert_eq!(outcome.ticket.status, CoarseStatus::Open);
    assert_eq!(outcome.ticket.status_name(), Some("RESOLVED"));
    assert!(!outcome.ticket.is_closed());
    assert!(outcome.ticket.is_assigned_to(&alice()));

    let moved = desk
        .lifecycle
        .transfer_group("T1", &alice(), Some("billing"))
        .await
        .unwrap();
    assert_eq!(moved.ticket.group, Reference::new("billing", "Billing"));
}

#[tokio::test]
async fn reclaiming_own_ticket_changes_nothing() {
    let desk = desk().await;
    desk.lifecycle.claim("T1", &alice()).await.unwrap();
    let ticket_before = desk.store.fetch_ticket("T1").await.unwrap();
    let entries_before = entries(&desk.store, "T1").await;

    let outcome = desk.lifecycle.claim("T1", &alice()).await.unwrap();
    assert!(outcome.entry.is_none());
    assert_eq!(outcome.ticket, ticket_before);
    assert_eq!(desk.store.fetch_ticket("T1").await.unwrap(), ticket_before);
    assert_eq!(entries(&desk.store, "T1").await, entries_before);
}

#[tokio::test]
async fn non_closing_status_keeps_owner_and_group() {
    let desk = desk().await;
    desk.lifecycle.claim("T1", &alice()).await.unwrap();
    let before = entries(&desk.store, "T1").await.len();

    let outcome = desk
        .lifecycle
        .update_status("T1", &alice(), Some("in-progress"))
        .await
        .unwrap();

    assert_eq!(outcome.ticket.status, CoarseStatus::InProgress);
    assert_eq!(outcome.ticket.assignee, Some(Reference::new("u-alice", "Alice")));
    assert_eq!(outcome.ticket.group, Reference::new("support", "Support"));

    let after = entries(&desk.store, "T1").await;
    assert_eq!(after.len(), before + 1);
    assert!(after[0].body.contains("Status: In Progress"));
    assert!(!after[0].body.contains("Group"));
}

#[tokio::test]
async fn transfer_always_releases_the_assignee() {
    let desk = desk().await;
    desk.lifecycle.claim("T1", &alice()).await.unwrap();
    let before = entries(&desk.store, "T1").await.len();

    let outcome = desk
        .lifecycle
        .transfer_group("T1", &alice(), Some("billing"))
        .await
        .unwrap();
    assert!(outcome.ticket.assignee.is_none());
    assert_eq!(outcome.ticket.group, Reference::new("billing", "Billing"));

    let after = entries(&desk.store, "T1").await;
    assert_eq!(after.len(), before + 1);
    assert!(after[0].body.contains("Support"));
    assert!(after[0].body.contains("Billing"));

    let same_group = desk
        .lifecycle
        .transfer_group("T2", &bob(), Some("support"))
        .await
        .unwrap();
    assert!(same_group.ticket.assignee.is_none());
}

#[tokio::test]
async fn missing_selections_fail_validation_without_writes() {
    let desk = desk().await;
    desk.lifecycle.claim("T1", &alice()).await.unwrap();
    let before = entries(&desk.store, "T1").await;

    let status_err = desk
        .lifecycle
        .update_status("T1", &alice(), None)
        .await
        .unwrap_err();
    let group_err = desk
        .lifecycle
        .transfer_group("T1", &alice(), Some(" "))
        .await
        .unwrap_err();
    let body_err = desk
        .lifecycle
        .append_activity("T1", &alice(), "   ", ActivityKind::Log, None)
        .await
        .unwrap_err();

    assert_eq!(status_err.kind(), ErrorKind::Validation);
    assert_eq!(group_err.kind(), ErrorKind::Validation);
    assert_eq!(body_err.kind(), ErrorKind::Validation);
    assert_eq!(entries(&desk.store, "T1").await, before);
}

#[tokio::test]
async fn unknown_status_is_not_found() {
    let desk = desk().await;
    let err = desk
        .lifecycle
        .update_status("T1", &alice(), Some("escalated"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn only_the_assignee_may_post() {
    let desk = desk().await;
    desk.lifecycle.claim("T1", &alice()).await.unwrap();
    let before = entries(&desk.store, "T1").await;

    let err = desk
        .lifecycle
        .append_activity("T1", &bob(), "let me help", ActivityKind::Comment, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateConflict);
    assert_eq!(entries(&desk.store, "T1").await, before);

    let unassigned = desk
        .lifecycle
        .append_activity("T2", &bob(), "hello", ActivityKind::Log, None)
        .await
        .unwrap_err();
    assert_eq!(unassigned.kind(), ErrorKind::StateConflict);
}

#[tokio::test]
async fn assignee_posts_with_quoted_text() {
    let desk = desk().await;
    desk.lifecycle.claim("T1", &alice()).await.unwrap();

    let entry = desk
        .lifecycle
        .append_activity(
            "T1",
            &alice(),
            "Replaced the power adapter.",
            ActivityKind::Log,
            Some("Modem reboots\nevery ten minutes"),
        )
        .await
        .unwrap();

    assert_eq!(entry.kind, ActivityKind::Log);
    assert_eq!(entry.author_name, "Alice");
    assert_eq!(
        entry.body,
        "> Modem reboots\n> every ten minutes\n\nReplaced the power adapter."
    );
}

#[tokio::test]
async fn users_cannot_post_system_entries() {
    let desk = desk().await;
    desk.lifecycle.claim("T1", &alice()).await.unwrap();
    let err = desk
        .lifecycle
        .append_activity("T1", &alice(), "fake audit", ActivityKind::System, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn ensure_closed_group_is_idempotent() {
    let desk = desk().await;
    assert!(desk.lifecycle.ensure_closed_group_exists().await.unwrap());
    assert!(!desk.lifecycle.ensure_closed_group_exists().await.unwrap());

    let closed_id = desk.lifecycle.closed_group().id.clone();
    let matching = desk
        .store
        .list_workgroups()
        .await
        .unwrap()
        .into_iter()
        .filter(|group| group.id == closed_id)
        .count();
    assert_eq!(matching, 1);
}

#[tokio::test]
async fn reject_policy_protects_existing_owner() {
    let desk = desk().await;
    desk.lifecycle.claim("T1", &alice()).await.unwrap();

    let err = desk.lifecycle.claim("T1", &bob()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StateConflict);

    let again = desk.lifecycle.claim("T1", &alice()).await.unwrap();
    assert!(again.entry.is_none());
    assert_eq!(entries(&desk.store, "T1").await.len(), 1);
}

#[tokio::test]
async fn allow_policy_overwrites_and_records_previous_owner() {
    let desk = desk_with_policy(ClaimPolicy::Allow).await;
    desk.lifecycle.claim("T1", &alice()).await.unwrap();

    let outcome = desk.lifecycle.claim("T1", &bob()).await.unwrap();
    assert_eq!(outcome.ticket.assignee, Some(Reference::new("u-bob", "Bob")));
    assert!(outcome.entry.unwrap().body.contains("[Alice → Bob]"));
}

#[tokio::test]
async fn warn_policy_overwrites() {
    let desk = desk_with_policy(ClaimPolicy::Warn).await;
    desk.lifecycle.claim("T1", &alice()).await.unwrap();
    let outcome = desk.lifecycle.claim("T1", &bob()).await.unwrap();
    assert!(outcome.ticket.is_assigned_to(&bob()));
}

#[tokio::test]
async fn system_log_is_not_gated_by_state() {
    let desk = desk().await;
    desk.lifecycle
        .update_status("T1", &alice(), Some("closed"))
        .await
        .unwrap();

    let entry = desk
        .lifecycle
        .append_system_log(
            "T1",
            &SystemEvent::SlaAutoClosed,
            SystemLogDetails::default().details("48h without response"),
        )
        .await
        .unwrap();
    assert_eq!(entry.kind, ActivityKind::System);
    assert_eq!(entry.body, "Closed automatically by SLA - 48h without response");
}

#[tokio::test]
async fn call_result_requires_reason_when_not_reached() {
    let desk = desk().await;
    let err = desk
        .lifecycle
        .record_call_result("T2", &Actor::new("u-carol", "Carol"), "+905551234567", false, Some(""))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(desk.store.list_call_results("T2").await.unwrap().is_empty());
}

#[tokio::test]
async fn call_results_are_recorded_on_closed_tickets_too() {
    let desk = desk().await;
    desk.lifecycle
        .update_status("T2", &alice(), Some("closed"))
        .await
        .unwrap();

    desk.lifecycle
        .record_call_result("T2", &bob(), "+905551234567", false, Some("busy"))
        .await
        .unwrap();
    desk.lifecycle
        .record_call_result("T2", &bob(), "+905551234567", true, None)
        .await
        .unwrap();

    let records = desk.store.list_call_results("T2").await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().any(|record| !record.reached && record.fail_reason.is_some()));
    assert!(records.iter().all(|record| record.actor_name == "Bob"));
}

#[tokio::test]
async fn closed_group_uses_shared_reserved_identity() {
    let desk = desk().await;
    desk.lifecycle.ensure_closed_group_exists().await.unwrap();
    desk.lifecycle
        .update_status("T1", &alice(), Some("resolved"))
        .await
        .unwrap();
    desk.lifecycle
        .update_status("T2", &bob(), Some("closed"))
        .await
        .unwrap();

    let t1 = desk.store.fetch_ticket("T1").await.unwrap();
    let t2 = desk.store.fetch_ticket("T2").await.unwrap();
    assert_eq!(t1.group, t2.group);
    let closed = desk
        .store
        .list_workgroups()
        .await
        .unwrap()
        .into_iter()
        .filter(|group| group.name == DEFAULT_CLOSED_GROUP_NAME)
        .count();
    assert_eq!(closed, 1);
}
