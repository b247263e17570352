#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;

use ticketdesk::config::ClaimPolicy;
use ticketdesk::domain::actor::Actor;
use ticketdesk::domain::status::default_statuses;
use ticketdesk::domain::ticket::{CoarseStatus, Customer, Priority, Reference, Ticket};
use ticketdesk::domain::workgroup::{DEFAULT_CLOSED_GROUP_NAME, Workgroup};
use ticketdesk::infra::memory::InMemoryStore;
use ticketdesk::workflow::TicketLifecycle;

pub struct Desk {
    pub store: Arc<InMemoryStore>,
    pub lifecycle: TicketLifecycle,
}

pub fn alice() -> Actor {
    Actor::new("u-alice", "Alice")
}

pub fn bob() -> Actor {
    Actor::new("u-bob", "Bob")
}

pub fn open_ticket(id: &str) -> Ticket {
    let now = Utc::now();
    Ticket {
        id: id.to_string(),
        number: format!("CC-{id}"),
        title: "Modem keeps rebooting".to_string(),
        description: "Customer reports a reboot every ten minutes.".to_string(),
        customer: Customer {
            name: "Deniz Yilmaz".to_string(),
            phone: Some("+905551234567".to_string()),
            email: None,
        },
        priority: Priority::Medium,
        status: CoarseStatus::Open,
        status_ref: Some(Reference::new("open", "Open")),
        category: Some(Reference::new("hardware", "Hardware")),
        group: Reference::new("support", "Support"),
        assignee: None,
        created_by: "Intake".to_string(),
        created_at: now,
        updated_at: now,
        version: 0,
    }
}

pub async fn desk_with_policy(policy: ClaimPolicy) -> Desk {
    let store = Arc::new(InMemoryStore::new());
    for status in default_statuses() {
        store.insert_status(status).await;
    }
    store.insert_workgroup(Workgroup::new("support", "Support")).await;
    store.insert_workgroup(Workgroup::new("billing", "Billing")).await;
    store.insert_ticket(open_ticket("T1")).await;
    store.insert_ticket(open_ticket("T2")).await;

    let lifecycle = TicketLifecycle::new(store.clone(), DEFAULT_CLOSED_GROUP_NAME, policy);
    Desk { store, lifecycle }
}

pub async fn desk() -> Desk {
    desk_with_policy(ClaimPolicy::Reject).await
}
