use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::actor::Actor;
use crate::domain::status::is_closed_state;

/// An `{id, name}` pair pointing at a document owned elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
    pub name: String,
}

impl Reference {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl From<&Actor> for Reference {
    fn from(actor: &Actor) -> Self {
        Reference::new(actor.id.clone(), actor.name.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoarseStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl CoarseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoarseStatus::Open => "open",
            CoarseStatus::InProgress => "in_progress",
            CoarseStatus::Resolved => "resolved",
            CoarseStatus::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "open" => Some(CoarseStatus::Open),
            "in_progress" | "in progress" => Some(CoarseStatus::InProgress),
            "resolved" => Some(CoarseStatus::Resolved),
            "closed" => Some(CoarseStatus::Closed),
            _ => None,
        }
    }

    /// Maps a fine-grained status display name onto the coarse field.
    ///
    /// Only a fixed set of names is recognized; localized closing names map to
    /// their closed-equivalent so both fields agree on closed-ness.
    pub fn from_status_name(name: &str) -> Option<Self> {
        match name {
            "Çözüldü" => Some(CoarseStatus::Resolved),
            "Kapandı" | "Kapalı" => Some(CoarseStatus::Closed),
            "Açık" => Some(CoarseStatus::Open),
            other => Self::parse(other),
        }
    }

    pub fn is_closed_equivalent(&self) -> bool {
        matches!(self, CoarseStatus::Resolved | CoarseStatus::Closed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub number: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub customer: Customer,
    pub priority: Priority,
    pub status: CoarseStatus,
    #[serde(default)]
    pub status_ref: Option<Reference>,
    #[serde(default)]
    pub category: Option<Reference>,
    pub group: Reference,
    #[serde(default)]
    pub assignee: Option<Reference>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Incremented by every committed change; compared before each write.
    #[serde(default)]
    pub version: u64,
}

impl Ticket {
    pub fn status_name(&self) -> Option<&str> {
        self.status_ref.as_ref().map(|status| status.name.as_str())
    }

    pub fn is_closed(&self) -> bool {
        is_closed_state(self.status_name(), self.status)
    }

    pub fn is_assigned_to(&self, actor: &Actor) -> bool {
        self.assignee
            .as_ref()
            .is_some_and(|assignee| assignee.id == actor.id)
    }

    pub fn display_status(&self) -> &str {
        self.status_name().unwrap_or(self.status.as_str())
    }
}

/// Field-level update applied to a ticket as a single write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketPatch {
    pub status: Option<CoarseStatus>,
    pub status_ref: Option<Reference>,
    pub group: Option<Reference>,
    /// `Some(None)` clears the assignee.
    pub assignee: Option<Option<Reference>>,
}

impl TicketPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.status_ref.is_none()
            && self.group.is_none()
            && self.assignee.is_none()
    }

    pub fn apply(&self, ticket: &mut Ticket, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            ticket.status = status;
        }
        if let Some(status_ref) = &self.status_ref {
            ticket.status_ref = Some(status_ref.clone());
        }
        if let Some(group) = &self.group {
            ticket.group = group.clone();
        }
        if let Some(assignee) = &self.assignee {
            ticket.assignee = assignee.clone();
        }
        ticket.updated_at = now;
        ticket.version += 1;
    }
}

#[cfg(test)]
pub(crate) fn sample_ticket(id: &str) -> Ticket {
    let now = Utc::now();
    Ticket {
        id: id.to_string(),
        number: "CC-1001".to_string(),
        title: "Internet outage".to_string(),
        description: "Customer reports no connectivity since morning.".to_string(),
        customer: Customer {
            name: "Deniz Yilmaz".to_string(),
            phone: Some("+905551234567".to_string()),
            email: None,
        },
        priority: Priority::High,
        status: CoarseStatus::Open,
        status_ref: Some(Reference::new("open", "Open")),
        category: None,
        group: Reference::new("support", "Support"),
        assignee: None,
        created_by: "Operator".to_string(),
        created_at: now,
        updated_at: now,
        version: 0,
    }
}
