use serde::{Deserialize, Serialize};

use crate::domain::ticket::{CoarseStatus, Reference};

/// Display names that close a ticket. Matching is case-sensitive.
pub const CLOSED_STATUS_NAMES: &[&str] = &[
    "resolved", "Resolved", "closed", "Closed", "Çözüldü", "Kapandı", "Kapalı",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketStatus {
    pub id: String,
    pub name: String,
}

impl TicketStatus {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn is_closing(&self) -> bool {
        is_closing_name(&self.name)
    }

    pub fn reference(&self) -> Reference {
        Reference::new(self.id.clone(), self.name.clone())
    }
}

pub fn is_closing_name(name: &str) -> bool {
    CLOSED_STATUS_NAMES.contains(&name)
}

/// The single closed-ness predicate every lockout check goes through.
pub fn is_closed_state(status_name: Option<&str>, coarse: CoarseStatus) -> bool {
    status_name.is_some_and(is_closing_name) || coarse.is_closed_equivalent()
}

pub fn default_statuses() -> Vec<TicketStatus> {
    vec![
        TicketStatus::new("open", "Open"),
        TicketStatus::new("in-progress", "In Progress"),
        TicketStatus::new("resolved", "Resolved"),
        TicketStatus::new("closed", "Closed"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closing_names_are_case_sensitive() {
        assert!(is_closing_name("Resolved"));
        assert!(is_closing_name("closed"));
        assert!(!is_closing_name("RESOLVED"));
        assert!(!is_closing_name("In Progress"));
    }

    #[test]
    fn closed_state_considers_both_fields() {
        assert!(is_closed_state(Some("Kapandı"), CoarseStatus::Open));
        assert!(is_closed_state(None, CoarseStatus::Closed));
        assert!(!is_closed_state(Some("Open"), CoarseStatus::InProgress));
    }
}
