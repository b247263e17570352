use std::cmp::Ordering;
use std::fmt;

use base64::prelude::{BASE64_URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::actor::Actor;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Log,
    Comment,
    System,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Log => "log",
            ActivityKind::Comment => "comment",
            ActivityKind::System => "system",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "log" => Some(ActivityKind::Log),
            "comment" => Some(ActivityKind::Comment),
            "system" => Some(ActivityKind::System),
            _ => None,
        }
    }
}

/// An immutable entry in a ticket's activity trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: String,
    pub author_name: String,
    pub author_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub kind: ActivityKind,
}

impl ActivityEntry {
    pub fn cursor(&self) -> FeedCursor {
        FeedCursor {
            created_at: self.created_at,
            id: self.id.clone(),
        }
    }
}

/// Feed order: newest first, ties broken by id descending.
pub fn feed_order(a: &ActivityEntry, b: &ActivityEntry) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

/// An entry not yet written; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivity {
    pub author_name: String,
    pub author_id: String,
    pub body: String,
    pub kind: ActivityKind,
}

impl NewActivity {
    pub fn by(actor: &Actor, body: impl Into<String>, kind: ActivityKind) -> Self {
        Self {
            author_name: actor.name.clone(),
            author_id: actor.id.clone(),
            body: body.into(),
            kind,
        }
    }

    pub fn system(body: impl Into<String>) -> Self {
        Self::by(&Actor::system(), body, ActivityKind::System)
    }

    pub fn into_entry(self, id: String, created_at: DateTime<Utc>) -> ActivityEntry {
        ActivityEntry {
            id,
            author_name: self.author_name,
            author_id: self.author_id,
            body: self.body,
            created_at,
            kind: self.kind,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActivityFilter {
    #[default]
    All,
    NonSystem,
    SystemOnly,
}

impl ActivityFilter {
    pub fn matches(&self, kind: ActivityKind) -> bool {
        match self {
            ActivityFilter::All => true,
            ActivityFilter::NonSystem => kind != ActivityKind::System,
            ActivityFilter::SystemOnly => kind == ActivityKind::System,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "all" => Some(ActivityFilter::All),
            "non-system" | "nonsystem" | "user" => Some(ActivityFilter::NonSystem),
            "system" | "system-only" => Some(ActivityFilter::SystemOnly),
            _ => None,
        }
    }
}

/// Position of the last entry seen on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedCursor {
    pub created_at: DateTime<Utc>,
    pub id: String,
}

impl FeedCursor {
    /// True if `entry` sorts strictly after this cursor in feed order.
    pub fn precedes(&self, entry: &ActivityEntry) -> bool {
        (entry.created_at, entry.id.as_str()) < (self.created_at, self.id.as_str())
    }

    pub fn encode(&self) -> String {
        let raw = format!("{}|{}", self.created_at.timestamp_micros(), self.id);
        BASE64_URL_SAFE_NO_PAD.encode(raw)
    }

    pub fn decode(token: &str) -> AppResult<Self> {
        let invalid = || AppError::Validation(format!("invalid feed cursor '{token}'"));
        let bytes = BASE64_URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| invalid())?;
        let raw = String::from_utf8(bytes).map_err(|_| invalid())?;
        let (micros, id) = raw.split_once('|').ok_or_else(invalid)?;
        let micros = micros.parse::<i64>().map_err(|_| invalid())?;
        let created_at = DateTime::from_timestamp_micros(micros).ok_or_else(invalid)?;
        if id.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            created_at,
            id: id.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityQuery {
    pub filter: ActivityFilter,
    pub start_after: Option<FeedCursor>,
    pub limit: usize,
}

impl ActivityQuery {
    pub fn admits(&self, entry: &ActivityEntry) -> bool {
        self.filter.matches(entry.kind)
            && self
                .start_after
                .as_ref()
                .is_none_or(|cursor| cursor.precedes(entry))
    }
}

/// Audit events written as `system` entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemEvent {
    TicketClaimed,
    StatusChanged,
    GroupTransferred,
    FileAttached,
    NotificationSent,
    SlaAutoClosed,
    ExternalUpdate,
    Other(String),
}

impl SystemEvent {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "ticket_claimed" | "claimed" => SystemEvent::TicketClaimed,
            "status_changed" => SystemEvent::StatusChanged,
            "group_transferred" => SystemEvent::GroupTransferred,
            "file_attached" => SystemEvent::FileAttached,
            "notification_sent" => SystemEvent::NotificationSent,
            "sla_auto_closed" => SystemEvent::SlaAutoClosed,
            "external_update" => SystemEvent::ExternalUpdate,
            _ => SystemEvent::Other(value.trim().to_string()),
        }
    }
}

impl fmt::Display for SystemEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SystemEvent::TicketClaimed => "Ticket claimed",
            SystemEvent::StatusChanged => "Status changed",
            SystemEvent::GroupTransferred => "Group transferred",
            SystemEvent::FileAttached => "File attached",
            SystemEvent::NotificationSent => "Notification sent",
            SystemEvent::SlaAutoClosed => "Closed automatically by SLA",
            SystemEvent::ExternalUpdate => "Updated by external system",
            SystemEvent::Other(label) => label,
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemLogDetails {
    pub details: Option<String>,
    pub related_actor: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl SystemLogDetails {
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn actor(mut self, name: impl Into<String>) -> Self {
        self.related_actor = Some(name.into());
        self
    }

    pub fn change(mut self, old: impl Into<String>, new: impl Into<String>) -> Self {
        self.old_value = Some(old.into());
        self.new_value = Some(new.into());
        self
    }
}

/// `<event>[ - <details>][ (User: <actor>)][ [<old> → <new>]]` on one line.
pub fn compose_system_line(event: &SystemEvent, extra: &SystemLogDetails) -> String {
    let mut line = event.to_string();
    if let Some(details) = non_blank(&extra.details) {
        line.push_str(" - ");
        line.push_str(details);
    }
    if let Some(actor) = non_blank(&extra.related_actor) {
        line.push_str(&format!(" (User: {actor})"));
    }
    match (non_blank(&extra.old_value), non_blank(&extra.new_value)) {
        (Some(old), Some(new)) => line.push_str(&format!(" [{old} → {new}]")),
        (None, Some(new)) => line.push_str(&format!(" [→ {new}]")),
        (Some(old), None) => line.push_str(&format!(" [{old} →]")),
        (None, None) => {}
    }
    line.replace(['\r', '\n'], " ")
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn entry(id: &str, secs: i64, kind: ActivityKind) -> ActivityEntry {
        ActivityEntry {
            id: id.to_string(),
            author_name: "Alice".to_string(),
            author_id: "u1".to_string(),
            body: "hello".to_string(),
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
            kind,
        }
    }

    #[test]
    fn composes_full_system_line() {
        let line = compose_system_line(
            &SystemEvent::StatusChanged,
            &SystemLogDetails::default()
                .details("Status: Resolved")
                .actor("Alice")
                .change("Open", "Resolved"),
        );
        assert_eq!(
            line,
            "Status changed - Status: Resolved (User: Alice) [Open → Resolved]"
        );
    }

    #[test]
    fn composes_bare_event() {
        let line = compose_system_line(&SystemEvent::FileAttached, &SystemLogDetails::default());
        assert_eq!(line, "File attached");
    }

    #[test]
    fn system_line_stays_single_line() {
        let line = compose_system_line(
            &SystemEvent::Other("Note".to_string()),
            &SystemLogDetails::default().details("first\nsecond"),
        );
        assert_eq!(line, "Note - first second");
    }

    #[test]
    fn orders_newest_first_with_id_tiebreak() {
        let mut entries = vec![
            entry("a", 10, ActivityKind::Log),
            entry("c", 20, ActivityKind::Log),
            entry("b", 20, ActivityKind::Log),
        ];
        entries.sort_by(feed_order);
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn cursor_admits_only_older_entries() {
        let cursor = entry("b", 20, ActivityKind::Log).cursor();
        assert!(cursor.precedes(&entry("a", 20, ActivityKind::Log)));
        assert!(cursor.precedes(&entry("z", 10, ActivityKind::Log)));
        assert!(!cursor.precedes(&entry("b", 20, ActivityKind::Log)));
        assert!(!cursor.precedes(&entry("c", 20, ActivityKind::Log)));
    }

    #[test]
    fn cursor_token_survives_encoding() {
        let cursor = entry("entry-7", 1_700_000_000, ActivityKind::Comment).cursor();
        let decoded = FeedCursor::decode(&cursor.encode()).unwrap();
        assert_eq!(decoded, cursor);
        assert!(FeedCursor::decode("not a cursor").is_err());
    }

    #[test]
    fn filter_selects_kinds() {
        assert!(ActivityFilter::NonSystem.matches(ActivityKind::Comment));
        assert!(!ActivityFilter::NonSystem.matches(ActivityKind::System));
        assert!(ActivityFilter::SystemOnly.matches(ActivityKind::System));
        assert_eq!(
            ActivityFilter::parse("system-only"),
            Some(ActivityFilter::SystemOnly)
        );
    }
}
