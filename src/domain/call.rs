use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::actor::Actor;
use crate::error::{AppError, AppResult};

/// Why an outbound call did not reach the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailReason {
    NoAnswer,
    Busy,
    Unreachable,
    WrongNumber,
    Rejected,
    Voicemail,
}

impl FailReason {
    pub const ALL: [FailReason; 6] = [
        FailReason::NoAnswer,
        FailReason::Busy,
        FailReason::Unreachable,
        FailReason::WrongNumber,
        FailReason::Rejected,
        FailReason::Voicemail,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FailReason::NoAnswer => "no_answer",
            FailReason::Busy => "busy",
            FailReason::Unreachable => "unreachable",
            FailReason::WrongNumber => "wrong_number",
            FailReason::Rejected => "rejected",
            FailReason::Voicemail => "voicemail",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FailReason::NoAnswer => "No answer",
            FailReason::Busy => "Line busy",
            FailReason::Unreachable => "Phone switched off or unreachable",
            FailReason::WrongNumber => "Wrong number",
            FailReason::Rejected => "Call rejected",
            FailReason::Voicemail => "Went to voicemail",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|reason| reason.as_str() == normalized)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallResult {
    pub id: String,
    pub phone_number: String,
    pub reached: bool,
    #[serde(default)]
    pub fail_reason: Option<FailReason>,
    pub actor_id: String,
    pub actor_name: String,
    pub created_at: DateTime<Utc>,
}

/// Validated input for a call-result record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallAttempt {
    pub phone_number: String,
    pub reached: bool,
    pub fail_reason: Option<FailReason>,
}

impl CallAttempt {
    /// `fail_reason` is the raw selection; empty means none chosen.
    pub fn new(phone_number: &str, reached: bool, fail_reason: Option<&str>) -> AppResult<Self> {
        let phone_number = phone_number.trim();
        if phone_number.is_empty() {
            return Err(AppError::Validation("phone number is required".to_string()));
        }

        let selection = fail_reason.map(str::trim).filter(|value| !value.is_empty());
        let fail_reason = match (reached, selection) {
            (true, _) => None,
            (false, None) => {
                return Err(AppError::Validation(
                    "a fail reason is required when the customer was not reached".to_string(),
                ));
            }
            (false, Some(raw)) => Some(FailReason::parse(raw).ok_or_else(|| {
                AppError::Validation(format!("unknown fail reason '{raw}'"))
            })?),
        };

        Ok(Self {
            phone_number: phone_number.to_string(),
            reached,
            fail_reason,
        })
    }

    pub fn into_record(self, id: String, actor: &Actor, created_at: DateTime<Utc>) -> CallResult {
        CallResult {
            id,
            phone_number: self.phone_number,
            reached: self.reached,
            fail_reason: self.fail_reason,
            actor_id: actor.id.clone(),
            actor_name: actor.name.clone(),
            created_at,
        }
    }
}
