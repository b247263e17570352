use blake3::Hasher;
use serde::{Deserialize, Serialize};

use crate::domain::ticket::Reference;

pub const DEFAULT_CLOSED_GROUP_NAME: &str = "Closed Tickets";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workgroup {
    pub id: String,
    pub name: String,
}

impl Workgroup {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// The reserved group closed tickets are moved into.
    ///
    /// Its id is derived from the name so every client computes the same key
    /// and create-if-absent never produces duplicates.
    pub fn closed(name: &str) -> Self {
        Self::new(closed_group_id(name), name.trim())
    }

    pub fn reference(&self) -> Reference {
        Reference::new(self.id.clone(), self.name.clone())
    }
}

pub fn closed_group_id(name: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(b"workgroup:");
    hasher.update(name.trim().as_bytes());
    let digest = hasher.finalize().to_hex();
    format!("closed-{}", &digest.as_str()[..20])
}
