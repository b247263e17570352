use async_trait::async_trait;

use crate::domain::actor::Actor;
use crate::error::{AppError, AppResult};
use crate::services::IdentityProvider;

/// Identity taken from configuration or command-line overrides.
pub struct StaticIdentity {
    id: Option<String>,
    name: Option<String>,
}

impl StaticIdentity {
    pub fn new(id: Option<String>, name: Option<String>) -> Self {
        Self { id, name }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_actor(&self) -> AppResult<Actor> {
        let id = self
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::Configuration("actor id not configured".to_string()))?;
        let name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(id);
        Ok(Actor::new(id, name))
    }
}
