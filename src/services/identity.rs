use async_trait::async_trait;

use crate::domain::actor::Actor;
use crate::error::AppResult;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_actor(&self) -> AppResult<Actor>;
}
