use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{IdentityProvider, TicketStore};

#[derive(Clone)]
pub struct AppContext {
    pub config: AppConfig,
    pub store: Arc<dyn TicketStore>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn TicketStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            config,
            store,
            identity,
        }
    }
}
