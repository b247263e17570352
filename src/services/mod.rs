pub mod identity;
pub mod ticket_store;

pub use identity::IdentityProvider;
pub use ticket_store::{ActivitySubscription, TicketChange, TicketStore};
