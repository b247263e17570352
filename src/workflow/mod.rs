pub mod feed;
pub mod lifecycle;

pub use feed::{ActivityFeed, FeedPage, PAGE_SIZE};
pub use lifecycle::{TicketLifecycle, TransitionOutcome};
