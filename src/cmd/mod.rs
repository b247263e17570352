pub mod config;
pub mod feed;
pub mod reference;
pub mod ticket;
