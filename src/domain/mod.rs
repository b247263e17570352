pub mod activity;
pub mod actor;
pub mod call;
pub mod quote;
pub mod status;
pub mod ticket;
pub mod workgroup;
