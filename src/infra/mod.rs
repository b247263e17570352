pub mod firestore;
pub mod local;
pub mod memory;
pub mod session;
