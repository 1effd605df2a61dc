//! # HTTP API Handlers
//!
//! The read-only query surface over past sessions plus the user enrollment
//! endpoints. Live traffic never passes through here; it lives on the
//! WebSocket channel.

pub mod records;
pub mod users;

pub use records::*;
pub use users::*;
