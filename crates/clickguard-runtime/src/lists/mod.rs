//! Blacklist management
//!
//! Blacklisted identifiers are stored as HMAC hashes only. A backend keeps the
//! full history of entries; lookups consider active entries alone.

mod backend;
mod service;

pub use backend::{BlacklistBackend, MemoryBackend};
pub use service::BlacklistService;
