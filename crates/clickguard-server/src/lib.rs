//! ClickGuard HTTP Server Library
//!
//! REST API components, configuration and pipeline wiring, exposed for
//! testing and embedding.

pub mod api;
pub mod config;
pub mod error;
pub mod pipeline;
