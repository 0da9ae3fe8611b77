//! REST API implementation
//!
//! - types: request/response payloads and application state
//! - extractors: JSON body, client context and admin authentication
//! - handlers: endpoint handlers
//! - router: route table and layers

mod extractors;
mod handlers;
mod router;
pub mod types;

pub use extractors::{AdminAuth, ClientContext, JsonExtractor};
pub use router::create_router;
pub use types::{
    AppState, BlacklistRequest, BlacklistResponse, FraudReportQuery, HealthResponse,
    TrackRequest, TrackResponse, TrackType, UnblockResponse, VerifyRequest, VerifyResponse,
};
