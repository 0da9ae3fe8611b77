//! TrackingPipeline - ingestion gateway for clicks and conversions
//!
//! The module is organized into:
//! - `types`: response types
//! - `gateway`: the ordered ingestion steps
//! - `operations`: review, queue, blacklist and reporting operations

mod gateway;
mod operations;
mod types;

pub use gateway::TrackingPipeline;
pub use types::IngestResponse;
