//! Notification Dispatcher
//!
//! Partner webhooks for verified conversions. Delivery runs detached from the
//! request that verified the conversion and never changes verification status.

mod dispatcher;
mod transport;

pub use dispatcher::{DeliveryOutcome, DispatcherConfig, WebhookDispatcher};
pub use transport::{
    ReqwestTransport, TransportResponse, WebhookPayload, WebhookTransport, MAX_RESPONSE_BODY,
    WEBHOOK_HEADER, WEBHOOK_HEADER_VALUE,
};
