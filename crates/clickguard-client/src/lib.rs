//! ClickGuard Client - integrity helpers for tracking submissions
//!
//! Everything in this crate runs on the submitting side and is a speed bump
//! only: the server re-derives every trust decision from its own secret and
//! never relies on these checks.
//!
//! - [`ClientSession`]: per-session fingerprint, signer, cache and submission guard
//! - [`SessionSigner`]: HMAC-SHA256 signatures with purpose-bound TTLs and single-use nonces
//! - [`SecureCache`]: signed, expiring key/value cache
//! - [`RecentSubmissions`]: suppresses repeated submissions of the same payload

pub mod cache;
pub mod error;
pub mod fingerprint;
pub mod guard;
pub mod session;
pub mod signing;

pub use cache::SecureCache;
pub use error::{ClientError, Result};
pub use fingerprint::DeviceTraits;
pub use guard::RecentSubmissions;
pub use session::{ClientSession, PreparedSubmission};
pub use signing::{SessionSigner, SignaturePurpose};
