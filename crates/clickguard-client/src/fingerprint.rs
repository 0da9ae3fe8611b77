//! Session fingerprint

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Device traits mixed into the fingerprint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceTraits {
    pub user_agent: String,
    pub language: String,
    pub platform: String,
    /// e.g. `1920x1080x24`
    pub screen: String,
    pub timezone: String,
    pub hardware_concurrency: u32,
}

/// SHA-256 over the device traits and the session salt, hex encoded
pub fn compute(traits: &DeviceTraits, session_salt: &[u8; 16]) -> String {
    let mut hasher = Sha256::new();
    for part in [
        traits.user_agent.as_str(),
        traits.language.as_str(),
        traits.platform.as_str(),
        traits.screen.as_str(),
        traits.timezone.as_str(),
    ] {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    hasher.update(traits.hardware_concurrency.to_be_bytes());
    hasher.update(session_salt);
    hex::encode(hasher.finalize())
}
