//! Device identity model

use serde::{Deserialize, Serialize};

use super::id::uuid_id;

uuid_id!(
    /// Stable anonymous identity of this device
    DeviceId
);

/// Platform details sent when registering the device with the remote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformMetadata {
    pub platform: String,
    pub app_version: String,
    #[serde(default)]
    pub os_version: Option<String>,
}

impl PlatformMetadata {
    /// Metadata describing the current build and host
    #[must_use]
    pub fn current() -> Self {
        Self {
            platform: std::env::consts::OS.to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            os_version: None,
        }
    }
}
