//! Device identity providers

use std::sync::OnceLock;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::DeviceId;

/// Namespace for deriving device ids from a host-provided stable string
const DEVICE_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2b7e_9a44_4d2e_8c1b_52a0_d3e6_71f4);

/// Supplies the stable identity every remote call is scoped by
pub trait DeviceIdentity: Send + Sync {
    fn device_id(&self) -> Result<DeviceId>;
}

/// Fixed identity, e.g. one already persisted by the host
#[derive(Debug, Clone, Copy)]
pub struct StaticDeviceIdentity(DeviceId);

impl StaticDeviceIdentity {
    pub const fn new(device_id: DeviceId) -> Self {
        Self(device_id)
    }
}

impl DeviceIdentity for StaticDeviceIdentity {
    fn device_id(&self) -> Result<DeviceId> {
        Ok(self.0)
    }
}

/// Identity derived deterministically (UUID v5) from a stable host string
#[derive(Debug)]
pub struct DerivedDeviceIdentity {
    stable_id: String,
    derived: OnceLock<DeviceId>,
}

impl DerivedDeviceIdentity {
    pub fn new(stable_id: impl Into<String>) -> Self {
        Self {
            stable_id: stable_id.into().trim().to_string(),
            derived: OnceLock::new(),
        }
    }
}

impl DeviceIdentity for DerivedDeviceIdentity {
    fn device_id(&self) -> Result<DeviceId> {
        if self.stable_id.is_empty() {
            return Err(Error::Validation(
                "stable device identifier must not be empty".to_string(),
            ));
        }
        Ok(*self.derived.get_or_init(|| {
            DeviceId::from_uuid(Uuid::new_v5(&DEVICE_NAMESPACE, self.stable_id.as_bytes()))
        }))
    }
}
