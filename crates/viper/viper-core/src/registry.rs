//! Device registry keyed by device id.
//!
//! Filled by the owning thread before the ecu starts and read-only after,
//! so the reader thread gets its own snapshot and no locking is needed.
//! Iteration is ordered by id, which keeps start-up and generated artifacts
//! deterministic.

use crate::device::Device;
use crate::error::EcuError;
use std::collections::BTreeMap;
use std::sync::Arc;
use viper_events::DeviceId;

#[derive(Clone, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<DeviceId, Arc<dyn Device>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts devices by id. A device reusing an id replaces the previous
    /// one (last write wins); the replacement is logged.
    pub fn add<I>(&mut self, devices: I)
    where
        I: IntoIterator<Item = Arc<dyn Device>>,
    {
        for device in devices {
            let id = device.id();
            if let Some(old) = self.devices.insert(id, device) {
                tracing::warn!(%id, replaced = old.name(), "duplicate device id, keeping the last one");
            }
        }
    }

    pub fn lookup(&self, id: DeviceId) -> Result<&Arc<dyn Device>, EcuError> {
        self.devices.get(&id).ok_or(EcuError::UnknownDevice(id))
    }

    /// All devices in ascending id order.
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Device>> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
