use crate::error::EcuError;
use crate::registry::DeviceRegistry;
use crate::scheduler::{Event, Scheduler};
use std::sync::Arc;
use viper_events::{DeviceId, RegisterMask};

/// Priority of every event built from a notification.
pub const EVENT_PRIORITY: u8 = 0;

/// Turns (device, mask) pairs into scheduler events.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    registry: DeviceRegistry,
    scheduler: Arc<dyn Scheduler>,
}

impl Dispatcher {
    pub(crate) fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            registry: DeviceRegistry::new(),
            scheduler,
        }
    }

    pub(crate) fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub(crate) fn registry_mut(&mut self) -> &mut DeviceRegistry {
        &mut self.registry
    }

    pub(crate) fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    /// No lock is held across `add_event`.
    pub(crate) fn dispatch(&self, id: DeviceId, register_mask: RegisterMask) -> Result<(), EcuError> {
        let device = self.registry.lookup(id)?;
        let event = Event {
            device: Arc::clone(device),
            priority: EVENT_PRIORITY,
            register_mask,
        };
        tracing::debug!(?event, "dispatching");
        self.scheduler.add_event(event);
        Ok(())
    }
}
