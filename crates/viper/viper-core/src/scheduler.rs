use crate::device::Device;
use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use viper_events::RegisterMask;

/// Wake-up request for one device, handed to the scheduler and not kept by
/// the ecu afterwards.
#[derive(Clone)]
pub struct Event {
    pub device: Arc<dyn Device>,
    pub priority: u8,
    /// Registers that changed since the device last ran.
    pub register_mask: RegisterMask,
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("device", &self.device.name())
            .field("id", &self.device.id())
            .field("priority", &self.priority)
            .field("register_mask", &format_args!("{:#x}", self.register_mask))
            .finish()
    }
}

/// Consumer of dispatched events.
///
/// `add_event` is called from the reader thread while the scheduler may be
/// running devices on other threads; implementations synchronize internally.
pub trait Scheduler: Send + Sync {
    fn add_event(&self, event: Event);
}

/// Scheduler that forwards every event into an mpsc channel.
pub struct ChannelScheduler {
    tx: Sender<Event>,
}

impl ChannelScheduler {
    pub fn new() -> (Self, Receiver<Event>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl Scheduler for ChannelScheduler {
    fn add_event(&self, event: Event) {
        if let Err(mpsc::SendError(event)) = self.tx.send(event) {
            tracing::warn!(?event, "event receiver dropped, event discarded");
        }
    }
}
