use crate::error::ChannelError;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use viper_events::{DeviceId, Notification, RegisterId, SignalKind};
use viper_ipc::ShmChannel;

/// Result of a blocking pop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Popped {
    Notification(Notification),
    /// The channel was closed; no further notifications will arrive.
    Closed,
}

/// Session with a running OS image.
///
/// Implementations must be shareable between the reader thread (the only
/// caller of `pop`) and the owner. `close` must make a `pop` blocked on
/// another thread return [`Popped::Closed`].
pub trait NotificationChannel: Send + Sync {
    /// Blocks until a notification is available or the channel is closed.
    fn pop(&self) -> Result<Popped, ChannelError>;

    fn read_register(&self, id: RegisterId) -> Result<u32, ChannelError>;

    fn write_register(&self, id: RegisterId, value: u32) -> Result<(), ChannelError>;

    fn send_signal(&self, kind: SignalKind, device: DeviceId) -> Result<(), ChannelError>;

    /// Idempotent.
    fn close(&self);
}

/// Opens the session belonging to an OS image.
pub trait ChannelOpener: Send + Sync {
    fn open(&self, os_image: &Path) -> Result<Arc<dyn NotificationChannel>, ChannelError>;
}

impl NotificationChannel for ShmChannel {
    fn pop(&self) -> Result<Popped, ChannelError> {
        Ok(match ShmChannel::pop(self) {
            Some(n) => Popped::Notification(n),
            None => Popped::Closed,
        })
    }

    fn read_register(&self, id: RegisterId) -> Result<u32, ChannelError> {
        Ok(ShmChannel::read_register(self, id)?)
    }

    fn write_register(&self, id: RegisterId, value: u32) -> Result<(), ChannelError> {
        Ok(ShmChannel::write_register(self, id, value)?)
    }

    fn send_signal(&self, kind: SignalKind, device: DeviceId) -> Result<(), ChannelError> {
        Ok(ShmChannel::send_signal(self, kind, device)?)
    }

    fn close(&self) {
        ShmChannel::close(self)
    }
}

/// Opens shared-memory sessions (`<image>.ipc`).
#[derive(Debug, Clone, Copy)]
pub struct ShmOpener {
    pub poll_interval: Duration,
}

impl ShmOpener {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }
}

impl Default for ShmOpener {
    fn default() -> Self {
        Self::new(Duration::from_micros(200))
    }
}

impl ChannelOpener for ShmOpener {
    fn open(&self, os_image: &Path) -> Result<Arc<dyn NotificationChannel>, ChannelError> {
        let channel = ShmChannel::open(os_image, self.poll_interval)?;
        Ok(Arc::new(channel))
    }
}
