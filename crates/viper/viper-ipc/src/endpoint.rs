use crate::error::IpcError;
use crate::fifo::SessionConfig;
use crate::session::Session;
use std::path::Path;
use std::sync::atomic::Ordering;
use viper_events::{DeviceId, Notification, RegisterId};

/// OS side of a session: creates the session file and produces
/// notifications, the way the compiled OS image does. Used to simulate the
/// image in tests and benches.
pub struct OsEndpoint {
    session: Session,
}

impl OsEndpoint {
    /// Creates (or truncates) the session file at `path`.
    pub fn create<P: AsRef<Path>>(path: P, cfg: SessionConfig) -> Result<Self, IpcError> {
        Ok(Self {
            session: Session::create(path.as_ref(), cfg)?,
        })
    }

    /// Advertises the process that receives signals. `0` detaches.
    pub fn attach_pid(&self, pid: u32) {
        self.session
            .header()
            .os_pid
            .store(pid as u64, Ordering::Release);
    }

    /// Queues a notification. Returns `false` when the FIFO is full; nothing
    /// unread is ever overwritten.
    pub fn push(&mut self, n: Notification) -> bool {
        self.session.try_push(n)
    }

    pub fn read_register(&self, id: RegisterId) -> Result<u32, IpcError> {
        Ok(self.session.register(id)?.load(Ordering::Acquire))
    }

    pub fn write_register(&self, id: RegisterId, value: u32) -> Result<(), IpcError> {
        self.session.register(id)?.store(value, Ordering::Release);
        Ok(())
    }

    /// Device targeted by the host's last signal.
    pub fn signal_device(&self) -> DeviceId {
        DeviceId(
            self.session
                .header()
                .signal_device
                .load(Ordering::Acquire) as u32,
        )
    }

    /// Notifications not yet consumed by the host.
    pub fn pending(&self) -> u64 {
        self.session.len()
    }
}
