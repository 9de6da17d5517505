use crate::error::IpcError;
use crate::layout::session_path;
use crate::session::Session;
use parking_lot::Mutex;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use viper_events::{DeviceId, Notification, RegisterId, SignalKind};

/// Busy-poll attempts before `pop` starts sleeping between FIFO checks.
const SPIN_LIMIT: u32 = 64;

/// Host side of a session.
///
/// `ShmChannel` is `Send + Sync`: one thread may sit in [`pop`](Self::pop)
/// while another reads registers, sends signals or calls
/// [`close`](Self::close). Closing wakes a pending `pop` within one poll
/// interval; the mapping stays valid until the last owner drops the channel.
pub struct ShmChannel {
    session: Session,
    /// Serializes the consumer cursor.
    pop_lock: Mutex<()>,
    closed: AtomicBool,
    poll_interval: Duration,
}

impl ShmChannel {
    /// Opens the session of a compiled OS image.
    ///
    /// # Errors
    /// - [`IpcError::ImageMissing`] if `os_image` does not exist
    /// - [`IpcError::Map`] if the session file cannot be mapped
    /// - [`IpcError::Layout`] if the session was written for another layout
    pub fn open(os_image: &Path, poll_interval: Duration) -> Result<Self, IpcError> {
        if !os_image.exists() {
            return Err(IpcError::ImageMissing {
                path: os_image.to_path_buf(),
            });
        }
        let session = Session::open(&session_path(os_image))?;
        tracing::debug!(path = %session.path().display(), "session mapped");
        Ok(Self {
            session,
            pop_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
            poll_interval,
        })
    }

    /// The mapped session file.
    pub fn path(&self) -> &Path {
        self.session.path()
    }

    #[inline]
    fn ensure_open(&self) -> Result<(), IpcError> {
        if self.closed.load(Ordering::Acquire) {
            Err(IpcError::Closed)
        } else {
            Ok(())
        }
    }

    /// Non-blocking pop. `Ok(None)` means the FIFO is empty.
    pub fn try_pop(&self) -> Result<Option<Notification>, IpcError> {
        self.ensure_open()?;
        let _guard = self.pop_lock.lock();
        Ok(self.session.try_pop())
    }

    /// Blocks until a notification arrives. Returns `None` once the channel
    /// has been closed, including when `close` is called while waiting.
    pub fn pop(&self) -> Option<Notification> {
        let mut spins = 0u32;
        loop {
            match self.try_pop() {
                Ok(Some(n)) => return Some(n),
                Ok(None) => {}
                Err(_) => return None,
            }
            if spins < SPIN_LIMIT {
                spins += 1;
                std::hint::spin_loop();
            } else {
                std::thread::sleep(self.poll_interval);
            }
        }
    }

    /// Notifications waiting in the FIFO.
    pub fn pending(&self) -> u64 {
        self.session.len()
    }

    pub fn read_register(&self, id: RegisterId) -> Result<u32, IpcError> {
        self.ensure_open()?;
        Ok(self.session.register(id)?.load(Ordering::Acquire))
    }

    pub fn write_register(&self, id: RegisterId, value: u32) -> Result<(), IpcError> {
        self.ensure_open()?;
        self.session.register(id)?.store(value, Ordering::Release);
        Ok(())
    }

    /// Records `device` as the signal target, then raises `kind` in the OS
    /// process attached to the session.
    pub fn send_signal(&self, kind: SignalKind, device: DeviceId) -> Result<(), IpcError> {
        self.ensure_open()?;
        let h = self.session.header();
        let pid = h.os_pid.load(Ordering::Acquire);
        if pid == 0 {
            return Err(IpcError::NotAttached);
        }
        h.signal_device.store(device.0 as u64, Ordering::Release);

        // SAFETY: kill(2) has no memory-safety preconditions
        let rc = unsafe { libc::kill(pid as libc::pid_t, signal_number(kind)) };
        if rc != 0 {
            return Err(IpcError::Signal {
                kind,
                pid,
                source: io::Error::last_os_error(),
            });
        }
        Ok(())
    }

    /// Marks the channel closed. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(path = %self.path().display(), "session closed");
        }
    }
}

fn signal_number(kind: SignalKind) -> libc::c_int {
    match kind {
        SignalKind::User1 => libc::SIGUSR1,
        SignalKind::User2 => libc::SIGUSR2,
        SignalKind::Alarm => libc::SIGALRM,
    }
}
