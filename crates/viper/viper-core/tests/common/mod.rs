//! In-memory stand-ins for the session and the scheduler.

#![allow(dead_code)]

use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use viper_core::{
    ChannelError, ChannelOpener, Device, DeviceId, Event, NotificationChannel, Notification,
    Popped, RegisterDevice, RegisterId, RegisterMask, Scheduler, SignalKind,
};

#[derive(Default)]
struct Queue {
    items: VecDeque<Notification>,
    closed: bool,
}

/// FIFO whose `pop` blocks on a condvar until a push or a close.
#[derive(Default)]
pub struct MemoryChannel {
    queue: Mutex<Queue>,
    ready: Condvar,
    registers: Mutex<HashMap<RegisterId, u32>>,
    signals: Mutex<Vec<(SignalKind, DeviceId)>>,
}

impl MemoryChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, n: Notification) {
        self.queue.lock().items.push_back(n);
        self.ready.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.queue.lock().closed
    }

    /// Notifications nobody has popped yet.
    pub fn pending(&self) -> usize {
        self.queue.lock().items.len()
    }

    pub fn signals(&self) -> Vec<(SignalKind, DeviceId)> {
        self.signals.lock().clone()
    }

    fn ensure_open(&self) -> Result<(), ChannelError> {
        if self.is_closed() {
            Err(ChannelError::Closed)
        } else {
            Ok(())
        }
    }
}

impl NotificationChannel for MemoryChannel {
    fn pop(&self) -> Result<Popped, ChannelError> {
        let mut q = self.queue.lock();
        loop {
            if q.closed {
                return Ok(Popped::Closed);
            }
            if let Some(n) = q.items.pop_front() {
                return Ok(Popped::Notification(n));
            }
            self.ready.wait(&mut q);
        }
    }

    fn read_register(&self, id: RegisterId) -> Result<u32, ChannelError> {
        self.ensure_open()?;
        Ok(self.registers.lock().get(&id).copied().unwrap_or(0))
    }

    fn write_register(&self, id: RegisterId, value: u32) -> Result<(), ChannelError> {
        self.ensure_open()?;
        self.registers.lock().insert(id, value);
        Ok(())
    }

    fn send_signal(&self, kind: SignalKind, device: DeviceId) -> Result<(), ChannelError> {
        self.ensure_open()?;
        self.signals.lock().push((kind, device));
        Ok(())
    }

    fn close(&self) {
        self.queue.lock().closed = true;
        self.ready.notify_all();
    }
}

/// Channel whose `pop` ignores `close` until the test releases it, like a raw
/// blocking primitive without a shutdown path.
#[derive(Default)]
pub struct StuckChannel {
    released: AtomicBool,
}

impl StuckChannel {
    pub fn release(&self) {
        self.released.store(true, Ordering::Release);
    }
}

impl NotificationChannel for StuckChannel {
    fn pop(&self) -> Result<Popped, ChannelError> {
        while !self.released.load(Ordering::Acquire) {
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(Popped::Closed)
    }

    fn read_register(&self, _: RegisterId) -> Result<u32, ChannelError> {
        Ok(0)
    }

    fn write_register(&self, _: RegisterId, _: u32) -> Result<(), ChannelError> {
        Ok(())
    }

    fn send_signal(&self, _: SignalKind, _: DeviceId) -> Result<(), ChannelError> {
        Ok(())
    }

    fn close(&self) {}
}

/// Hands out one shared channel, or refuses to open.
pub struct Opener {
    channel: Option<Arc<dyn NotificationChannel>>,
}

impl Opener {
    pub fn serving(channel: Arc<dyn NotificationChannel>) -> Self {
        Self {
            channel: Some(channel),
        }
    }

    pub fn failing() -> Self {
        Self { channel: None }
    }
}

impl ChannelOpener for Opener {
    fn open(&self, os_image: &Path) -> Result<Arc<dyn NotificationChannel>, ChannelError> {
        self.channel
            .clone()
            .ok_or_else(|| ChannelError::Unavailable(format!("{} not built", os_image.display())))
    }
}

/// Records every event it receives.
#[derive(Default)]
pub struct RecordingScheduler {
    events: Mutex<Vec<(DeviceId, u8, RegisterMask)>>,
    arrived: Condvar,
}

impl RecordingScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<(DeviceId, u8, RegisterMask)> {
        self.events.lock().clone()
    }

    /// Waits until at least `n` events arrived or `timeout` passed.
    pub fn wait_for(&self, n: usize, timeout: Duration) -> Vec<(DeviceId, u8, RegisterMask)> {
        let deadline = Instant::now() + timeout;
        let mut events = self.events.lock();
        while events.len() < n {
            if self.arrived.wait_until(&mut events, deadline).timed_out() {
                break;
            }
        }
        events.clone()
    }
}

impl Scheduler for RecordingScheduler {
    fn add_event(&self, event: Event) {
        self.events
            .lock()
            .push((event.device.id(), event.priority, event.register_mask));
        self.arrived.notify_all();
    }
}

pub fn device(id: u32, name: &str) -> Arc<RegisterDevice> {
    Arc::new(RegisterDevice::new(DeviceId(id), name, id * 10).with_register("DATA", 0))
}

pub fn as_dyn(devices: &[Arc<RegisterDevice>]) -> Vec<Arc<dyn Device>> {
    devices
        .iter()
        .map(|d| Arc::clone(d) as Arc<dyn Device>)
        .collect()
}

/// Polls `cond` until it holds or `timeout` passes.
pub fn eventually(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}
