//! Background pump draining the notification channel.
//!
//! ```text
//!   Idle ──start──▶ Running ──request_stop──▶ StopRequested ──▶ Stopped
//!                      │                                          ▲
//!                      └──── channel closed / fatal error ────────┘
//! ```
//!
//! The loop only pops, decodes and dispatches. Every notification popped is
//! dispatched before the stop flag is looked at again, so stopping never
//! loses one that already left the channel.

use crate::channel::{NotificationChannel, Popped};
use crate::dispatch::Dispatcher;
use crate::error::EcuError;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use viper_config::UnknownDevicePolicy;
use viper_events::decode;

const THREAD_NAME: &str = "viper-reader";

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReaderState {
    Idle = 0,
    Running = 1,
    StopRequested = 2,
    Stopped = 3,
}

impl ReaderState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ReaderState::Idle,
            1 => ReaderState::Running,
            2 => ReaderState::StopRequested,
            _ => ReaderState::Stopped,
        }
    }
}

/// Everything the reader thread owns.
struct Pump {
    channel: Arc<dyn NotificationChannel>,
    dispatcher: Arc<Dispatcher>,
    errors: Sender<EcuError>,
    policy: UnknownDevicePolicy,
    state: Arc<AtomicU8>,
}

impl Pump {
    fn running(&self) -> bool {
        self.state.load(Ordering::Acquire) == ReaderState::Running as u8
    }

    fn report(&self, err: EcuError) {
        // The owner may already be gone during teardown.
        let _ = self.errors.send(err);
    }

    fn run(self) {
        tracing::info!("reader started");
        while self.running() {
            match self.channel.pop() {
                Ok(Popped::Notification(n)) => {
                    let device = decode(n.device);
                    if let Err(err) = self.dispatcher.dispatch(device, n.register_mask) {
                        tracing::error!(%device, mask = n.register_mask, error = %err, "notification for an unregistered device");
                        self.report(err);
                        if self.policy == UnknownDevicePolicy::Stop {
                            break;
                        }
                    }
                }
                Ok(Popped::Closed) => {
                    tracing::debug!("channel closed");
                    break;
                }
                Err(err) => {
                    tracing::error!(error = %err, "channel failed, reader stopping");
                    self.report(err.into());
                    break;
                }
            }
        }
        self.state.store(ReaderState::Stopped as u8, Ordering::Release);
        tracing::info!("reader stopped");
    }
}

/// Owner side of the reader thread. Exactly one per running [`Ecu`](crate::Ecu).
pub struct EventReader {
    state: Arc<AtomicU8>,
    pump: Option<Pump>,
    handle: Option<JoinHandle<()>>,
    done: Option<Receiver<()>>,
    stack_size: Option<usize>,
}

impl EventReader {
    pub(crate) fn new(
        channel: Arc<dyn NotificationChannel>,
        dispatcher: Arc<Dispatcher>,
        errors: Sender<EcuError>,
        policy: UnknownDevicePolicy,
    ) -> Self {
        let state = Arc::new(AtomicU8::new(ReaderState::Idle as u8));
        Self {
            pump: Some(Pump {
                channel,
                dispatcher,
                errors,
                policy,
                state: Arc::clone(&state),
            }),
            state,
            handle: None,
            done: None,
            stack_size: None,
        }
    }

    pub(crate) fn with_stack_size(mut self, stack_size: Option<usize>) -> Self {
        self.stack_size = stack_size;
        self
    }

    pub fn state(&self) -> ReaderState {
        ReaderState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `Idle -> Running`. A second call is a no-op.
    pub(crate) fn start(&mut self) -> Result<(), EcuError> {
        let Some(pump) = self.pump.take() else {
            return Ok(());
        };
        self.state
            .store(ReaderState::Running as u8, Ordering::Release);

        let (done_tx, done_rx) = mpsc::channel();
        let mut builder = thread::Builder::new().name(THREAD_NAME.into());
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }
        let spawned = builder.spawn(move || {
            pump.run();
            let _ = done_tx.send(());
        });

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                self.done = Some(done_rx);
                Ok(())
            }
            Err(e) => {
                self.state
                    .store(ReaderState::Stopped as u8, Ordering::Release);
                Err(EcuError::Spawn(e))
            }
        }
    }

    /// `Running -> StopRequested`. The loop leaves at its next check; a
    /// blocked `pop` needs the channel to be closed as well.
    pub fn request_stop(&self) {
        let _ = self.state.compare_exchange(
            ReaderState::Running as u8,
            ReaderState::StopRequested as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Waits up to `grace` for the thread to finish. Returns `true` if it
    /// did. On timeout the thread is detached and keeps running until the
    /// channel lets go of it.
    pub fn join(&mut self, grace: Duration) -> bool {
        let (Some(handle), Some(done)) = (self.handle.take(), self.done.take()) else {
            return true;
        };

        match done.recv_timeout(grace) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => match handle.join() {
                Ok(()) => true,
                Err(_) => {
                    tracing::warn!("reader thread panicked");
                    self.state
                        .store(ReaderState::Stopped as u8, Ordering::Release);
                    false
                }
            },
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(?grace, "reader thread did not stop cleanly, detaching it");
                false
            }
        }
    }

    /// `request_stop` followed by `join`.
    pub fn stop(&mut self, grace: Duration) -> bool {
        self.request_stop();
        self.join(grace)
    }
}
