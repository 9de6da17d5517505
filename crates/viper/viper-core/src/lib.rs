//! Host side of the Viper bridge.
//!
//! An [`Ecu`] owns a set of simulated [`Device`]s, attaches to the session
//! of a compiled OS image through a [`NotificationChannel`], and runs one
//! [`EventReader`] thread that turns register-change notifications into
//! [`Event`]s for the external [`Scheduler`]. [`ArtifactGenerator`] writes
//! the identifier header and interrupt table the OS image is compiled with.

mod channel;
mod device;
mod dispatch;
mod ecu;
mod error;
mod generate;
mod reader;
mod registry;
mod scheduler;

pub use channel::{ChannelOpener, NotificationChannel, Popped, ShmOpener};
pub use device::{Device, RegisterDevice};
pub use dispatch::EVENT_PRIORITY;
pub use ecu::{Ecu, EcuHandle, EcuOptions};
pub use error::{ChannelError, EcuError};
pub use generate::{ArtifactGenerator, CONFIG_FILE, HEADER_FILE, write_artifacts};
pub use reader::{EventReader, ReaderState};
pub use registry::DeviceRegistry;
pub use scheduler::{ChannelScheduler, Event, Scheduler};

pub use viper_config::UnknownDevicePolicy;
pub use viper_events::{DeviceId, Notification, RegisterId, RegisterMask, SignalKind, decode, encode};
