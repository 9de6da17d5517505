//! Shared-memory session between the host bridge and a compiled OS image.
//!
//! The OS image is the producer of register-change notifications; the host is
//! the single consumer. See [`layout`] for the binary layout both sides agree on.

mod channel;
mod endpoint;
mod error;
mod fifo;
pub mod layout;
mod session;

pub use channel::ShmChannel;
pub use endpoint::OsEndpoint;
pub use error::IpcError;
pub use fifo::SessionConfig;
pub use layout::{REGISTERS_PER_DEVICE, SESSION_MAGIC, session_path};
