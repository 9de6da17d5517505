pub mod codec;
pub mod notification;
pub mod signal;

pub use codec::{DeviceId, LAYOUT_VERSION, REGISTER_OFFSET, RegisterId, RegisterMask, decode, encode};
pub use notification::Notification;
pub use signal::{SignalKind, UnknownSignal};
