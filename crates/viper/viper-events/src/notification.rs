#![forbid(unsafe_code)]

use crate::codec::{DeviceId, RegisterId, RegisterMask, encode};

// Wire record pushed by the OS image into the session FIFO.
// repr(C) with explicit padding so the 16-byte layout matches the C side.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Notification {
    /// Composite id of the device that changed (register bits zero).
    pub device: RegisterId,
    /// Registers of that device that changed.
    pub register_mask: RegisterMask,
    _reserved: u32,
}

impl Notification {
    pub fn new(device: DeviceId, register_mask: RegisterMask) -> Self {
        Self {
            device: encode(device, 0),
            register_mask,
            _reserved: 0,
        }
    }

    #[inline]
    pub fn device_id(&self) -> DeviceId {
        self.device.device_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    /// The OS image writes this record verbatim; a layout change is a
    /// protocol change.
    #[test]
    fn notification_layout_is_stable() {
        assert_eq!(size_of::<Notification>(), 16, "Notification layout changed");
        assert_eq!(align_of::<Notification>(), 8);
    }

    #[test]
    fn device_id_survives_the_wire_form() {
        let n = Notification::new(DeviceId(7), 0x4);
        assert_eq!(n.device, RegisterId(0x7_0000_0000));
        assert_eq!(n.device_id(), DeviceId(7));
        assert_eq!(n.register_mask, 0x4);
    }
}
