//! Composite register identifiers shared with the compiled OS image.
//!
//! A register identifier is a single `u64`: the device id sits above bit
//! [`REGISTER_OFFSET`], the register bit-mask fills the low 32 bits.
//!
//! ```text
//!  63                              32 31                               0
//! ┌──────────────────────────────────┬──────────────────────────────────┐
//! │            device id             │          register mask           │
//! └──────────────────────────────────┴──────────────────────────────────┘
//! ```
//!
//! Both the runtime dispatch path and the header generator go through
//! [`encode`]/[`decode`]; changing [`REGISTER_OFFSET`] means regenerating the
//! header and recompiling the OS image.

/// Bit position of the device id inside a composite register identifier.
pub const REGISTER_OFFSET: u32 = 32;

/// Version stamp of the identifier layout. Stored in the session header so a
/// host never talks to an OS image compiled against another layout.
pub const LAYOUT_VERSION: u64 = 1;

/// Low-bits mask selecting the register part of a composite id.
const MASK_BITS: u64 = (1u64 << REGISTER_OFFSET) - 1;

// DeviceId is assigned by configuration and is stable across the host and the
// OS image. u32 keeps every value encodable: 64 - REGISTER_OFFSET = 32 bits.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DeviceId(pub u32);

/// Bit-mask of registers inside one device. One bit per register.
pub type RegisterMask = u32;

/// Composite identifier: `(device << REGISTER_OFFSET) | mask`.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RegisterId(pub u64);

/// Packs a device id and a register mask into a composite identifier.
#[inline]
pub const fn encode(device: DeviceId, mask: RegisterMask) -> RegisterId {
    RegisterId(((device.0 as u64) << REGISTER_OFFSET) | mask as u64)
}

/// Extracts the device id of a composite identifier.
#[inline]
pub const fn decode(id: RegisterId) -> DeviceId {
    DeviceId((id.0 >> REGISTER_OFFSET) as u32)
}

impl DeviceId {
    /// The device's own base identifier (no register bit set).
    #[inline]
    pub const fn base(self) -> RegisterId {
        encode(self, 0)
    }
}

impl RegisterId {
    #[inline]
    pub const fn device_id(self) -> DeviceId {
        decode(self)
    }

    #[inline]
    pub const fn register_mask(self) -> RegisterMask {
        (self.0 & MASK_BITS) as RegisterMask
    }

    /// Bit index of the addressed register, or `None` when the mask does not
    /// select exactly one register.
    #[inline]
    pub const fn register_index(self) -> Option<u32> {
        let mask = self.register_mask();
        if mask.count_ones() == 1 {
            Some(mask.trailing_zeros())
        } else {
            None
        }
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for RegisterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_lands_above_offset() {
        assert_eq!(encode(DeviceId(1), 0), RegisterId(0x1_0000_0000));
        assert_eq!(encode(DeviceId(3), 0x4), RegisterId(0x3_0000_0004));
        assert_eq!(DeviceId(2).base(), RegisterId(0x2_0000_0000));
    }

    #[test]
    fn decode_inverts_encode_at_the_edges() {
        let devices = [0, 1, 2, 0xFF, 0xFFFF, u32::MAX];
        let masks = [0, 1, 0x8000_0000, 0x5555_5555, u32::MAX];
        for &d in &devices {
            for &m in &masks {
                let id = encode(DeviceId(d), m);
                assert_eq!(decode(id), DeviceId(d));
                assert_eq!(id.register_mask(), m);
            }
        }
    }

    #[test]
    fn register_index_needs_a_single_bit() {
        assert_eq!(encode(DeviceId(1), 1 << 5).register_index(), Some(5));
        assert_eq!(encode(DeviceId(1), 0).register_index(), None);
        assert_eq!(encode(DeviceId(1), 0b11).register_index(), None);
    }

    #[test]
    fn display_is_hex_like_the_generated_header() {
        assert_eq!(encode(DeviceId(1), 0).to_string(), "0x100000000");
        assert_eq!(DeviceId(0).base().to_string(), "0x0");
    }
}
