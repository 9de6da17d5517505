//! Binary layout of a session file.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │ SessionHeader                                                        │
//! │  magic │ version │ register_offset │ device_capacity │ fifo_capacity │
//! │  os_pid* │ signal_device* │ write_seq* │ read_seq*     (* = atomic)  │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │ register bank: device_capacity × REGISTERS_PER_DEVICE × AtomicU32    │
//! │   word index = device_id × REGISTERS_PER_DEVICE + register bit index │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │ FIFO: fifo_capacity × Notification (16 bytes each)                   │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `write_seq` is advanced only by the OS side, `read_seq` only by the host.

use std::ffi::OsString;
use std::mem::size_of;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64};
use viper_events::{LAYOUT_VERSION, Notification, REGISTER_OFFSET};

/// ASCII "VIPERIPC".
pub const SESSION_MAGIC: u64 = 0x5649_5045_5249_5043;

/// One register per bit of the register mask.
pub const REGISTERS_PER_DEVICE: u64 = REGISTER_OFFSET as u64;

/// Device ids are 32-bit, so no session can address more devices.
pub const MAX_DEVICE_CAPACITY: u64 = 1 << 32;

#[repr(C)]
pub struct SessionHeader {
    pub magic: u64,
    /// Identifier layout version, must equal [`LAYOUT_VERSION`].
    pub version: u64,
    /// Must equal [`REGISTER_OFFSET`]; the OS image was compiled against it.
    pub register_offset: u64,
    pub device_capacity: u64,
    /// Power of two.
    pub fifo_capacity: u64,
    /// Pid of the OS process, 0 while none is attached.
    pub os_pid: AtomicU64,
    /// Device targeted by the last signal sent by the host.
    pub signal_device: AtomicU64,
    pub write_seq: AtomicU64,
    pub read_seq: AtomicU64,
}

impl SessionHeader {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.magic != SESSION_MAGIC {
            return Err("bad magic");
        }
        if self.version != LAYOUT_VERSION {
            return Err("identifier layout version mismatch");
        }
        if self.register_offset != REGISTER_OFFSET as u64 {
            return Err("register offset mismatch, regenerate and recompile the OS image");
        }
        if self.device_capacity > MAX_DEVICE_CAPACITY {
            return Err("device capacity exceeds the identifier range");
        }
        if !self.fifo_capacity.is_power_of_two() {
            return Err("fifo capacity must be power of two");
        }
        Ok(())
    }
}

#[inline]
pub fn registers_offset() -> usize {
    size_of::<SessionHeader>()
}

/// Start of the FIFO. `None` if the register bank does not fit in `usize`.
#[inline]
pub fn fifo_offset(device_capacity: u64) -> Option<usize> {
    let words = usize::try_from(device_capacity.checked_mul(REGISTERS_PER_DEVICE)?).ok()?;
    words
        .checked_mul(size_of::<AtomicU32>())?
        .checked_add(registers_offset())
}

/// Total bytes of a session with the given capacities, `None` on overflow.
pub fn bytes_for_session(device_capacity: u64, fifo_capacity: u64) -> Option<usize> {
    let slots = usize::try_from(fifo_capacity).ok()?;
    slots
        .checked_mul(size_of::<Notification>())?
        .checked_add(fifo_offset(device_capacity)?)
}

/// Session file belonging to an OS image: `<image>.ipc`.
pub fn session_path(os_image: &Path) -> PathBuf {
    let mut name = OsString::from(os_image.as_os_str());
    name.push(".ipc");
    PathBuf::from(name)
}
