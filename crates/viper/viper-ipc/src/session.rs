use crate::error::IpcError;
use crate::fifo::{SessionConfig, pending, seq_to_index};
use crate::layout::{
    REGISTERS_PER_DEVICE, SESSION_MAGIC, SessionHeader, bytes_for_session, fifo_offset,
    registers_offset,
};
use std::mem::size_of;
use std::path::Path;
use std::ptr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use viper_events::{LAYOUT_VERSION, Notification, REGISTER_OFFSET, RegisterId};
use viper_mmap::SharedMap;

/// A mapped session file. Shared by the host channel and the OS endpoint;
/// each side only drives its own half of the FIFO protocol.
pub(crate) struct Session {
    map: SharedMap,
    base: *mut u8,
    mask: u64,
    /// Byte offset of the first FIFO slot.
    fifo_start: usize,
    fifo_capacity: u64,
    device_capacity: u64,
}

// SAFETY: the mapping lives as long as the Session. Header counters and
// registers are atomics; FIFO slots are handed over through the
// write_seq/read_seq Release/Acquire pairs, and each side serializes its own
// cursor (OS side via &mut, host side via a lock in ShmChannel).
unsafe impl Send for Session {}
unsafe impl Sync for Session {}

impl Session {
    pub(crate) fn create(path: &Path, cfg: SessionConfig) -> Result<Self, IpcError> {
        let device_capacity = cfg.device_capacity as u64;
        let fifo_capacity = cfg.fifo_capacity as u64;
        let overflow = || IpcError::Layout {
            path: path.to_path_buf(),
            reason: "capacity overflow",
        };
        let bytes = bytes_for_session(device_capacity, fifo_capacity).ok_or_else(overflow)?;
        let fifo_start = fifo_offset(device_capacity).ok_or_else(overflow)?;
        let mut mm = SharedMap::create(path, bytes as u64).map_err(|source| IpcError::Map {
            path: path.to_path_buf(),
            source,
        })?;
        let base = mm.as_mut_ptr();

        // SAFETY: freshly created and zero-filled region sized for the header,
        // the register bank and the FIFO. Nobody else maps it before we return.
        unsafe {
            ptr::write(
                base as *mut SessionHeader,
                SessionHeader {
                    magic: SESSION_MAGIC,
                    version: LAYOUT_VERSION,
                    register_offset: REGISTER_OFFSET as u64,
                    device_capacity,
                    fifo_capacity,
                    os_pid: AtomicU64::new(0),
                    signal_device: AtomicU64::new(0),
                    write_seq: AtomicU64::new(0),
                    read_seq: AtomicU64::new(0),
                },
            );
        }

        Ok(Self {
            map: mm,
            base,
            mask: cfg.mask(),
            fifo_start,
            fifo_capacity,
            device_capacity,
        })
    }

    pub(crate) fn open(path: &Path) -> Result<Self, IpcError> {
        let layout_err = |reason| IpcError::Layout {
            path: path.to_path_buf(),
            reason,
        };

        let mut mm = SharedMap::open(path).map_err(|source| IpcError::Map {
            path: path.to_path_buf(),
            source,
        })?;
        if mm.len() < size_of::<SessionHeader>() {
            return Err(layout_err("truncated header"));
        }
        let base = mm.as_mut_ptr();

        // SAFETY: the mapping holds at least a full header; contents are
        // checked by validate() before anything else is trusted.
        let h = unsafe { &*(base as *const SessionHeader) };
        h.validate().map_err(layout_err)?;
        let (device_capacity, fifo_capacity) = (h.device_capacity, h.fifo_capacity);
        let bytes = bytes_for_session(device_capacity, fifo_capacity)
            .ok_or_else(|| layout_err("capacity overflow"))?;
        if mm.len() < bytes {
            return Err(layout_err("truncated session"));
        }
        let fifo_start =
            fifo_offset(device_capacity).ok_or_else(|| layout_err("capacity overflow"))?;

        Ok(Self {
            map: mm,
            base,
            mask: fifo_capacity - 1,
            fifo_start,
            fifo_capacity,
            device_capacity,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        self.map.path()
    }

    #[inline(always)]
    pub(crate) fn header(&self) -> &SessionHeader {
        // SAFETY: base points to a header initialized by create() or checked by open()
        unsafe { &*(self.base as *const SessionHeader) }
    }

    /// Resolves a composite id to its word in the register bank.
    pub(crate) fn register(&self, id: RegisterId) -> Result<&AtomicU32, IpcError> {
        let device = id.device_id().0 as u64;
        let bit = id.register_index().ok_or(IpcError::InvalidRegister(id))? as u64;
        if device >= self.device_capacity {
            return Err(IpcError::InvalidRegister(id));
        }
        let word = device * REGISTERS_PER_DEVICE + bit;
        // SAFETY: word < device_capacity * REGISTERS_PER_DEVICE, inside the bank
        unsafe {
            let regs = self.base.add(registers_offset()) as *const AtomicU32;
            Ok(&*regs.add(word as usize))
        }
    }

    #[inline(always)]
    fn slot(&self, seq: u64) -> *mut Notification {
        let idx = seq_to_index(seq, self.mask) as usize;
        // SAFETY: idx is masked below fifo_capacity
        unsafe {
            let slots = self.base.add(self.fifo_start) as *mut Notification;
            slots.add(idx)
        }
    }

    /// Producer half. Must only be driven by one thread at a time.
    pub(crate) fn try_push(&self, n: Notification) -> bool {
        let h = self.header();
        let w = h.write_seq.load(Ordering::Relaxed);
        let r = h.read_seq.load(Ordering::Acquire);
        if pending(w, r) >= self.fifo_capacity {
            return false;
        }
        // SAFETY: the slot at w is not visible to the consumer until write_seq moves
        unsafe { ptr::write_volatile(self.slot(w), n) };
        h.write_seq.store(w + 1, Ordering::Release);
        true
    }

    /// Consumer half. Must only be driven by one thread at a time.
    pub(crate) fn try_pop(&self) -> Option<Notification> {
        let h = self.header();
        let r = h.read_seq.load(Ordering::Relaxed);
        let w = h.write_seq.load(Ordering::Acquire);
        if pending(w, r) == 0 {
            return None;
        }
        // SAFETY: the Acquire load of write_seq makes the slot at r visible;
        // the producer will not reuse it until read_seq moves past it
        let n = unsafe { ptr::read_volatile(self.slot(r)) };
        h.read_seq.store(r + 1, Ordering::Release);
        Some(n)
    }

    pub(crate) fn len(&self) -> u64 {
        let h = self.header();
        pending(
            h.write_seq.load(Ordering::Acquire),
            h.read_seq.load(Ordering::Acquire),
        )
    }
}
