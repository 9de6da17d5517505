//! Session sizing and FIFO index arithmetic.
//!
//! The notification FIFO is a power-of-two ring indexed by monotonically
//! increasing sequence numbers: `index = seq & (capacity - 1)`.

/// Sizing of a session created by the OS side.
#[derive(Debug, Copy, Clone)]
pub struct SessionConfig {
    /// Number of devices the register bank can address (ids `0..device_capacity`).
    pub device_capacity: u32,
    /// Number of FIFO slots. Must be a power of 2.
    pub fifo_capacity: usize,
}

impl SessionConfig {
    /// # Panics
    /// Panics if `fifo_capacity` is not a power of 2.
    ///
    /// ```
    /// use viper_ipc::SessionConfig;
    /// let cfg = SessionConfig::new(16, 1024);
    /// assert_eq!(cfg.mask(), 1023);
    /// ```
    pub fn new(device_capacity: u32, fifo_capacity: usize) -> Self {
        assert!(fifo_capacity.is_power_of_two(), "Capacity must be power of 2");
        Self {
            device_capacity,
            fifo_capacity,
        }
    }

    #[inline(always)]
    pub fn mask(&self) -> u64 {
        (self.fifo_capacity as u64) - 1
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(64, 1 << 10)
    }
}

/// Converts a sequence number to a slot index.
#[inline(always)]
pub fn seq_to_index(seq: u64, mask: u64) -> u64 {
    seq & mask
}

/// Number of unread slots between the two cursors.
///
/// The producer never overwrites unread data, so `write_seq - read_seq` is
/// always within `0..=capacity`; a reader cursor ahead of the writer (corrupt
/// session) counts as empty.
#[inline(always)]
pub fn pending(write_seq: u64, read_seq: u64) -> u64 {
    write_seq.saturating_sub(read_seq)
}
