use crate::ecu::EcuHandle;
use crate::scheduler::Scheduler;
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use viper_config::DeviceConfig;
use viper_events::{DeviceId, RegisterId, RegisterMask, encode};

/// A simulated hardware unit attached to an [`Ecu`](crate::Ecu).
///
/// The ecu only registers devices, wires them up on start and asks them for
/// their generated constants; what a device does when woken is up to the
/// scheduler and the device itself.
pub trait Device: Send + Sync {
    fn id(&self) -> DeviceId;

    /// Symbol used in the generated artifacts.
    fn name(&self) -> &str;

    /// Interrupt table entry, copied verbatim into the config artifact.
    fn callback_index(&self) -> u32;

    fn set_ecu(&self, ecu: EcuHandle);

    fn set_scheduler(&self, scheduler: Arc<dyn Scheduler>);

    fn start(&self);

    /// Writes one constant per register into the header.
    fn generate_registers(&self, _sink: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }

    /// Writes device-specific trailing constants into the header.
    fn generate(&self, _sink: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }
}

/// Device described entirely by configuration: a name and a set of
/// single-bit registers.
pub struct RegisterDevice {
    id: DeviceId,
    name: String,
    callback_index: u32,
    /// (name, bit) pairs
    registers: Vec<(String, u8)>,
    ecu: Mutex<Option<EcuHandle>>,
    scheduler: Mutex<Option<Arc<dyn Scheduler>>>,
    started: AtomicBool,
}

impl RegisterDevice {
    pub fn new(id: DeviceId, name: impl Into<String>, callback_index: u32) -> Self {
        Self {
            id,
            name: name.into(),
            callback_index,
            registers: Vec::new(),
            ecu: Mutex::new(None),
            scheduler: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// # Panics
    /// Panics if `bit` is not below 32.
    pub fn with_register(mut self, name: impl Into<String>, bit: u8) -> Self {
        assert!(bit < 32, "register bit out of range");
        self.registers.push((name.into(), bit));
        self
    }

    pub fn from_config(cfg: &DeviceConfig) -> Self {
        cfg.registers.iter().fold(
            Self::new(DeviceId(cfg.id), cfg.name.clone(), cfg.callback_index),
            |dev, reg| dev.with_register(reg.name.clone(), reg.bit),
        )
    }

    pub fn register_id(&self, name: &str) -> Option<RegisterId> {
        self.registers
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, bit)| encode(self.id, 1 << bit))
    }

    /// Union of all register bits.
    pub fn register_mask(&self) -> RegisterMask {
        self.registers.iter().fold(0, |mask, &(_, bit)| mask | 1 << bit)
    }

    /// Handle received on ecu start.
    pub fn ecu(&self) -> Option<EcuHandle> {
        self.ecu.lock().clone()
    }

    pub fn scheduler(&self) -> Option<Arc<dyn Scheduler>> {
        self.scheduler.lock().clone()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }
}

impl Device for RegisterDevice {
    fn id(&self) -> DeviceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn callback_index(&self) -> u32 {
        self.callback_index
    }

    fn set_ecu(&self, ecu: EcuHandle) {
        *self.ecu.lock() = Some(ecu);
    }

    fn set_scheduler(&self, scheduler: Arc<dyn Scheduler>) {
        *self.scheduler.lock() = Some(scheduler);
    }

    fn start(&self) {
        self.started.store(true, Ordering::Release);
        tracing::debug!(device = %self.name, id = %self.id, "device started");
    }

    fn generate_registers(&self, sink: &mut dyn Write) -> io::Result<()> {
        for (reg, bit) in &self.registers {
            writeln!(
                sink,
                "const reg_id_t {}_{} = {};",
                self.name,
                reg,
                encode(self.id, 1 << bit)
            )?;
        }
        Ok(())
    }

    // Mask covering every register, for OS code reacting to "any register".
    fn generate(&self, sink: &mut dyn Write) -> io::Result<()> {
        if self.registers.is_empty() {
            return Ok(());
        }
        writeln!(
            sink,
            "const reg_id_t {}_ALL = {};",
            self.name,
            encode(self.id, self.register_mask())
        )
    }
}
