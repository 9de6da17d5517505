use crate::channel::{ChannelOpener, NotificationChannel};
use crate::device::{Device, RegisterDevice};
use crate::dispatch::Dispatcher;
use crate::error::EcuError;
use crate::generate::ArtifactGenerator;
use crate::reader::{EventReader, ReaderState};
use crate::registry::DeviceRegistry;
use crate::scheduler::Scheduler;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;
use viper_config::{EcuConfig, UnknownDevicePolicy, image_dir};
use viper_events::{DeviceId, RegisterId, RegisterMask, SignalKind};

type ChannelSlot = Arc<RwLock<Option<Arc<dyn NotificationChannel>>>>;

/// Tunables of an [`Ecu`].
#[derive(Debug, Clone)]
pub struct EcuOptions {
    /// How long `kill` waits for the reader thread.
    pub stop_grace: Duration,
    pub on_unknown_device: UnknownDevicePolicy,
    /// Target of `generate`. `None` means the OS image's directory.
    pub artifact_dir: Option<PathBuf>,
    /// Stack size of the reader thread. `None` keeps the platform default.
    pub reader_stack_size: Option<usize>,
}

impl Default for EcuOptions {
    fn default() -> Self {
        Self {
            stop_grace: Duration::from_secs(1),
            on_unknown_device: UnknownDevicePolicy::Stop,
            artifact_dir: None,
            reader_stack_size: None,
        }
    }
}

/// Back-reference handed to devices on start.
///
/// Register and signal calls go to the ecu's current session and fail with
/// [`EcuError::ChannelClosed`] before start and after kill.
#[derive(Clone)]
pub struct EcuHandle {
    channel: ChannelSlot,
}

impl EcuHandle {
    fn current(&self) -> Result<Arc<dyn NotificationChannel>, EcuError> {
        self.channel.read().clone().ok_or(EcuError::ChannelClosed)
    }

    pub fn read_register(&self, id: RegisterId) -> Result<u32, EcuError> {
        Ok(self.current()?.read_register(id)?)
    }

    pub fn write_register(&self, id: RegisterId, value: u32) -> Result<(), EcuError> {
        Ok(self.current()?.write_register(id, value)?)
    }

    pub fn send_signal(&self, kind: SignalKind, device: DeviceId) -> Result<(), EcuError> {
        Ok(self.current()?.send_signal(kind, device)?)
    }

    pub fn is_open(&self) -> bool {
        self.channel.read().is_some()
    }
}

/// Engine control unit: a set of devices bridged to one OS image.
///
/// ```text
/// add* ──▶ start ──▶ (running: reader thread dispatching) ──▶ kill
/// ```
///
/// The device list is fixed once `start` has been called.
pub struct Ecu {
    os_path: PathBuf,
    opener: Box<dyn ChannelOpener>,
    dispatcher: Dispatcher,
    handle: EcuHandle,
    reader: Option<EventReader>,
    errors: Option<Receiver<EcuError>>,
    options: EcuOptions,
    started: bool,
}

impl Ecu {
    pub fn new<O>(os_path: impl Into<PathBuf>, scheduler: Arc<dyn Scheduler>, opener: O) -> Self
    where
        O: ChannelOpener + 'static,
    {
        Self {
            os_path: os_path.into(),
            opener: Box::new(opener),
            dispatcher: Dispatcher::new(scheduler),
            handle: EcuHandle {
                channel: Arc::new(RwLock::new(None)),
            },
            reader: None,
            errors: None,
            options: EcuOptions::default(),
            started: false,
        }
    }

    pub fn with_options(mut self, options: EcuOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds an ecu with the configured options and one [`RegisterDevice`]
    /// per configured device.
    pub fn from_config<O>(config: &EcuConfig, scheduler: Arc<dyn Scheduler>, opener: O) -> Self
    where
        O: ChannelOpener + 'static,
    {
        let mut ecu = Self::new(config.os_path.clone(), scheduler, opener).with_options(EcuOptions {
            stop_grace: config.stop_grace(),
            on_unknown_device: config.on_unknown_device,
            artifact_dir: Some(config.artifact_dir()),
            reader_stack_size: None,
        });
        let devices = config
            .devices
            .iter()
            .map(|d| Arc::new(RegisterDevice::from_config(d)) as Arc<dyn Device>);
        ecu.dispatcher.registry_mut().add(devices);
        ecu
    }

    pub fn os_path(&self) -> &Path {
        &self.os_path
    }

    pub fn devices(&self) -> &DeviceRegistry {
        self.dispatcher.registry()
    }

    /// Registers devices. Only valid before `start`.
    pub fn add<I>(&mut self, devices: I) -> Result<(), EcuError>
    where
        I: IntoIterator<Item = Arc<dyn Device>>,
    {
        if self.started {
            return Err(EcuError::AlreadyStarted);
        }
        self.dispatcher.registry_mut().add(devices);
        Ok(())
    }

    /// Opens the session (or takes over the one from [`open_session`]), wires
    /// up and starts every device in id order, then launches the reader.
    ///
    /// [`open_session`]: Self::open_session
    ///
    /// # Errors
    /// - [`EcuError::ChannelUnavailable`] if the session cannot be opened;
    ///   nothing is started and `start` may be retried.
    /// - [`EcuError::Spawn`] if the reader thread cannot be created. The
    ///   session is closed again and `start` may be retried; devices already
    ///   got `start` and will get it once more.
    /// - [`EcuError::AlreadyStarted`] on a second call.
    pub fn start(&mut self) -> Result<(), EcuError> {
        if self.started {
            return Err(EcuError::AlreadyStarted);
        }

        // a session opened by open_session is taken over as is
        let open = self.handle.channel.read().clone();
        let channel = match open {
            Some(channel) => channel,
            None => self.open_channel()?,
        };
        *self.handle.channel.write() = Some(Arc::clone(&channel));
        self.started = true;

        let scheduler = self.dispatcher.scheduler();
        for device in self.dispatcher.registry().all() {
            device.set_ecu(self.handle.clone());
            device.set_scheduler(Arc::clone(scheduler));
            device.start();
        }

        let (tx, rx) = mpsc::channel();
        let mut reader = EventReader::new(
            Arc::clone(&channel),
            Arc::new(self.dispatcher.clone()),
            tx,
            self.options.on_unknown_device,
        )
        .with_stack_size(self.options.reader_stack_size);
        if let Err(e) = reader.start() {
            tracing::error!(error = %e, "reader thread failed to start, closing the session");
            channel.close();
            *self.handle.channel.write() = None;
            self.started = false;
            return Err(e);
        }
        self.reader = Some(reader);
        self.errors = Some(rx);

        tracing::info!(
            os = %self.os_path.display(),
            devices = self.dispatcher.registry().len(),
            "ecu started"
        );
        Ok(())
    }

    /// Opens the session for register and signal access only.
    ///
    /// No reader is started and no device is woken, so notifications stay in
    /// the FIFO for whichever host consumes them. Calling it again while the
    /// session is open does nothing. `kill` closes the session.
    ///
    /// # Errors
    /// - [`EcuError::ChannelUnavailable`] if the session cannot be opened.
    /// - [`EcuError::AlreadyStarted`] once `start` has been called.
    pub fn open_session(&mut self) -> Result<(), EcuError> {
        if self.started {
            return Err(EcuError::AlreadyStarted);
        }
        if self.handle.is_open() {
            return Ok(());
        }
        let channel = self.open_channel()?;
        *self.handle.channel.write() = Some(channel);
        tracing::debug!(os = %self.os_path.display(), "session opened without a reader");
        Ok(())
    }

    fn open_channel(&self) -> Result<Arc<dyn NotificationChannel>, EcuError> {
        self.opener
            .open(&self.os_path)
            .map_err(|source| EcuError::ChannelUnavailable {
                path: self.os_path.clone(),
                source,
            })
    }

    /// Stops the reader and closes the session. Safe to call any number of
    /// times, including before `start`.
    ///
    /// The stop request is followed by closing the channel, which releases a
    /// reader blocked in `pop`; the reader then gets `stop_grace` to finish.
    /// A reader that does not finish in time is reported and left behind.
    /// The reader is kept afterwards so its final state stays observable.
    pub fn kill(&mut self) {
        let Some(channel) = self.handle.channel.write().take() else {
            return;
        };
        if let Some(reader) = &self.reader {
            reader.request_stop();
        }
        channel.close();

        if let Some(reader) = self.reader.as_mut() {
            if reader.join(self.options.stop_grace) {
                tracing::info!("ecu stopped");
            } else {
                tracing::warn!("ecu stopped, reader thread still running");
            }
        }
    }

    /// Builds an event for `device` and hands it to the scheduler.
    pub fn on_notification(&self, device: DeviceId, register_mask: RegisterMask) -> Result<(), EcuError> {
        self.dispatcher.dispatch(device, register_mask)
    }

    pub fn read_register(&self, id: RegisterId) -> Result<u32, EcuError> {
        self.handle.read_register(id)
    }

    pub fn write_register(&self, id: RegisterId, value: u32) -> Result<(), EcuError> {
        self.handle.write_register(id, value)
    }

    pub fn send_signal(&self, kind: SignalKind, device: DeviceId) -> Result<(), EcuError> {
        self.handle.send_signal(kind, device)
    }

    pub fn handle(&self) -> EcuHandle {
        self.handle.clone()
    }

    pub fn reader_state(&self) -> ReaderState {
        self.reader
            .as_ref()
            .map_or(ReaderState::Idle, EventReader::state)
    }

    pub fn is_running(&self) -> bool {
        self.reader_state() == ReaderState::Running
    }

    /// Errors the reader reported since the last call.
    pub fn reader_errors(&self) -> Vec<EcuError> {
        self.errors
            .as_ref()
            .map(|rx| rx.try_iter().collect())
            .unwrap_or_default()
    }

    /// Writes the header and interrupt table into the artifact directory
    /// (by default the directory holding the OS image).
    pub fn generate(&self) -> Result<(), EcuError> {
        let dir = match &self.options.artifact_dir {
            Some(dir) => dir.clone(),
            None => image_dir(&self.os_path),
        };
        self.generate_into(dir)
    }

    pub fn generate_into(&self, dir: impl Into<PathBuf>) -> Result<(), EcuError> {
        ArtifactGenerator::new(dir).generate(self.dispatcher.registry())
    }
}

impl Drop for Ecu {
    fn drop(&mut self) {
        self.kill();
    }
}
