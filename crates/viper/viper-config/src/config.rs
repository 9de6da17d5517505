use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Deserialize, Debug, Clone)]
pub struct EcuConfig {
    /// Compiled OS image the bridge attaches to.
    #[serde(default = "defaults::os_path")]
    pub os_path: PathBuf,
    /// Where generated artifacts go. Defaults to the directory of `os_path`.
    #[serde(default)]
    pub artifact_dir: Option<PathBuf>,
    /// How long `kill` waits for the reader thread.
    #[serde(default = "defaults::stop_grace_ms")]
    pub stop_grace_ms: u64,
    /// Sleep between FIFO checks once the reader has stopped spinning.
    #[serde(default = "defaults::poll_interval_us")]
    pub poll_interval_us: u64,
    #[serde(default)]
    pub on_unknown_device: UnknownDevicePolicy,
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

/// What the reader does with a notification for a device it does not know.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnknownDevicePolicy {
    /// Report the fault and stop reading.
    #[default]
    Stop,
    /// Report the fault and keep reading.
    Skip,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub id: u32,
    pub name: String,
    pub callback_index: u32,
    #[serde(default)]
    pub registers: Vec<RegisterConfig>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RegisterConfig {
    pub name: String,
    /// Bit of the register mask, 0..32.
    pub bit: u8,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("register '{device}.{register}' uses bit {bit}, registers are bits 0..32")]
    RegisterBit {
        device: String,
        register: String,
        bit: u8,
    },
}

mod defaults {
    use std::path::PathBuf;

    pub fn os_path() -> PathBuf {
        PathBuf::from("./trampoline")
    }

    pub fn stop_grace_ms() -> u64 {
        1_000
    }

    pub fn poll_interval_us() -> u64 {
        200
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

impl Default for EcuConfig {
    fn default() -> Self {
        Self {
            os_path: defaults::os_path(),
            artifact_dir: None,
            stop_grace_ms: defaults::stop_grace_ms(),
            poll_interval_us: defaults::poll_interval_us(),
            on_unknown_device: UnknownDevicePolicy::default(),
            log_level: defaults::log_level(),
            devices: Vec::new(),
        }
    }
}

impl EcuConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let toml_to_str = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&toml_to_str)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: EcuConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for device in &self.devices {
            if let Some(reg) = device.registers.iter().find(|r| r.bit >= 32) {
                return Err(ConfigError::RegisterBit {
                    device: device.name.clone(),
                    register: reg.name.clone(),
                    bit: reg.bit,
                });
            }
        }
        Ok(())
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us)
    }

    /// Artifact directory, falling back to the directory holding the OS image.
    pub fn artifact_dir(&self) -> PathBuf {
        match &self.artifact_dir {
            Some(dir) => dir.clone(),
            None => image_dir(&self.os_path),
        }
    }
}

/// Directory holding `os_image`; `.` for a bare file name.
pub fn image_dir(os_image: &Path) -> PathBuf {
    os_image
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}
