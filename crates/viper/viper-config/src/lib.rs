mod config;

pub use config::{
    ConfigError, DeviceConfig, EcuConfig, RegisterConfig, UnknownDevicePolicy, image_dir,
};
