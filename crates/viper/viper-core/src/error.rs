use std::io;
use std::path::PathBuf;
use viper_events::{DeviceId, RegisterId};
use viper_ipc::IpcError;

/// Failures reported by a [`NotificationChannel`](crate::NotificationChannel).
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,

    #[error("register {0} is not addressable")]
    InvalidRegister(RegisterId),

    #[error("session unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Ipc(IpcError),
}

impl From<IpcError> for ChannelError {
    fn from(e: IpcError) -> Self {
        match e {
            IpcError::Closed => ChannelError::Closed,
            IpcError::InvalidRegister(id) => ChannelError::InvalidRegister(id),
            e => ChannelError::Ipc(e),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EcuError {
    #[error("cannot open a session for '{path}', compile the OS image before running")]
    ChannelUnavailable {
        path: PathBuf,
        #[source]
        source: ChannelError,
    },

    #[error("device {0} is not in the device list")]
    UnknownDevice(DeviceId),

    #[error(
        "cannot write '{header}' or '{config}', check that the directory exists and is writable"
    )]
    ArtifactWrite {
        header: PathBuf,
        config: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("channel is not open")]
    ChannelClosed,

    #[error("ecu already started, the device list is fixed")]
    AlreadyStarted,

    #[error("channel operation failed")]
    Channel(#[source] ChannelError),

    #[error("failed to spawn the reader thread")]
    Spawn(#[source] io::Error),
}

impl From<ChannelError> for EcuError {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::Closed => EcuError::ChannelClosed,
            e => EcuError::Channel(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_ipc_session_maps_to_channel_closed() {
        let e: EcuError = ChannelError::from(IpcError::Closed).into();
        assert!(matches!(e, EcuError::ChannelClosed));
    }

    #[test]
    fn artifact_error_names_both_paths() {
        let e = EcuError::ArtifactWrite {
            header: PathBuf::from("/x/vp_ipc_devices.h"),
            config: PathBuf::from("/x/target.cfg"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        let msg = e.to_string();
        assert!(msg.contains("/x/vp_ipc_devices.h"));
        assert!(msg.contains("/x/target.cfg"));
    }
}
