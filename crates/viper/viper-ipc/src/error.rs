use std::io;
use std::path::PathBuf;
use viper_events::{RegisterId, SignalKind};

#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("OS image '{path}' not found, compile it before running")]
    ImageMissing { path: PathBuf },

    #[error("failed to map session '{path}'")]
    Map {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("session '{path}' is invalid: {reason}")]
    Layout { path: PathBuf, reason: &'static str },

    #[error("register {0} is not addressable in this session")]
    InvalidRegister(RegisterId),

    #[error("no OS process attached to the session")]
    NotAttached,

    #[error("failed to deliver {kind} to pid {pid}")]
    Signal {
        kind: SignalKind,
        pid: u64,
        #[source]
        source: io::Error,
    },

    #[error("session closed")]
    Closed,
}
