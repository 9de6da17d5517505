use std::fmt;
use std::str::FromStr;

/// Interrupt-like signals the host can raise inside the OS image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignalKind {
    User1,
    User2,
    Alarm,
}

impl SignalKind {
    pub const ALL: [SignalKind; 3] = [SignalKind::User1, SignalKind::User2, SignalKind::Alarm];

    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::User1 => "SIGUSR1",
            SignalKind::User2 => "SIGUSR2",
            SignalKind::Alarm => "SIGALRM",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSignal(pub String);

impl fmt::Display for UnknownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown signal '{}'", self.0)
    }
}

impl std::error::Error for UnknownSignal {}

impl FromStr for SignalKind {
    type Err = UnknownSignal;

    // Accepts "SIGUSR1", "USR1" or "usr1".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let name = upper.strip_prefix("SIG").unwrap_or(&upper);
        match name {
            "USR1" => Ok(SignalKind::User1),
            "USR2" => Ok(SignalKind::User2),
            "ALRM" => Ok(SignalKind::Alarm),
            _ => Err(UnknownSignal(s.to_string())),
        }
    }
}
