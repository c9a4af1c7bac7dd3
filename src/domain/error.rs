use thiserror::Error;

/// TermLink unified error type
#[derive(Error, Debug)]
pub enum TermLinkError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid {field}: {message}")]
    Configuration {
        field: &'static str,
        message: String,
    },

    #[error("Could not open tty device ({0})")]
    DeviceUnavailable(String),

    #[error("Device file is locked by another process")]
    LockConflict,

    #[error("Not a tty device")]
    NotATerminal,

    #[error("Device I/O failed: {0}")]
    RuntimeIo(String),

    #[error("poll() failed ({0})")]
    ReadinessWait(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration file error: {0}")]
    ConfigFile(String),

    #[error("Log error: {0}")]
    Log(String),
}

pub type TermLinkResult<T> = Result<T, TermLinkError>;

/// Last-error slots consumed once at process exit.
///
/// The loud slot is always reported. The silent slot holds transient
/// connect failures and is reported only when auto-reconnect is
/// disabled, so an interrupted reconnect wait does not end with a
/// stale diagnostic.
#[derive(Debug, Default)]
pub struct ErrorSlots {
    loud: Option<String>,
    silent: Option<String>,
}

impl ErrorSlots {
    pub fn record_loud(&mut self, message: impl Into<String>) {
        self.loud = Some(message.into());
    }

    pub fn record_silent(&mut self, message: impl Into<String>) {
        self.silent = Some(message.into());
    }

    /// The diagnostic the operator should see at exit, if any.
    pub fn exit_message(&self, no_autoconnect: bool) -> Option<&str> {
        match (&self.loud, &self.silent) {
            (Some(loud), _) => Some(loud.as_str()),
            (None, Some(silent)) if no_autoconnect => Some(silent.as_str()),
            _ => None,
        }
    }
}
