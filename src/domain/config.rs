use crate::domain::options::TimestampMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// On-disk configuration profile.
///
/// Every field mirrors a command-line tunable; fields left unset in
/// the file fall through to the command line's own defaults, and
/// explicit command-line flags always win over the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub device: Option<String>,
    pub baudrate: Option<u32>,
    pub databits: Option<u8>,
    pub parity: Option<String>,
    pub stopbits: Option<u8>,
    pub flow: Option<String>,
    pub map: Option<String>,
    pub local_echo: Option<bool>,
    pub hex: Option<bool>,
    pub timestamp: Option<TimestampMode>,
    pub output_delay: Option<u64>,
    pub no_autoconnect: Option<bool>,
    pub log: Option<PathBuf>,
    pub socket: Option<String>,
}

impl FileConfig {
    /// Overlay `other` on top of `self`, field by field.
    pub fn merge(self, other: FileConfig) -> FileConfig {
        FileConfig {
            device: other.device.or(self.device),
            baudrate: other.baudrate.or(self.baudrate),
            databits: other.databits.or(self.databits),
            parity: other.parity.or(self.parity),
            stopbits: other.stopbits.or(self.stopbits),
            flow: other.flow.or(self.flow),
            map: other.map.or(self.map),
            local_echo: other.local_echo.or(self.local_echo),
            hex: other.hex.or(self.hex),
            timestamp: other.timestamp.or(self.timestamp),
            output_delay: other.output_delay.or(self.output_delay),
            no_autoconnect: other.no_autoconnect.or(self.no_autoconnect),
            log: other.log.or(self.log),
            socket: other.socket.or(self.socket),
        }
    }
}
