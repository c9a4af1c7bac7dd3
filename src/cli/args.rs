use clap::{Parser, ValueEnum};
use nix::libc;
use nix::unistd::isatty;
use std::path::PathBuf;

use crate::domain::config::FileConfig;
use crate::domain::error::{TermLinkError, TermLinkResult};
use crate::domain::options::{Options, TimestampMode};

/// Command line arguments for TermLink
#[derive(Parser, Debug, Default)]
#[command(
    name = "termlink",
    version = env!("CARGO_PKG_VERSION"),
    about = "Simple serial terminal I/O tool",
    long_about = "A simple serial terminal I/O tool connecting the operator terminal to one serial device, with byte mapping, hexadecimal mode, line timestamping and session mirroring over sockets."
)]
pub struct Args {
    /// Serial device path (doubles as a name filter with --list-devices)
    pub device: Option<String>,

    /// Baud rate
    #[arg(short = 'b', long)]
    pub baudrate: Option<u32>,

    /// Data bits (5, 6, 7, 8)
    #[arg(short = 'd', long)]
    pub databits: Option<u8>,

    /// Flow control (hard, soft, none)
    #[arg(short = 'f', long)]
    pub flow: Option<String>,

    /// Stop bits (1, 2)
    #[arg(short = 's', long)]
    pub stopbits: Option<u8>,

    /// Parity (odd, even, none)
    #[arg(short = 'p', long)]
    pub parity: Option<String>,

    /// Delay after each transmitted byte, in milliseconds
    #[arg(short = 'o', long, value_name = "MS")]
    pub output_delay: Option<u64>,

    /// Do not wait for the device to reappear after a disconnect
    #[arg(short = 'n', long)]
    pub no_autoconnect: bool,

    /// Enable local echo
    #[arg(short = 'e', long)]
    pub local_echo: bool,

    /// Timestamp received lines (--timestamp=MODE selects the mode)
    #[arg(
        short = 't',
        long,
        value_enum,
        value_name = "MODE",
        num_args = 0..=1,
        default_missing_value = "24hour"
    )]
    pub timestamp: Option<TimestampArg>,

    /// Capture the session to a log file
    #[arg(short = 'L', long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Comma-separated character mapping flags
    #[arg(short = 'm', long, value_name = "FLAGS")]
    pub map: Option<String>,

    /// Start in hexadecimal mode
    #[arg(short = 'x', long)]
    pub hex: bool,

    /// Mirror the session over a socket (unix:<path> or tcp:<port>)
    #[arg(short = 'S', long, value_name = "ADDR")]
    pub socket: Option<String>,

    /// List available serial devices and exit
    #[arg(short = 'l', long)]
    pub list_devices: bool,

    /// Explicit configuration file path
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Timestamp mode argument
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum TimestampArg {
    #[value(name = "24hour")]
    TwentyFourHour,
    #[value(name = "24hour-start")]
    TwentyFourHourStart,
    #[value(name = "24hour-delta")]
    TwentyFourHourDelta,
    #[value(name = "iso8601")]
    Iso8601,
}

impl From<TimestampArg> for TimestampMode {
    fn from(arg: TimestampArg) -> Self {
        match arg {
            TimestampArg::TwentyFourHour => Self::TwentyFourHour,
            TimestampArg::TwentyFourHourStart => Self::TwentyFourHourStart,
            TimestampArg::TwentyFourHourDelta => Self::TwentyFourHourDelta,
            TimestampArg::Iso8601 => Self::Iso8601,
        }
    }
}

impl Args {
    /// Merge the parsed flags over the file configuration into the
    /// read-only options snapshot the engine consumes. Command-line
    /// flags win over the file; the file wins over built-in defaults.
    pub fn resolve(
        self,
        file: FileConfig,
        config_file: Option<PathBuf>,
    ) -> TermLinkResult<Options> {
        let device = self
            .device
            .or(file.device)
            .ok_or(TermLinkError::Configuration {
                field: "device",
                message: "no device specified".to_string(),
            })?;

        Ok(Options {
            device,
            baudrate: self.baudrate.or(file.baudrate).unwrap_or(115_200),
            databits: self.databits.or(file.databits).unwrap_or(8),
            parity: self
                .parity
                .or(file.parity)
                .unwrap_or_else(|| "none".to_string()),
            stopbits: self.stopbits.or(file.stopbits).unwrap_or(1),
            flow: self
                .flow
                .or(file.flow)
                .unwrap_or_else(|| "none".to_string()),
            map: self.map.or(file.map).unwrap_or_default(),
            local_echo: self.local_echo || file.local_echo.unwrap_or(false),
            hex_mode: self.hex || file.hex.unwrap_or(false),
            timestamp: self
                .timestamp
                .map(TimestampMode::from)
                .or(file.timestamp)
                .unwrap_or(TimestampMode::Off),
            output_delay: self.output_delay.or(file.output_delay).unwrap_or(0),
            no_autoconnect: self.no_autoconnect || file.no_autoconnect.unwrap_or(false),
            log: self.log.or(file.log),
            socket: self.socket.or(file.socket),
            interactive: isatty(libc::STDIN_FILENO).unwrap_or(false),
            config_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags_win_over_file() {
        let args = Args {
            device: Some("/dev/ttyUSB1".to_string()),
            baudrate: Some(9600),
            ..Args::default()
        };
        let file = FileConfig {
            device: Some("/dev/ttyUSB0".to_string()),
            baudrate: Some(115_200),
            databits: Some(7),
            ..FileConfig::default()
        };
        let options = args.resolve(file, None).unwrap();
        assert_eq!(options.device, "/dev/ttyUSB1");
        assert_eq!(options.baudrate, 9600);
        assert_eq!(options.databits, 7);
    }

    #[test]
    fn test_missing_device_fails() {
        let err = Args::default().resolve(FileConfig::default(), None).unwrap_err();
        assert!(matches!(
            err,
            TermLinkError::Configuration { field: "device", .. }
        ));
    }

    #[test]
    fn test_defaults_fill_gaps() {
        let args = Args {
            device: Some("/dev/ttyACM0".to_string()),
            ..Args::default()
        };
        let options = args.resolve(FileConfig::default(), None).unwrap();
        assert_eq!(options.baudrate, 115_200);
        assert_eq!(options.databits, 8);
        assert_eq!(options.parity, "none");
        assert_eq!(options.stopbits, 1);
        assert_eq!(options.flow, "none");
        assert_eq!(options.timestamp, TimestampMode::Off);
        assert!(!options.hex_mode);
    }

    #[test]
    fn test_timestamp_arg_conversion() {
        let args = Args {
            device: Some("/dev/ttyACM0".to_string()),
            timestamp: Some(TimestampArg::Iso8601),
            ..Args::default()
        };
        let options = args.resolve(FileConfig::default(), None).unwrap();
        assert_eq!(options.timestamp, TimestampMode::Iso8601);
    }

    #[test]
    fn test_parse_basic_invocation() {
        let args = Args::parse_from([
            "termlink",
            "/dev/ttyUSB0",
            "-b",
            "9600",
            "--map",
            "ONLCRNL",
            "-e",
        ]);
        assert_eq!(args.device.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(args.baudrate, Some(9600));
        assert_eq!(args.map.as_deref(), Some("ONLCRNL"));
        assert!(args.local_echo);
    }
}
