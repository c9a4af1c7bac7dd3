//! Device line-parameter validation.

use serialport::{DataBits, FlowControl, Parity, StopBits};

use crate::domain::error::{TermLinkError, TermLinkResult};
use crate::domain::options::Options;

/// Baud rates accepted on every platform. Anything else requires the
/// arbitrary-baud capability of the target OS.
pub const STANDARD_BAUD_RATES: &[u32] = &[
    50, 75, 110, 134, 150, 200, 300, 600, 1200, 1800, 2400, 4800, 9600, 19200, 38400, 57600,
    115_200, 230_400, 460_800, 500_000, 576_000, 921_600, 1_000_000, 1_152_000, 1_500_000,
    2_000_000, 2_500_000, 3_000_000, 3_500_000, 4_000_000,
];

/// Whether the serial backend on this platform can program a
/// non-standard baud rate (termios2 on Linux, IOSSIOSPEED on macOS).
pub fn arbitrary_baud_supported() -> bool {
    cfg!(any(target_os = "linux", target_os = "macos"))
}

/// Validated line parameters, rebuilt fresh for every connect attempt
/// from the read-only options snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSettings {
    pub baudrate: u32,
    pub standard_baudrate: bool,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
}

impl DeviceSettings {
    /// Build settings from the options snapshot. The first invalid
    /// field fails the whole configuration; nothing is ever partially
    /// applied to a device.
    pub fn from_options(options: &Options) -> TermLinkResult<Self> {
        let standard_baudrate = STANDARD_BAUD_RATES.contains(&options.baudrate);
        if !standard_baudrate && !arbitrary_baud_supported() {
            return Err(TermLinkError::Configuration {
                field: "baud rate",
                message: format!("{} is not supported on this platform", options.baudrate),
            });
        }

        let data_bits = match options.databits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            8 => DataBits::Eight,
            other => {
                return Err(TermLinkError::Configuration {
                    field: "data bits",
                    message: format!("{other} is out of range"),
                })
            }
        };

        let flow_control = match options.flow.as_str() {
            "hard" => FlowControl::Hardware,
            "soft" => FlowControl::Software,
            "none" => FlowControl::None,
            other => {
                return Err(TermLinkError::Configuration {
                    field: "flow control",
                    message: format!("unknown mode {other}"),
                })
            }
        };

        let stop_bits = match options.stopbits {
            1 => StopBits::One,
            2 => StopBits::Two,
            other => {
                return Err(TermLinkError::Configuration {
                    field: "stop bits",
                    message: format!("{other} is out of range"),
                })
            }
        };

        let parity = match options.parity.as_str() {
            "odd" => Parity::Odd,
            "even" => Parity::Even,
            "none" => Parity::None,
            other => {
                return Err(TermLinkError::Configuration {
                    field: "parity",
                    message: format!("unknown mode {other}"),
                })
            }
        };

        Ok(Self {
            baudrate: options.baudrate,
            standard_baudrate,
            data_bits,
            parity,
            stop_bits,
            flow_control,
        })
    }
}
