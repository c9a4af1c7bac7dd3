use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Line timestamp mode, cycled in order with ctrl-t T.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampMode {
    #[default]
    #[serde(rename = "off")]
    Off,
    #[serde(rename = "24hour")]
    TwentyFourHour,
    #[serde(rename = "24hour-start")]
    TwentyFourHourStart,
    #[serde(rename = "24hour-delta")]
    TwentyFourHourDelta,
    #[serde(rename = "iso8601")]
    Iso8601,
}

impl TimestampMode {
    /// The next mode in the cycle, wrapping to off after the last.
    pub fn next(self) -> Self {
        match self {
            Self::Off => Self::TwentyFourHour,
            Self::TwentyFourHour => Self::TwentyFourHourStart,
            Self::TwentyFourHourStart => Self::TwentyFourHourDelta,
            Self::TwentyFourHourDelta => Self::Iso8601,
            Self::Iso8601 => Self::Off,
        }
    }

    pub fn is_enabled(self) -> bool {
        self != Self::Off
    }
}

impl fmt::Display for TimestampMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::TwentyFourHour => write!(f, "24hour"),
            Self::TwentyFourHourStart => write!(f, "24hour-start"),
            Self::TwentyFourHourDelta => write!(f, "24hour-delta"),
            Self::Iso8601 => write!(f, "iso8601"),
        }
    }
}

/// Wall-clock state backing the timestamp prefixes.
#[derive(Debug, Clone)]
pub struct TimestampClock {
    start: DateTime<Local>,
    previous: DateTime<Local>,
}

impl TimestampClock {
    pub fn new() -> Self {
        let now = Local::now();
        Self {
            start: now,
            previous: now,
        }
    }

    /// Produce the prefix text for the given mode, if one applies.
    pub fn stamp(&mut self, mode: TimestampMode) -> Option<String> {
        match mode {
            TimestampMode::Off => None,
            TimestampMode::TwentyFourHour => {
                Some(Local::now().format("%H:%M:%S%.3f").to_string())
            }
            TimestampMode::Iso8601 => {
                Some(Local::now().format("%Y-%m-%dT%H:%M:%S%.3f").to_string())
            }
            TimestampMode::TwentyFourHourStart => {
                Some(format_elapsed(Local::now().signed_duration_since(self.start)))
            }
            TimestampMode::TwentyFourHourDelta => {
                let now = Local::now();
                let delta = now.signed_duration_since(self.previous);
                self.previous = now;
                Some(format_elapsed(delta))
            }
        }
    }
}

impl Default for TimestampClock {
    fn default() -> Self {
        Self::new()
    }
}

fn format_elapsed(duration: Duration) -> String {
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        duration.num_hours(),
        duration.num_minutes() % 60,
        duration.num_seconds() % 60,
        duration.num_milliseconds() % 1000
    )
}

/// Read-only snapshot of all session tunables, resolved once from the
/// command line and the configuration file before the engine starts.
#[derive(Debug, Clone)]
pub struct Options {
    pub device: String,
    pub baudrate: u32,
    pub databits: u8,
    pub parity: String,
    pub stopbits: u8,
    pub flow: String,
    pub map: String,
    pub local_echo: bool,
    pub hex_mode: bool,
    pub timestamp: TimestampMode,
    /// Per-byte pacing delay in milliseconds; 0 disables pacing.
    pub output_delay: u64,
    pub no_autoconnect: bool,
    pub log: Option<PathBuf>,
    pub socket: Option<String>,
    pub interactive: bool,
    pub config_file: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            device: String::new(),
            baudrate: 115_200,
            databits: 8,
            parity: "none".to_string(),
            stopbits: 1,
            flow: "none".to_string(),
            map: String::new(),
            local_echo: false,
            hex_mode: false,
            timestamp: TimestampMode::Off,
            output_delay: 0,
            no_autoconnect: false,
            log: None,
            socket: None,
            interactive: true,
            config_file: None,
        }
    }
}
