//! TermLink Library
//!
//! Simple serial terminal I/O tool library providing device
//! configuration, a single-threaded poll-based connection engine and
//! byte-level mapping/hex pipelines.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use crate::cli::output::PrintMode;
pub use crate::core::escape::{decode, Command, Decision, ESCAPE_KEY};
pub use crate::core::session::{
    DeviceControl, ModemLine, ModemLines, Session, SessionEvent, Statistics,
};
pub use crate::core::{DeviceSettings, HexAccumulator, MappingConfig, WriteBuffer};
pub use crate::domain::error::{ErrorSlots, TermLinkError, TermLinkResult};
pub use crate::domain::options::{Options, TimestampMode};
