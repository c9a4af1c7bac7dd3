// Domain module - Core domain types
pub mod config;
pub mod error;
pub mod options;

pub use self::error::{ErrorSlots, TermLinkError, TermLinkResult};
pub use self::options::{Options, TimestampMode};
