// CLI module - Command line interface
pub mod args;
pub mod commands;
pub mod output;

pub use self::args::Args;
pub use self::commands::execute;
pub use self::output::{PrintMode, Printer, RawGuard};
