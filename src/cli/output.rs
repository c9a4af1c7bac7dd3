//! Operator-terminal rendering: print strategies, status lines and the
//! raw-mode guard.

use chrono::Local;
use crossterm::{
    cursor, execute,
    terminal::{self, Clear, ClearType},
};
use std::io::{self, Write};

use crate::domain::error::TermLinkResult;
use crate::domain::options::Options;

/// Inbound rendering strategy for bytes received from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintMode {
    /// Literal character glyphs
    Normal,
    /// Two hexadecimal text characters per byte
    Hex,
}

/// Renders session bytes and status lines on the operator terminal.
///
/// Tracks whether device output left the cursor mid-line so status
/// messages start on a line of their own.
pub struct Printer {
    out: Box<dyn Write + Send>,
    pub mode: PrintMode,
    tainted: bool,
}

impl Printer {
    pub fn stdout(mode: PrintMode) -> Self {
        Self::with_writer(Box::new(io::stdout()), mode)
    }

    pub fn with_writer(out: Box<dyn Write + Send>, mode: PrintMode) -> Self {
        Self {
            out,
            mode,
            tainted: false,
        }
    }

    /// Render one received byte using the active strategy.
    pub fn print(&mut self, byte: u8) {
        let _ = match self.mode {
            PrintMode::Normal => self.out.write_all(&[byte]),
            PrintMode::Hex => write!(self.out, "{} ", hex::encode([byte])),
        };
        let _ = self.out.flush();
        self.tainted = true;
    }

    /// Raw text (timestamp prefixes), no strategy applied.
    pub fn print_raw(&mut self, text: &str) {
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
        self.tainted = true;
    }

    /// In-session status line, prefixed and CR-LF terminated for raw
    /// terminal mode.
    pub fn status(&mut self, message: &str) {
        if self.tainted {
            let _ = self.out.write_all(b"\r\n");
            self.tainted = false;
        }
        let _ = write!(
            self.out,
            "[termlink {}] {}\r\n",
            Local::now().format("%H:%M:%S"),
            message
        );
        let _ = self.out.flush();
    }

    pub fn warning(&mut self, message: &str) {
        self.status(&format!("Warning: {message}"));
    }

    /// ANSI/VT100 clear, cursor home.
    pub fn clear_screen(&mut self) {
        let _ = execute!(self.out, Clear(ClearType::All), cursor::MoveTo(0, 0));
    }
}

/// Scoped raw-mode guard for the operator terminal. Cooked mode comes
/// back on every exit path, including panics and error returns.
pub struct RawGuard;

impl RawGuard {
    pub fn enable() -> TermLinkResult<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Print the resolved options snapshot (the ctrl-t c listing).
pub fn print_options(printer: &mut Printer, options: &Options) {
    printer.status("Configuration:");
    if let Some(path) = &options.config_file {
        printer.status(&format!(" Config file: {}", path.display()));
    }
    printer.status(&format!(" Device: {}", options.device));
    printer.status(&format!(" Baudrate: {}", options.baudrate));
    printer.status(&format!(" Databits: {}", options.databits));
    printer.status(&format!(" Flow: {}", options.flow));
    printer.status(&format!(" Stopbits: {}", options.stopbits));
    printer.status(&format!(" Parity: {}", options.parity));
    printer.status(&format!(" Output delay: {}", options.output_delay));
    printer.status(&format!(
        " Local echo: {}",
        if options.local_echo { "yes" } else { "no" }
    ));
    printer.status(&format!(" Timestamp: {}", options.timestamp));
    if !options.map.is_empty() {
        printer.status(&format!(" Map flags: {}", options.map));
    }
    if let Some(path) = &options.log {
        printer.status(&format!(" Log file: {}", path.display()));
    }
    if let Some(socket) = &options.socket {
        printer.status(&format!(" Socket: {socket}"));
    }
}
