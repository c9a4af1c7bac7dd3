//! Serial device lifecycle: open, lock, configure, restore.

use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;

use nix::errno::Errno;
use nix::fcntl::{flock, FlockArg};
use nix::libc;
use nix::sys::termios::{self, InputFlags, SetArg, Termios};
use nix::unistd::isatty;
use serialport::{ClearBuffer, SerialPort, TTYPort};
use tracing::debug;

use crate::core::mapping::MappingConfig;
use crate::core::session::{DeviceControl, ModemLine, ModemLines};
use crate::core::settings::DeviceSettings;
use crate::domain::error::{TermLinkError, TermLinkResult};

nix::ioctl_read_bad!(tiocmget, libc::TIOCMGET, libc::c_int);
nix::ioctl_write_ptr_bad!(tiocmset, libc::TIOCMSET, libc::c_int);

/// An open, locked and configured serial device.
///
/// Dropping the connection restores the saved driver settings,
/// releases the advisory lock and closes the descriptor, on every exit
/// path.
#[derive(Debug)]
pub struct Connection {
    port: TTYPort,
    saved: Termios,
}

impl Connection {
    /// Open and configure the device.
    ///
    /// Open and settings-application failures are the transient,
    /// retriable kind; a foreign lock or a non-tty path is a hard
    /// error that retrying cannot fix.
    pub fn open(
        path: &str,
        settings: &DeviceSettings,
        mapping: &MappingConfig,
    ) -> TermLinkResult<Self> {
        let mut port = serialport::new(path, settings.baudrate)
            .data_bits(settings.data_bits)
            .parity(settings.parity)
            .stop_bits(settings.stop_bits)
            .flow_control(settings.flow_control)
            .timeout(Duration::from_millis(100))
            .open_native()
            .map_err(|err| TermLinkError::DeviceUnavailable(err.to_string()))?;

        let fd = port.as_raw_fd();

        if !isatty(fd).unwrap_or(false) {
            return Err(TermLinkError::NotATerminal);
        }

        // Keep the kernel exclusive flag off so a second instance
        // reaches the advisory lock and gets the conflict diagnostic.
        port.set_exclusive(false)
            .map_err(|err| TermLinkError::DeviceUnavailable(err.to_string()))?;

        match flock(fd, FlockArg::LockExclusiveNonblock) {
            Ok(()) => {}
            Err(Errno::EWOULDBLOCK) => return Err(TermLinkError::LockConflict),
            Err(err) => return Err(TermLinkError::DeviceUnavailable(err.to_string())),
        }

        // Flush stale I/O left over from a previous holder.
        port.clear(ClearBuffer::All)
            .map_err(|err| TermLinkError::DeviceUnavailable(err.to_string()))?;

        let saved = termios::tcgetattr(fd)
            .map_err(|err| TermLinkError::DeviceUnavailable(err.to_string()))?;

        let connection = Self { port, saved };
        if mapping.wants_input_flags() {
            connection.apply_input_flags(mapping)?;
        }
        Ok(connection)
    }

    fn apply_input_flags(&self, mapping: &MappingConfig) -> TermLinkResult<()> {
        let fd = self.port.as_raw_fd();
        let mut attrs = termios::tcgetattr(fd)
            .map_err(|err| TermLinkError::DeviceUnavailable(err.to_string()))?;
        if mapping.inlcr {
            attrs.input_flags |= InputFlags::INLCR;
        }
        if mapping.igncr {
            attrs.input_flags |= InputFlags::IGNCR;
        }
        if mapping.icrnl {
            attrs.input_flags |= InputFlags::ICRNL;
        }
        termios::tcsetattr(fd, SetArg::TCSANOW, &attrs)
            .map_err(|err| TermLinkError::DeviceUnavailable(err.to_string()))
    }

    pub fn raw_fd(&self) -> RawFd {
        self.port.as_raw_fd()
    }

    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }

    fn line_state(&self) -> TermLinkResult<libc::c_int> {
        let mut state: libc::c_int = 0;
        unsafe { tiocmget(self.port.as_raw_fd(), &mut state) }
            .map_err(|err| TermLinkError::RuntimeIo(format!("could not get line state ({err})")))?;
        Ok(state)
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl DeviceControl for Connection {
    fn send_break(&mut self) -> TermLinkResult<()> {
        termios::tcsendbreak(self.port.as_raw_fd(), 0)
            .map_err(|err| TermLinkError::RuntimeIo(format!("could not send break ({err})")))
    }

    fn modem_lines(&mut self) -> TermLinkResult<ModemLines> {
        let state = self.line_state()?;
        Ok(ModemLines {
            dtr: state & libc::TIOCM_DTR != 0,
            rts: state & libc::TIOCM_RTS != 0,
            cts: state & libc::TIOCM_CTS != 0,
            dsr: state & libc::TIOCM_DSR != 0,
            dcd: state & libc::TIOCM_CD != 0,
            ri: state & libc::TIOCM_RI != 0,
        })
    }

    fn toggle_line(&mut self, line: ModemLine) -> TermLinkResult<bool> {
        let mask = match line {
            ModemLine::Dtr => libc::TIOCM_DTR,
            ModemLine::Rts => libc::TIOCM_RTS,
        };
        let mut state = self.line_state()?;
        state ^= mask;
        unsafe { tiocmset(self.port.as_raw_fd(), &state) }
            .map_err(|err| TermLinkError::RuntimeIo(format!("could not set line state ({err})")))?;
        Ok(state & mask != 0)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let fd = self.port.as_raw_fd();
        if let Err(err) = termios::tcsetattr(fd, SetArg::TCSANOW, &self.saved) {
            debug!("Could not restore device settings ({err})");
        }
        if let Err(err) = flock(fd, FlockArg::Unlock) {
            debug!("Could not release device lock ({err})");
        }
    }
}
