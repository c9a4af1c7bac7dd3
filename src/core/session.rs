//! The connection engine: one session object owning the statistics,
//! toggles and buffers that outlive reconnects, plus the poll-based
//! reactor that shuttles bytes between the device, the operator and
//! the socket bridge.

use std::fmt;
use std::io::{self, Write};
use std::os::unix::io::RawFd;
use std::time::Duration;

use nix::errno::Errno;
use nix::libc;
use nix::poll::{poll, PollFd, PollFlags};
use nix::unistd::{self, AccessFlags};

use crate::cli::output::{self, PrintMode, Printer};
use crate::core::buffer::WriteBuffer;
use crate::core::escape::{self, Command, Decision};
use crate::core::hex::{is_valid_hex, HexAccumulator};
use crate::core::mapping::MappingConfig;
use crate::core::settings::DeviceSettings;
use crate::domain::error::{ErrorSlots, TermLinkError, TermLinkResult};
use crate::domain::options::{Options, TimestampClock, TimestampMode};
use crate::infrastructure::device::Connection;
use crate::infrastructure::log::SessionLog;
use crate::infrastructure::socket::SocketBridge;

const READ_BUFFER_SIZE: usize = 4096;
const DEL: u8 = 0x7f;
const BS: u8 = 0x08;

/// Transfer totals for the lifetime of the process. Never reset by a
/// reconnect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    pub tx_total: u64,
    pub rx_total: u64,
}

/// Modem control lines the operator can toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemLine {
    Dtr,
    Rts,
}

impl fmt::Display for ModemLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dtr => write!(f, "DTR"),
            Self::Rts => write!(f, "RTS"),
        }
    }
}

/// Snapshot of the six modem control/status lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModemLines {
    pub dtr: bool,
    pub rts: bool,
    pub cts: bool,
    pub dsr: bool,
    pub dcd: bool,
    pub ri: bool,
}

/// Control surface the escape commands need from an open device, over
/// and above the byte stream itself.
pub trait DeviceControl: Write {
    fn send_break(&mut self) -> TermLinkResult<()>;
    fn modem_lines(&mut self) -> TermLinkResult<ModemLines>;
    /// Flip one line and report its new level (true = high).
    fn toggle_line(&mut self, line: ModemLine) -> TermLinkResult<bool>;
}

/// Stand-in device used while disconnected; every control operation
/// reports the absence of a device and writes go nowhere.
pub struct NoDevice;

impl Write for NoDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl DeviceControl for NoDevice {
    fn send_break(&mut self) -> TermLinkResult<()> {
        Err(TermLinkError::RuntimeIo("no device connected".to_string()))
    }

    fn modem_lines(&mut self) -> TermLinkResult<ModemLines> {
        Err(TermLinkError::RuntimeIo("no device connected".to_string()))
    }

    fn toggle_line(&mut self, _line: ModemLine) -> TermLinkResult<bool> {
        Err(TermLinkError::RuntimeIo("no device connected".to_string()))
    }
}

/// Outcome of feeding a batch of operator bytes to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Continue,
    Quit,
}

enum CommandEffect {
    None,
    Quit,
    ForwardEscapeKey,
}

enum LoopExit {
    Quit,
    DeviceGone,
}

enum WaitOutcome {
    Ready,
    Quit,
}

/// One interactive session between the operator, a serial device and
/// optional socket mirrors.
///
/// The device connection comes and goes with reconnects; everything
/// held here survives them.
pub struct Session {
    options: Options,
    mapping: MappingConfig,
    stats: Statistics,
    printer: Printer,
    local_echo: bool,
    timestamp: TimestampMode,
    clock: TimestampClock,
    buffer: WriteBuffer,
    hex: HexAccumulator,
    log: Option<SessionLog>,
    bridge: Option<SocketBridge>,
    errors: ErrorSlots,
    previous_byte: u8,
    next_timestamp: bool,
    first_wait: bool,
}

impl Session {
    /// Validate the configuration and set up the long-lived session
    /// state. Fails before any device is touched.
    pub fn new(options: Options) -> TermLinkResult<Self> {
        let mode = if options.hex_mode {
            PrintMode::Hex
        } else {
            PrintMode::Normal
        };
        let printer = Printer::stdout(mode);
        Self::build(options, printer)
    }

    /// Same as [`Session::new`] but rendering into the given writer.
    pub fn with_writer(options: Options, out: Box<dyn Write + Send>) -> TermLinkResult<Self> {
        let mode = if options.hex_mode {
            PrintMode::Hex
        } else {
            PrintMode::Normal
        };
        let printer = Printer::with_writer(out, mode);
        Self::build(options, printer)
    }

    fn build(options: Options, printer: Printer) -> TermLinkResult<Self> {
        let mapping = MappingConfig::parse(&options.map)?;
        DeviceSettings::from_options(&options)?;

        let log = match &options.log {
            Some(path) => Some(SessionLog::create(path)?),
            None => None,
        };
        let bridge = match &options.socket {
            Some(spec) => Some(SocketBridge::bind(spec)?),
            None => None,
        };

        let output_delay = (options.output_delay > 0)
            .then(|| Duration::from_millis(options.output_delay));

        Ok(Self {
            mapping,
            stats: Statistics::default(),
            local_echo: options.local_echo,
            timestamp: options.timestamp,
            clock: TimestampClock::new(),
            buffer: WriteBuffer::new(output_delay),
            hex: HexAccumulator::new(),
            log,
            bridge,
            errors: ErrorSlots::default(),
            previous_byte: 0,
            next_timestamp: options.timestamp.is_enabled(),
            first_wait: true,
            options,
            printer,
        })
    }

    pub fn statistics(&self) -> Statistics {
        self.stats
    }

    pub fn errors(&self) -> &ErrorSlots {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut ErrorSlots {
        &mut self.errors
    }

    pub fn print_mode(&self) -> PrintMode {
        self.printer.mode
    }

    pub fn local_echo(&self) -> bool {
        self.local_echo
    }

    pub fn timestamp_mode(&self) -> TimestampMode {
        self.timestamp
    }

    /// Drive the session until quit or a fatal error. With
    /// auto-reconnect on, device loss sends the loop back to waiting
    /// for the device path to reappear.
    pub fn run(&mut self) -> TermLinkResult<()> {
        if self.options.no_autoconnect {
            let _ = self.connect_once()?;
            return Ok(());
        }

        loop {
            if let WaitOutcome::Quit = self.wait_for_device()? {
                return Ok(());
            }
            match self.connect_once()? {
                LoopExit::Quit => return Ok(()),
                LoopExit::DeviceGone => {}
            }
        }
    }

    /// One connect attempt plus the connected loop that follows it.
    /// Transient open failures land in the silent error slot; lock
    /// conflicts and non-tty paths abort.
    fn connect_once(&mut self) -> TermLinkResult<LoopExit> {
        let settings = DeviceSettings::from_options(&self.options)?;
        let mut connection =
            match Connection::open(&self.options.device, &settings, &self.mapping) {
                Ok(connection) => connection,
                Err(err @ TermLinkError::DeviceUnavailable(_)) => {
                    self.errors.record_silent(err.to_string());
                    return Ok(LoopExit::DeviceGone);
                }
                Err(err) => return Err(err),
            };

        self.printer.status("Connected");
        self.next_timestamp = self.timestamp.is_enabled();

        match self.connected_loop(&mut connection) {
            Ok(LoopExit::Quit) => Ok(LoopExit::Quit),
            Ok(LoopExit::DeviceGone) => {
                self.printer.status("Disconnected");
                Ok(LoopExit::DeviceGone)
            }
            Err(err) => Err(err),
        }
    }

    /// The reactor: one blocking readiness wait across the device,
    /// stdin and the socket bridge, then synchronous dispatch of
    /// whichever source woke us.
    fn connected_loop(&mut self, connection: &mut Connection) -> TermLinkResult<LoopExit> {
        let mut buf = [0u8; READ_BUFFER_SIZE];

        loop {
            let device_fd = connection.raw_fd();
            let bridge_fds = self
                .bridge
                .as_ref()
                .map(|bridge| bridge.fds())
                .unwrap_or_default();

            let mut fds = Vec::with_capacity(2 + bridge_fds.len());
            fds.push(PollFd::new(device_fd, PollFlags::POLLIN));
            fds.push(PollFd::new(libc::STDIN_FILENO, PollFlags::POLLIN));
            for fd in &bridge_fds {
                fds.push(PollFd::new(*fd, PollFlags::POLLIN));
            }

            poll(&mut fds, -1).map_err(|err| TermLinkError::ReadinessWait(err.to_string()))?;

            if is_ready(&fds[0]) {
                if !self.service_device(connection, &mut buf) {
                    return Ok(LoopExit::DeviceGone);
                }
            } else if is_ready(&fds[1]) {
                match self.service_stdin(connection, &mut buf) {
                    Some(exit) => return Ok(exit),
                    None => {}
                }
            } else {
                let ready: Vec<RawFd> = bridge_fds
                    .iter()
                    .zip(fds[2..].iter())
                    .filter(|(_, pfd)| is_ready(pfd))
                    .map(|(fd, _)| *fd)
                    .collect();
                let forwarded = self
                    .bridge
                    .as_mut()
                    .and_then(|bridge| bridge.service(&ready));
                if let Some(byte) = forwarded {
                    self.forward_to_device(connection, byte);
                    self.buffer.flush(connection);
                }
            }
        }
    }

    /// Bulk-read from the device; false means the device is gone.
    fn service_device(&mut self, connection: &mut Connection, buf: &mut [u8]) -> bool {
        let count = match connection.read(buf) {
            Ok(count) => count,
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::Interrupted
                        | io::ErrorKind::WouldBlock
                        | io::ErrorKind::TimedOut
                ) =>
            {
                return true;
            }
            Err(_) => 0,
        };

        if count == 0 {
            // Read failure or EOF: the device is likely unplugged.
            self.errors.record_silent("Could not read from tty device");
            return false;
        }

        self.process_device_bytes(&buf[..count]);
        true
    }

    /// Render a batch of device bytes in arrival order: timestamp
    /// prefixes, inbound newline mapping, the active print strategy,
    /// the session log and the socket broadcast.
    pub fn process_device_bytes(&mut self, bytes: &[u8]) {
        self.stats.rx_total += bytes.len() as u64;

        for &byte in bytes {
            if self.next_timestamp && byte != b'\n' && byte != b'\r' {
                if let Some(stamp) = self.clock.stamp(self.timestamp) {
                    let prefix = format!("[{stamp}] ");
                    self.printer.print_raw(&prefix);
                    if let Some(log) = self.log.as_mut() {
                        log.puts(&prefix);
                    }
                    self.next_timestamp = false;
                }
            }

            if byte == b'\n' && self.mapping.i_nl_crnl {
                self.printer.print(b'\r');
                self.printer.print(b'\n');
            } else {
                self.printer.print(byte);
            }

            if let Some(log) = self.log.as_mut() {
                log.putc(byte);
            }
            if let Some(bridge) = self.bridge.as_mut() {
                bridge.broadcast(byte);
            }

            if byte == b'\n' && self.timestamp.is_enabled() {
                self.next_timestamp = true;
            }
        }
    }

    /// Bulk-read from stdin and feed the batch to the interpreter and
    /// the outbound pipeline.
    fn service_stdin(&mut self, connection: &mut Connection, buf: &mut [u8]) -> Option<LoopExit> {
        let count = match unistd::read(libc::STDIN_FILENO, buf) {
            Ok(0) | Err(_) => {
                self.errors.record_silent("Could not read from stdin");
                return Some(LoopExit::DeviceGone);
            }
            Ok(count) => count,
        };

        match self.process_input(connection, &buf[..count]) {
            SessionEvent::Quit => Some(LoopExit::Quit),
            SessionEvent::Continue => None,
        }
    }

    /// Feed operator bytes through the escape interpreter, hex-digit
    /// validation and the outbound pipeline, flushing the write buffer
    /// after the batch.
    ///
    /// Hex validation runs after the interpreter on purpose: command
    /// selectors must never be mistaken for malformed hex input.
    pub fn process_input<D: DeviceControl>(&mut self, device: &mut D, bytes: &[u8]) -> SessionEvent {
        for &byte in bytes {
            let mut forward = true;
            let mut output = byte;

            if self.options.interactive {
                if byte == escape::ESCAPE_KEY {
                    forward = false;
                }

                match escape::decode(self.previous_byte, byte) {
                    Decision::Pass => {}
                    Decision::Drop => forward = false,
                    Decision::Run(command) => {
                        forward = false;
                        match self.run_command(device, command) {
                            CommandEffect::Quit => return SessionEvent::Quit,
                            CommandEffect::ForwardEscapeKey => {
                                forward = true;
                                output = escape::ESCAPE_KEY;
                            }
                            CommandEffect::None => {}
                        }
                    }
                }
                self.previous_byte = byte;

                if self.printer.mode == PrintMode::Hex && !is_valid_hex(byte) {
                    self.printer
                        .warning(&format!("Invalid hex character: 0x{byte:02x}"));
                    forward = false;
                }
            }

            if forward {
                self.forward_to_device(device, output);
            }
        }

        self.buffer.flush(device);
        SessionEvent::Continue
    }

    /// Outbound mapping pipeline for one forwarded byte.
    fn forward_to_device<D: DeviceControl>(&mut self, device: &mut D, byte: u8) {
        let mut output = byte;

        if output == DEL && self.mapping.o_del_bs {
            output = BS;
        }
        if output == b'\r' && self.mapping.o_cr_nl {
            output = b'\n';
        }

        if (output == b'\n' || output == b'\r') && self.mapping.o_nl_crnl {
            let mut written = 0;
            for &mapped in b"\r\n" {
                self.echo(mapped);
                written += self.buffer.write(device, &[mapped]);
            }
            if written < 2 {
                self.printer.warning("Could not write to tty device");
            }
            self.stats.tx_total += 2;
        } else if self.printer.mode == PrintMode::Hex {
            if let Some(value) = self.hex.push(output) {
                self.echo(value);
                if self.buffer.write(device, &[value]) == 0 {
                    self.printer.warning("Could not write to tty device");
                } else {
                    self.stats.tx_total += 1;
                }
            }
        } else {
            self.echo(output);
            if self.buffer.write(device, &[output]) == 0 {
                self.printer.warning("Could not write to tty device");
            }
            self.stats.tx_total += 1;
        }
    }

    fn echo(&mut self, byte: u8) {
        if !self.local_echo {
            return;
        }
        self.printer.print(byte);
        if let Some(log) = self.log.as_mut() {
            log.putc(byte);
        }
    }

    fn run_command<D: DeviceControl>(&mut self, device: &mut D, command: Command) -> CommandEffect {
        match command {
            Command::Help => {
                self.printer.status("Key commands:");
                self.printer.status(" ctrl-t ?   List available key commands");
                self.printer.status(" ctrl-t b   Send break");
                self.printer.status(" ctrl-t c   Show configuration");
                self.printer.status(" ctrl-t d   Toggle DTR line");
                self.printer.status(" ctrl-t e   Toggle local echo mode");
                self.printer.status(" ctrl-t h   Toggle hexadecimal mode");
                self.printer.status(" ctrl-t l   Clear screen");
                self.printer.status(" ctrl-t L   Show line states");
                self.printer.status(" ctrl-t q   Quit");
                self.printer.status(" ctrl-t r   Toggle RTS line");
                self.printer.status(" ctrl-t s   Show statistics");
                self.printer.status(" ctrl-t t   Send ctrl-t key code");
                self.printer.status(" ctrl-t T   Cycle timestamp mode");
                self.printer.status(" ctrl-t v   Show version");
            }
            Command::SendBreak => {
                if let Err(err) = device.send_break() {
                    self.printer.warning(&err.to_string());
                }
            }
            Command::ShowConfig => {
                output::print_options(&mut self.printer, &self.options);
            }
            Command::ToggleDtr => self.toggle_line(device, ModemLine::Dtr),
            Command::ToggleRts => self.toggle_line(device, ModemLine::Rts),
            Command::ToggleEcho => {
                self.local_echo = !self.local_echo;
                self.printer.status(&format!(
                    "Switched local echo {}",
                    if self.local_echo { "on" } else { "off" }
                ));
            }
            Command::ToggleHex => {
                if self.printer.mode == PrintMode::Normal {
                    self.printer.mode = PrintMode::Hex;
                    self.printer.status("Switched to hexadecimal mode");
                } else {
                    self.printer.mode = PrintMode::Normal;
                    self.printer.status("Switched to normal mode");
                }
            }
            Command::ClearScreen => self.printer.clear_screen(),
            Command::ShowLineStates => match device.modem_lines() {
                Ok(lines) => {
                    self.printer.status("Line states:");
                    self.printer.status(&format!(" DTR: {}", level(lines.dtr)));
                    self.printer.status(&format!(" RTS: {}", level(lines.rts)));
                    self.printer.status(&format!(" CTS: {}", level(lines.cts)));
                    self.printer.status(&format!(" DSR: {}", level(lines.dsr)));
                    self.printer.status(&format!(" DCD: {}", level(lines.dcd)));
                    self.printer.status(&format!(" RI : {}", level(lines.ri)));
                }
                Err(err) => self.printer.warning(&err.to_string()),
            },
            Command::Quit => return CommandEffect::Quit,
            Command::ShowStats => {
                self.printer.status("Statistics:");
                self.printer
                    .status(&format!(" Sent {} bytes", self.stats.tx_total));
                self.printer
                    .status(&format!(" Received {} bytes", self.stats.rx_total));
            }
            Command::SendEscapeKey => return CommandEffect::ForwardEscapeKey,
            Command::CycleTimestamp => {
                self.timestamp = self.timestamp.next();
                if self.timestamp.is_enabled() {
                    self.printer
                        .status(&format!("Switched to {} timestamp mode", self.timestamp));
                } else {
                    self.printer.status("Switched timestamp off");
                }
            }
            Command::ShowVersion => {
                self.printer
                    .status(&format!("termlink v{}", env!("CARGO_PKG_VERSION")));
            }
        }
        CommandEffect::None
    }

    fn toggle_line<D: DeviceControl>(&mut self, device: &mut D, line: ModemLine) {
        match device.toggle_line(line) {
            Ok(high) => self.printer.status(&format!(
                "set {} to {}",
                line,
                if high { "HIGH" } else { "LOW" }
            )),
            Err(err) => self.printer.warning(&err.to_string()),
        }
    }

    /// Poll for the device path to become readable while still
    /// servicing operator commands and socket clients. The very first
    /// wait of the process is near-zero so a present device connects
    /// immediately; all later waits are bounded at one second.
    fn wait_for_device(&mut self) -> TermLinkResult<WaitOutcome> {
        let mut last_errno: Option<Errno> = None;
        let mut byte = [0u8; 1];

        loop {
            let timeout: libc::c_int = if self.first_wait { 0 } else { 1000 };
            self.first_wait = false;

            let bridge_fds = self
                .bridge
                .as_ref()
                .map(|bridge| bridge.fds())
                .unwrap_or_default();
            let mut fds = Vec::with_capacity(1 + bridge_fds.len());
            fds.push(PollFd::new(libc::STDIN_FILENO, PollFlags::POLLIN));
            for fd in &bridge_fds {
                fds.push(PollFd::new(*fd, PollFlags::POLLIN));
            }

            let ready_count =
                poll(&mut fds, timeout).map_err(|err| TermLinkError::ReadinessWait(err.to_string()))?;

            if ready_count > 0 {
                if is_ready(&fds[0]) {
                    let count = unistd::read(libc::STDIN_FILENO, &mut byte).map_err(|err| {
                        TermLinkError::RuntimeIo(format!("could not read from stdin ({err})"))
                    })?;
                    if count == 0 {
                        return Err(TermLinkError::RuntimeIo(
                            "could not read from stdin".to_string(),
                        ));
                    }

                    if let Decision::Run(command) = escape::decode(self.previous_byte, byte[0]) {
                        if let CommandEffect::Quit = self.run_command(&mut NoDevice, command) {
                            return Ok(WaitOutcome::Quit);
                        }
                    }
                    self.previous_byte = byte[0];
                }

                let ready: Vec<RawFd> = bridge_fds
                    .iter()
                    .zip(fds[1..].iter())
                    .filter(|(_, pfd)| is_ready(pfd))
                    .map(|(fd, _)| *fd)
                    .collect();
                if let Some(bridge) = self.bridge.as_mut() {
                    // No device to forward to; mirror traffic is dropped.
                    let _ = bridge.service(&ready);
                }
            }

            match unistd::access(self.options.device.as_str(), AccessFlags::R_OK) {
                Ok(()) => return Ok(WaitOutcome::Ready),
                Err(errno) => {
                    if last_errno != Some(errno) {
                        self.printer
                            .warning(&format!("Could not open tty device ({errno})"));
                        self.printer.status("Waiting for tty device..");
                        last_errno = Some(errno);
                    }
                }
            }
        }
    }
}

fn is_ready(pfd: &PollFd) -> bool {
    pfd.revents().map_or(false, |revents| {
        revents.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR)
    })
}

fn level(high: bool) -> &'static str {
    if high {
        "HIGH"
    } else {
        "LOW"
    }
}
