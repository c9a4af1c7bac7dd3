//! Socket bridge: auxiliary network clients mirroring the session.
//!
//! Clients receive every byte the device sends; a byte written by a
//! client is handed back to the session for forwarding to the device.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;

use tracing::{debug, info};

use crate::domain::error::{TermLinkError, TermLinkResult};

/// Bridge address - a Unix socket path or a TCP bind address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeAddr {
    Unix(PathBuf),
    Tcp(String),
}

impl BridgeAddr {
    /// Parse `unix:<path>`, `tcp:<port>` or `tcp:<host>:<port>`.
    pub fn parse(spec: &str) -> TermLinkResult<Self> {
        if let Some(path) = spec.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(TermLinkError::Configuration {
                    field: "socket",
                    message: "empty unix socket path".to_string(),
                });
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        if let Some(addr) = spec.strip_prefix("tcp:") {
            let addr = if addr.contains(':') {
                addr.to_string()
            } else {
                format!("127.0.0.1:{addr}")
            };
            return Ok(Self::Tcp(addr));
        }
        Err(TermLinkError::Configuration {
            field: "socket",
            message: format!("unknown socket address {spec}"),
        })
    }
}

enum ListenerInner {
    Unix(UnixListener),
    Tcp(TcpListener),
}

enum ClientInner {
    Unix(UnixStream),
    Tcp(TcpStream),
}

struct Client {
    inner: ClientInner,
}

impl Client {
    fn fd(&self) -> RawFd {
        match &self.inner {
            ClientInner::Unix(stream) => stream.as_raw_fd(),
            ClientInner::Tcp(stream) => stream.as_raw_fd(),
        }
    }
}

impl Read for Client {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            ClientInner::Unix(stream) => stream.read(buf),
            ClientInner::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for Client {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            ClientInner::Unix(stream) => stream.write(buf),
            ClientInner::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            ClientInner::Unix(stream) => stream.flush(),
            ClientInner::Tcp(stream) => stream.flush(),
        }
    }
}

/// Listens for session-mirror clients and shuttles their bytes.
/// Everything is non-blocking; readiness comes from the session's own
/// poll set.
pub struct SocketBridge {
    listener: ListenerInner,
    clients: Vec<Client>,
    addr: BridgeAddr,
}

impl SocketBridge {
    pub fn bind(spec: &str) -> TermLinkResult<Self> {
        let addr = BridgeAddr::parse(spec)?;
        let listener = match &addr {
            BridgeAddr::Unix(path) => {
                let _ = std::fs::remove_file(path);
                let listener = UnixListener::bind(path).map_err(|err| {
                    TermLinkError::Configuration {
                        field: "socket",
                        message: format!("could not bind {}: {err}", path.display()),
                    }
                })?;
                listener.set_nonblocking(true)?;
                ListenerInner::Unix(listener)
            }
            BridgeAddr::Tcp(bind_addr) => {
                let listener = TcpListener::bind(bind_addr).map_err(|err| {
                    TermLinkError::Configuration {
                        field: "socket",
                        message: format!("could not bind {bind_addr}: {err}"),
                    }
                })?;
                listener.set_nonblocking(true)?;
                ListenerInner::Tcp(listener)
            }
        };
        info!("Socket bridge listening on {spec}");
        Ok(Self {
            listener,
            clients: Vec::new(),
            addr,
        })
    }

    fn listener_fd(&self) -> RawFd {
        match &self.listener {
            ListenerInner::Unix(listener) => listener.as_raw_fd(),
            ListenerInner::Tcp(listener) => listener.as_raw_fd(),
        }
    }

    /// Descriptors to include in the session's readiness set.
    pub fn fds(&self) -> Vec<RawFd> {
        let mut fds = Vec::with_capacity(1 + self.clients.len());
        fds.push(self.listener_fd());
        fds.extend(self.clients.iter().map(Client::fd));
        fds
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Handle whatever became ready: accept pending clients, then read
    /// at most one byte to forward to the device. Further pending
    /// client bytes surface on the next readiness cycle.
    pub fn service(&mut self, ready: &[RawFd]) -> Option<u8> {
        if ready.contains(&self.listener_fd()) {
            self.accept_pending();
        }

        let mut forwarded = None;
        let mut closed = Vec::new();
        for (index, client) in self.clients.iter_mut().enumerate() {
            if forwarded.is_some() || !ready.contains(&client.fd()) {
                continue;
            }
            let mut byte = [0u8; 1];
            match client.read(&mut byte) {
                Ok(0) => closed.push(index),
                Ok(_) => forwarded = Some(byte[0]),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
                Err(err) => {
                    debug!("Dropping socket client ({err})");
                    closed.push(index);
                }
            }
        }
        for index in closed.into_iter().rev() {
            self.clients.remove(index);
            info!("Socket client disconnected");
        }
        forwarded
    }

    /// Mirror one device byte to every connected client, pruning the
    /// ones that went away.
    pub fn broadcast(&mut self, byte: u8) {
        self.clients.retain_mut(|client| match client.write(&[byte]) {
            Ok(0) => false,
            Ok(_) => true,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => true,
            Err(err) => {
                debug!("Dropping socket client ({err})");
                false
            }
        });
    }

    fn accept_pending(&mut self) {
        loop {
            let accepted = match &self.listener {
                ListenerInner::Unix(listener) => listener.accept().map(|(stream, _)| {
                    let _ = stream.set_nonblocking(true);
                    Client {
                        inner: ClientInner::Unix(stream),
                    }
                }),
                ListenerInner::Tcp(listener) => listener.accept().map(|(stream, _)| {
                    let _ = stream.set_nonblocking(true);
                    Client {
                        inner: ClientInner::Tcp(stream),
                    }
                }),
            };
            match accepted {
                Ok(client) => {
                    info!("Socket client connected");
                    self.clients.push(client);
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    debug!("Socket accept failed ({err})");
                    break;
                }
            }
        }
    }
}

impl Drop for SocketBridge {
    fn drop(&mut self) {
        if let BridgeAddr::Unix(path) = &self.addr {
            let _ = std::fs::remove_file(path);
        }
    }
}
