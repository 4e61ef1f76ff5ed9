use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;

use nix::sys::socket::{setsockopt, sockopt};
use nix::sys::time::{TimeVal, TimeValLike};
use tokio::net::{TcpSocket, TcpStream};

use crate::error::{Error, Result};
use crate::types::ConnectionState;

pub const RECEIVE_TIMEOUT: Duration = Duration::from_millis(5000);
pub const KEEPALIVE_IDLE: Duration = Duration::from_millis(5000);
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_millis(5000);

type ConnectFuture = Pin<Box<dyn Future<Output = io::Result<TcpStream>> + Send>>;

/// The socket lives inside the state, so "no socket" and "disconnected"
/// cannot drift apart.
enum Link {
    Disconnected,
    Connecting {
        addr: SocketAddr,
        pending: ConnectFuture,
    },
    Connected {
        addr: SocketAddr,
        stream: TcpStream,
    },
}

/// What the socket has to say, one readiness notification at a time.
#[derive(Debug)]
pub enum Readiness {
    Connected,
    ConnectFailed(Error),
    Readable,
    Lost(Error),
}

pub struct ConnectionManager {
    link: Link,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            link: Link::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        match self.link {
            Link::Disconnected => ConnectionState::Disconnected,
            Link::Connecting { .. } => ConnectionState::Connecting,
            Link::Connected { .. } => ConnectionState::Connected,
        }
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        match &self.link {
            Link::Disconnected => None,
            Link::Connecting { addr, .. } | Link::Connected { addr, .. } => Some(*addr),
        }
    }

    /// Start a non-blocking connection attempt to `addr`.
    ///
    /// Returns as soon as the attempt is under way; the outcome arrives later
    /// through [`ConnectionManager::ready`]. Does nothing if a socket already
    /// exists.
    pub fn connect(&mut self, addr: SocketAddr) -> Result<()> {
        if !matches!(self.link, Link::Disconnected) {
            return Ok(());
        }

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(|source| Error::ConnectSetup {
            action: "create socket",
            source,
        })?;

        // Dropping the socket on error closes it.
        configure(&socket)?;

        log::debug!("Connecting to {}", addr);
        self.link = Link::Connecting {
            addr,
            pending: Box::pin(socket.connect(addr)),
        };
        Ok(())
    }

    /// Wait for the next readiness event on the current socket.
    ///
    /// Never completes while disconnected. Cancel safe: an interrupted wait
    /// loses nothing, so this can sit in a `select!` loop.
    pub async fn ready(&mut self) -> Readiness {
        match &mut self.link {
            Link::Disconnected => std::future::pending().await,
            Link::Connecting { pending, .. } => {
                let result = pending.await;
                self.on_connect_completed(result)
            }
            Link::Connected { addr, stream } => match stream.readable().await {
                Ok(()) => Readiness::Readable,
                Err(e) => Readiness::Lost(Error::ConnectionLost {
                    addr: *addr,
                    reason: e.to_string(),
                }),
            },
        }
    }

    fn on_connect_completed(&mut self, result: io::Result<TcpStream>) -> Readiness {
        let Link::Connecting { addr, .. } = self.link else {
            return Readiness::Lost(Error::ProtocolViolation(
                "connection completed but no connection was in progress",
            ));
        };

        match result {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    log::debug!("Unable to disable Nagle on {}: {}", addr, e);
                }
                self.link = Link::Connected { addr, stream };
                Readiness::Connected
            }
            Err(source) => {
                self.link = Link::Disconnected;
                Readiness::ConnectFailed(Error::ConnectRefused { addr, source })
            }
        }
    }

    /// One non-blocking read into `buf`.
    ///
    /// `Ok(0)` means the readiness was spurious; end of stream is reported as
    /// [`Error::ConnectionLost`].
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let Link::Connected { addr, stream } = &mut self.link else {
            return Ok(0);
        };

        match stream.try_read(buf) {
            Ok(0) => Err(Error::ConnectionLost {
                addr: *addr,
                reason: "closed by server".to_string(),
            }),
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(Error::ConnectionLost {
                addr: *addr,
                reason: e.to_string(),
            }),
        }
    }

    /// Write all of `bytes` in a single non-blocking attempt.
    pub fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        let Link::Connected { stream, .. } = &mut self.link else {
            return Err(io::ErrorKind::NotConnected.into());
        };

        let written = stream.try_write(bytes)?;
        if written != bytes.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write ({} of {} bytes)", written, bytes.len()),
            ));
        }
        Ok(())
    }

    /// Close the socket, telling the server first when connected.
    ///
    /// Returns whether there was a socket to close.
    pub fn disconnect(&mut self) -> bool {
        match std::mem::replace(&mut self.link, Link::Disconnected) {
            Link::Disconnected => false,
            Link::Connecting { addr, .. } => {
                log::debug!("Abandoning connection attempt to {}", addr);
                true
            }
            Link::Connected { addr, stream } => {
                if let Err(e) = stream.try_write(b"close\n") {
                    log::debug!("Unable to send close to {}: {}", addr, e);
                }
                true
            }
        }
    }
}

fn configure(socket: &TcpSocket) -> Result<()> {
    let timeout = TimeVal::milliseconds(RECEIVE_TIMEOUT.as_millis() as i64);
    setsockopt(socket, sockopt::ReceiveTimeout, &timeout).map_err(|e| Error::ConnectSetup {
        action: "set socket timeout",
        source: e.into(),
    })?;

    socket
        .set_keepalive(true)
        .map_err(|source| Error::ConnectSetup {
            action: "set socket keepalive options",
            source,
        })?;

    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        let keepalive = |e: nix::Error| Error::ConnectSetup {
            action: "set socket keepalive options",
            source: e.into(),
        };
        setsockopt(socket, sockopt::TcpKeepIdle, &(KEEPALIVE_IDLE.as_secs() as u32))
            .map_err(keepalive)?;
        setsockopt(
            socket,
            sockopt::TcpKeepInterval,
            &(KEEPALIVE_INTERVAL.as_secs() as u32),
        )
        .map_err(keepalive)?;
    }

    Ok(())
}
