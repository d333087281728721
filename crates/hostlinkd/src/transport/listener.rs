//! Accept loop for the host command socket.
//!
//! The socket is polled in non-blocking mode so the accept thread notices a
//! shutdown request within one backoff interval. Every accepted stream is
//! switched back to blocking mode and served on a dedicated thread.

use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use hostlink_config::SocketEndpoint;
use tracing::{debug, info, warn};

use super::{ConnectionHandler, ConnectionStream, LISTENER_TARGET, ListenerError};

#[cfg(unix)]
use camino::Utf8Path;
#[cfg(unix)]
use std::os::unix::net::UnixListener;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

#[derive(Debug)]
enum BoundSocket {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl BoundSocket {
    fn set_nonblocking(&self) -> io::Result<()> {
        match self {
            Self::Tcp(listener) => listener.set_nonblocking(true),
            #[cfg(unix)]
            Self::Unix(listener) => listener.set_nonblocking(true),
        }
    }

    /// `Ok(None)` when no client is waiting.
    fn accept(&self) -> io::Result<Option<ConnectionStream>> {
        let accepted = match self {
            Self::Tcp(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(ConnectionStream::Tcp(stream))
            }),
            #[cfg(unix)]
            Self::Unix(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(ConnectionStream::Unix(stream))
            }),
        };
        match accepted {
            Ok(stream) => Ok(Some(stream)),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        }
    }
}

/// Socket bound to the configured endpoint but not yet accepting.
#[derive(Debug)]
pub(crate) struct SocketListener {
    endpoint: SocketEndpoint,
    socket: BoundSocket,
}

impl SocketListener {
    /// Binds `endpoint`, reclaiming a stale Unix socket file if one is left
    /// over from a previous run.
    pub(crate) fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        let socket = match endpoint {
            SocketEndpoint::Tcp { host, port } => BoundSocket::Tcp(bind_tcp(host, *port)?),
            #[cfg(unix)]
            SocketEndpoint::Unix { path } => BoundSocket::Unix(bind_unix(path)?),
            #[cfg(not(unix))]
            SocketEndpoint::Unix { path } => {
                return Err(ListenerError::UnsupportedUnix { path: path.clone() });
            }
        };
        Ok(Self {
            endpoint: endpoint.clone(),
            socket,
        })
    }

    /// Bound TCP address; `None` for Unix sockets.
    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        match &self.socket {
            BoundSocket::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            BoundSocket::Unix(_) => None,
        }
    }

    /// Moves the socket onto the accept thread.
    pub(crate) fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ListenerHandle, ListenerError> {
        if let Err(source) = self.socket.set_nonblocking() {
            remove_socket_file(&self.endpoint);
            return Err(ListenerError::Configure { source });
        }
        let shutdown = Arc::new(AtomicBool::new(false));
        let accept_loop = AcceptLoop {
            listener: self,
            handler,
            shutdown: Arc::clone(&shutdown),
            accepted: 0,
        };
        let thread = thread::Builder::new()
            .name(String::from("hostlink-accept"))
            .spawn(move || accept_loop.run())
            .map_err(|source| ListenerError::Spawn { source })?;
        Ok(ListenerHandle {
            shutdown,
            thread: Some(thread),
        })
    }
}

/// Control handle for a running accept thread.
///
/// Dropping the handle requests shutdown without waiting for it.
#[derive(Debug)]
pub(crate) struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Waits for the accept thread; the socket is closed once this returns.
    pub(crate) fn join(mut self) -> Result<(), ListenerError> {
        self.thread
            .take()
            .map_or(Ok(()), |thread| thread.join().map_err(|_| ListenerError::ThreadPanic))
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct AcceptLoop {
    listener: SocketListener,
    handler: Arc<dyn ConnectionHandler>,
    shutdown: Arc<AtomicBool>,
    accepted: u64,
}

impl AcceptLoop {
    fn run(mut self) {
        let endpoint = &self.listener.endpoint;
        info!(target: LISTENER_TARGET, %endpoint, "accepting connections");
        let mut repeated_error = None::<io::ErrorKind>;
        while !self.shutdown.load(Ordering::SeqCst) {
            match self.listener.socket.accept() {
                Ok(Some(stream)) => {
                    repeated_error = None;
                    self.dispatch(stream);
                }
                Ok(None) => thread::sleep(ACCEPT_BACKOFF),
                Err(error) => {
                    // A run of identical failures is logged once.
                    if repeated_error.replace(error.kind()) != Some(error.kind()) {
                        warn!(target: LISTENER_TARGET, %error, "accept failed");
                    }
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }
        remove_socket_file(&self.listener.endpoint);
        info!(
            target: LISTENER_TARGET,
            endpoint = %self.listener.endpoint,
            accepted = self.accepted,
            "stopped accepting connections"
        );
    }

    fn dispatch(&mut self, stream: ConnectionStream) {
        self.accepted += 1;
        let sequence = self.accepted;
        let handler = Arc::clone(&self.handler);
        let spawned = thread::Builder::new()
            .name(format!("hostlink-conn-{sequence}"))
            .spawn(move || handler.handle(stream));
        if let Err(error) = spawned {
            warn!(target: LISTENER_TARGET, sequence, %error, "connection dropped: thread spawn failed");
        } else {
            debug!(target: LISTENER_TARGET, sequence, "connection accepted");
        }
    }
}

fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let resolve_error = |source| ListenerError::Resolve {
        address: format!("{host}:{port}"),
        source,
    };
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(resolve_error)?
        .next()
        .ok_or_else(|| resolve_error(io::Error::from(io::ErrorKind::NotFound)))?;
    TcpListener::bind(addr).map_err(|source| ListenerError::BindTcp { addr, source })
}

#[cfg(unix)]
fn bind_unix(path: &Utf8Path) -> Result<UnixListener, ListenerError> {
    reclaim_stale_socket(path)?;
    UnixListener::bind(path).map_err(|source| ListenerError::BindUnix {
        path: path.to_path_buf(),
        source,
    })
}

/// Removes a socket file nobody is listening on; refuses live sockets and
/// anything that is not a socket.
#[cfg(unix)]
fn reclaim_stale_socket(path: &Utf8Path) -> Result<(), ListenerError> {
    use std::fs;
    use std::os::unix::fs::FileTypeExt;
    use std::os::unix::net::UnixStream;

    let stale = |source| ListenerError::StaleSocket {
        path: path.to_path_buf(),
        source,
    };
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(error) => return Err(stale(error)),
    };
    if !metadata.file_type().is_socket() {
        return Err(ListenerError::UnixNotSocket {
            path: path.to_path_buf(),
        });
    }
    match UnixStream::connect(path) {
        Ok(_) => Err(ListenerError::UnixInUse {
            path: path.to_path_buf(),
        }),
        Err(error)
            if matches!(
                error.kind(),
                io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
            ) =>
        {
            debug!(target: LISTENER_TARGET, %path, "removing stale socket file");
            fs::remove_file(path).map_err(stale)
        }
        Err(error) => Err(stale(error)),
    }
}

fn remove_socket_file(endpoint: &SocketEndpoint) {
    let Some(path) = endpoint.unix_path() else {
        return;
    };
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => warn!(target: LISTENER_TARGET, %path, %error, "socket file left behind"),
    }
}
