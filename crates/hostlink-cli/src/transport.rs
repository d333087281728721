//! Stream sockets the bridge uses to reach the host.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use hostlink_config::SocketEndpoint;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use crate::errors::ClientError;

pub(crate) const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Connected stream, TCP or Unix.
#[derive(Debug)]
pub(crate) enum Connection {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

macro_rules! on_stream {
    ($connection:expr, $stream:ident => $body:expr) => {
        match $connection {
            Connection::Tcp($stream) => $body,
            #[cfg(unix)]
            Connection::Unix($stream) => $body,
        }
    };
}

impl Connection {
    pub(crate) fn set_read_timeout(&self, timeout: Duration) -> io::Result<()> {
        on_stream!(self, stream => stream.set_read_timeout(Some(timeout)))
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        on_stream!(self, stream => stream.read(buf))
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        on_stream!(self, stream => stream.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        on_stream!(self, stream => stream.flush())
    }
}

/// Opens a stream to `endpoint`, waiting at most [`CONNECTION_TIMEOUT`].
pub(crate) fn connect(endpoint: &SocketEndpoint) -> Result<Connection, ClientError> {
    let connect_error = |source| ClientError::Connect {
        endpoint: endpoint.to_string(),
        source,
    };
    match endpoint {
        SocketEndpoint::Tcp { host, port } => {
            let candidates: Vec<_> = (host.as_str(), *port)
                .to_socket_addrs()
                .map_err(|source| ClientError::Resolve {
                    endpoint: endpoint.to_string(),
                    source,
                })?
                .collect();
            connect_tcp(&candidates).map_err(connect_error)
        }
        #[cfg(unix)]
        SocketEndpoint::Unix { path } => connect_unix(path.as_str()).map_err(connect_error),
        #[cfg(not(unix))]
        SocketEndpoint::Unix { .. } => {
            Err(ClientError::UnsupportedUnixTransport(endpoint.to_string()))
        }
    }
}

/// Tries each resolved address in turn; `localhost` may resolve to `::1`
/// while the host only listens on IPv4.
fn connect_tcp(candidates: &[std::net::SocketAddr]) -> io::Result<Connection> {
    let mut last_error =
        io::Error::new(io::ErrorKind::AddrNotAvailable, "host name resolved to no addresses");
    for address in candidates {
        match TcpStream::connect_timeout(address, CONNECTION_TIMEOUT) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(Connection::Tcp(stream));
            }
            Err(error) => last_error = error,
        }
    }
    Err(last_error)
}

#[cfg(unix)]
fn connect_unix(path: &str) -> io::Result<Connection> {
    use socket2::{Domain, SockAddr, Socket, Type};

    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
    socket.connect_timeout(&SockAddr::unix(path)?, CONNECTION_TIMEOUT)?;
    Ok(Connection::Unix(UnixStream::from(std::os::fd::OwnedFd::from(socket))))
}
