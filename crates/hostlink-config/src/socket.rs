//! Address of the host command socket.
//!
//! Endpoints are written as URLs, `tcp://127.0.0.1:9876` or
//! `unix:///run/hostlink/host.sock`. A bare `host:port` pair is read as TCP.

use std::fmt;
use std::io;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Where the host listens and the bridge connects.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum SocketEndpoint {
    /// TCP socket; port `0` asks the OS for a free port when binding.
    Tcp {
        /// Host name or IP literal (IPv6 without brackets).
        host: String,
        /// TCP port.
        port: u16,
    },
    /// Unix domain socket.
    Unix {
        /// Filesystem path of the socket.
        path: Utf8PathBuf,
    },
}

impl SocketEndpoint {
    /// Builds a TCP endpoint.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Builds a Unix socket endpoint.
    #[must_use]
    pub fn unix(path: impl Into<Utf8PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }

    /// Socket path for Unix endpoints.
    #[must_use]
    pub fn unix_path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Unix { path } => Some(path),
            Self::Tcp { .. } => None,
        }
    }

    /// Creates the directory that will hold a Unix socket, owner-only on
    /// Unix. Does nothing for TCP endpoints or when the directory exists.
    ///
    /// # Errors
    ///
    /// Returns a [`SocketPreparationError`] when the path has no directory
    /// component or the directory cannot be created.
    pub fn prepare_filesystem(&self) -> Result<(), SocketPreparationError> {
        let Some(path) = self.unix_path() else {
            return Ok(());
        };
        let directory = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .ok_or_else(|| SocketPreparationError::MissingParent {
                path: path.to_path_buf(),
            })?;
        if directory.is_dir() {
            return Ok(());
        }
        create_private_dir(directory).map_err(|source| SocketPreparationError::CreateDirectory {
            path: directory.to_path_buf(),
            source,
        })
    }
}

#[cfg(unix)]
fn create_private_dir(directory: &Utf8Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(directory)
}

#[cfg(not(unix))]
fn create_private_dir(directory: &Utf8Path) -> io::Result<()> {
    std::fs::create_dir_all(directory)
}

impl fmt::Display for SocketEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } if host.contains(':') => {
                write!(formatter, "tcp://[{host}]:{port}")
            }
            Self::Tcp { host, port } => write!(formatter, "tcp://{host}:{port}"),
            Self::Unix { path } => write!(formatter, "unix://{path}"),
        }
    }
}

impl FromStr for SocketEndpoint {
    type Err = SocketParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if !input.contains("://") {
            return parse_host_port(input);
        }
        let url = Url::parse(input)?;
        match url.scheme() {
            "tcp" => {
                let host = url
                    .host_str()
                    .filter(|host| !host.is_empty())
                    .ok_or_else(|| SocketParseError::MissingHost(input.to_owned()))?;
                let port = url
                    .port()
                    .ok_or_else(|| SocketParseError::MissingPort(input.to_owned()))?;
                Ok(Self::tcp(host.trim_start_matches('[').trim_end_matches(']'), port))
            }
            "unix" => match url.path() {
                "" | "/" => Err(SocketParseError::MissingUnixPath(input.to_owned())),
                path => Ok(Self::unix(path)),
            },
            other => Err(SocketParseError::UnsupportedScheme(other.to_owned())),
        }
    }
}

fn parse_host_port(input: &str) -> Result<SocketEndpoint, SocketParseError> {
    let (host, port) = input
        .rsplit_once(':')
        .ok_or_else(|| SocketParseError::MissingPort(input.to_owned()))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(SocketParseError::MissingHost(input.to_owned()));
    }
    let port = port
        .parse()
        .map_err(|_| SocketParseError::InvalidPort(input.to_owned()))?;
    Ok(SocketEndpoint::tcp(host, port))
}

/// Reasons an endpoint string is rejected.
#[derive(Debug, Error)]
pub enum SocketParseError {
    /// Scheme other than `tcp` or `unix`.
    #[error("unsupported socket scheme '{0}' (expected tcp or unix)")]
    UnsupportedScheme(String),
    /// TCP endpoint without a host.
    #[error("missing host in '{0}'")]
    MissingHost(String),
    /// TCP endpoint without a port.
    #[error("missing port in '{0}'")]
    MissingPort(String),
    /// Port is not a number in `0..=65535`.
    #[error("invalid port in '{0}'")]
    InvalidPort(String),
    /// Unix endpoint without a path.
    #[error("missing socket path in '{0}'")]
    MissingUnixPath(String),
    /// The URL itself is malformed.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// Failures preparing the directory of a Unix socket.
#[derive(Debug, Error)]
pub enum SocketPreparationError {
    /// The socket path has no directory component.
    #[error("socket path '{path}' has no parent directory")]
    MissingParent {
        /// Configured socket path.
        path: Utf8PathBuf,
    },
    /// The directory could not be created.
    #[error("failed to create socket directory '{path}': {source}")]
    CreateDirectory {
        /// Directory being created.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}
