//! Owned command server with an explicit start/stop lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use hostlink_config::{SocketEndpoint, SocketPreparationError};

use crate::health::HealthReporter;
use crate::transport::{ConnectionHandler, ListenerError, ListenerHandle, SocketListener};

/// Lifecycle phase of a [`Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// No socket is bound.
    Stopped,
    /// Binding and spawning the accept loop.
    Starting,
    /// Accepting connections.
    Running,
    /// Waiting for the accept loop to exit.
    Stopping,
}

/// Errors reported while starting or stopping a [`Server`].
#[derive(Debug, Error)]
pub enum ServerError {
    /// `start` was called while the server was not stopped.
    #[error("server already running on {endpoint}")]
    AlreadyRunning {
        /// Endpoint the running server is bound to.
        endpoint: String,
    },
    /// Preparing the socket directory failed.
    #[error("failed to prepare socket: {0}")]
    Prepare(#[from] SocketPreparationError),
    /// Binding or running the listener failed.
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Command server bound to one endpoint.
///
/// Dropping a running server stops it. Connection threads that are still
/// serving clients are left to finish on their own.
pub struct Server {
    endpoint: SocketEndpoint,
    handler: Arc<dyn ConnectionHandler>,
    reporter: Arc<dyn HealthReporter>,
    state: ServerState,
    listener: Option<ListenerHandle>,
    local_addr: Option<SocketAddr>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Server")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Builds a stopped server.
    #[must_use]
    pub fn new(
        endpoint: SocketEndpoint,
        handler: Arc<dyn ConnectionHandler>,
        reporter: Arc<dyn HealthReporter>,
    ) -> Self {
        Self {
            endpoint,
            handler,
            reporter,
            state: ServerState::Stopped,
            listener: None,
            local_addr: None,
        }
    }

    /// Binds the endpoint and starts accepting connections.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::AlreadyRunning`] unless the server is stopped,
    /// or the bind/spawn failure; the server is left stopped in that case.
    pub fn start(&mut self) -> Result<(), ServerError> {
        if self.state != ServerState::Stopped {
            return Err(ServerError::AlreadyRunning {
                endpoint: self.endpoint.to_string(),
            });
        }
        self.state = ServerState::Starting;
        self.reporter.server_starting(&self.endpoint);
        match self.bind_and_start() {
            Ok((listener, local_addr)) => {
                self.listener = Some(listener);
                self.local_addr = local_addr;
                self.state = ServerState::Running;
                self.reporter.server_listening(&self.endpoint, local_addr);
                Ok(())
            }
            Err(error) => {
                self.state = ServerState::Stopped;
                self.reporter.server_failed(&error);
                Err(error)
            }
        }
    }

    fn bind_and_start(&self) -> Result<(ListenerHandle, Option<SocketAddr>), ServerError> {
        self.endpoint.prepare_filesystem()?;
        let listener = SocketListener::bind(&self.endpoint)?;
        let local_addr = listener.local_addr();
        let handle = listener.start(Arc::clone(&self.handler))?;
        Ok((handle, local_addr))
    }

    /// Stops accepting connections and waits for the accept loop to exit.
    ///
    /// Stopping a stopped server is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::ThreadPanic`] if the accept thread panicked.
    pub fn stop(&mut self) -> Result<(), ServerError> {
        let Some(listener) = self.listener.take() else {
            return Ok(());
        };
        self.state = ServerState::Stopping;
        listener.shutdown();
        let joined = listener.join();
        self.state = ServerState::Stopped;
        self.local_addr = None;
        self.reporter.server_stopped(&self.endpoint);
        joined.map_err(ServerError::from)
    }

    /// Current lifecycle phase.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Whether the accept loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == ServerState::Running
    }

    /// Bound TCP address while running; `None` for Unix sockets.
    #[must_use]
    pub const fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Endpoint this server binds.
    #[must_use]
    pub const fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Err(error) = self.stop() {
            warn!(
                target: "hostlinkd::server",
                error = %error,
                "failed to stop server cleanly"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader};
    use std::net::{TcpListener, TcpStream};

    use hostlink_wire::Response;
    use mockall::{Sequence, mock, predicate::always};
    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;
    use crate::transport::GreetingHandler;

    mock! {
        Reporter {}
        impl HealthReporter for Reporter {
            fn server_starting(&self, endpoint: &SocketEndpoint);
            fn server_listening(&self, endpoint: &SocketEndpoint, local_addr: Option<SocketAddr>);
            fn server_failed(&self, error: &ServerError);
            fn server_stopped(&self, endpoint: &SocketEndpoint);
        }
    }

    #[fixture]
    fn endpoint() -> SocketEndpoint {
        SocketEndpoint::tcp("127.0.0.1", 0)
    }

    fn server_with(endpoint: SocketEndpoint, reporter: MockReporter) -> Server {
        let (_, handler) = GreetingHandler::new();
        Server::new(endpoint, handler, Arc::new(reporter))
    }

    #[rstest]
    fn lifecycle_reports_each_transition(endpoint: SocketEndpoint) {
        let mut sequence = Sequence::new();
        let mut reporter = MockReporter::new();
        reporter
            .expect_server_starting()
            .once()
            .in_sequence(&mut sequence)
            .return_const(());
        reporter
            .expect_server_listening()
            .withf(|_, addr| addr.is_some())
            .once()
            .in_sequence(&mut sequence)
            .return_const(());
        reporter
            .expect_server_stopped()
            .once()
            .in_sequence(&mut sequence)
            .return_const(());
        reporter.expect_server_failed().never();

        let mut server = server_with(endpoint, reporter);
        assert_eq!(server.state(), ServerState::Stopped);
        server.start().expect("start server");
        assert!(server.is_running());

        let addr = server.local_addr().expect("bound address");
        let mut line = String::new();
        BufReader::new(TcpStream::connect(addr).expect("connect"))
            .read_line(&mut line)
            .expect("read acknowledgement");
        let response: Response = serde_json::from_str(&line).expect("decode");
        assert_eq!(response, Response::success(json!("accepted")));

        server.stop().expect("stop server");
        assert_eq!(server.state(), ServerState::Stopped);
        assert!(server.local_addr().is_none());
        server.stop().expect("second stop is a no-op");
    }

    #[rstest]
    fn starting_twice_is_rejected(endpoint: SocketEndpoint) {
        let mut reporter = MockReporter::new();
        reporter.expect_server_starting().once().return_const(());
        reporter.expect_server_listening().once().return_const(());
        reporter.expect_server_stopped().once().return_const(());

        let mut server = server_with(endpoint, reporter);
        server.start().expect("first start");
        let error = server.start().expect_err("second start");
        assert!(matches!(error, ServerError::AlreadyRunning { .. }));
        assert!(server.is_running());
    }

    #[rstest]
    fn bind_failure_returns_to_stopped() {
        let taken = TcpListener::bind(("127.0.0.1", 0)).expect("reserve port");
        let port = taken.local_addr().expect("reserved address").port();

        let mut reporter = MockReporter::new();
        reporter.expect_server_starting().once().return_const(());
        reporter
            .expect_server_failed()
            .with(always())
            .once()
            .return_const(());
        reporter.expect_server_listening().never();
        reporter.expect_server_stopped().never();

        let mut server = server_with(SocketEndpoint::tcp("127.0.0.1", port), reporter);
        let error = server.start().expect_err("port in use");
        assert!(matches!(
            error,
            ServerError::Listener(ListenerError::BindTcp { .. })
        ));
        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[rstest]
    fn dropping_a_running_server_releases_the_port(endpoint: SocketEndpoint) {
        let mut reporter = MockReporter::new();
        reporter.expect_server_starting().return_const(());
        reporter.expect_server_listening().return_const(());
        reporter.expect_server_stopped().once().return_const(());

        let mut server = server_with(endpoint, reporter);
        server.start().expect("start server");
        let addr = server.local_addr().expect("bound address");
        drop(server);

        TcpListener::bind(addr).expect("port is free after drop");
    }
}
