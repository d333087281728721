//! Structured health reporting for server lifecycle events.

use std::net::SocketAddr;
use std::sync::Arc;

use hostlink_config::SocketEndpoint;

use crate::server::ServerError;

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before the server binds its endpoint.
    fn server_starting(&self, endpoint: &SocketEndpoint);

    /// Invoked once the accept loop is running.
    fn server_listening(&self, endpoint: &SocketEndpoint, local_addr: Option<SocketAddr>);

    /// Invoked when the server fails to start.
    fn server_failed(&self, error: &ServerError);

    /// Invoked after the accept loop has shut down.
    fn server_stopped(&self, endpoint: &SocketEndpoint);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn server_starting(&self, endpoint: &SocketEndpoint) {
        (**self).server_starting(endpoint);
    }

    fn server_listening(&self, endpoint: &SocketEndpoint, local_addr: Option<SocketAddr>) {
        (**self).server_listening(endpoint, local_addr);
    }

    fn server_failed(&self, error: &ServerError) {
        (**self).server_failed(error);
    }

    fn server_stopped(&self, endpoint: &SocketEndpoint) {
        (**self).server_stopped(endpoint);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn server_starting(&self, endpoint: &SocketEndpoint) {
        tracing::info!(
            target: "hostlinkd::health",
            event = "server_starting",
            endpoint = %endpoint,
            "starting command server"
        );
    }

    fn server_listening(&self, endpoint: &SocketEndpoint, local_addr: Option<SocketAddr>) {
        tracing::info!(
            target: "hostlinkd::health",
            event = "server_listening",
            endpoint = %endpoint,
            local_addr = ?local_addr,
            "command server listening"
        );
    }

    fn server_failed(&self, error: &ServerError) {
        tracing::error!(
            target: "hostlinkd::health",
            event = "server_failed",
            error = %error,
            "command server failed to start"
        );
    }

    fn server_stopped(&self, endpoint: &SocketEndpoint) {
        tracing::info!(
            target: "hostlinkd::health",
            event = "server_stopped",
            endpoint = %endpoint,
            "command server stopped"
        );
    }
}
