//! Command dispatch table.
//!
//! The registry maps command names to handlers and is immutable once built.
//! Handlers receive exclusive access to the host state, which only the host
//! thread holds, so they are invoked exclusively from host-loop tasks.

use std::any::Any;
use std::backtrace::Backtrace;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use hostlink_wire::{Params, Response};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, warn};

use super::DISPATCH_TARGET;

/// Executes one named command against the host state.
pub trait CommandHandler<H>: Send + Sync {
    /// Runs the command. Returning an error produces an error response.
    fn handle(&self, host: &mut H, params: &Params) -> Result<Value, HandlerError>;
}

struct FnHandler<F>(F);

impl<H, F> CommandHandler<H> for FnHandler<F>
where
    F: Fn(&mut H, &Params) -> Result<Value, HandlerError> + Send + Sync,
{
    fn handle(&self, host: &mut H, params: &Params) -> Result<Value, HandlerError> {
        (self.0)(host, params)
    }
}

/// Failure reported by a handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    traceback: Option<String>,
}

impl HandlerError {
    /// Builds an error carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            traceback: None,
        }
    }

    /// Attaches a diagnostic trace.
    #[must_use]
    pub fn with_traceback(mut self, traceback: impl Into<String>) -> Self {
        self.traceback = Some(traceback.into());
        self
    }

    /// Human-readable failure description.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Diagnostic trace, when present.
    pub fn traceback(&self) -> Option<&str> {
        self.traceback.as_deref()
    }

    fn into_response(self) -> Response {
        match self.traceback {
            Some(traceback) => Response::error_with_traceback(self.message, traceback),
            None => Response::error(self.message),
        }
    }
}

/// Errors raised while resolving a command name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// No handler is registered under the name.
    #[error("Unknown command: {name}")]
    UnknownCommand {
        /// Requested command name.
        name: String,
    },
    /// The handler is privileged and the host did not opt in.
    #[error("Command '{name}' is privileged and disabled on this host")]
    PrivilegedDisabled {
        /// Requested command name.
        name: String,
    },
}

/// Capability class of a registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Operates on host state through a fixed, validated interface.
    Standard,
    /// Runs caller-supplied instructions with full host privileges.
    Privileged,
}

struct Entry<H> {
    capability: Capability,
    handler: Arc<dyn CommandHandler<H>>,
}

/// Accumulates handler registrations before freezing them.
pub struct RegistryBuilder<H> {
    entries: HashMap<String, Entry<H>>,
    allow_privileged: bool,
}

impl<H> Default for RegistryBuilder<H> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            allow_privileged: false,
        }
    }
}

impl<H: 'static> RegistryBuilder<H> {
    /// Registers a standard handler closure.
    #[must_use]
    pub fn register<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut H, &Params) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        self.register_handler(name, Capability::Standard, FnHandler(handler))
    }

    /// Registers a privileged handler closure.
    #[must_use]
    pub fn register_privileged<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut H, &Params) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        self.register_handler(name, Capability::Privileged, FnHandler(handler))
    }

    /// Registers any [`CommandHandler`] implementation.
    ///
    /// A later registration under the same name replaces the earlier one.
    #[must_use]
    pub fn register_handler<C>(
        mut self,
        name: impl Into<String>,
        capability: Capability,
        handler: C,
    ) -> Self
    where
        C: CommandHandler<H> + 'static,
    {
        self.entries.insert(
            name.into(),
            Entry {
                capability,
                handler: Arc::new(handler),
            },
        );
        self
    }

    /// Enables or disables privileged handlers.
    #[must_use]
    pub const fn allow_privileged(mut self, allow: bool) -> Self {
        self.allow_privileged = allow;
        self
    }

    /// Freezes the registrations.
    #[must_use]
    pub fn build(self) -> HandlerRegistry<H> {
        HandlerRegistry {
            entries: self.entries,
            allow_privileged: self.allow_privileged,
        }
    }
}

/// Immutable lookup from command name to handler.
pub struct HandlerRegistry<H> {
    entries: HashMap<String, Entry<H>>,
    allow_privileged: bool,
}

impl<H> fmt::Debug for HandlerRegistry<H> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("HandlerRegistry")
            .field("commands", &self.names())
            .field("allow_privileged", &self.allow_privileged)
            .finish()
    }
}

impl<H: 'static> HandlerRegistry<H> {
    /// Starts an empty registration list.
    #[must_use]
    pub fn builder() -> RegistryBuilder<H> {
        RegistryBuilder::default()
    }
}

impl<H> HandlerRegistry<H> {
    /// Looks up the handler for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownCommand`] for unregistered names and
    /// [`DispatchError::PrivilegedDisabled`] for privileged handlers when the
    /// registry was built without opt-in.
    pub fn resolve(&self, name: &str) -> Result<ResolvedHandler<H>, DispatchError> {
        let Some(entry) = self.entries.get(name) else {
            return Err(DispatchError::UnknownCommand {
                name: name.to_owned(),
            });
        };
        if entry.capability == Capability::Privileged && !self.allow_privileged {
            warn!(
                target: DISPATCH_TARGET,
                command = name,
                "rejected privileged command"
            );
            return Err(DispatchError::PrivilegedDisabled {
                name: name.to_owned(),
            });
        }
        Ok(ResolvedHandler {
            name: name.to_owned(),
            handler: Arc::clone(&entry.handler),
        })
    }

    /// Registered command names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns `true` when privileged handlers may run.
    #[must_use]
    pub const fn allows_privileged(&self) -> bool {
        self.allow_privileged
    }
}

/// A handler bound to the name it was resolved under.
pub struct ResolvedHandler<H> {
    name: String,
    handler: Arc<dyn CommandHandler<H>>,
}

impl<H> fmt::Debug for ResolvedHandler<H> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ResolvedHandler")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<H> ResolvedHandler<H> {
    /// Command name this handler was resolved for.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invokes the handler and converts its outcome into a response.
    ///
    /// Panics are contained here so they never unwind into the host loop.
    pub fn invoke(&self, host: &mut H, params: &Params) -> Response {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.handler.handle(host, params)));
        match outcome {
            Ok(Ok(result)) => Response::success(result),
            Ok(Err(failure)) => failure.into_response(),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                let backtrace = Backtrace::force_capture();
                error!(
                    target: DISPATCH_TARGET,
                    command = %self.name,
                    panic = %message,
                    "command handler panicked"
                );
                Response::error_with_traceback(
                    message.clone(),
                    format!("handler '{}' panicked: {message}\n{backtrace}", self.name),
                )
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("handler panicked")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[derive(Default)]
    struct Counter {
        hits: u32,
    }

    struct Fixed;

    impl CommandHandler<Counter> for Fixed {
        fn handle(&self, _host: &mut Counter, _params: &Params) -> Result<Value, HandlerError> {
            Ok(json!("fixed"))
        }
    }

    #[fixture]
    fn registry() -> HandlerRegistry<Counter> {
        HandlerRegistry::builder()
            .register("hit", |host: &mut Counter, _params: &Params| {
                host.hits += 1;
                Ok(json!({"hits": host.hits}))
            })
            .register("fail", |_host: &mut Counter, params: &Params| {
                let reason = params
                    .get("reason")
                    .and_then(Value::as_str)
                    .unwrap_or("no reason");
                Err(HandlerError::new(reason).with_traceback("at fail"))
            })
            .register("boom", |_host: &mut Counter, _params: &Params| {
                panic!("exploded on purpose")
            })
            .register_privileged("run", |_host: &mut Counter, _params: &Params| Ok(Value::Null))
            .register_handler("fixed", Capability::Standard, Fixed)
            .build()
    }

    #[rstest]
    fn resolves_and_invokes_registered_handler(registry: HandlerRegistry<Counter>) {
        let mut host = Counter::default();
        let handler = registry.resolve("hit").expect("resolve");
        assert_eq!(handler.name(), "hit");
        let response = handler.invoke(&mut host, &Params::new());
        assert_eq!(response, Response::success(json!({"hits": 1})));
        assert_eq!(host.hits, 1);
    }

    #[rstest]
    fn unknown_command_names_the_command(registry: HandlerRegistry<Counter>) {
        let error = registry.resolve("frobnicate").expect_err("unknown");
        assert_eq!(error.to_string(), "Unknown command: frobnicate");
    }

    #[rstest]
    fn privileged_handlers_require_opt_in(registry: HandlerRegistry<Counter>) {
        let error = registry.resolve("run").expect_err("disabled");
        assert_eq!(
            error.to_string(),
            "Command 'run' is privileged and disabled on this host"
        );

        let enabled = HandlerRegistry::builder()
            .register_privileged("run", |_host: &mut Counter, _params: &Params| {
                Ok(Value::Null)
            })
            .allow_privileged(true)
            .build();
        assert!(enabled.resolve("run").is_ok());
    }

    #[rstest]
    fn handler_errors_become_error_responses(registry: HandlerRegistry<Counter>) {
        let mut params = Params::new();
        params.insert("reason".into(), json!("bad input"));
        let response = registry
            .resolve("fail")
            .expect("resolve")
            .invoke(&mut Counter::default(), &params);
        assert_eq!(
            response,
            Response::error_with_traceback("bad input", "at fail")
        );
    }

    #[rstest]
    fn panics_become_error_responses_with_diagnostic(registry: HandlerRegistry<Counter>) {
        let response = registry
            .resolve("boom")
            .expect("resolve")
            .invoke(&mut Counter::default(), &Params::new());
        assert_eq!(response.message(), Some("exploded on purpose"));
        let traceback = response.traceback().expect("diagnostic");
        assert!(traceback.contains("handler 'boom' panicked: exploded on purpose"));
    }

    #[rstest]
    fn trait_implementations_can_be_registered(registry: HandlerRegistry<Counter>) {
        let response = registry
            .resolve("fixed")
            .expect("resolve")
            .invoke(&mut Counter::default(), &Params::new());
        assert_eq!(response.result(), Some(&json!("fixed")));
    }

    #[rstest]
    fn names_are_sorted(registry: HandlerRegistry<Counter>) {
        assert_eq!(
            registry.names(),
            vec!["boom", "fail", "fixed", "hit", "run"]
        );
    }
}
