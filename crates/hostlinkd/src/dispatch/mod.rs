//! Command dispatch for host connections.
//!
//! Clients send self-delimiting JSON command frames and receive one
//! newline-terminated response per command, in order:
//!
//! ```json
//! {"type":"get_object_info","params":{"name":"Cube"}}
//! ```
//!
//! ```json
//! {"status":"success","result":{"name":"Cube","type":"MESH"}}
//! ```
//!
//! The [`HandlerRegistry`] maps names to handlers; the connection state
//! machine decodes frames, runs them through the execution bridge, and writes
//! the responses back.

mod connection;
#[cfg(test)]
mod connection_tests;
mod handler;
mod registry;

pub use self::handler::CommandConnectionHandler;
pub use self::registry::{
    Capability, CommandHandler, DispatchError, HandlerError, HandlerRegistry, RegistryBuilder,
    ResolvedHandler,
};

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
