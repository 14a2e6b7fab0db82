//! Code-intelligence daemon.
//!
//! A long-lived background process answers source-navigation queries
//! (definition, callers, callees, free variables, ...) for short-lived
//! clients over a local socket, so an analysis engine's one-time load cost is
//! paid once and amortized across invocations. The client side discovers or
//! launches the daemon transparently.

pub mod capture;
pub mod client;
pub mod cmd;
pub mod config;
pub mod engine;
pub mod error;
pub mod ipc;
pub mod launcher;
pub mod query;
pub mod server;
pub mod sock;
pub mod types;

pub use error::{Error, Result};
