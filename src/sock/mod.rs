//! TCP socket abstractions for the daemon endpoint

use std::io;

/// Errors that can occur during socket operations
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
   #[error("daemon already running at {0}")]
   AlreadyRunning(String),

   #[error("failed to connect to {addr}: {source}")]
   Connect {
      addr:   String,
      #[source]
      source: io::Error,
   },

   #[error("failed to bind {addr}: {source}")]
   Bind {
      addr:   String,
      #[source]
      source: io::Error,
   },

   #[error("accept failed: {0}")]
   Accept(#[source] io::Error),
}

mod tcp;

pub use tcp::*;
