use std::{io, time::Duration};

use thiserror::Error;

use crate::{engine::EngineError, launcher::LaunchError, sock::SocketError, types::QueryKind};

/// Main error type for god.
///
/// Covers everything that can go wrong between the command line, the daemon
/// launcher, the wire protocol, the query service and the analysis engine.
#[derive(Debug, Error)]
pub enum Error {
   /// I/O error occurred during file or process operations.
   #[error("io error: {0}")]
   Io(#[from] io::Error),

   /// JSON serialization error occurred (CLI output).
   #[error("json error: {0}")]
   Json(#[from] serde_json::Error),

   /// Configuration-related error occurred.
   #[error("config error: {0}")]
   Config(#[from] ConfigError),

   /// Inter-process communication error occurred.
   #[error("ipc error: {0}")]
   Ipc(#[from] IpcError),

   /// Socket communication error occurred.
   #[error("socket error: {0}")]
   Socket(#[from] SocketError),

   /// The daemon could not be launched or did not become ready.
   #[error("launch error: {0}")]
   Launch(#[from] LaunchError),

   /// The analysis engine rejected or failed the query.
   #[error("{0}")]
   Engine(#[from] EngineError),

   /// The captured engine result could not be handed to the handler.
   #[error("capture error: {0}")]
   Capture(#[from] CaptureError),

   /// Position string is not of the form `file:#offset`.
   #[error("invalid position {0:?}: expected file:#offset")]
   InvalidPosition(String),

   /// Server error occurred during a specific operation.
   #[error("server error during {op}: {reason}")]
   Server { op: &'static str, reason: String },

   /// The daemon answered a request with an error.
   #[error("daemon error ({code}): {message}")]
   Remote { code: String, message: String },

   /// Unexpected response received from the server during an operation.
   #[error("unexpected response from server during {0}")]
   UnexpectedResponse(&'static str),

   /// An operation did not complete in time.
   #[error("timeout during {op} after {}ms", after.as_millis())]
   Timeout { op: &'static str, after: Duration },

   /// Client and daemon share no protocol version.
   #[error("incompatible protocol: daemon supports none of {client:?}")]
   Incompatible { client: Vec<u32> },
}

impl Error {
   /// Stable code used when the error is sent back over the wire.
   pub fn code(&self) -> &'static str {
      match self {
         Self::Engine(_) => "engine",
         Self::Capture(CaptureError::Mismatch { .. }) => "result_mismatch",
         Self::Capture(CaptureError::Missing { .. }) => "missing_result",
         Self::Capture(CaptureError::Duplicate { .. }) => "duplicate_result",
         Self::InvalidPosition(_) => "invalid_position",
         Self::Incompatible { .. } => "incompatible",
         Self::Timeout { .. } => "timeout",
         _ => "server",
      }
   }

   pub fn exit_code(&self) -> i32 {
      match self {
         Self::Timeout { .. } => 11,
         Self::Incompatible { .. } => 13,
         Self::Remote { code, .. } if code == "timeout" => 11,
         Self::Remote { code, .. } if code == "incompatible" => 13,
         Self::Launch(_) => 14,
         _ => 1,
      }
   }
}

/// Errors that can occur during inter-process communication (IPC).
///
/// These errors are related to message serialization, deserialization, and I/O
/// operations when communicating between processes.
#[derive(Debug, Error)]
pub enum IpcError {
   /// The message size exceeds the maximum allowed size.
   #[error("message too large: {0} bytes")]
   MessageTooLarge(usize),

   /// Failed to serialize a message for IPC transmission.
   #[error("failed to serialize: {0}")]
   Serialize(#[source] postcard::Error),

   /// Failed to deserialize a message received via IPC.
   #[error("failed to deserialize: {0}")]
   Deserialize(#[source] postcard::Error),

   /// Failed to read data from the IPC channel.
   #[error("failed to read: {0}")]
   Read(#[source] io::Error),

   /// Failed to write data to the IPC channel.
   #[error("failed to write: {0}")]
   Write(#[source] io::Error),
}

/// Errors raised when handing an engine result back to the query handler.
#[derive(Debug, Error)]
pub enum CaptureError {
   /// The engine delivered a result of a different kind than was queried.
   #[error("result kind mismatch: expected {expected}, engine delivered {found}")]
   Mismatch { expected: QueryKind, found: QueryKind },

   /// The engine returned without delivering any result.
   #[error("engine returned without delivering a {kind} result")]
   Missing { kind: QueryKind },

   /// The engine delivered more than one result for a single query.
   #[error("engine delivered {count} results for one {kind} query")]
   Duplicate { kind: QueryKind, count: usize },
}

/// Errors that can occur while validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
   /// A configured value is out of range.
   #[error("invalid config value for {key}: {reason}")]
   InvalidValue { key: &'static str, reason: String },
}

/// Standard result type using [`enum@Error`] as the default error type
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn capture_errors_map_to_distinct_codes() {
      let mismatch = Error::from(CaptureError::Mismatch {
         expected: QueryKind::Definition,
         found:    QueryKind::Callers,
      });
      let missing = Error::from(CaptureError::Missing { kind: QueryKind::Peers });
      let duplicate =
         Error::from(CaptureError::Duplicate { kind: QueryKind::Peers, count: 2 });
      assert_eq!(mismatch.code(), "result_mismatch");
      assert_eq!(missing.code(), "missing_result");
      assert_eq!(duplicate.code(), "duplicate_result");
   }

   #[test]
   fn timeouts_exit_with_dedicated_code() {
      let err = Error::Timeout { op: "ping", after: Duration::from_millis(5) };
      assert_eq!(err.exit_code(), 11);
      assert!(err.to_string().contains("5ms"));
   }
}
