//! Seam to the source-analysis backend.
//!
//! Engines are synchronous and callback-driven: [`AnalysisEngine::analyze`]
//! blocks until the analysis is done and reports its answer by calling
//! [`Query::reply`] exactly once before returning `Ok`. The daemon runs each
//! call on the blocking pool and collects the answer through a per-query
//! [`ResultCapture`](crate::capture::ResultCapture).

mod echo;

pub use echo::EchoEngine;
use thiserror::Error;

use crate::{query::Query, types::QueryKind};

/// Failures reported by an analysis engine.
///
/// These travel back to the client unchanged; the daemon never retries or
/// substitutes a fallback answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
   #[error("invalid position: {0}")]
   InvalidPosition(String),

   #[error("no identifier found at {0}")]
   NoIdentifier(String),

   #[error("ambiguous selection at {pos}: {reason}")]
   Ambiguous { pos: String, reason: String },

   #[error("{0} queries are not supported by this engine")]
   Unsupported(QueryKind),

   #[error("analysis failed: {0}")]
   Failed(String),
}

/// Synchronous, callback-driven source analysis.
pub trait AnalysisEngine: Send + Sync {
   /// Runs the `kind` analysis for `query`.
   ///
   /// On success the engine must have delivered exactly one result through
   /// `query`; on failure it returns the error and delivers nothing.
   fn analyze(&self, kind: QueryKind, query: &Query<'_>) -> Result<(), EngineError>;
}
