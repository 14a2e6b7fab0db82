//! Hand-off of engine results to the query handler that asked for them.
//!
//! Every query gets its own [`ResultCapture`]: a one-shot cell that the
//! engine writes through [`ResultSink::deliver`] while the handler waits for
//! the synchronous engine call to return. Nothing is shared between queries,
//! so concurrent handlers can never observe each other's results.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::{
   error::{CaptureError, Result},
   types::{QueryKind, QueryOutput, QueryResult},
};

/// Callback target for engine results.
pub trait ResultSink: Send + Sync {
   fn deliver(&self, result: QueryResult);
}

/// Per-query result cell.
pub struct ResultCapture {
   expected: QueryKind,
   tx:       Mutex<Option<oneshot::Sender<QueryResult>>>,
   rx:       Mutex<oneshot::Receiver<QueryResult>>,
   extra:    AtomicUsize,
}

impl ResultCapture {
   pub fn new(expected: QueryKind) -> Self {
      let (tx, rx) = oneshot::channel();
      Self {
         expected,
         tx: Mutex::new(Some(tx)),
         rx: Mutex::new(rx),
         extra: AtomicUsize::new(0),
      }
   }

   /// Takes the delivered result as `T`.
   ///
   /// Fails if nothing was delivered, if more than one result was delivered,
   /// or if the result is not the variant `T` stands for.
   pub fn take<T: QueryOutput>(self) -> Result<T> {
      if T::KIND != self.expected {
         return Err(CaptureError::Mismatch { expected: self.expected, found: T::KIND }.into());
      }

      let extra = self.extra.load(Ordering::Acquire);
      if extra > 0 {
         return Err(CaptureError::Duplicate { kind: self.expected, count: extra + 1 }.into());
      }

      let result = self
         .rx
         .into_inner()
         .try_recv()
         .map_err(|_| CaptureError::Missing { kind: self.expected })?;

      T::from_result(result).map_err(|other| {
         CaptureError::Mismatch { expected: self.expected, found: other.kind() }.into()
      })
   }
}

impl ResultSink for ResultCapture {
   fn deliver(&self, result: QueryResult) {
      let mut tx = self.tx.lock();
      match tx.take() {
         Some(sender) => {
            // The receiver lives in `self`, so the send cannot fail.
            let _ = sender.send(result);
         },
         None => {
            self.extra.fetch_add(1, Ordering::AcqRel);
            tracing::warn!(
               expected = %self.expected,
               delivered = %result.kind(),
               "engine delivered more than one result"
            );
         },
      }
   }
}
