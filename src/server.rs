//! Query service: lifecycle, connection handling and per-kind handlers.
//!
//! A [`Server`] moves through `Idle -> Listening -> Stopped`. [`Server::start`]
//! binds the endpoint, runs the accept loop on its own task and blocks until
//! the listener fails or [`Server::stop`] is called from anywhere. Each
//! connection is served by its own task; engine calls run on the blocking
//! pool with a private [`ResultCapture`] per query.

use std::{
   io,
   net::SocketAddr,
   sync::Arc,
   time::{Duration, Instant},
};

use tokio::{sync::watch, task, time};

use crate::{
   Result,
   capture::ResultCapture,
   config::Config,
   engine::AnalysisEngine,
   error::Error,
   ipc::{self, BINARY_VERSION, Request, Response, SocketBuffer},
   query,
   sock::{Listener, SocketError, Stream},
   types::{
      CallStack, Callees, Callers, Definition, Describe, FreeVars, Implements, Location, Peers,
      PointsTo, QueryKind, QueryOutput, QueryResult, Referrers, What, WhichErrs,
   },
};

/// Lifecycle state of a [`Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
   Idle,
   /// Admitted by `start`, endpoint not bound yet.
   Starting,
   Listening(SocketAddr),
   Stopped,
}

pub struct Server {
   engine:            Arc<dyn AnalysisEngine>,
   addr:              String,
   max_request_bytes: usize,
   status:            watch::Sender<ServerStatus>,
}

impl Server {
   pub fn new(engine: Arc<dyn AnalysisEngine>, addr: impl Into<String>) -> Self {
      Self {
         engine,
         addr: addr.into(),
         max_request_bytes: Config::default().effective_max_request_bytes(),
         status: watch::Sender::new(ServerStatus::Idle),
      }
   }

   pub fn with_max_request_bytes(mut self, max_request_bytes: usize) -> Self {
      self.max_request_bytes = max_request_bytes;
      self
   }

   pub fn status(&self) -> ServerStatus {
      *self.status.borrow()
   }

   /// Listens on the configured address until stopped.
   ///
   /// Returns `Ok` after [`Server::stop`], or the accept loop's error if the
   /// listener fails. Only one `start` is accepted per server.
   pub async fn start(self: &Arc<Self>) -> Result<()> {
      let admitted = self.status.send_if_modified(|status| {
         if *status == ServerStatus::Idle {
            *status = ServerStatus::Starting;
            true
         } else {
            false
         }
      });
      if !admitted {
         let reason = if self.status() == ServerStatus::Stopped {
            "server already stopped"
         } else {
            "server already started"
         };
         return Err(Error::Server { op: "start", reason: reason.to_string() });
      }

      let listener = match Listener::bind(&self.addr).await {
         Ok(listener) => listener,
         Err(e) => {
            self.stop();
            return Err(e);
         },
      };
      let local = listener.local_addr();

      let listening = self.status.send_if_modified(|status| {
         if *status == ServerStatus::Starting {
            *status = ServerStatus::Listening(local);
            true
         } else {
            false
         }
      });
      if !listening {
         tracing::debug!(addr = %local, "stopped before listening");
         return Ok(());
      }
      tracing::info!(addr = %local, "query service listening");

      let mut status_rx = self.status.subscribe();
      let accept_server = Arc::clone(self);
      let mut accept_handle =
         tokio::spawn(async move { accept_server.accept_loop(listener).await });

      let outcome = tokio::select! {
         joined = &mut accept_handle => match joined {
            Ok(e) => Err(e),
            Err(e) => Err(Error::Server { op: "accept", reason: e.to_string() }),
         },
         () = wait_stopped(&mut status_rx) => {
            accept_handle.abort();
            let _ = accept_handle.await;
            Ok(())
         }
      };

      self.stop();
      match &outcome {
         Ok(()) => tracing::info!(addr = %local, "query service stopped"),
         Err(e) => tracing::error!(addr = %local, "query service failed: {e}"),
      }
      outcome
   }

   /// Requests shutdown. Idempotent; a server stopped before `start` never
   /// listens.
   pub fn stop(&self) {
      let changed = self.status.send_if_modified(|status| {
         if *status == ServerStatus::Stopped {
            false
         } else {
            *status = ServerStatus::Stopped;
            true
         }
      });
      if changed {
         tracing::debug!("stop requested");
      }
   }

   /// Resolves with the bound address once listening.
   pub async fn wait_listening(&self) -> Result<SocketAddr> {
      let mut rx = self.status.subscribe();
      let status = *rx
         .wait_for(|s| matches!(s, ServerStatus::Listening(_) | ServerStatus::Stopped))
         .await
         .map_err(|e| Error::Server { op: "wait_listening", reason: e.to_string() })?;
      match status {
         ServerStatus::Listening(addr) => Ok(addr),
         _ => Err(Error::Server { op: "wait_listening", reason: "server stopped".to_string() }),
      }
   }

   async fn accept_loop(self: Arc<Self>, listener: Listener) -> Error {
      loop {
         match listener.accept().await {
            Ok((stream, peer)) => {
               tracing::debug!(%peer, "client connected");
               let client_server = Arc::clone(&self);
               tokio::spawn(async move { client_server.handle_client(stream, peer).await });
            },
            Err(Error::Socket(SocketError::Accept(e))) if is_transient_accept_error(&e) => {
               tracing::warn!("accept failed, still serving: {e}");
               if is_resource_exhaustion(&e) {
                  time::sleep(EXHAUSTED_BACKOFF).await;
               }
            },
            Err(e) => return e,
         }
      }
   }

   async fn handle_client(self: Arc<Self>, mut stream: Stream, peer: SocketAddr) {
      let mut buffer = SocketBuffer::new();

      loop {
         let request: Request =
            match buffer.recv_with_limit(&mut stream, self.max_request_bytes).await {
               Ok(req) => req,
               Err(e) => {
                  tracing::debug!(%peer, "client read ended: {e}");
                  break;
               },
            };

         let shutting_down = matches!(request, Request::Shutdown);
         let response = self.dispatch(request).await;

         if let Err(e) = buffer.send(&mut stream, &response).await {
            tracing::debug!(%peer, "client write error: {e}");
            break;
         }

         if shutting_down {
            tracing::info!(%peer, "shutdown requested by client");
            self.stop();
            break;
         }
      }
   }

   async fn dispatch(&self, request: Request) -> Response {
      match request {
         Request::Hello { protocol_versions, client_version } => {
            match ipc::negotiate_protocol(&protocol_versions) {
               Some(protocol_version) => Response::Hello {
                  protocol_version,
                  binary_version: BINARY_VERSION.to_string(),
               },
               None => {
                  tracing::warn!(%client_version, ?protocol_versions, "no common protocol version");
                  Response::from_error(&Error::Incompatible { client: protocol_versions })
               },
            }
         },
         Request::Ping => {
            self.ping();
            Response::Ack
         },
         Request::Query { kind, location } => match self.answer(kind, location).await {
            Ok(result) => Response::Answer(result),
            Err(e) => Response::from_error(&e),
         },
         Request::Shutdown => Response::Shutdown { success: true },
      }
   }

   pub fn ping(&self) {
      tracing::trace!("ping");
   }

   /// Runs a query of any kind and returns the result as the matching
   /// variant.
   pub async fn answer(&self, kind: QueryKind, location: Location) -> Result<QueryResult> {
      Ok(match kind {
         QueryKind::Definition => self.get_definition(location).await?.into(),
         QueryKind::Callees => self.get_callees(location).await?.into(),
         QueryKind::Callers => self.get_callers(location).await?.into(),
         QueryKind::CallStack => self.get_call_stack(location).await?.into(),
         QueryKind::Describe => self.get_describe(location).await?.into(),
         QueryKind::FreeVars => self.get_free_vars(location).await?.into(),
         QueryKind::Implements => self.get_implements(location).await?.into(),
         QueryKind::Peers => self.get_peers(location).await?.into(),
         QueryKind::PointsTo => self.get_points_to(location).await?.into(),
         QueryKind::Referrers => self.get_referrers(location).await?.into(),
         QueryKind::What => self.get_what(location).await?.into(),
         QueryKind::WhichErrs => self.get_which_errs(location).await?.into(),
      })
   }

   pub async fn get_definition(&self, location: Location) -> Result<Definition> {
      self.run(location).await
   }

   pub async fn get_callees(&self, location: Location) -> Result<Callees> {
      self.run(location).await
   }

   pub async fn get_callers(&self, location: Location) -> Result<Callers> {
      self.run(location).await
   }

   pub async fn get_call_stack(&self, location: Location) -> Result<CallStack> {
      self.run(location).await
   }

   pub async fn get_describe(&self, location: Location) -> Result<Describe> {
      self.run(location).await
   }

   pub async fn get_free_vars(&self, location: Location) -> Result<FreeVars> {
      self.run(location).await
   }

   pub async fn get_implements(&self, location: Location) -> Result<Implements> {
      self.run(location).await
   }

   pub async fn get_peers(&self, location: Location) -> Result<Peers> {
      self.run(location).await
   }

   pub async fn get_points_to(&self, location: Location) -> Result<PointsTo> {
      self.run(location).await
   }

   pub async fn get_referrers(&self, location: Location) -> Result<Referrers> {
      self.run(location).await
   }

   pub async fn get_what(&self, location: Location) -> Result<What> {
      self.run(location).await
   }

   pub async fn get_which_errs(&self, location: Location) -> Result<WhichErrs> {
      self.run(location).await
   }

   /// Runs the engine for `T::KIND` on the blocking pool and collects its
   /// answer from a capture owned by this call alone.
   async fn run<T: QueryOutput>(&self, location: Location) -> Result<T> {
      let kind = T::KIND;
      let engine = Arc::clone(&self.engine);
      let position = location.position.clone();
      let started = Instant::now();

      let outcome = task::spawn_blocking(move || -> Result<T> {
         let capture = ResultCapture::new(kind);
         engine.analyze(kind, &query::build_query(&location, &capture))?;
         capture.take::<T>()
      })
      .await
      .map_err(|e| Error::Server {
         op:     kind.as_str(),
         reason: format!("engine task failed: {e}"),
      })?;

      let elapsed_ms = started.elapsed().as_millis() as u64;
      match &outcome {
         Ok(_) => tracing::debug!(%kind, %position, elapsed_ms, "query answered"),
         Err(e) => tracing::debug!(%kind, %position, elapsed_ms, "query failed: {e}"),
      }
      outcome
   }
}

/// Pause before accepting again once the process ran out of descriptors.
const EXHAUSTED_BACKOFF: Duration = Duration::from_millis(100);

/// Accept failures that concern one connection or a passing resource
/// shortage; the listener itself is still usable.
fn is_transient_accept_error(e: &io::Error) -> bool {
   matches!(
      e.kind(),
      io::ErrorKind::ConnectionAborted
         | io::ErrorKind::ConnectionReset
         | io::ErrorKind::ConnectionRefused
         | io::ErrorKind::Interrupted
         | io::ErrorKind::WouldBlock
         | io::ErrorKind::TimedOut
   ) || is_resource_exhaustion(e)
}

#[cfg(unix)]
fn is_resource_exhaustion(e: &io::Error) -> bool {
   matches!(
      e.raw_os_error(),
      Some(libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM)
   )
}

#[cfg(not(unix))]
fn is_resource_exhaustion(e: &io::Error) -> bool {
   e.kind() == io::ErrorKind::OutOfMemory
}

async fn wait_stopped(rx: &mut watch::Receiver<ServerStatus>) {
   let _ = rx.wait_for(|status| *status == ServerStatus::Stopped).await;
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn connection_level_accept_errors_keep_serving() {
      for kind in [
         io::ErrorKind::ConnectionAborted,
         io::ErrorKind::ConnectionReset,
         io::ErrorKind::Interrupted,
      ] {
         assert!(is_transient_accept_error(&io::Error::from(kind)), "{kind:?}");
      }
   }

   #[cfg(unix)]
   #[test]
   fn descriptor_exhaustion_keeps_serving() {
      for errno in [libc::EMFILE, libc::ENFILE] {
         let e = io::Error::from_raw_os_error(errno);
         assert!(is_transient_accept_error(&e), "{e}");
         assert!(is_resource_exhaustion(&e), "{e}");
      }
   }

   #[test]
   fn listener_failures_end_the_loop() {
      for kind in [io::ErrorKind::InvalidInput, io::ErrorKind::PermissionDenied] {
         assert!(!is_transient_accept_error(&io::Error::from(kind)), "{kind:?}");
      }
      #[cfg(unix)]
      assert!(!is_transient_accept_error(&io::Error::from_raw_os_error(libc::EBADF)));
   }
}
