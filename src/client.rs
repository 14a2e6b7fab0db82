//! Client side of the daemon protocol.

use std::{future::Future, time::Duration};

use tokio::time;

use crate::{
   Result,
   config::Config,
   error::Error,
   ipc::{self, Request, Response, SocketBuffer},
   sock::Stream,
   types::{
      CallStack, Callees, Callers, Definition, Describe, FreeVars, Implements, Location, Peers,
      PointsTo, QueryKind, QueryOutput, QueryResult, Referrers, What, WhichErrs,
   },
};

/// Version information returned by the daemon handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
   pub protocol_version: u32,
   pub binary_version:   String,
}

/// Connection to a running daemon
pub struct Client {
   stream:             Stream,
   buffer:             SocketBuffer,
   rpc_timeout:        Duration,
   max_response_bytes: usize,
   /// Set once an exchange was abandoned midway; its reply may still be in
   /// flight, so the stream no longer lines up with requests.
   desynced:           bool,
}

impl Client {
   /// Connects to `addr`, giving up after `connect_timeout`.
   pub async fn connect(addr: &str, connect_timeout: Duration) -> Result<Self> {
      let stream = with_timeout("connect", connect_timeout, Stream::connect(addr)).await?;
      let cfg = Config::default();
      Ok(Self {
         stream,
         buffer: SocketBuffer::new(),
         rpc_timeout: cfg.rpc_timeout(),
         max_response_bytes: cfg.effective_max_response_bytes(),
         desynced: false,
      })
   }

   pub async fn connect_with_config(addr: &str, cfg: &Config) -> Result<Self> {
      Ok(Self::connect(addr, cfg.connect_timeout())
         .await?
         .with_rpc_timeout(cfg.rpc_timeout())
         .with_max_response_bytes(cfg.effective_max_response_bytes()))
   }

   pub const fn with_rpc_timeout(mut self, rpc_timeout: Duration) -> Self {
      self.rpc_timeout = rpc_timeout;
      self
   }

   pub const fn with_max_response_bytes(mut self, max_response_bytes: usize) -> Self {
      self.max_response_bytes = max_response_bytes;
      self
   }

   async fn call(&mut self, op: &'static str, request: &Request) -> Result<Response> {
      if self.desynced {
         return Err(Error::Server { op, reason: "connection desynchronized".to_string() });
      }

      let Self { stream, buffer, rpc_timeout, max_response_bytes, desynced } = self;
      let exchange = async {
         buffer.send(stream, request).await?;
         buffer
            .recv_with_limit::<_, Response>(stream, *max_response_bytes)
            .await
      };
      let response = with_timeout(op, *rpc_timeout, exchange)
         .await
         .inspect_err(|e| {
            *desynced = true;
            tracing::debug!(op, "abandoning connection after failed exchange: {e}");
         })?;
      match response {
         Response::Error { code, message } => Err(Error::Remote { code, message }),
         response => Ok(response),
      }
   }

   /// Whether an earlier call left the connection unusable.
   pub const fn is_desynced(&self) -> bool {
      self.desynced
   }

   /// Negotiates the protocol version with the daemon.
   pub async fn hello(&mut self) -> Result<ServerInfo> {
      let hello = ipc::client_hello();
      match self.call("hello", &hello).await {
         Ok(Response::Hello { protocol_version, binary_version }) => {
            Ok(ServerInfo { protocol_version, binary_version })
         },
         Ok(_) => Err(Error::UnexpectedResponse("hello")),
         Err(Error::Remote { code, .. }) if code == "incompatible" => {
            Err(Error::Incompatible { client: ipc::PROTOCOL_VERSIONS.to_vec() })
         },
         Err(e) => Err(e),
      }
   }

   pub async fn ping(&mut self) -> Result<()> {
      match self.call("ping", &Request::Ping).await? {
         Response::Ack => Ok(()),
         _ => Err(Error::UnexpectedResponse("ping")),
      }
   }

   /// Asks the daemon to shut down.
   pub async fn shutdown(&mut self) -> Result<()> {
      match self.call("shutdown", &Request::Shutdown).await? {
         Response::Shutdown { success: true } => Ok(()),
         Response::Shutdown { success: false } => {
            Err(Error::Server { op: "shutdown", reason: "daemon refused to stop".to_string() })
         },
         _ => Err(Error::UnexpectedResponse("shutdown")),
      }
   }

   /// Runs a query of any kind; the answer is checked against `kind`.
   pub async fn answer(&mut self, kind: QueryKind, location: Location) -> Result<QueryResult> {
      tracing::debug!(%kind, position = %location.position, "query");
      match self.call(kind.as_str(), &Request::Query { kind, location }).await? {
         Response::Answer(result) if result.kind() == kind => Ok(result),
         _ => Err(Error::UnexpectedResponse(kind.as_str())),
      }
   }

   /// Runs a query and unwraps the answer as `T`.
   pub async fn query<T: QueryOutput>(&mut self, location: Location) -> Result<T> {
      let result = self.answer(T::KIND, location).await?;
      T::from_result(result).map_err(|_| Error::UnexpectedResponse(T::KIND.as_str()))
   }

   pub async fn definition(&mut self, pos: &str, scope: Option<&str>) -> Result<Definition> {
      self.query(location(pos, scope)).await
   }

   pub async fn callees(&mut self, pos: &str, scope: Option<&str>) -> Result<Callees> {
      self.query(location(pos, scope)).await
   }

   pub async fn callers(&mut self, pos: &str, scope: Option<&str>) -> Result<Callers> {
      self.query(location(pos, scope)).await
   }

   pub async fn call_stack(&mut self, pos: &str, scope: Option<&str>) -> Result<CallStack> {
      self.query(location(pos, scope)).await
   }

   pub async fn describe(&mut self, pos: &str, scope: Option<&str>) -> Result<Describe> {
      self.query(location(pos, scope)).await
   }

   pub async fn free_vars(&mut self, pos: &str, scope: Option<&str>) -> Result<FreeVars> {
      self.query(location(pos, scope)).await
   }

   pub async fn implements(&mut self, pos: &str, scope: Option<&str>) -> Result<Implements> {
      self.query(location(pos, scope)).await
   }

   pub async fn peers(&mut self, pos: &str, scope: Option<&str>) -> Result<Peers> {
      self.query(location(pos, scope)).await
   }

   pub async fn points_to(&mut self, pos: &str, scope: Option<&str>) -> Result<PointsTo> {
      self.query(location(pos, scope)).await
   }

   pub async fn referrers(&mut self, pos: &str, scope: Option<&str>) -> Result<Referrers> {
      self.query(location(pos, scope)).await
   }

   pub async fn what(&mut self, pos: &str, scope: Option<&str>) -> Result<What> {
      self.query(location(pos, scope)).await
   }

   pub async fn which_errs(&mut self, pos: &str, scope: Option<&str>) -> Result<WhichErrs> {
      self.query(location(pos, scope)).await
   }
}

fn location(pos: &str, scope: Option<&str>) -> Location {
   match scope {
      Some(scope) if !scope.is_empty() => Location::new(pos).with_scope(scope),
      _ => Location::new(pos),
   }
}

async fn with_timeout<T>(
   op: &'static str,
   after: Duration,
   fut: impl Future<Output = Result<T>>,
) -> Result<T> {
   time::timeout(after, fut)
      .await
      .map_err(|_| Error::Timeout { op, after })?
}
