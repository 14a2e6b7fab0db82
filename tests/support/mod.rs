#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, thread, time::Duration};

use god::{
   engine::{AnalysisEngine, EchoEngine, EngineError},
   query::Query,
   server::Server,
   types::{QueryKind, QueryResult},
};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// Replies with the same result whatever the query kind.
pub struct FixedEngine {
   result: QueryResult,
}

impl FixedEngine {
   pub fn new(result: impl Into<QueryResult>) -> Self {
      Self { result: result.into() }
   }
}

impl AnalysisEngine for FixedEngine {
   fn analyze(&self, _kind: QueryKind, query: &Query<'_>) -> Result<(), EngineError> {
      query.reply(self.result.clone());
      Ok(())
   }
}

/// Fails every query with the same error.
pub struct FailingEngine(pub EngineError);

impl AnalysisEngine for FailingEngine {
   fn analyze(&self, _kind: QueryKind, _query: &Query<'_>) -> Result<(), EngineError> {
      Err(self.0.clone())
   }
}

/// Returns success without ever delivering a result.
pub struct SilentEngine;

impl AnalysisEngine for SilentEngine {
   fn analyze(&self, _kind: QueryKind, _query: &Query<'_>) -> Result<(), EngineError> {
      Ok(())
   }
}

/// Delivers the echo answer twice.
pub struct ChattyEngine;

impl AnalysisEngine for ChattyEngine {
   fn analyze(&self, kind: QueryKind, query: &Query<'_>) -> Result<(), EngineError> {
      EchoEngine::new().analyze(kind, query)?;
      EchoEngine::new().analyze(kind, query)
   }
}

/// Echo engine that holds each query for `delay` before answering.
pub struct SlowEchoEngine {
   pub delay: Duration,
}

impl AnalysisEngine for SlowEchoEngine {
   fn analyze(&self, kind: QueryKind, query: &Query<'_>) -> Result<(), EngineError> {
      thread::sleep(self.delay);
      EchoEngine::new().analyze(kind, query)
   }
}

/// Query as seen by an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seen {
   pub kind:     QueryKind,
   pub position: String,
   pub scope:    Vec<String>,
}

/// Echo engine that records every query it receives.
#[derive(Default)]
pub struct RecordingEngine {
   seen: Mutex<Vec<Seen>>,
}

impl RecordingEngine {
   pub fn seen(&self) -> Vec<Seen> {
      self.seen.lock().clone()
   }
}

impl AnalysisEngine for RecordingEngine {
   fn analyze(&self, kind: QueryKind, query: &Query<'_>) -> Result<(), EngineError> {
      self.seen.lock().push(Seen {
         kind,
         position: query.position().to_string(),
         scope: query.scope().to_vec(),
      });
      EchoEngine::new().analyze(kind, query)
   }
}

pub struct Running {
   pub server: Arc<Server>,
   pub addr:   SocketAddr,
   pub handle: JoinHandle<god::Result<()>>,
}

impl Running {
   pub fn addr(&self) -> String {
      self.addr.to_string()
   }

   /// Stops the server and waits for `start` to return.
   pub async fn shutdown(self) -> god::Result<()> {
      self.server.stop();
      tokio::time::timeout(Duration::from_secs(5), self.handle)
         .await
         .expect("start did not return after stop")
         .expect("server task panicked")
   }
}

/// Starts a server for `engine` on an ephemeral loopback port.
pub async fn start_server(engine: Arc<dyn AnalysisEngine>) -> Running {
   let server = Arc::new(Server::new(engine, "127.0.0.1:0"));
   let serving = Arc::clone(&server);
   let handle = tokio::spawn(async move { serving.start().await });
   let addr = server.wait_listening().await.expect("server failed to listen");
   Running { server, addr, handle }
}

/// Reserves a loopback port that is free at the time of the call.
pub fn free_port() -> u16 {
   std::net::TcpListener::bind("127.0.0.1:0")
      .and_then(|l| l.local_addr())
      .map(|a| a.port())
      .expect("no free port")
}
