//! Long-running daemon command.
//!
//! Hosts the query service on the well-known address until a client asks it
//! to shut down or the process receives Ctrl-C / SIGTERM.

use std::sync::Arc;

use console::style;
use tokio::{signal, task::JoinError};

use crate::{
   Result,
   config::Config,
   engine::{AnalysisEngine, EchoEngine},
   error::Error,
   server::Server,
   sock::SocketError,
};

/// Executes the daemon, blocking until it stops.
pub async fn execute(cfg: &Config, addr: String) -> Result<()> {
   let engine: Arc<dyn AnalysisEngine> = Arc::new(EchoEngine::new());
   let server = Arc::new(
      Server::new(engine, addr).with_max_request_bytes(cfg.effective_max_request_bytes()),
   );

   let serving = Arc::clone(&server);
   let mut start = tokio::spawn(async move { serving.start().await });

   if let Ok(local) = server.wait_listening().await {
      println!("{}", style("Starting god daemon...").green().bold());
      println!("Listening: {}", style(local).cyan());
   }

   tokio::select! {
      joined = &mut start => return finish(joined),
      () = shutdown_signal() => {
         println!("\n{}", style("Shutting down...").yellow());
         server.stop();
      }
   }

   finish(start.await)
}

fn finish(joined: Result<Result<()>, JoinError>) -> Result<()> {
   let outcome = joined.map_err(|e| Error::Server { op: "serve", reason: e.to_string() })?;
   match outcome {
      Err(Error::Socket(SocketError::AlreadyRunning(addr))) => {
         println!("{} {}", style("Daemon already running at").yellow(), addr);
         Ok(())
      },
      other => other,
   }
}

async fn shutdown_signal() {
   #[cfg(unix)]
   {
      use tokio::signal::unix::{SignalKind, signal as unix_signal};

      match unix_signal(SignalKind::terminate()) {
         Ok(mut term) => {
            tokio::select! {
               _ = signal::ctrl_c() => {},
               _ = term.recv() => {},
            }
         },
         Err(e) => {
            tracing::warn!("failed to install SIGTERM handler: {e}");
            let _ = signal::ctrl_c().await;
         },
      }
   }

   #[cfg(not(unix))]
   {
      let _ = signal::ctrl_c().await;
   }
}
