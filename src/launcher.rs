//! Daemon discovery and on-demand startup.
//!
//! Probes the well-known address for a live daemon and, when none answers,
//! re-executes the current binary in daemon mode as a detached background
//! process, then waits for it with bounded exponential backoff.

use std::{
   ffi::OsString,
   io,
   path::PathBuf,
   process::{Command, Stdio},
   time::Duration,
};

use tokio::time::{self, Instant};

use crate::{Result, client::Client, config::Config, error::Error};

/// Errors that can occur while bringing a daemon up
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
   #[error("failed to resolve current executable: {0}")]
   ResolveExe(#[source] io::Error),

   #[error("failed to resolve working directory: {0}")]
   CurrentDir(#[source] io::Error),

   #[error("failed to spawn daemon {program}: {source}")]
   Spawn {
      program: PathBuf,
      #[source]
      source:  io::Error,
   },

   #[error("daemon at {addr} not ready after {}ms: {last_error}", waited.as_millis())]
   NotReady { addr: String, waited: Duration, last_error: String },
}

/// Exponential delay sequence capped at `max`
#[derive(Debug, Clone)]
pub struct Backoff {
   next: Duration,
   max:  Duration,
}

impl Backoff {
   pub fn new(initial: Duration, max: Duration) -> Self {
      Self { next: initial.min(max), max }
   }

   pub fn next_delay(&mut self) -> Duration {
      let delay = self.next;
      self.next = self.next.saturating_mul(2).min(self.max);
      delay
   }
}

/// Owns daemon spawn, readiness probing and hand-off of a ready connection
#[derive(Debug, Clone)]
pub struct Launcher {
   addr:    String,
   program: Option<PathBuf>,
   args:    Vec<OsString>,
   config:  Config,
}

impl Launcher {
   pub fn new(addr: impl Into<String>, config: Config) -> Self {
      let addr = addr.into();
      let args = vec!["-d".into(), "--addr".into(), addr.clone().into()];
      Self { addr, program: None, args, config }
   }

   /// Spawns `program` instead of the current executable.
   pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
      self.program = Some(program.into());
      self
   }

   pub fn with_args<I, S>(mut self, args: I) -> Self
   where
      I: IntoIterator<Item = S>,
      S: Into<OsString>,
   {
      self.args = args.into_iter().map(Into::into).collect();
      self
   }

   /// Returns a connection to a ready daemon, starting one if needed.
   pub async fn ensure_daemon(&self) -> Result<Client> {
      match self.probe().await {
         Ok(client) => {
            tracing::debug!(addr = %self.addr, "daemon already running");
            return Ok(client);
         },
         Err(Error::Incompatible { .. }) => {
            tracing::info!(addr = %self.addr, "replacing daemon with incompatible protocol");
            self.replace_incompatible().await;
         },
         Err(e) => tracing::debug!(addr = %self.addr, "daemon probe failed: {e}"),
      }

      self.spawn_daemon()?;
      self.wait_for_daemon().await
   }

   /// Connects, handshakes and pings; any failure means "not available".
   ///
   /// The handshake is held to the connect timeout; the returned client uses
   /// the regular RPC timeout.
   pub async fn probe(&self) -> Result<Client> {
      let mut client = Client::connect_with_config(&self.addr, &self.config)
         .await?
         .with_rpc_timeout(self.config.connect_timeout());
      client.hello().await?;
      client.ping().await?;
      Ok(client.with_rpc_timeout(self.config.rpc_timeout()))
   }

   async fn replace_incompatible(&self) {
      let Ok(client) = Client::connect_with_config(&self.addr, &self.config).await else {
         return;
      };
      let mut client = client.with_rpc_timeout(self.config.connect_timeout());
      if let Err(e) = client.shutdown().await {
         tracing::warn!(addr = %self.addr, "failed to stop incompatible daemon: {e}");
      }
      // Give the old listener a moment to close before the new one binds.
      time::sleep(self.config.probe_initial()).await;
   }

   /// Starts the daemon as a detached process and releases it.
   pub fn spawn_daemon(&self) -> Result<()> {
      let program = match &self.program {
         Some(program) => program.clone(),
         None => std::env::current_exe().map_err(LaunchError::ResolveExe)?,
      };
      let cwd = std::env::current_dir().map_err(LaunchError::CurrentDir)?;

      let mut cmd = Command::new(&program);
      cmd.args(&self.args)
         .current_dir(cwd)
         .stdin(Stdio::null())
         .stdout(Stdio::null())
         .stderr(Stdio::null());

      #[cfg(unix)]
      {
         use std::os::unix::process::CommandExt;
         cmd.process_group(0);
      }

      let child = cmd
         .spawn()
         .map_err(|source| LaunchError::Spawn { program: program.clone(), source })?;
      tracing::info!(
         pid = child.id(),
         program = %program.display(),
         addr = %self.addr,
         "daemon spawned"
      );
      // Dropping the handle neither waits for nor kills the daemon.
      drop(child);
      Ok(())
   }

   async fn wait_for_daemon(&self) -> Result<Client> {
      let deadline = self.config.launch_timeout();
      let started = Instant::now();
      let mut backoff = Backoff::new(self.config.probe_initial(), self.config.probe_max());

      loop {
         let last_error = match self.probe().await {
            Ok(client) => {
               tracing::debug!(
                  addr = %self.addr,
                  waited_ms = started.elapsed().as_millis() as u64,
                  "daemon ready"
               );
               return Ok(client);
            },
            Err(e) => e,
         };

         let waited = started.elapsed();
         if waited >= deadline {
            return Err(
               LaunchError::NotReady {
                  addr: self.addr.clone(),
                  waited,
                  last_error: last_error.to_string(),
               }
               .into(),
            );
         }
         time::sleep(backoff.next_delay().min(deadline - waited)).await;
      }
   }
}
