//! Stop daemon command.
//!
//! Asks a running daemon to shut down. Never spawns one.

use console::style;

use crate::{Result, client::Client, config::Config, error::Error};

/// Executes the stop command against the daemon at `addr`.
pub async fn execute(cfg: &Config, addr: &str) -> Result<()> {
   let mut client = match Client::connect_with_config(addr, cfg).await {
      Ok(client) => client,
      Err(Error::Socket(_) | Error::Timeout { .. }) => {
         println!("{}", style(format!("No daemon running at {addr}")).yellow());
         return Ok(());
      },
      Err(e) => return Err(e),
   };

   client.shutdown().await?;
   println!("{}", style("Daemon stopped").green());
   Ok(())
}
