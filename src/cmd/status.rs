//! Daemon status command.

use console::style;
use serde_json::json;

use crate::{Result, client::Client, config::Config, error::Error, ipc};

/// Reports whether a daemon is reachable at `addr` and which version it runs.
pub async fn execute(cfg: &Config, addr: &str, json: bool) -> Result<()> {
   let (state, detail) = match probe(cfg, addr).await {
      Ok((protocol, version)) => ("running", Some((protocol, version))),
      Err(Error::Incompatible { .. }) => ("incompatible", None),
      Err(Error::Socket(_) | Error::Timeout { .. }) => ("stopped", None),
      Err(e) => {
         tracing::debug!(%addr, "status probe failed: {e}");
         ("unresponsive", None)
      },
   };

   if json {
      let (protocol, version) = detail.unzip();
      let report = json!({
         "addr": addr,
         "state": state,
         "protocol_version": protocol,
         "binary_version": version,
         "client_version": ipc::BINARY_VERSION,
      });
      println!("{}", serde_json::to_string_pretty(&report)?);
      return Ok(());
   }

   match (state, detail) {
      ("running", Some((protocol, version))) => println!(
         "  {} {} {}",
         style("●").green(),
         addr,
         style(format!("(version {version}, protocol {protocol})")).dim()
      ),
      ("stopped", _) => println!("{}", style(format!("No daemon running at {addr}")).dim()),
      (state, _) => {
         println!("  {} {} {}", style("●").yellow(), addr, style(format!("({state})")).dim());
      },
   }
   Ok(())
}

async fn probe(cfg: &Config, addr: &str) -> Result<(u32, String)> {
   let mut client = Client::connect_with_config(addr, cfg).await?;
   let info = client.hello().await?;
   client.ping().await?;
   Ok((info.protocol_version, info.binary_version))
}
