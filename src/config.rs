//! Configuration for the daemon address, timeouts and message limits.

use std::{
   path::{Path, PathBuf},
   sync::OnceLock,
   time::Duration,
};

use directories::BaseDirs;
use figment::{
   Figment,
   providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

static CONFIG: OnceLock<Config> = OnceLock::new();

pub const DEFAULT_PORT: u16 = 7463;
pub const MAX_MESSAGE_BYTES_CAP: usize = 64 * 1024 * 1024;

/// Application configuration loaded from config file and environment variables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
   pub host: String,
   pub port: u16,

   pub connect_timeout_ms:   u64,
   pub rpc_timeout_ms:       u64,
   pub launch_timeout_ms:    u64,
   pub probe_initial_ms:     u64,
   pub probe_max_ms:         u64,
   pub max_request_bytes:    usize,
   pub max_response_bytes:   usize,

   pub log_file: Option<PathBuf>,
}

impl Default for Config {
   fn default() -> Self {
      Self {
         host: "127.0.0.1".to_string(),
         port: DEFAULT_PORT,
         connect_timeout_ms: 500,
         rpc_timeout_ms: 60_000,
         launch_timeout_ms: 10_000,
         probe_initial_ms: 20,
         probe_max_ms: 500,
         max_request_bytes: 1_048_576,
         max_response_bytes: 16 * 1_048_576,
         log_file: None,
      }
   }
}

impl Config {
   pub fn load() -> Self {
      Self::load_from(config_file_path())
   }

   fn load_from(path: &Path) -> Self {
      Figment::from(Serialized::defaults(Self::default()))
         .merge(Toml::file(path))
         .merge(Env::prefixed("GOD_").ignore(&["debug"]).lowercase(true))
         .extract()
         .inspect_err(|e| tracing::warn!("failed to parse config: {e}"))
         .unwrap_or_default()
   }

   /// Well-known `host:port` the daemon listens on.
   pub fn address(&self) -> String {
      format!("{}:{}", self.host, self.port)
   }

   pub const fn connect_timeout(&self) -> Duration {
      Duration::from_millis(self.connect_timeout_ms)
   }

   pub const fn rpc_timeout(&self) -> Duration {
      Duration::from_millis(self.rpc_timeout_ms)
   }

   pub const fn launch_timeout(&self) -> Duration {
      Duration::from_millis(self.launch_timeout_ms)
   }

   pub const fn probe_initial(&self) -> Duration {
      Duration::from_millis(self.probe_initial_ms)
   }

   pub const fn probe_max(&self) -> Duration {
      Duration::from_millis(self.probe_max_ms)
   }

   pub fn effective_max_request_bytes(&self) -> usize {
      self.max_request_bytes.clamp(1, MAX_MESSAGE_BYTES_CAP)
   }

   pub fn effective_max_response_bytes(&self) -> usize {
      self.max_response_bytes.clamp(1, MAX_MESSAGE_BYTES_CAP)
   }

   pub fn validate(&self) -> Result<()> {
      if self.host.is_empty() {
         return Err(
            ConfigError::InvalidValue { key: "host", reason: "must not be empty".to_string() }
               .into(),
         );
      }
      for (key, value) in [
         ("connect_timeout_ms", self.connect_timeout_ms),
         ("rpc_timeout_ms", self.rpc_timeout_ms),
         ("launch_timeout_ms", self.launch_timeout_ms),
         ("probe_initial_ms", self.probe_initial_ms),
      ] {
         if value == 0 {
            return Err(
               ConfigError::InvalidValue { key, reason: "must be greater than zero".to_string() }
                  .into(),
            );
         }
      }
      if self.probe_max_ms < self.probe_initial_ms {
         return Err(
            ConfigError::InvalidValue {
               key:    "probe_max_ms",
               reason: format!(
                  "{} is below probe_initial_ms {}",
                  self.probe_max_ms, self.probe_initial_ms
               ),
            }
            .into(),
         );
      }
      Ok(())
   }
}

/// Returns the global configuration instance
pub fn get() -> &'static Config {
   CONFIG.get_or_init(Config::load)
}

/// Returns the base directory for god configuration
pub fn base_dir() -> &'static PathBuf {
   static ONCE: OnceLock<PathBuf> = OnceLock::new();
   ONCE.get_or_init(|| resolve_base_dir(".god"))
}

pub fn config_file_path() -> &'static PathBuf {
   static ONCE: OnceLock<PathBuf> = OnceLock::new();
   ONCE.get_or_init(|| base_dir().join("config.toml"))
}

fn resolve_base_dir(dir_name: &str) -> PathBuf {
   BaseDirs::new()
      .map(|d| d.home_dir().join(dir_name))
      .or_else(|| {
         std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(dir_name))
      })
      .unwrap_or_else(|| {
         std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(dir_name)
      })
}
