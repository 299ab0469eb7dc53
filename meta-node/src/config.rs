//! Node-level configuration (`SPEC_FULL.md` §1.3): everything this core
//! needs beyond what a single `SubscribeRequest` carries. Deserializable
//! from YAML so an operator can check a config file into their deploy
//! repo; every field also has a CLI override via `clap`, consistent with
//! how the other examples in the pack layer `clap` over a config struct.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

fn default_bind_address() -> SocketAddr {
    "0.0.0.0:4458".parse().unwrap()
}

fn default_ring_buffer_capacity() -> usize {
    10_000
}

fn default_idle_poll_interval_ms() -> u64 {
    1127
}

fn default_unsynced_event_threshold() -> u32 {
    1000
}

fn default_system_log_dir() -> String {
    "/etc/seaweedfs/log".to_string()
}

fn default_local_signature() -> i32 {
    0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,
    pub persisted_log_dir: PathBuf,
    #[serde(default = "default_ring_buffer_capacity")]
    pub ring_buffer_capacity: usize,
    #[serde(default = "default_idle_poll_interval_ms")]
    pub idle_poll_interval_ms: u64,
    #[serde(default = "default_unsynced_event_threshold")]
    pub unsynced_event_threshold: u32,
    #[serde(default = "default_system_log_dir")]
    pub system_log_dir: String,
    #[serde(default = "default_local_signature")]
    pub local_signature: i32,
}

impl Config {
    pub fn idle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.idle_poll_interval_ms)
    }
}

/// CLI surface. Any flag given overrides the value loaded from
/// `--config`, if both are present.
#[derive(Debug, Parser)]
#[command(name = "meta-node", about = "Serves metadata change subscriptions over HTTP and websocket.")]
pub struct Opt {
    /// Path to a YAML config file (see `Config` for the shape).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory of append-only persisted log segments.
    #[arg(long)]
    pub persisted_log_dir: Option<PathBuf>,

    /// Address to bind the HTTP/websocket server to.
    #[arg(long)]
    pub bind_address: Option<SocketAddr>,

    /// Capacity of each in-memory ring buffer (local and aggregated).
    #[arg(long)]
    pub ring_buffer_capacity: Option<usize>,

    /// Idle poll interval between subscription loop cycles, in milliseconds.
    #[arg(long)]
    pub idle_poll_interval_ms: Option<u64>,

    /// Suppressed-event count before a keepalive is attempted.
    #[arg(long)]
    pub unsynced_event_threshold: Option<u32>,

    /// Reserved path prefix whose mutations are never forwarded.
    #[arg(long)]
    pub system_log_dir: Option<String>,

    /// This node's signature, stamped into forwarded events and checked
    /// against `SubscribeRequest::signature` for loop prevention.
    #[arg(long)]
    pub local_signature: Option<i32>,
}

impl Opt {
    /// Load the base config from `--config` if given, then apply any CLI
    /// overrides on top. `--persisted-log-dir` is mandatory one way or
    /// the other, since it has no sane default.
    pub fn resolve(self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => {
                let bytes = std::fs::read(path)
                    .map_err(|e| anyhow::anyhow!("reading config file {}: {}", path.display(), e))?;
                serde_yaml::from_slice(&bytes)
                    .map_err(|e| anyhow::anyhow!("parsing config file {}: {}", path.display(), e))?
            }
            None => Config {
                bind_address: default_bind_address(),
                persisted_log_dir: self
                    .persisted_log_dir
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("--persisted-log-dir is required without --config"))?,
                ring_buffer_capacity: default_ring_buffer_capacity(),
                idle_poll_interval_ms: default_idle_poll_interval_ms(),
                unsynced_event_threshold: default_unsynced_event_threshold(),
                system_log_dir: default_system_log_dir(),
                local_signature: default_local_signature(),
            },
        };

        if let Some(dir) = self.persisted_log_dir {
            config.persisted_log_dir = dir;
        }
        if let Some(addr) = self.bind_address {
            config.bind_address = addr;
        }
        if let Some(cap) = self.ring_buffer_capacity {
            config.ring_buffer_capacity = cap;
        }
        if let Some(ms) = self.idle_poll_interval_ms {
            config.idle_poll_interval_ms = ms;
        }
        if let Some(threshold) = self.unsynced_event_threshold {
            config.unsynced_event_threshold = threshold;
        }
        if let Some(dir) = self.system_log_dir {
            config.system_log_dir = dir;
        }
        if let Some(sig) = self.local_signature {
            config.local_signature = sig;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_only_requires_persisted_log_dir() {
        let opt = Opt {
            config: None,
            persisted_log_dir: Some(PathBuf::from("/tmp/logs")),
            bind_address: None,
            ring_buffer_capacity: None,
            idle_poll_interval_ms: None,
            unsynced_event_threshold: None,
            system_log_dir: None,
            local_signature: None,
        };
        let config = opt.resolve().unwrap();
        assert_eq!(config.persisted_log_dir, PathBuf::from("/tmp/logs"));
        assert_eq!(config.unsynced_event_threshold, 1000);
        assert_eq!(config.idle_poll_interval(), Duration::from_millis(1127));
    }

    #[test]
    fn missing_persisted_log_dir_without_config_file_is_an_error() {
        let opt = Opt {
            config: None,
            persisted_log_dir: None,
            bind_address: None,
            ring_buffer_capacity: None,
            idle_poll_interval_ms: None,
            unsynced_event_threshold: None,
            system_log_dir: None,
            local_signature: None,
        };
        assert!(opt.resolve().is_err());
    }

    #[test]
    fn config_file_values_are_overridden_by_cli_flags() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("meta-node.yaml");
        std::fs::write(
            &config_path,
            "persisted_log_dir: /var/log/meta\nunsynced_event_threshold: 500\n",
        )
        .unwrap();

        let opt = Opt {
            config: Some(config_path),
            persisted_log_dir: None,
            bind_address: None,
            ring_buffer_capacity: None,
            idle_poll_interval_ms: None,
            unsynced_event_threshold: Some(42),
            system_log_dir: None,
            local_signature: None,
        };
        let config = opt.resolve().unwrap();
        assert_eq!(config.persisted_log_dir, PathBuf::from("/var/log/meta"));
        assert_eq!(config.unsynced_event_threshold, 42);
    }
}
