//! Runtime configuration. Grounded on
//! `liveion_udp_bridge/src/config.rs`: `#[serde(default = "fn")]` per
//! field, `Config::load` create-if-missing behavior.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

use crate::wire::{DEFAULT_MTU_PAYLOAD, DEFAULT_PORT};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireConfig {
    #[serde(default = "default_mtu_payload")]
    pub mtu_payload: usize,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            mtu_payload: default_mtu_payload(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// `host:port` of the join endpoint.
    pub target: Option<String>,

    #[serde(default)]
    pub source: Option<String>,

    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    #[serde(default)]
    pub auto: bool,

    #[serde(default = "default_bitrate_bps")]
    pub bitrate_bps: u32,

    #[serde(default = "default_keyframe_interval")]
    pub keyframe_interval: u32,

    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            target: None,
            source: None,
            exclude_patterns: default_exclude_patterns(),
            auto: false,
            bitrate_bps: default_bitrate_bps(),
            keyframe_interval: default_keyframe_interval(),
            reconnect_interval_secs: default_reconnect_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinConfig {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub buffer_ms: u64,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            name: None,
            buffer_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub wire: WireConfig,
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub join: JoinConfig,
}

fn default_mtu_payload() -> usize {
    DEFAULT_MTU_PAYLOAD
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_exclude_patterns() -> Vec<String> {
    vec!["bridge".to_string()]
}

fn default_bitrate_bps() -> u32 {
    6_000_000
}

fn default_keyframe_interval() -> u32 {
    120
}

fn default_reconnect_interval_secs() -> u64 {
    2
}

impl Config {
    /// Loads configuration from `path`, writing a default file if none
    /// exists yet (mirrors `liveion_udp_bridge::config::Config::load`).
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            let default_config = Self::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            fs::write(path, toml_content).await?;
            tracing::info!(?path, "created default configuration file");
            return Ok(default_config);
        }

        let content = fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_wire_protocol_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.wire.port, 5990);
        assert_eq!(cfg.wire.mtu_payload, 1362);
        assert_eq!(cfg.host.exclude_patterns, vec!["bridge".to_string()]);
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = Config::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.wire.port, cfg.wire.port);
    }
}
