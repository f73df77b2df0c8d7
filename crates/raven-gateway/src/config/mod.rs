//! Gateway config loader (strict parsing).

pub mod schema;

use std::fs;

use raven_core::error::{RavenError, Result};

pub use schema::{AuthSection, EventPolicy, GatewayConfig, GatewaySection, Limits, RealtimeSection};

/// Default config path; `RAVEN_CONFIG` overrides it.
pub const DEFAULT_CONFIG_PATH: &str = "raven.yaml";

pub fn load_from_file(path: &str) -> Result<GatewayConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| RavenError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<GatewayConfig> {
    let cfg: GatewayConfig = serde_yaml::from_str(s)
        .map_err(|e| RavenError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Resolve the config path from the environment.
pub fn config_path() -> String {
    std::env::var("RAVEN_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}
