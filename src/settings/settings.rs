use crate::domain_model::{AuthMode, ConnectionType, PersistTier};
use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub api: Api,
    pub network: Network,
    pub retry: Retry,
    pub cache: Cache,
    pub session: Session,
    pub probe: Probe,
    pub log: Log,
}

#[derive(Debug, Deserialize)]
pub struct Api {
    pub base_url: String,
    pub app_version: String,
    pub auth_mode: AuthMode,
    pub transport: String, // "fake" or "real"
}

#[derive(Debug, Deserialize)]
pub struct Network {
    pub baseline_timeout_ms: u64,
    pub online: bool,
    pub save_data: bool,
    pub connection: ConnectionType,
}

#[derive(Debug, Deserialize)]
pub struct Retry {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub read_retries: u32,
    pub write_retries: u32,
    pub jitter_ratio: f64,
}

#[derive(Debug, Deserialize)]
pub struct Cache {
    pub default_ttl_secs: u64,
    pub max_entries: usize,
}

#[derive(Debug, Deserialize)]
pub struct Session {
    pub persist_tier: PersistTier,
    pub clock_skew_secs: i64,
    pub durable_path: String,
    pub login_path: String,
    pub refresh_path: String,
    pub me_path: String,
    pub logout_path: String,
}

#[derive(Debug, Deserialize)]
pub struct Probe {
    pub health_path: String,
    pub timeout_ms: u64,
    pub idle_threshold_secs: u64,
    pub failure_window_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// Loads the settings file, then applies `LIFELINE__SECTION__KEY` overrides
/// from the environment.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(
            Environment::with_prefix("LIFELINE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
