//! Configuration for the hassly CLI.
//!
//! TOML profiles, `HASSLY_` environment overrides, token resolution
//! (env var, keyring, plaintext) and translation to
//! `hassly_core::ClientConfig`. The core never reads files; everything it
//! needs arrives through the `ClientConfig` built here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use hassly_core::{Backoff, ClientConfig, ReconnectConfig};

/// Keyring service name; entries are stored as `{profile}/token`.
pub const KEYRING_SERVICE: &str = "hassly";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("no access token configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is given on the command line.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named hub profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up `name`, or the default profile when `name` is `None`.
    pub fn profile<'a>(&'a self, name: Option<&'a str>) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|profile| (name, profile))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }

    /// Resolve a profile into a ready-to-use `ClientConfig`.
    pub fn client_config(&self, name: Option<&str>) -> Result<ClientConfig, ConfigError> {
        let (name, profile) = self.profile(name)?;
        profile_to_client_config(profile, name, &self.defaults)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Response timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,

    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout: u64,

    /// Seconds before a reconnect attempt. `0` disables reconnecting.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// `fixed` or `exponential`.
    #[serde(default = "default_backoff")]
    pub backoff: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            heartbeat_interval: default_heartbeat_interval(),
            heartbeat_timeout: default_heartbeat_timeout(),
            reconnect_delay: default_reconnect_delay(),
            max_retries: default_max_retries(),
            backoff: default_backoff(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}
fn default_heartbeat_interval() -> u64 {
    30
}
fn default_heartbeat_timeout() -> u64 {
    10
}
fn default_reconnect_delay() -> u64 {
    5
}
fn default_max_retries() -> u32 {
    10
}
fn default_backoff() -> String {
    "fixed".into()
}

/// A named hub profile. Unset fields fall back to [`Defaults`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Hub address: `ws(s)://host:port/api/websocket`, or the plain
    /// `http(s)://host:port` frontend URL.
    pub url: String,

    /// Access token (plaintext, prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable holding the access token.
    pub token_env: Option<String>,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Verify the hub certificate (default `true`).
    pub verify_ssl: Option<bool>,

    pub timeout: Option<u64>,
    pub heartbeat_interval: Option<u64>,
    pub heartbeat_timeout: Option<u64>,
    pub reconnect_delay: Option<u64>,
    pub max_retries: Option<u32>,
    pub backoff: Option<String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "hassly", "hassly").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("hassly");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment.
///
/// Environment keys nest on a double underscore, e.g.
/// `HASSLY_DEFAULTS__TIMEOUT=5` or `HASSLY_PROFILES__HOME__URL=...`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("HASSLY_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the access token: `token_env`, then keyring, then plaintext.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's token_env → env var lookup
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/token")) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref token) = profile.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a token in the system keyring for `profile_name`.
pub fn store_token(profile_name: &str, token: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/token"))
        .and_then(|entry| entry.set_password(token))
        .map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })
}

// ── Translation ─────────────────────────────────────────────────────

/// Normalize a hub address into its WebSocket endpoint.
///
/// `http` maps to `ws` and `https` to `wss`; an empty path becomes
/// `/api/websocket`.
pub fn websocket_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::Validation {
        field: "url".into(),
        reason,
    };

    let mut url: Url = raw
        .parse()
        .map_err(|e| invalid(format!("{raw}: {e}")))?;

    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => return Err(invalid(format!("unsupported scheme '{other}'"))),
    };
    url.set_scheme(scheme)
        .map_err(|()| invalid(format!("cannot use scheme '{scheme}' with {raw}")))?;

    if url.path().is_empty() || url.path() == "/" {
        url.set_path("/api/websocket");
    }
    Ok(url)
}

fn parse_backoff(raw: &str) -> Result<Backoff, ConfigError> {
    match raw {
        "fixed" => Ok(Backoff::Fixed),
        "exponential" => Ok(Backoff::Exponential),
        other => Err(ConfigError::Validation {
            field: "backoff".into(),
            reason: format!("expected 'fixed' or 'exponential', got '{other}'"),
        }),
    }
}

/// Build a `ClientConfig` from a profile and the global defaults.
pub fn profile_to_client_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ClientConfig, ConfigError> {
    let token = resolve_token(profile, profile_name)?;
    client_config_with_token(profile, defaults, token)
}

/// Like [`profile_to_client_config`], with the token supplied by the caller
/// instead of resolved from the profile.
pub fn client_config_with_token(
    profile: &Profile,
    defaults: &Defaults,
    token: SecretString,
) -> Result<ClientConfig, ConfigError> {
    let url = websocket_url(&profile.url)?;

    let secs = |value: Option<u64>, fallback: u64| Duration::from_secs(value.unwrap_or(fallback));
    let backoff = parse_backoff(profile.backoff.as_deref().unwrap_or(&defaults.backoff))?;

    let mut config = ClientConfig::new(url.as_str(), token);
    config.ca_cert.clone_from(&profile.ca_cert);
    config.verify_ssl = profile.verify_ssl.unwrap_or(true);
    config.response_timeout = secs(profile.timeout, defaults.timeout);
    config.heartbeat_interval = secs(profile.heartbeat_interval, defaults.heartbeat_interval);
    config.heartbeat_timeout = secs(profile.heartbeat_timeout, defaults.heartbeat_timeout);
    config.reconnect = ReconnectConfig {
        delay: secs(profile.reconnect_delay, defaults.reconnect_delay),
        max_retries: profile.max_retries.unwrap_or(defaults.max_retries),
        backoff,
        ..ReconnectConfig::default()
    };
    Ok(config)
}

// ── Tests ────────────────────────────────────────────────────────────
