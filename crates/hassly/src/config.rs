//! CLI configuration: thin wrapper around `hassly_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` flag overrides (--url, --token, --insecure, ...).

use std::time::Duration;

use secrecy::SecretString;

use hassly_core::ClientConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use hassly_config::{Config, Defaults, Profile, config_path, load_config_or_default, save_config};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build a `ClientConfig` from the config file, profile, and CLI overrides.
///
/// Flags win over the profile; without any profile, `--url` and `--token`
/// alone are enough.
pub fn build_client_config(global: &GlobalOpts, cfg: &Config) -> Result<ClientConfig, CliError> {
    let profile_name = active_profile_name(global, cfg);

    let mut config = match cfg.profiles.get(&profile_name) {
        Some(profile) => resolve_profile(profile, &profile_name, global, &cfg.defaults)?,
        None => {
            if global.profile.is_some() {
                let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
                available.sort();
                return Err(CliError::ProfileNotFound {
                    name: profile_name,
                    available: available.join(", "),
                    path: config_path().display().to_string(),
                });
            }
            from_flags(global, &profile_name, &cfg.defaults)?
        }
    };

    if global.insecure {
        config.verify_ssl = false;
    }
    if let Some(secs) = global.timeout {
        config.response_timeout = Duration::from_secs(secs);
    }
    Ok(config)
}

/// Translate a `Profile` + global flags into a `ClientConfig`.
fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    global: &GlobalOpts,
    defaults: &Defaults,
) -> Result<ClientConfig, CliError> {
    let mut profile = profile.clone();
    if let Some(url) = &global.url {
        profile.url.clone_from(url);
    }

    // A token flag short-circuits env and keyring lookup.
    let config = match &global.token {
        Some(token) => hassly_config::client_config_with_token(&profile, defaults, SecretString::from(token.clone()))?,
        None => hassly_config::profile_to_client_config(&profile, profile_name, defaults)?,
    };
    Ok(config)
}

/// Build a config from `--url` / `--token` alone.
fn from_flags(global: &GlobalOpts, profile_name: &str, defaults: &Defaults) -> Result<ClientConfig, CliError> {
    let url = global.url.clone().ok_or_else(|| CliError::NoConfig {
        path: config_path().display().to_string(),
    })?;
    let token = global.token.clone().ok_or_else(|| CliError::NoCredentials {
        profile: profile_name.into(),
    })?;

    let profile = Profile {
        url,
        ..Profile::default()
    };
    Ok(hassly_config::client_config_with_token(&profile, defaults, SecretString::from(token))?)
}

// ── Tests ────────────────────────────────────────────────────────────
