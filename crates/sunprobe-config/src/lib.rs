//! Shared configuration for the sunprobe CLI.
//!
//! TOML profiles, session-cookie source resolution (env + keyring + file),
//! login password resolution, and translation to
//! `sunprobe_core::AcquisitionConfig`. The CLI layers its flag overrides
//! on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use sunprobe_api::{CredentialSource, EnvSource, FileSource, TlsMode};
use sunprobe_core::config::DEFAULT_PORTAL;
use sunprobe_core::{AcquisitionConfig, Backoff, EndpointPreset, RetryPolicy};

/// Keyring service name for stored secrets.
pub const KEYRING_SERVICE: &str = "sunprobe";

/// Overrides the config file location (tests, portable installs).
pub const CONFIG_PATH_ENV: &str = "SUNPROBE_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

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
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named portal profiles.
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
    /// Name of the profile to use when none is given.
    pub fn active_profile_name(&self) -> &str {
        self.default_profile.as_deref().unwrap_or("default")
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
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
    15
}
fn default_portal() -> String {
    DEFAULT_PORTAL.into()
}

/// A named portal profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Portal base URL.
    #[serde(default = "default_portal")]
    pub portal: String,

    /// File holding the session cookie string.
    pub cookie_file: Option<PathBuf>,

    /// Environment variable holding the session cookie string.
    pub cookie_env: Option<String>,

    /// Candidate endpoints in priority order; empty uses the preset.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<String>,

    #[serde(default)]
    pub endpoint_preset: EndpointPreset,

    pub update_interval_ms: Option<u64>,

    /// Backoff floor after a transient failure.
    pub retry_delay_ms: Option<u64>,

    /// Backoff ceiling.
    pub retry_ceiling_ms: Option<u64>,

    pub max_retries: Option<u32>,

    pub probe_delay_ms: Option<u64>,

    pub session_ttl_secs: Option<u64>,

    /// Return the last non-empty extraction when nothing is meaningful.
    pub degraded_fallback: Option<bool>,

    /// Username for `sunprobe login`.
    pub username: Option<String>,

    /// Password for `sunprobe login` (plaintext, prefer keyring).
    pub password: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout (seconds).
    pub timeout: Option<u64>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            portal: default_portal(),
            cookie_file: None,
            cookie_env: None,
            endpoints: Vec::new(),
            endpoint_preset: EndpointPreset::default(),
            update_interval_ms: None,
            retry_delay_ms: None,
            retry_ceiling_ms: None,
            max_retries: None,
            probe_delay_ms: None,
            session_ttl_secs: None,
            degraded_fallback: None,
            username: None,
            password: None,
            ca_cert: None,
            insecure: None,
            timeout: None,
        }
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "sunprobe", "sunprobe")
}

/// Resolve the config file path (`SUNPROBE_CONFIG`, else platform dirs).
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default cookie file for a profile, next to the config file.
pub fn default_cookie_path(profile_name: &str) -> PathBuf {
    let dir = config_path()
        .parent()
        .map_or_else(dirs_fallback, Path::to_path_buf);
    dir.join("cookies").join(format!("{profile_name}.txt"))
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("sunprobe");
    p
}

// ── Loading / saving ────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path`, layered over defaults and under
/// `SUNPROBE_`-prefixed environment variables (`__` separates levels).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SUNPROBE_").split("__"));

    let config: Config = figment.extract()?;
    debug!(path = %path.display(), profiles = config.profiles.len(), "config loaded");
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// Serialize config to TOML and write it to the canonical path.
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

// ── Credential sources ──────────────────────────────────────────────

/// Secret stored in the system keyring under `sunprobe` / `<profile>/<kind>`.
#[derive(Debug, Clone)]
pub struct KeyringSource {
    account: String,
}

impl KeyringSource {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    /// The session-cookie entry of a profile.
    pub fn cookie(profile_name: &str) -> Self {
        Self::new(format!("{profile_name}/cookie"))
    }

    /// The login-password entry of a profile.
    pub fn password(profile_name: &str) -> Self {
        Self::new(format!("{profile_name}/password"))
    }

    fn entry(&self) -> Result<keyring::Entry, ConfigError> {
        Ok(keyring::Entry::new(KEYRING_SERVICE, &self.account)?)
    }

    pub fn store(&self, secret: &SecretString) -> Result<(), ConfigError> {
        self.entry()?.set_password(secret.expose_secret())?;
        Ok(())
    }

    /// Remove the entry; a missing entry is not an error.
    pub fn delete(&self) -> Result<(), ConfigError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl CredentialSource for KeyringSource {
    fn load(&self) -> Result<SecretString, sunprobe_api::Error> {
        let missing = |reason: String| sunprobe_api::Error::CredentialMissing {
            source_desc: self.describe(),
            reason,
        };
        let entry = keyring::Entry::new(KEYRING_SERVICE, &self.account)
            .map_err(|e| missing(e.to_string()))?;
        let secret = entry.get_password().map_err(|e| match e {
            keyring::Error::NoEntry => missing("no entry".into()),
            other => missing(other.to_string()),
        })?;
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(missing("entry is empty".into()));
        }
        Ok(SecretString::from(secret.to_owned()))
    }

    fn describe(&self) -> String {
        format!("keyring entry {KEYRING_SERVICE}/{}", self.account)
    }
}

/// Tries each source in order; the first that yields a secret wins.
///
/// Re-walked on every load, so a cookie that moves from one source to
/// another is picked up on the next session reload.
pub struct ChainSource {
    sources: Vec<Box<dyn CredentialSource>>,
}

impl ChainSource {
    pub fn new(sources: Vec<Box<dyn CredentialSource>>) -> Self {
        Self { sources }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl CredentialSource for ChainSource {
    fn load(&self) -> Result<SecretString, sunprobe_api::Error> {
        let mut reasons = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            match source.load() {
                Ok(secret) => return Ok(secret),
                Err(e) => {
                    debug!(source = %source.describe(), error = %e, "credential source skipped");
                    reasons.push(e.to_string());
                }
            }
        }
        Err(sunprobe_api::Error::CredentialMissing {
            source_desc: self.describe(),
            reason: if reasons.is_empty() {
                "no sources configured".into()
            } else {
                reasons.join("; ")
            },
        })
    }

    fn describe(&self) -> String {
        self.sources
            .iter()
            .map(|s| s.describe())
            .collect::<Vec<_>>()
            .join(", then ")
    }
}

impl std::fmt::Debug for ChainSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainSource")
            .field("sources", &self.describe())
            .finish()
    }
}

/// Cookie file of a profile: explicit `cookie_file`, else the default path.
pub fn cookie_file(profile: &Profile, profile_name: &str) -> PathBuf {
    profile
        .cookie_file
        .clone()
        .unwrap_or_else(|| default_cookie_path(profile_name))
}

/// Session-cookie source chain: `cookie_env` → keyring → cookie file.
pub fn resolve_cookie_source(profile: &Profile, profile_name: &str) -> ChainSource {
    let mut sources: Vec<Box<dyn CredentialSource>> = Vec::with_capacity(3);
    if let Some(ref var) = profile.cookie_env {
        sources.push(Box::new(EnvSource::new(var.clone())));
    }
    sources.push(Box::new(KeyringSource::cookie(profile_name)));
    sources.push(Box::new(FileSource::new(cookie_file(profile, profile_name))));
    ChainSource::new(sources)
}

/// Resolve login credentials (username + password) without CLI flags.
pub fn resolve_login_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<(String, SecretString), ConfigError> {
    let username = profile
        .username
        .clone()
        .or_else(|| std::env::var("SUNPROBE_USERNAME").ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;

    // 1. Env var
    if let Ok(pw) = std::env::var("SUNPROBE_PASSWORD") {
        return Ok((username, SecretString::from(pw)));
    }

    // 2. Keyring
    if let Ok(pw) = KeyringSource::password(profile_name).load() {
        return Ok((username, pw));
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok((username, SecretString::from(pw.clone())));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

// ── Translation ─────────────────────────────────────────────────────

fn millis(field: &str, value: Option<u64>, default: Duration) -> Result<Duration, ConfigError> {
    match value {
        Some(0) => Err(ConfigError::Validation {
            field: field.into(),
            reason: "must be greater than zero".into(),
        }),
        Some(ms) => Ok(Duration::from_millis(ms)),
        None => Ok(default),
    }
}

/// Retry timing of a profile.
pub fn profile_retry_policy(profile: &Profile) -> Result<RetryPolicy, ConfigError> {
    let defaults = RetryPolicy::default();
    let floor = millis("retry_delay_ms", profile.retry_delay_ms, defaults.backoff.floor)?;
    let ceiling = millis(
        "retry_ceiling_ms",
        profile.retry_ceiling_ms,
        defaults.backoff.ceiling.max(floor),
    )?;
    if ceiling < floor {
        return Err(ConfigError::Validation {
            field: "retry_ceiling_ms".into(),
            reason: format!(
                "{} is below retry_delay_ms {}",
                ceiling.as_millis(),
                floor.as_millis()
            ),
        });
    }

    Ok(RetryPolicy {
        update_interval: millis(
            "update_interval_ms",
            profile.update_interval_ms,
            defaults.update_interval,
        )?,
        backoff: Backoff::new(floor, ceiling),
        max_retries: profile.max_retries.unwrap_or(defaults.max_retries),
    })
}

/// Build an `AcquisitionConfig` from a profile, with no CLI overrides.
pub fn profile_to_acquisition_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<AcquisitionConfig, ConfigError> {
    let portal: url::Url = profile
        .portal
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "portal".into(),
            reason: format!("invalid URL: {}", profile.portal),
        })?;

    let mut config = AcquisitionConfig::new(portal);
    config.endpoints.clone_from(&profile.endpoints);
    config.preset = profile.endpoint_preset;
    config.tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    };
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    if let Some(ms) = profile.probe_delay_ms {
        config.probe_delay = Duration::from_millis(ms);
    }
    if let Some(secs) = profile.session_ttl_secs {
        config.session_ttl = Duration::from_secs(secs);
    }
    config.degraded_fallback = profile.degraded_fallback.unwrap_or(false);
    config.retry = profile_retry_policy(profile)?;
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use sunprobe_api::StaticSource;

    use super::*;

    const SAMPLE: &str = r#"
default_profile = "roof"

[defaults]
output = "json"
timeout = 20

[profiles.roof]
portal = "https://portal.example.com"
cookie_file = "/tmp/roof-cookie.txt"
endpoints = ["/api/live", "/dashboard"]
update_interval_ms = 120000
retry_delay_ms = 30000
retry_ceiling_ms = 240000
max_retries = 3
degraded_fallback = true

[profiles.garage]
endpoint_preset = "live"
insecure = true
"#;

    fn sample() -> Config {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        load_config_from(&path).unwrap()
    }

    #[test]
    fn profiles_load_from_toml() {
        let config = sample();
        assert_eq!(config.active_profile_name(), "roof");
        assert_eq!(config.defaults.output, "json");
        assert_eq!(config.defaults.color, "auto");

        let garage = &config.profiles["garage"];
        assert_eq!(garage.portal, DEFAULT_PORTAL);
        assert_eq!(garage.endpoint_preset, EndpointPreset::Live);
    }

    #[test]
    fn profile_translates_to_acquisition_config() {
        let config = sample();
        let acq = profile_to_acquisition_config(&config.profiles["roof"], &config.defaults).unwrap();

        assert_eq!(acq.portal.as_str(), "https://portal.example.com/");
        assert_eq!(acq.candidate_endpoints(), vec!["/api/live", "/dashboard"]);
        assert_eq!(acq.timeout, Duration::from_secs(20));
        assert!(acq.degraded_fallback);
        assert!(matches!(acq.tls, TlsMode::System));
        assert_eq!(acq.retry.update_interval, Duration::from_secs(120));
        assert_eq!(acq.retry.backoff.delay(1), Duration::from_secs(30));
        assert_eq!(acq.retry.backoff.delay(4), Duration::from_secs(240));
        assert_eq!(acq.retry.max_retries, 3);

        let garage = profile_to_acquisition_config(&config.profiles["garage"], &config.defaults)
            .unwrap();
        assert!(matches!(garage.tls, TlsMode::DangerAcceptInvalid));
        assert!(!garage.degraded_fallback);
        assert_eq!(garage.retry, RetryPolicy::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad_url = Profile {
            portal: "not a url".into(),
            ..Profile::default()
        };
        assert!(matches!(
            profile_to_acquisition_config(&bad_url, &Defaults::default()),
            Err(ConfigError::Validation { ref field, .. }) if field == "portal"
        ));

        let inverted = Profile {
            retry_delay_ms: Some(60_000),
            retry_ceiling_ms: Some(1_000),
            ..Profile::default()
        };
        assert!(profile_retry_policy(&inverted).is_err());

        let zero = Profile {
            update_interval_ms: Some(0),
            ..Profile::default()
        };
        assert!(profile_retry_policy(&zero).is_err());
    }

    #[test]
    fn saved_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.profiles.insert(
            "default".into(),
            Profile {
                cookie_env: Some("PORTAL_COOKIE".into()),
                ..Profile::default()
            },
        );
        save_config_to(&config, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(
            loaded.profiles["default"].cookie_env.as_deref(),
            Some("PORTAL_COOKIE")
        );
    }

    #[test]
    fn chain_returns_first_available_secret() {
        let dir = tempfile::tempdir().unwrap();
        let chain = ChainSource::new(vec![
            Box::new(FileSource::new(dir.path().join("missing.txt"))),
            Box::new(StaticSource::new("SESSION=from-chain")),
        ]);
        assert_eq!(chain.load().unwrap().expose_secret(), "SESSION=from-chain");
        assert!(chain.describe().contains("then inline credential"));
    }

    #[test]
    fn empty_chain_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let chain = ChainSource::new(vec![Box::new(FileSource::new(dir.path().join("nope")))]);
        let err = chain.load().unwrap_err();
        assert!(err.is_credential_missing());
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn explicit_cookie_file_wins() {
        let profile = Profile {
            cookie_file: Some("/srv/cookie".into()),
            ..Profile::default()
        };
        assert_eq!(cookie_file(&profile, "roof"), PathBuf::from("/srv/cookie"));
        assert!(
            cookie_file(&Profile::default(), "roof")
                .ends_with(Path::new("cookies").join("roof.txt"))
        );
    }
}
