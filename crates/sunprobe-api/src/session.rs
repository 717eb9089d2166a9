// Session store
//
// Holds the portal session cookie in memory with a freshness TTL and
// reloads it from a durable source (file, env var, keyring, ...) when it
// is absent or stale. Rejections from the portal discard the cached
// credential so the next attempt reloads it.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::error::Error;

/// Default freshness window for a loaded credential.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(300);

/// A durable source of session credential material.
///
/// Implementations must be cheap to call repeatedly: the store re-reads
/// the source every time the cached credential expires.
pub trait CredentialSource: Send + Sync {
    /// Load the opaque session string. Empty material is an error.
    fn load(&self) -> Result<SecretString, Error>;

    /// Human-readable description used in diagnostics (never the secret).
    fn describe(&self) -> String;
}

// ── Sources ──────────────────────────────────────────────────────────

/// Cookie string stored in a plain text file (one line, trimmed).
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a cookie string to this file, creating parent directories.
    pub fn store(&self, cookie: &SecretString) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, cookie.expose_secret())?;
        Ok(())
    }
}

impl CredentialSource for FileSource {
    fn load(&self) -> Result<SecretString, Error> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| Error::CredentialMissing {
            source_desc: self.describe(),
            reason: if e.kind() == std::io::ErrorKind::NotFound {
                "file not found".into()
            } else {
                e.to_string()
            },
        })?;
        non_empty(raw.trim(), self)
    }

    fn describe(&self) -> String {
        format!("cookie file {}", self.path.display())
    }
}

/// Cookie string taken from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvSource {
    var: String,
}

impl EnvSource {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialSource for EnvSource {
    fn load(&self) -> Result<SecretString, Error> {
        let raw = std::env::var(&self.var).map_err(|_| Error::CredentialMissing {
            source_desc: self.describe(),
            reason: "variable not set".into(),
        })?;
        non_empty(raw.trim(), self)
    }

    fn describe(&self) -> String {
        format!("environment variable {}", self.var)
    }
}

/// An in-memory credential (CLI flag, tests).
#[derive(Debug, Clone)]
pub struct StaticSource {
    cookie: SecretString,
}

impl StaticSource {
    pub fn new(cookie: impl Into<String>) -> Self {
        Self {
            cookie: SecretString::from(cookie.into()),
        }
    }
}

impl CredentialSource for StaticSource {
    fn load(&self) -> Result<SecretString, Error> {
        non_empty(self.cookie.expose_secret().trim(), self)
    }

    fn describe(&self) -> String {
        "inline credential".into()
    }
}

fn non_empty(raw: &str, source: &dyn CredentialSource) -> Result<SecretString, Error> {
    if raw.is_empty() {
        return Err(Error::CredentialMissing {
            source_desc: source.describe(),
            reason: "source is empty".into(),
        });
    }
    Ok(SecretString::from(raw.to_owned()))
}

// ── Credential ───────────────────────────────────────────────────────

/// Loaded session material plus the instant it was read.
#[derive(Debug, Clone)]
pub struct Credential {
    cookie: SecretString,
    loaded_at: Instant,
}

impl Credential {
    pub fn new(cookie: SecretString) -> Self {
        Self {
            cookie,
            loaded_at: Instant::now(),
        }
    }

    pub fn loaded_at(&self) -> Instant {
        self.loaded_at
    }

    /// Whether the credential may still be used without a reload.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.loaded_at.elapsed() < ttl
    }

    /// Value for the `Cookie` request header.
    pub fn cookie_header(&self) -> &str {
        self.cookie.expose_secret()
    }
}

// ── Store ────────────────────────────────────────────────────────────

/// In-memory cache in front of a [`CredentialSource`].
pub struct SessionStore {
    source: Box<dyn CredentialSource>,
    ttl: Duration,
    cached: Option<Credential>,
}

impl SessionStore {
    pub fn new(source: Box<dyn CredentialSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cached: None,
        }
    }

    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    /// Return the cached credential while fresh, otherwise reload it.
    ///
    /// A failed reload clears the cache and surfaces
    /// [`Error::CredentialMissing`].
    pub fn get_credential(&mut self) -> Result<Credential, Error> {
        if let Some(ref cred) = self.cached {
            if cred.is_fresh(self.ttl) {
                return Ok(cred.clone());
            }
            debug!("cached session credential expired");
        }

        match self.source.load() {
            Ok(cookie) => {
                let cred = Credential::new(cookie);
                self.cached = Some(cred.clone());
                info!(source = %self.source.describe(), "session credential loaded");
                Ok(cred)
            }
            Err(e) => {
                self.cached = None;
                warn!(error = %e, "failed to load session credential");
                Err(match e {
                    Error::CredentialMissing { .. } => e,
                    other => Error::CredentialMissing {
                        source_desc: self.source.describe(),
                        reason: other.to_string(),
                    },
                })
            }
        }
    }

    /// Discard the cached credential (the portal rejected it).
    pub fn invalidate(&mut self) {
        if self.cached.take().is_some() {
            debug!("session credential invalidated");
        }
    }

    pub fn has_cached(&self) -> bool {
        self.cached.is_some()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("source", &self.source.describe())
            .field("ttl", &self.ttl)
            .field("cached", &self.cached.is_some())
            .finish()
    }
}
