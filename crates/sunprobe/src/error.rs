//! CLI error types with miette diagnostics.
//!
//! Maps core, config and acquisition failures into user-facing errors with
//! actionable help text and a stable exit code.

use miette::Diagnostic;
use thiserror::Error;

use sunprobe_config::ConfigError;
use sunprobe_core::{AcquisitionError, CoreError, ErrorKind};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NO_DATA: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the portal at {url}: {reason}")]
    #[diagnostic(
        code(sunprobe::connection_failed),
        help(
            "Check the portal URL and your network connection.\n\
             A self-signed certificate needs --insecure (-k) or ca_cert in the profile."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Portal temporarily unavailable: {reason}")]
    #[diagnostic(
        code(sunprobe::transient),
        help("The portal or network failed in a way that usually clears up. Try again shortly.")
    )]
    Transient { reason: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(sunprobe::timeout),
        help("Increase the timeout with --timeout or check portal responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(sunprobe::auth_failed),
        help(
            "The session cookie is missing or expired.\n\
             Run: sunprobe login --profile {profile}\n\
             Or copy a fresh cookie from your browser into the profile's cookie file."
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(sunprobe::no_credentials),
        help(
            "Set a username with: sunprobe config set username <name>\n\
             Store the password with: sunprobe config set-password\n\
             Or set SUNPROBE_USERNAME and SUNPROBE_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── Data ─────────────────────────────────────────────────────────
    #[error("No usable data: {message}")]
    #[diagnostic(code(sunprobe::no_data), help("{hint}"))]
    NoData { message: String, hint: String },

    #[error("Portal returned an unexpected response: {message}")]
    #[diagnostic(code(sunprobe::api_error))]
    Api { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(sunprobe::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(sunprobe::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: sunprobe config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(sunprobe::config))]
    Config { message: String },

    #[error("Cancelled")]
    #[diagnostic(code(sunprobe::cancelled))]
    Cancelled,

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Transient { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NoData { .. } => exit_code::NO_DATA,
            Self::Validation { .. } | Self::ProfileNotFound { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the active profile name to an authentication failure.
    pub fn for_profile(self, name: &str) -> Self {
        match self {
            Self::AuthFailed { message, .. } => Self::AuthFailed {
                profile: name.to_owned(),
                message,
            },
            other => other,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::CredentialMissing { .. } | CoreError::AuthenticationFailed { .. } => {
                CliError::AuthFailed {
                    profile: "default".into(),
                    message: err.to_string(),
                }
            }
            CoreError::Api { message, status } => match status {
                Some(s) if s >= 500 || s == 429 => CliError::Transient {
                    reason: format!("HTTP {s}: {message}"),
                },
                _ => CliError::Api { message },
            },
            CoreError::NoData { message } => CliError::NoData {
                message,
                hint: "The portal answered but returned no measurements for this window.".into(),
            },
            CoreError::Config { message } => CliError::Config { message },
            CoreError::Cancelled => CliError::Cancelled,
            CoreError::Internal(message) => CliError::Api { message },
        }
    }
}

// ── AcquisitionError → CliError mapping ──────────────────────────────

impl From<AcquisitionError> for CliError {
    fn from(err: AcquisitionError) -> Self {
        match err.kind {
            ErrorKind::Authentication => CliError::AuthFailed {
                profile: "default".into(),
                message: err.message,
            },
            ErrorKind::NoData => CliError::NoData {
                message: err.message,
                hint: err.hint.unwrap_or_default(),
            },
            ErrorKind::Transient => CliError::Transient {
                reason: err.message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: "(none)".into(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}

impl From<sunprobe_api::Error> for CliError {
    fn from(err: sunprobe_api::Error) -> Self {
        CoreError::from(err).into()
    }
}
