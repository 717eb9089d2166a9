// ── Core error types ──
//
// Errors surfaced by sunprobe-core operations that return `Result`
// (construction, history). Live acquisition never returns these directly:
// it folds every failure into an `AcquisitionOutcome`. The
// `From<sunprobe_api::Error>` impl translates wire-level failures into
// domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Session errors ───────────────────────────────────────────────
    #[error("No session credential available from {source_desc}: {reason}")]
    CredentialMissing { source_desc: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach portal at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Portal request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Portal returned an unexpected response: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    #[error("No usable data: {message}")]
    NoData { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Authentication is missing or was rejected; operator action needed.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::CredentialMissing { .. } | Self::AuthenticationFailed { .. }
        )
    }

    /// Worth retrying on a shorter schedule.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } => true,
            Self::Api { status, .. } => status.is_some_and(|s| s >= 500 || s == 429),
            _ => false,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<sunprobe_api::Error> for CoreError {
    fn from(err: sunprobe_api::Error) -> Self {
        match err {
            sunprobe_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            sunprobe_api::Error::CredentialMissing {
                source_desc,
                reason,
            } => CoreError::CredentialMissing {
                source_desc,
                reason,
            },
            sunprobe_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() || e.is_request() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            sunprobe_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            sunprobe_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            sunprobe_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            sunprobe_api::Error::Status { status, path } => CoreError::Api {
                message: format!("HTTP {status} from {path}"),
                status: Some(status),
            },
            sunprobe_api::Error::Deserialization { message, body: _ } => CoreError::Api {
                message,
                status: None,
            },
            sunprobe_api::Error::Io(e) => CoreError::Internal(format!("I/O error: {e}")),
        }
    }
}
