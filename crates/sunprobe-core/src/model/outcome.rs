// ── Acquisition outcome ──
//
// Exactly one of these is produced per acquisition attempt. The
// serializable `AcquisitionError` is the failure contract consumers
// render.

use serde::{Deserialize, Serialize};

use super::measurement::MeasurementRecord;

/// Hint attached to authentication failures.
pub const AUTH_HINT: &str =
    "Refresh the session cookie (run `sunprobe login` or update the cookie file) and try again";

/// Result of one acquisition attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionOutcome {
    Success(MeasurementRecord),
    /// No usable credential, or the portal rejected it.
    AuthError { message: String },
    /// Every endpoint was tried; none yielded a usable record.
    NoData {
        endpoints_tried: Vec<String>,
        hint: String,
    },
    /// Network-level trouble; worth retrying sooner.
    Transient { reason: String },
}

/// Failure category exposed to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    NoData,
    Transient,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Authentication => "authentication",
            Self::NoData => "no_data",
            Self::Transient => "transient",
        })
    }
}

/// Tagged failure delivered to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct AcquisitionError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl AcquisitionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Failure category, `None` for success.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success(_) => None,
            Self::AuthError { .. } => Some(ErrorKind::Authentication),
            Self::NoData { .. } => Some(ErrorKind::NoData),
            Self::Transient { .. } => Some(ErrorKind::Transient),
        }
    }

    pub fn into_result(self) -> Result<MeasurementRecord, AcquisitionError> {
        match self {
            Self::Success(record) => Ok(record),
            Self::AuthError { message } => Err(AcquisitionError {
                kind: ErrorKind::Authentication,
                message,
                hint: Some(AUTH_HINT.to_owned()),
            }),
            Self::NoData {
                endpoints_tried,
                hint,
            } => Err(AcquisitionError {
                kind: ErrorKind::NoData,
                message: format!(
                    "no usable data from {} endpoint(s): {}",
                    endpoints_tried.len(),
                    endpoints_tried.join(", ")
                ),
                hint: Some(hint),
            }),
            Self::Transient { reason } => Err(AcquisitionError {
                kind: ErrorKind::Transient,
                message: reason,
                hint: None,
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn no_data_lists_endpoints_and_serializes_kind() {
        let outcome = AcquisitionOutcome::NoData {
            endpoints_tried: vec!["/a".into(), "/b".into()],
            hint: "check the endpoint list".into(),
        };
        assert_eq!(outcome.error_kind(), Some(ErrorKind::NoData));

        let err = outcome.into_result().unwrap_err();
        assert!(err.message.contains("/a, /b"));

        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "no_data");
        assert_eq!(json["hint"], "check the endpoint list");
    }

    #[test]
    fn transient_has_no_hint() {
        let err = AcquisitionOutcome::Transient {
            reason: "timeout".into(),
        }
        .into_result()
        .unwrap_err();
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "transient");
        assert!(json.get("hint").is_none());
    }
}
