// ── Endpoint prober ──
//
// Walks the candidate endpoint list strictly in order, one request at a
// time, until a response classifies into a meaningful record. Every
// attempt is logged so the orchestrator can tell an unreachable portal
// apart from one that answers but has nothing useful.

use std::time::Duration;

use sunprobe_api::{Credential, PortalClient};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::classify::classify;
use crate::config::ExtractionProfile;
use crate::extract::{ResponseShape, extract};
use crate::model::{MeasurementRecord, RawExtractionRecord, RecordStatus};

/// What happened at one candidate endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Classified into a meaningful record.
    Meaningful,
    /// Answered 200 with values, none of them meaningful.
    NotMeaningful { values: usize },
    /// Answered 200 with nothing extractable.
    Empty,
    NotFound,
    /// Any other non-success status.
    Status(u16),
    /// Timeout, connection failure, 5xx or 429.
    Transient(String),
    /// 401/403.
    Rejected,
}

impl std::fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Meaningful => f.write_str("ok"),
            Self::NotMeaningful { values } => write!(f, "{values} value(s), none usable"),
            Self::Empty => f.write_str("no values"),
            Self::NotFound => f.write_str("not found"),
            Self::Status(code) => write!(f, "HTTP {code}"),
            Self::Transient(reason) => write!(f, "unreachable ({reason})"),
            Self::Rejected => f.write_str("rejected session"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointAttempt {
    pub endpoint: String,
    pub outcome: AttemptOutcome,
}

/// Terminal result of one probe run.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeResult {
    Found(MeasurementRecord),
    /// Best-effort record from the last non-empty extraction.
    Degraded(MeasurementRecord),
    /// The portal rejected the session at `endpoint`.
    Rejected { endpoint: String, message: String },
    Exhausted,
    Cancelled,
}

/// Probe result plus the per-endpoint log.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub result: ProbeResult,
    pub attempts: Vec<EndpointAttempt>,
}

impl ProbeReport {
    pub fn endpoints_tried(&self) -> Vec<String> {
        self.attempts.iter().map(|a| a.endpoint.clone()).collect()
    }

    /// Every attempted endpoint failed at the network level.
    pub fn all_transient(&self) -> bool {
        !self.attempts.is_empty()
            && self
                .attempts
                .iter()
                .all(|a| matches!(a.outcome, AttemptOutcome::Transient(_)))
    }

    /// One line per endpoint, for diagnostics.
    pub fn summary(&self) -> String {
        self.attempts
            .iter()
            .map(|a| format!("{}: {}", a.endpoint, a.outcome))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Sequential prober over a borrowed portal client.
#[derive(Debug)]
pub struct Prober<'a> {
    client: &'a PortalClient,
    profile: &'a ExtractionProfile,
    delay: Duration,
    degraded_fallback: bool,
}

impl<'a> Prober<'a> {
    pub fn new(client: &'a PortalClient, profile: &'a ExtractionProfile) -> Self {
        Self {
            client,
            profile,
            delay: crate::config::DEFAULT_PROBE_DELAY,
            degraded_fallback: false,
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn with_degraded_fallback(mut self, enabled: bool) -> Self {
        self.degraded_fallback = enabled;
        self
    }

    /// Probe `endpoints` in order with one credential.
    ///
    /// Stops at the first meaningful record or at the first 401/403.
    /// Cancellation is honored before each request and during the
    /// inter-request delay.
    pub async fn probe(
        &self,
        endpoints: &[String],
        credential: &Credential,
        cancel: &CancellationToken,
    ) -> ProbeReport {
        let mut attempts = Vec::with_capacity(endpoints.len());
        let mut last_nonempty: Option<RawExtractionRecord> = None;

        for (i, endpoint) in endpoints.iter().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {}
                    () = tokio::time::sleep(self.delay) => {}
                }
            }
            if cancel.is_cancelled() {
                info!(tried = attempts.len(), "probe cancelled");
                return ProbeReport {
                    result: ProbeResult::Cancelled,
                    attempts,
                };
            }

            let response = match self.client.fetch(endpoint, credential).await {
                Ok(response) => response,
                Err(e) if e.is_auth_rejected() => {
                    warn!(endpoint = %endpoint, "portal rejected the session");
                    attempts.push(EndpointAttempt {
                        endpoint: endpoint.clone(),
                        outcome: AttemptOutcome::Rejected,
                    });
                    return ProbeReport {
                        result: ProbeResult::Rejected {
                            endpoint: endpoint.clone(),
                            message: e.to_string(),
                        },
                        attempts,
                    };
                }
                Err(e) => {
                    let outcome = if e.is_not_found() {
                        debug!(endpoint = %endpoint, "endpoint not found, skipping");
                        AttemptOutcome::NotFound
                    } else if e.is_transient() {
                        debug!(endpoint = %endpoint, error = %e, "endpoint unreachable, skipping");
                        AttemptOutcome::Transient(e.to_string())
                    } else {
                        debug!(endpoint = %endpoint, error = %e, "endpoint failed, skipping");
                        e.status().map_or_else(
                            || AttemptOutcome::Transient(e.to_string()),
                            AttemptOutcome::Status,
                        )
                    };
                    attempts.push(EndpointAttempt {
                        endpoint: endpoint.clone(),
                        outcome,
                    });
                    continue;
                }
            };

            let shape = ResponseShape::from_response(&response);
            let raw = extract(&shape, endpoint, self.profile);
            if raw.is_empty() {
                attempts.push(EndpointAttempt {
                    endpoint: endpoint.clone(),
                    outcome: AttemptOutcome::Empty,
                });
                continue;
            }

            let record = classify(&raw);
            if record.is_meaningful() {
                info!(endpoint = %endpoint, values = raw.len(), "meaningful data found");
                attempts.push(EndpointAttempt {
                    endpoint: endpoint.clone(),
                    outcome: AttemptOutcome::Meaningful,
                });
                return ProbeReport {
                    result: ProbeResult::Found(record),
                    attempts,
                };
            }

            debug!(endpoint = %endpoint, values = raw.len(), "extraction not meaningful");
            attempts.push(EndpointAttempt {
                endpoint: endpoint.clone(),
                outcome: AttemptOutcome::NotMeaningful { values: raw.len() },
            });
            last_nonempty = Some(raw);
        }

        let result = match last_nonempty {
            Some(raw) if self.degraded_fallback => {
                warn!(endpoint = %raw.endpoint, "no meaningful data, using last extraction");
                let mut record = classify(&raw);
                record.provenance.status = RecordStatus::Degraded;
                ProbeResult::Degraded(record)
            }
            _ => ProbeResult::Exhausted,
        };
        ProbeReport { result, attempts }
    }
}
