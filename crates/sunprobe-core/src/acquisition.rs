// ── Acquisition orchestrator ──
//
// Owns the portal client and the session store and runs one acquisition
// at a time: credential → probe → extract → classify → outcome. The
// session store sits behind an async mutex, so a second request queues
// until the first one has produced its outcome.

use std::sync::Arc;

use sunprobe_api::{CredentialSource, PortalClient, SessionStore};
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AcquisitionConfig;
use crate::error::CoreError;
use crate::model::AcquisitionOutcome;
use crate::prober::{ProbeReport, ProbeResult, Prober};

/// Hint attached to no-data outcomes when the portal answered but had
/// nothing usable.
const NO_DATA_HINT: &str = "The portal answered but no endpoint returned recognizable measurements; \
     check the endpoint list or enable degraded_fallback";

/// Observable orchestrator state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AcquisitionState {
    #[default]
    Idle,
    AwaitingCredential,
    Probing,
    Succeeded,
    AuthFailed,
    Exhausted,
}

impl std::fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::AwaitingCredential => "awaiting credential",
            Self::Probing => "probing",
            Self::Succeeded => "succeeded",
            Self::AuthFailed => "authentication failed",
            Self::Exhausted => "exhausted",
        })
    }
}

// ── Acquirer ─────────────────────────────────────────────────────────

/// Entry point for consumers. Cheaply cloneable.
#[derive(Clone)]
pub struct Acquirer {
    inner: Arc<AcquirerInner>,
}

struct AcquirerInner {
    config: AcquisitionConfig,
    client: PortalClient,
    session: Mutex<SessionStore>,
    state: watch::Sender<AcquisitionState>,
}

impl Acquirer {
    /// Build an acquirer with a portal client derived from `config`.
    pub fn new(
        config: AcquisitionConfig,
        source: Box<dyn CredentialSource>,
    ) -> Result<Self, CoreError> {
        let client = PortalClient::new(config.portal.clone(), &config.transport())?;
        Ok(Self::with_client(config, client, source))
    }

    /// Build an acquirer around an existing portal client.
    pub fn with_client(
        config: AcquisitionConfig,
        client: PortalClient,
        source: Box<dyn CredentialSource>,
    ) -> Self {
        let session = SessionStore::new(source, config.session_ttl);
        let (state, _) = watch::channel(AcquisitionState::Idle);
        Self {
            inner: Arc::new(AcquirerInner {
                config,
                client,
                session: Mutex::new(session),
                state,
            }),
        }
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &PortalClient {
        &self.inner.client
    }

    /// Subscribe to state transitions.
    pub fn state(&self) -> watch::Receiver<AcquisitionState> {
        self.inner.state.subscribe()
    }

    pub(crate) fn session(&self) -> &Mutex<SessionStore> {
        &self.inner.session
    }

    fn transition(&self, state: AcquisitionState) {
        debug!(%state, "acquisition state");
        self.inner.state.send_replace(state);
    }

    /// Run one acquisition to completion.
    pub async fn request_acquisition(&self) -> AcquisitionOutcome {
        self.request_acquisition_with_cancel(&CancellationToken::new())
            .await
    }

    /// Run one acquisition, honoring `cancel` between endpoint probes.
    pub async fn request_acquisition_with_cancel(
        &self,
        cancel: &CancellationToken,
    ) -> AcquisitionOutcome {
        let mut session = self.inner.session.lock().await;
        self.transition(AcquisitionState::AwaitingCredential);

        let credential = match session.get_credential() {
            Ok(credential) => credential,
            Err(e) => {
                warn!(
                    source = %session.source_description(),
                    error = %e,
                    "no session credential"
                );
                self.transition(AcquisitionState::AuthFailed);
                self.transition(AcquisitionState::Idle);
                return AcquisitionOutcome::AuthError {
                    message: e.to_string(),
                };
            }
        };

        self.transition(AcquisitionState::Probing);
        let config = &self.inner.config;
        let endpoints = config.candidate_endpoints();
        let report = Prober::new(&self.inner.client, &config.extraction)
            .with_delay(config.probe_delay)
            .with_degraded_fallback(config.degraded_fallback)
            .probe(&endpoints, &credential, cancel)
            .await;

        let (state, outcome) = Self::conclude(report);
        if state == Some(AcquisitionState::AuthFailed) {
            session.invalidate();
        }
        drop(session);

        if let Some(state) = state {
            self.transition(state);
        }
        self.transition(AcquisitionState::Idle);
        outcome
    }

    fn conclude(report: ProbeReport) -> (Option<AcquisitionState>, AcquisitionOutcome) {
        let tried = report.attempts.len();
        let all_transient = report.all_transient();
        let summary = report.summary();

        match report.result {
            ProbeResult::Found(record) | ProbeResult::Degraded(record) => {
                info!(
                    endpoint = %record.provenance.endpoint,
                    status = %record.provenance.status,
                    tried,
                    "acquisition succeeded"
                );
                (
                    Some(AcquisitionState::Succeeded),
                    AcquisitionOutcome::Success(record),
                )
            }
            ProbeResult::Rejected { endpoint, message } => (
                Some(AcquisitionState::AuthFailed),
                AcquisitionOutcome::AuthError {
                    message: format!("{endpoint}: {message}"),
                },
            ),
            ProbeResult::Cancelled => (
                None,
                AcquisitionOutcome::Transient {
                    reason: "acquisition cancelled".into(),
                },
            ),
            ProbeResult::Exhausted if all_transient => {
                let reason = format!("all {tried} endpoint(s) unreachable: {summary}");
                warn!(%reason, "acquisition failed");
                (
                    Some(AcquisitionState::Exhausted),
                    AcquisitionOutcome::Transient { reason },
                )
            }
            ProbeResult::Exhausted => {
                let hint = if tried == 0 {
                    "No candidate endpoints are configured".to_owned()
                } else {
                    format!("{NO_DATA_HINT} ({summary})")
                };
                warn!(tried, "no usable data from any endpoint");
                (
                    Some(AcquisitionState::Exhausted),
                    AcquisitionOutcome::NoData {
                        endpoints_tried: report.attempts.into_iter().map(|a| a.endpoint).collect(),
                        hint,
                    },
                )
            }
        }
    }
}

impl std::fmt::Debug for Acquirer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acquirer")
            .field("portal", &self.inner.config.portal.as_str())
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sunprobe_api::{FileSource, StaticSource};
    use url::Url;

    use super::*;
    use crate::model::ErrorKind;

    fn config(endpoints: &[&str]) -> AcquisitionConfig {
        let mut config = AcquisitionConfig::new(Url::parse("http://127.0.0.1:9").unwrap());
        config.endpoints = endpoints.iter().map(|e| (*e).to_owned()).collect();
        config.probe_delay = std::time::Duration::ZERO;
        config
    }

    #[test]
    fn missing_credential_is_an_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSource::new(dir.path().join("absent.txt"));
        let acquirer = Acquirer::new(config(&["/live"]), Box::new(source)).unwrap();
        let state = acquirer.state();

        let outcome = tokio_test::block_on(acquirer.request_acquisition());
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Authentication));
        assert_eq!(*state.borrow(), AcquisitionState::Idle);
    }

    #[test]
    fn empty_endpoint_list_is_no_data() {
        let mut config = config(&[]);
        config.preset = crate::config::EndpointPreset::Live;
        let acquirer = Acquirer::new(config, Box::new(StaticSource::new("sid=1"))).unwrap();
        let (state, outcome) = Acquirer::conclude(ProbeReport {
            result: ProbeResult::Exhausted,
            attempts: Vec::new(),
        });
        assert_eq!(state, Some(AcquisitionState::Exhausted));
        match outcome {
            AcquisitionOutcome::NoData { endpoints_tried, hint } => {
                assert!(endpoints_tried.is_empty());
                assert!(hint.contains("No candidate endpoints"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(acquirer.config().candidate_endpoints().len(), 5);
    }

    #[test]
    fn cancellation_is_transient() {
        let (state, outcome) = Acquirer::conclude(ProbeReport {
            result: ProbeResult::Cancelled,
            attempts: Vec::new(),
        });
        assert_eq!(state, None);
        assert_eq!(
            outcome,
            AcquisitionOutcome::Transient {
                reason: "acquisition cancelled".into()
            }
        );
    }
}
