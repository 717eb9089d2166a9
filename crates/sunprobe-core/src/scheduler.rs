// ── Retry / backoff scheduler ──
//
// Decides when the next acquisition runs. Success and "portal reachable
// but unhelpful" outcomes keep the regular update interval; transient
// failures back off exponentially between a floor and a ceiling until
// `max_retries` is exceeded. The latest good record stays in the
// published snapshot while failures persist.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::acquisition::Acquirer;
use crate::model::{AcquisitionError, AcquisitionOutcome, MeasurementRecord};

pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_RETRY_FLOOR: Duration = Duration::from_secs(60);
pub const DEFAULT_RETRY_CEILING: Duration = Duration::from_secs(300);
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Exponential delay: `min(floor * 2^(n-1), ceiling)` for failure `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backoff {
    pub floor: Duration,
    pub ceiling: Duration,
}

impl Backoff {
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        Self {
            floor,
            ceiling: ceiling.max(floor),
        }
    }

    /// Delay before the retry following the `failures`-th consecutive failure.
    pub fn delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.checked_pow(failures - 1).unwrap_or(u32::MAX);
        self.floor
            .checked_mul(factor)
            .map_or(self.ceiling, |d| d.min(self.ceiling))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_FLOOR, DEFAULT_RETRY_CEILING)
    }
}

/// Timing for repeated acquisitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub update_interval: Duration,
    pub backoff: Backoff,
    /// Transient failures that escalate the backoff before falling back
    /// to the regular interval.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            update_interval: DEFAULT_UPDATE_INTERVAL,
            backoff: Backoff::default(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// What a dashboard shows between acquisitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    /// Most recent successful record; kept across failures.
    pub last_good: Option<MeasurementRecord>,
    /// Failure of the latest attempt, cleared on success.
    pub last_error: Option<AcquisitionError>,
    /// Consecutive failed attempts.
    pub retry_count: u32,
    pub max_retries: u32,
    #[serde(with = "duration_ms")]
    pub next_attempt_in: Duration,
    pub updated_at: Option<DateTime<Utc>>,
}

impl DashboardSnapshot {
    /// Nothing to display but an error.
    pub fn is_blocked(&self) -> bool {
        self.last_good.is_none() && self.last_error.is_some()
    }

    /// `(Retry n/max)` while failures persist.
    pub fn retry_indicator(&self) -> Option<String> {
        (self.retry_count > 0).then(|| format!("(Retry {}/{})", self.retry_count, self.max_retries))
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

// ── Scheduler ────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Scheduler {
    policy: RetryPolicy,
    transient_streak: u32,
    snapshot: watch::Sender<DashboardSnapshot>,
}

impl Scheduler {
    pub fn new(policy: RetryPolicy) -> Self {
        let (snapshot, _) = watch::channel(DashboardSnapshot {
            max_retries: policy.max_retries,
            ..DashboardSnapshot::default()
        });
        Self {
            policy,
            transient_streak: 0,
            snapshot,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Subscribe to dashboard snapshots.
    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Delay before the next attempt, given the latest outcome.
    pub fn next_delay(&mut self, outcome: &AcquisitionOutcome) -> Duration {
        match outcome {
            AcquisitionOutcome::Transient { .. } => {
                self.transient_streak = self.transient_streak.saturating_add(1);
                if self.transient_streak <= self.policy.max_retries {
                    self.policy.backoff.delay(self.transient_streak)
                } else {
                    self.policy.update_interval
                }
            }
            AcquisitionOutcome::Success(_) => {
                self.transient_streak = 0;
                self.policy.update_interval
            }
            AcquisitionOutcome::NoData { .. } | AcquisitionOutcome::AuthError { .. } => {
                self.policy.update_interval
            }
        }
    }

    /// Fold an outcome into the snapshot and return the next delay.
    pub fn record(&mut self, outcome: AcquisitionOutcome) -> Duration {
        let delay = self.next_delay(&outcome);
        let now = Utc::now();
        self.snapshot.send_modify(|snap| {
            snap.next_attempt_in = delay;
            snap.updated_at = Some(now);
            match outcome.into_result() {
                Ok(record) => {
                    snap.last_good = Some(record);
                    snap.last_error = None;
                    snap.retry_count = 0;
                }
                Err(err) => {
                    snap.last_error = Some(err);
                    snap.retry_count = snap.retry_count.saturating_add(1);
                }
            }
        });
        delay
    }

    /// Acquire repeatedly until `cancel` fires.
    pub async fn run(mut self, acquirer: Acquirer, cancel: CancellationToken) {
        info!(
            interval_secs = self.policy.update_interval.as_secs(),
            max_retries = self.policy.max_retries,
            "scheduler started"
        );

        loop {
            // Not raced against `cancel`: the acquisition observes the token
            // itself and must run to an outcome so its state returns to idle.
            let outcome = acquirer.request_acquisition_with_cancel(&cancel).await;
            if cancel.is_cancelled() {
                break;
            }

            let delay = self.record(outcome);
            debug!(delay = ?delay, "next acquisition scheduled");

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        info!("scheduler stopped");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{ErrorKind, Provenance, RecordStatus};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn transient() -> AcquisitionOutcome {
        AcquisitionOutcome::Transient {
            reason: "timed out".into(),
        }
    }

    fn success() -> AcquisitionOutcome {
        AcquisitionOutcome::Success(MeasurementRecord {
            current_power: Some(1200.0),
            daily_energy: Some(4.2),
            monthly_energy: None,
            yearly_energy: None,
            total_energy: None,
            voltage: None,
            current: None,
            efficiency: None,
            fields: indexmap::IndexMap::new(),
            metadata: indexmap::IndexMap::new(),
            provenance: Provenance {
                endpoint: "/live".into(),
                timestamp: Utc::now(),
                status: RecordStatus::Success,
                estimated_from_vi: false,
                estimated_daily: false,
                value_count: 2,
                methods: Vec::new(),
            },
        })
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            update_interval: ms(600_000),
            backoff: Backoff::new(ms(60_000), ms(300_000)),
            max_retries: 5,
        }
    }

    #[test]
    fn backoff_doubles_up_to_ceiling() {
        let backoff = Backoff::new(ms(60_000), ms(300_000));
        let delays: Vec<_> = (1..=5).map(|n| backoff.delay(n)).collect();
        assert_eq!(
            delays,
            vec![ms(60_000), ms(120_000), ms(240_000), ms(300_000), ms(300_000)]
        );
        assert_eq!(backoff.delay(64), ms(300_000));
    }

    #[test]
    fn transient_failures_escalate_and_success_resets() {
        let mut scheduler = Scheduler::new(policy());
        assert_eq!(scheduler.next_delay(&transient()), ms(60_000));
        assert_eq!(scheduler.next_delay(&transient()), ms(120_000));
        assert_eq!(scheduler.next_delay(&transient()), ms(240_000));
        assert_eq!(scheduler.next_delay(&transient()), ms(300_000));

        assert_eq!(scheduler.next_delay(&success()), ms(600_000));
        assert_eq!(scheduler.next_delay(&transient()), ms(60_000));
    }

    #[test]
    fn escalation_stops_after_max_retries() {
        let mut scheduler = Scheduler::new(RetryPolicy {
            max_retries: 2,
            ..policy()
        });
        assert_eq!(scheduler.next_delay(&transient()), ms(60_000));
        assert_eq!(scheduler.next_delay(&transient()), ms(120_000));
        assert_eq!(scheduler.next_delay(&transient()), ms(600_000));
    }

    #[test]
    fn unhelpful_portal_keeps_regular_interval() {
        let mut scheduler = Scheduler::new(policy());
        let no_data = AcquisitionOutcome::NoData {
            endpoints_tried: vec!["/a".into()],
            hint: "none".into(),
        };
        let auth = AcquisitionOutcome::AuthError {
            message: "HTTP 403".into(),
        };
        assert_eq!(scheduler.next_delay(&no_data), ms(600_000));
        assert_eq!(scheduler.next_delay(&auth), ms(600_000));
        assert_eq!(scheduler.next_delay(&transient()), ms(60_000));
    }

    #[test]
    fn snapshot_keeps_last_good_across_failures() {
        let mut scheduler = Scheduler::new(policy());
        let rx = scheduler.subscribe();

        scheduler.record(success());
        scheduler.record(transient());
        scheduler.record(transient());

        let snap = rx.borrow().clone();
        assert_eq!(snap.last_good.as_ref().unwrap().current_power, Some(1200.0));
        assert_eq!(snap.retry_count, 2);
        assert_eq!(snap.retry_indicator().as_deref(), Some("(Retry 2/5)"));
        assert_eq!(snap.next_attempt_in, ms(120_000));
        assert!(!snap.is_blocked());

        scheduler.record(success());
        let snap = scheduler.snapshot();
        assert_eq!(snap.retry_count, 0);
        assert!(snap.last_error.is_none());
        assert_eq!(snap.retry_indicator(), None);
    }

    #[test]
    fn failure_without_history_blocks() {
        let mut scheduler = Scheduler::new(policy());
        scheduler.record(AcquisitionOutcome::AuthError {
            message: "no cookie".into(),
        });
        let snap = scheduler.snapshot();
        assert!(snap.is_blocked());
        assert_eq!(
            snap.last_error.map(|e| e.kind),
            Some(ErrorKind::Authentication)
        );
    }
}
