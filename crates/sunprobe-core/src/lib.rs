//! Data-acquisition core between `sunprobe-api` and its consumers (CLI).
//!
//! - **[`Acquirer`]** runs one acquisition at a time: it takes the session
//!   credential from the [`SessionStore`](sunprobe_api::SessionStore), probes
//!   the candidate endpoints in order, and folds the result into exactly one
//!   [`AcquisitionOutcome`].
//!
//! - **[`extract`]** turns a portal response (JSON, HTML with embedded
//!   script data, HTML tables, free text) into a flat
//!   [`RawExtractionRecord`].
//!
//! - **[`classify`]** maps raw keys onto the canonical
//!   [`MeasurementRecord`] using unit and keyword heuristics, with flagged
//!   estimates for missing power or energy.
//!
//! - **[`Scheduler`]** decides when to acquire again and publishes a
//!   [`DashboardSnapshot`] that keeps the last good record visible while
//!   failures persist.
//!
//! - **[`history`]** fetches short measurement series from the structured
//!   plant endpoints.

pub mod acquisition;
pub mod classify;
pub mod config;
pub mod error;
pub mod extract;
pub mod history;
pub mod model;
pub mod prober;
pub mod scheduler;

// ── Primary re-exports ──────────────────────────────────────────────
pub use acquisition::{Acquirer, AcquisitionState};
pub use classify::{classify, classify_at};
pub use config::{AcquisitionConfig, EndpointPreset, ExtractionProfile};
pub use error::CoreError;
pub use extract::{ResponseShape, extract};
pub use history::{HistoryPeriod, HistoryPoint, HistorySeries};
pub use model::{
    AcquisitionError, AcquisitionOutcome, CanonicalField, ErrorKind, ExtractionMethod,
    MeasurementRecord, Provenance, RawExtractionRecord, RecordStatus,
};
pub use prober::{AttemptOutcome, EndpointAttempt, ProbeReport, ProbeResult, Prober};
pub use scheduler::{Backoff, DashboardSnapshot, RetryPolicy, Scheduler};
