// Domain model: raw extraction output, canonical measurements, outcomes.

pub mod measurement;
pub mod outcome;
pub mod raw;

pub use measurement::{CanonicalField, MeasurementRecord, Provenance, RecordStatus};
pub use outcome::{AcquisitionError, AcquisitionOutcome, ErrorKind};
pub use raw::{ExtractionMethod, RawExtractionRecord, RawValue};
