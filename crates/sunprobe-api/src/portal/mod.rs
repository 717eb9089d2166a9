// Portal API client modules
//
// Hand-written client for the portal's undocumented endpoints. The portal
// has no stable contract: `client` owns transport mechanics, `auth` the
// interactive login flow, `plants` the structured history endpoints.

pub mod auth;
pub mod client;
pub mod models;
pub mod plants;

pub use client::{PortalClient, PortalResponse};
pub use models::{MeasurementPoint, MeasurementsEnvelope};
