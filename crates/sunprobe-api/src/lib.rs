// sunprobe-api: Session-authenticated HTTP client for undocumented solar portals

pub mod error;
pub mod portal;
pub mod session;
pub mod transport;

pub use error::Error;
pub use portal::{MeasurementPoint, MeasurementsEnvelope, PortalClient, PortalResponse};
pub use session::{
    Credential, CredentialSource, DEFAULT_SESSION_TTL, EnvSource, FileSource, SessionStore,
    StaticSource,
};
pub use transport::{TlsMode, TransportConfig};
