// ── Runtime acquisition configuration ──
//
// These types describe *what* to probe and *how* to interpret it. They
// carry no credential material and never touch disk: the CLI builds an
// `AcquisitionConfig` from its profile and hands it in together with a
// credential source.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sunprobe_api::{DEFAULT_SESSION_TTL, TlsMode, TransportConfig};
use url::Url;

use crate::scheduler::RetryPolicy;

/// Portal used when nothing else is configured.
pub const DEFAULT_PORTAL: &str = "https://ennexos.sunnyportal.com";

/// Delay between consecutive endpoint probes.
pub const DEFAULT_PROBE_DELAY: Duration = Duration::from_millis(500);

/// Maximum nesting depth the JSON walk descends into.
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Key fragments that make a JSON leaf worth collecting.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "power",
    "energy",
    "production",
    "current",
    "voltage",
    "plant",
    "solar",
    "pv",
    "inverter",
    "generation",
    "yield",
    "kwh",
    "kw",
    "watt",
    "live",
    "total",
    "today",
    "daily",
    "monthly",
    "yearly",
    "accumulated",
    "feed",
];

/// Global script variables that commonly hold page state.
pub const DEFAULT_SCRIPT_GLOBALS: &[&str] = &["data", "initialData", "__INITIAL_STATE__"];

const ENNEXOS_ENDPOINTS: &[&str] = &[
    "/api/v1/plants",
    "/api/v1/navigation",
    "/api/dt/plants/Plant:1/components/all/system-time/v2/properties",
    "/api/v1/powerflow/livedata",
    "/dashboard/data",
    "/live/data",
];

const LIVE_ENDPOINTS: &[&str] = &[
    "/api/v1/powerflow/livedata",
    "/api/powerflow/livedata",
    "/dashboard/livedata",
    "/api/dashboard/current",
    "/live",
];

/// Built-in candidate endpoint lists.
///
/// Portal generations differ mainly in which undocumented paths answer,
/// so each is a data preset rather than a separate code path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointPreset {
    /// ennexOS plant, navigation and dashboard resources.
    #[default]
    Ennexos,
    /// Power-flow live data endpoints.
    Live,
}

impl EndpointPreset {
    pub fn endpoints(self) -> Vec<String> {
        let paths = match self {
            Self::Ennexos => ENNEXOS_ENDPOINTS,
            Self::Live => LIVE_ENDPOINTS,
        };
        paths.iter().map(|p| (*p).to_owned()).collect()
    }
}

impl std::fmt::Display for EndpointPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ennexos => f.write_str("ennexos"),
            Self::Live => f.write_str("live"),
        }
    }
}

impl std::str::FromStr for EndpointPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ennexos" => Ok(Self::Ennexos),
            "live" => Ok(Self::Live),
            other => Err(format!("unknown endpoint preset '{other}' (expected ennexos or live)")),
        }
    }
}

/// Tuning for the response extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionProfile {
    /// Lower-case key fragments; a JSON leaf is kept when its key contains one.
    pub keywords: Vec<String>,
    /// Maximum JSON nesting depth.
    pub max_depth: usize,
    /// Global names whose object-literal assignment is parsed from scripts.
    pub script_globals: Vec<String>,
}

impl Default for ExtractionProfile {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|k| (*k).to_owned()).collect(),
            max_depth: DEFAULT_MAX_DEPTH,
            script_globals: DEFAULT_SCRIPT_GLOBALS
                .iter()
                .map(|k| (*k).to_owned())
                .collect(),
        }
    }
}

impl ExtractionProfile {
    /// Whether a JSON key names something worth collecting.
    pub fn is_relevant(&self, key: &str) -> bool {
        let key = key.to_ascii_lowercase();
        self.keywords.iter().any(|k| key.contains(k.as_str()))
    }
}

/// Everything one acquisition needs besides the credential source.
///
/// Built by the CLI, passed to [`Acquirer`](crate::Acquirer); core never
/// reads config files.
#[derive(Debug, Clone)]
pub struct AcquisitionConfig {
    /// Portal base URL.
    pub portal: Url,
    /// Explicit candidate endpoints in priority order. Empty = use `preset`.
    pub endpoints: Vec<String>,
    /// Fallback endpoint list.
    pub preset: EndpointPreset,
    /// Pause between consecutive probes.
    pub probe_delay: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
    /// TLS verification strategy.
    pub tls: TlsMode,
    /// How long a loaded credential is reused before the source is re-read.
    pub session_ttl: Duration,
    /// Return the last non-empty extraction as a degraded record when no
    /// endpoint produced a meaningful one.
    pub degraded_fallback: bool,
    pub extraction: ExtractionProfile,
    pub retry: RetryPolicy,
}

impl AcquisitionConfig {
    pub fn new(portal: Url) -> Self {
        Self {
            portal,
            endpoints: Vec::new(),
            preset: EndpointPreset::default(),
            probe_delay: DEFAULT_PROBE_DELAY,
            timeout: sunprobe_api::transport::DEFAULT_TIMEOUT,
            tls: TlsMode::System,
            session_ttl: DEFAULT_SESSION_TTL,
            degraded_fallback: false,
            extraction: ExtractionProfile::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Candidate endpoints in probe order.
    pub fn candidate_endpoints(&self) -> Vec<String> {
        if self.endpoints.is_empty() {
            self.preset.endpoints()
        } else {
            self.endpoints.clone()
        }
    }

    /// Transport settings for the portal client.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.clone(),
            timeout: self.timeout,
            ..TransportConfig::default()
        }
    }
}
