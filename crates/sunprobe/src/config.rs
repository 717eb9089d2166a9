//! CLI configuration: thin wrapper around `sunprobe_config` shared types.
//!
//! Re-exports the shared types and adds resolution that respects
//! `GlobalOpts` flag overrides (--portal, --cookie-file, --timeout, ...).

use sunprobe_api::{CredentialSource, FileSource, TlsMode};
use sunprobe_core::{AcquisitionConfig, Acquirer};

use crate::cli::{FetchArgs, GlobalOpts};
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use sunprobe_config::{
    Config, Defaults, KeyringSource, Profile, config_path, load_config_or_default, save_config,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .unwrap_or_else(|| config.active_profile_name().to_owned())
}

/// Profile selected by flags, with flag overrides applied.
///
/// An unknown profile name given with `--profile` is an error; with no
/// profile configured at all the built-in defaults are used, so a bare
/// `--portal` + `--cookie-file` invocation works without a config file.
pub struct ResolvedProfile {
    pub name: String,
    pub profile: Profile,
    pub defaults: Defaults,
}

pub fn resolve(global: &GlobalOpts) -> Result<ResolvedProfile, CliError> {
    let cfg = load_config_or_default();
    let name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profiles.get(&name) {
        Some(p) => p.clone(),
        None if global.profile.is_some() => {
            let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
            available.sort();
            return Err(CliError::ProfileNotFound {
                name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            });
        }
        None => Profile::default(),
    };

    if let Some(ref portal) = global.portal {
        profile.portal.clone_from(portal);
    }
    if let Some(ref path) = global.cookie_file {
        profile.cookie_file = Some(path.clone());
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }

    Ok(ResolvedProfile {
        name,
        profile,
        defaults: cfg.defaults,
    })
}

impl ResolvedProfile {
    /// Acquisition settings with fetch-level overrides applied.
    pub fn acquisition_config(
        &self,
        fetch: Option<&FetchArgs>,
    ) -> Result<AcquisitionConfig, CliError> {
        let mut config =
            sunprobe_config::profile_to_acquisition_config(&self.profile, &self.defaults)?;
        if let Some(args) = fetch {
            if !args.endpoints.is_empty() {
                config.endpoints.clone_from(&args.endpoints);
            }
            if args.degraded {
                config.degraded_fallback = true;
            }
        }
        if matches!(config.tls, TlsMode::DangerAcceptInvalid) {
            tracing::warn!("TLS certificate verification is disabled");
        }
        Ok(config)
    }

    /// Where the session cookie comes from.
    ///
    /// An explicit `--cookie-file` is used on its own; otherwise the
    /// profile's env var → keyring → cookie file chain.
    pub fn cookie_source(&self, global: &GlobalOpts) -> Box<dyn CredentialSource> {
        match global.cookie_file {
            Some(ref path) => Box::new(FileSource::new(path.clone())),
            None => Box::new(sunprobe_config::resolve_cookie_source(
                &self.profile,
                &self.name,
            )),
        }
    }
}

/// Build an acquirer for the active profile.
pub fn build_acquirer(
    global: &GlobalOpts,
    fetch: Option<&FetchArgs>,
) -> Result<(ResolvedProfile, Acquirer), CliError> {
    let resolved = resolve(global)?;
    let config = resolved.acquisition_config(fetch)?;
    tracing::debug!(
        profile = %resolved.name,
        portal = %config.portal,
        endpoints = config.candidate_endpoints().len(),
        "acquisition configured"
    );
    let acquirer = Acquirer::new(config, resolved.cookie_source(global))?;
    Ok((resolved, acquirer))
}
