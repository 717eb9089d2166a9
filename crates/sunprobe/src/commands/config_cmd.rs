//! Config subcommand handlers.

use std::collections::HashMap;
use std::path::PathBuf;

use dialoguer::{Input, Select};
use secrecy::SecretString;
use serde::Serialize;
use tabled::Tabled;

use sunprobe_core::EndpointPreset;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Defaults, KeyringSource, Profile};
use crate::error::CliError;
use crate::output;

const SET_KEYS: &str = "portal, cookie_file, cookie_env, endpoints, endpoint_preset, \
     update_interval_ms, retry_delay_ms, retry_ceiling_ms, max_retries, probe_delay_ms, \
     session_ttl_secs, degraded_fallback, username, insecure, timeout, ca_cert";

// ── Helpers ─────────────────────────────────────────────────────────

/// Copy of the config with secrets masked, for every output format.
fn redacted(cfg: &Config) -> Config {
    let profiles = cfg
        .profiles
        .iter()
        .map(|(name, p)| {
            let mut p = p.clone();
            if p.password.is_some() {
                p.password = Some("****".into());
            }
            (name.clone(), p)
        })
        .collect();
    Config {
        default_profile: cfg.default_profile.clone(),
        defaults: Defaults {
            output: cfg.defaults.output.clone(),
            color: cfg.defaults.color.clone(),
            insecure: cfg.defaults.insecure,
            timeout: cfg.defaults.timeout,
        },
        profiles,
    }
}

/// TOML view of the (already redacted) config.
fn format_config(cfg: &Config) -> String {
    toml::to_string_pretty(cfg).unwrap_or_else(|e| format!("# unable to render config: {e}"))
}

fn save_config(cfg: &Config) -> Result<(), CliError> {
    config::save_config(cfg)?;
    Ok(())
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn profile_not_found(name: String, cfg: &Config) -> CliError {
    let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
    available.sort();
    CliError::ProfileNotFound {
        name,
        available: if available.is_empty() {
            "(none)".into()
        } else {
            available.join(", ")
        },
    }
}

fn parse_value<T: std::str::FromStr>(
    field: &str,
    value: &str,
    expected: &str,
) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("must be {expected}"),
    })
}

/// Apply one `config set` assignment to a profile.
fn apply_setting(profile: &mut Profile, key: &str, value: &str) -> Result<(), CliError> {
    const MS: &str = "a number of milliseconds";
    match key.replace('-', "_").as_str() {
        "portal" => profile.portal = value.into(),
        "cookie_file" => profile.cookie_file = Some(PathBuf::from(value)),
        "cookie_env" => profile.cookie_env = Some(value.into()),
        "endpoints" => {
            profile.endpoints = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect();
        }
        "endpoint_preset" => {
            profile.endpoint_preset = value
                .parse::<EndpointPreset>()
                .map_err(|reason| CliError::Validation {
                    field: "endpoint_preset".into(),
                    reason,
                })?;
        }
        "update_interval_ms" => profile.update_interval_ms = Some(parse_value(key, value, MS)?),
        "retry_delay_ms" => profile.retry_delay_ms = Some(parse_value(key, value, MS)?),
        "retry_ceiling_ms" => profile.retry_ceiling_ms = Some(parse_value(key, value, MS)?),
        "probe_delay_ms" => profile.probe_delay_ms = Some(parse_value(key, value, MS)?),
        "max_retries" => profile.max_retries = Some(parse_value(key, value, "a whole number")?),
        "session_ttl_secs" => {
            profile.session_ttl_secs = Some(parse_value(key, value, "a number of seconds")?);
        }
        "degraded_fallback" => {
            profile.degraded_fallback = Some(parse_value(key, value, "'true' or 'false'")?);
        }
        "username" => profile.username = Some(value.into()),
        "insecure" => profile.insecure = Some(parse_value(key, value, "'true' or 'false'")?),
        "timeout" => profile.timeout = Some(parse_value(key, value, "a number (seconds)")?),
        "ca_cert" => profile.ca_cert = Some(PathBuf::from(value)),
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!("unknown config key '{other}'. Valid keys: {SET_KEYS}"),
            });
        }
    }
    Ok(())
}

#[derive(Clone, Serialize, Tabled)]
struct ProfileRow {
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "Portal")]
    portal: String,
    #[tabled(rename = "Endpoints")]
    endpoints: String,
    #[tabled(rename = "Default")]
    default: String,
}

// ── Handler ─────────────────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init ────────────────────────────────────────────────────
        ConfigCommand::Init => {
            let config_path = config::config_path();
            eprintln!("sunprobe configuration setup\n");

            let profile_name: String = Input::new()
                .with_prompt("Profile name")
                .default("default".into())
                .interact_text()
                .map_err(prompt_err)?;

            let portal: String = Input::new()
                .with_prompt("Portal URL")
                .default(sunprobe_core::config::DEFAULT_PORTAL.into())
                .interact_text()
                .map_err(prompt_err)?;
            if portal.parse::<url::Url>().is_err() {
                return Err(CliError::Validation {
                    field: "portal".into(),
                    reason: format!("invalid URL: {portal}"),
                });
            }

            let preset_choices = &[
                "ennexOS plant and dashboard resources",
                "Power-flow live data",
            ];
            let preset = match Select::new()
                .with_prompt("Endpoint set")
                .items(preset_choices)
                .default(0)
                .interact()
                .map_err(prompt_err)?
            {
                0 => EndpointPreset::Ennexos,
                _ => EndpointPreset::Live,
            };

            let cookie_choices = &[
                "Cookie file (paste from the browser or run `sunprobe login`)",
                "System keyring",
                "Environment variable",
            ];
            let mut profile = Profile {
                portal,
                endpoint_preset: preset,
                ..Profile::default()
            };
            match Select::new()
                .with_prompt("Session cookie source")
                .items(cookie_choices)
                .default(0)
                .interact()
                .map_err(prompt_err)?
            {
                0 => {
                    let default_path = sunprobe_config::cookie_file(&profile, &profile_name);
                    let path: String = Input::new()
                        .with_prompt("Cookie file")
                        .default(default_path.display().to_string())
                        .interact_text()
                        .map_err(prompt_err)?;
                    profile.cookie_file = Some(path.into());
                }
                1 => {
                    let cookie = rpassword::prompt_password("Cookie header: ").map_err(prompt_err)?;
                    if !cookie.trim().is_empty() {
                        KeyringSource::cookie(&profile_name).store(&SecretString::from(cookie))?;
                    }
                }
                _ => {
                    let var: String = Input::new()
                        .with_prompt("Variable name")
                        .default("SUNPROBE_COOKIE".into())
                        .interact_text()
                        .map_err(prompt_err)?;
                    profile.cookie_env = Some(var);
                }
            }

            let username: String = Input::new()
                .with_prompt("Portal username (optional, for `sunprobe login`)")
                .allow_empty(true)
                .interact_text()
                .map_err(prompt_err)?;
            if !username.is_empty() {
                profile.username = Some(username);
            }

            let mut profiles = HashMap::new();
            profiles.insert(profile_name.clone(), profile);
            let cfg = Config {
                default_profile: Some(profile_name.clone()),
                defaults: Defaults::default(),
                profiles,
            };
            save_config(&cfg)?;

            eprintln!("\n✓ Configuration written to {}", config_path.display());
            eprintln!("  Active profile: {profile_name}");
            eprintln!("\n  Test it: sunprobe fetch");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(&global.output, &cfg, format_config, format_config);
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        // ── Set <key> <value> ───────────────────────────────────────
        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);
            let profile = cfg.profiles.entry(profile_name.clone()).or_default();

            apply_setting(profile, &key, &value)?;
            sunprobe_config::profile_to_acquisition_config(profile, &cfg.defaults)?;

            save_config(&cfg)?;
            eprintln!("✓ Set {key} on profile '{profile_name}'");
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: sunprobe config init");
                return Ok(());
            }
            let default = cfg.active_profile_name();
            let mut rows: Vec<ProfileRow> = cfg
                .profiles
                .iter()
                .map(|(name, p)| ProfileRow {
                    name: name.clone(),
                    portal: p.portal.clone(),
                    endpoints: if p.endpoints.is_empty() {
                        p.endpoint_preset.to_string()
                    } else {
                        p.endpoints.len().to_string()
                    },
                    default: if name == default { "*".into() } else { String::new() },
                })
                .collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));
            let out = output::render_list(&global.output, &rows, ProfileRow::clone, |r| {
                r.name.clone()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Use <name> ─────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(profile_not_found(name, &cfg));
            }
            cfg.default_profile = Some(name.clone());
            save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }

        // ── SetPassword ─────────────────────────────────────────────
        ConfigCommand::SetPassword { profile, cookie } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            if !cfg.profiles.contains_key(&profile_name) {
                return Err(profile_not_found(profile_name, &cfg));
            }

            let (source, label) = if cookie {
                (KeyringSource::cookie(&profile_name), "Cookie header: ")
            } else {
                (KeyringSource::password(&profile_name), "Password: ")
            };
            let secret = rpassword::prompt_password(label).map_err(prompt_err)?;
            if secret.is_empty() {
                return Err(CliError::Validation {
                    field: "secret".into(),
                    reason: "value cannot be empty".into(),
                });
            }
            source.store(&SecretString::from(secret))?;

            eprintln!("✓ Secret stored in system keyring for profile '{profile_name}'");
            Ok(())
        }
    }
}
