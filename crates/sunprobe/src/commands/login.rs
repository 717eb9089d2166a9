//! `sunprobe login`: username/password sign-in that yields a session cookie.

use std::io::IsTerminal;

use dialoguer::Input;
use secrecy::{ExposeSecret, SecretString};

use sunprobe_api::{FileSource, PortalClient};
use sunprobe_config::ConfigError;

use crate::cli::{CookieStore, GlobalOpts, LoginArgs};
use crate::commands::util;
use crate::config::{self, KeyringSource, ResolvedProfile};
use crate::error::CliError;

fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Username and password from flags, profile, env or keyring; prompts for
/// whatever is missing when attached to a terminal.
fn credentials(
    args: &LoginArgs,
    resolved: &ResolvedProfile,
) -> Result<(String, SecretString), CliError> {
    let mut profile = resolved.profile.clone();
    if let Some(ref username) = args.username {
        profile.username = Some(username.clone());
    }

    match sunprobe_config::resolve_login_credentials(&profile, &resolved.name) {
        Ok(found) => return Ok(found),
        Err(ConfigError::NoCredentials { .. }) if std::io::stdin().is_terminal() => {}
        Err(e) => return Err(e.into()),
    }

    let username = match profile
        .username
        .or_else(|| std::env::var("SUNPROBE_USERNAME").ok())
    {
        Some(u) => u,
        None => Input::new()
            .with_prompt("Username")
            .interact_text()
            .map_err(prompt_err)?,
    };
    let password = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
    if username.is_empty() || password.is_empty() {
        return Err(CliError::Validation {
            field: "credentials".into(),
            reason: "username and password cannot be empty".into(),
        });
    }
    Ok((username, SecretString::from(password)))
}

pub async fn handle(args: LoginArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let resolved = config::resolve(global)?;
    let acq_config = resolved.acquisition_config(None)?;
    let (username, password) = credentials(&args, &resolved)?;

    let transport = acq_config.transport().with_cookie_jar();
    let client = PortalClient::new(acq_config.portal.clone(), &transport)?;

    let spinner = util::spinner(global, "Signing in...");
    let result = client.login(&username, &password).await;
    spinner.finish_and_clear();
    let cookie = result.map_err(|e| CliError::from(e).for_profile(&resolved.name))?;

    match args.store {
        CookieStore::File => {
            let path = sunprobe_config::cookie_file(&resolved.profile, &resolved.name);
            FileSource::new(path.clone()).store(&cookie)?;
            if !global.quiet {
                eprintln!("✓ Session cookie written to {}", path.display());
            }
        }
        CookieStore::Keyring => {
            KeyringSource::cookie(&resolved.name).store(&cookie)?;
            if !global.quiet {
                eprintln!(
                    "✓ Session cookie stored in the system keyring for profile '{}'",
                    resolved.name
                );
            }
        }
        CookieStore::Stdout => println!("{}", cookie.expose_secret()),
    }
    Ok(())
}
