// Interactive login flow
//
// The portal delegates sign-in to an external identity provider: GET
// /login redirects to a form on another host, whose hidden inputs must be
// echoed back with the credentials. When no redirect happens the portal's
// own form (or /auth/login) is posted directly. On success the session
// cookies captured in the jar are returned as a single Cookie header.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::header::{ACCEPT, REFERER};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};
use url::Url;

use super::client::{HTML_ACCEPT, PortalClient};
use crate::error::Error;

const LOGIN_PATH: &str = "/login";
const DIRECT_LOGIN_PATH: &str = "/auth/login";

static FORM_ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<form\b[^>]*?\baction\s*=\s*["']([^"']*)["']"#).expect("valid regex")
});

static HIDDEN_INPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<input\b[^>]*?\btype\s*=\s*["']hidden["'][^>]*>"#).expect("valid regex")
});

static NAME_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bname\s*=\s*["']([^"']*)["']"#).expect("valid regex")
});

static VALUE_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bvalue\s*=\s*["']([^"']*)["']"#).expect("valid regex")
});

static PASSWORD_INPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<input\b[^>]*?\btype\s*=\s*["']password["']"#).expect("valid regex")
});

/// A sign-in form scraped from an HTML page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    /// Raw `action` attribute of the first form, entity-decoded.
    pub action: Option<String>,
    /// Hidden inputs in document order.
    pub hidden: Vec<(String, String)>,
}

impl LoginForm {
    pub fn parse(html: &str) -> Self {
        let action = FORM_ACTION
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| decode_entities(m.as_str()))
            .filter(|a| !a.is_empty());

        let hidden = HIDDEN_INPUT
            .find_iter(html)
            .filter_map(|tag| {
                let tag = tag.as_str();
                let name = NAME_ATTR.captures(tag)?.get(1)?.as_str().to_owned();
                let value = VALUE_ATTR
                    .captures(tag)
                    .and_then(|c| c.get(1))
                    .map(|m| decode_entities(m.as_str()))
                    .unwrap_or_default();
                Some((name, value))
            })
            .collect();

        Self { action, hidden }
    }

    /// Resolve the action against the page URL.
    fn target(&self, page: &Url) -> Option<Url> {
        self.action.as_deref().and_then(|a| page.join(a).ok())
    }
}

fn decode_entities(raw: &str) -> String {
    raw.replace("&amp;", "&")
        .replace("&#x3D;", "=")
        .replace("&#61;", "=")
        .replace("&quot;", "\"")
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}

impl PortalClient {
    /// Sign in with username and password and return the session cookie header.
    ///
    /// Follows the identity-provider redirect when the portal issues one,
    /// otherwise posts to the portal's own form. The returned string is
    /// suitable for a cookie file or keyring entry.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<SecretString, Error> {
        let login_url = self.url_for(LOGIN_PATH)?;
        debug!("GET {}", login_url);

        let resp = self
            .http()
            .get(login_url)
            .header(ACCEPT, HTML_ACCEPT)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let page_url = resp.url().clone();
        let page = resp.text().await.map_err(|e| self.transport_error(e))?;
        let form = LoginForm::parse(&page);

        let delegated = !same_origin(&page_url, self.base_url());
        let (action, fields) = if delegated {
            info!(idp = %page_url.host_str().unwrap_or_default(), "login delegated to identity provider");
            let action = match form.target(&page_url) {
                Some(url) => url,
                None => page_url.join(LOGIN_PATH)?,
            };
            let mut fields = form.hidden.clone();
            for key in ["username", "email", "login"] {
                fields.push((key.to_owned(), username.to_owned()));
            }
            fields.push(("password".to_owned(), password.expose_secret().to_owned()));
            (action, fields)
        } else {
            let action = match form.target(&page_url) {
                Some(url) => url,
                None => self.url_for(DIRECT_LOGIN_PATH)?,
            };
            let mut fields = form.hidden.clone();
            fields.push(("username".to_owned(), username.to_owned()));
            fields.push(("password".to_owned(), password.expose_secret().to_owned()));
            (action, fields)
        };

        debug!("POST {}", action);
        let resp = self
            .http()
            .post(action)
            .header(ACCEPT, HTML_ACCEPT)
            .header(REFERER, page_url.as_str())
            .form(&fields)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        let final_url = resp.url().clone();
        let body = resp.text().await.map_err(|e| self.transport_error(e))?;

        // A page still asking for a password means the credentials were refused.
        let back_on_portal = same_origin(&final_url, self.base_url());
        let accepted = status.is_success() && (back_on_portal || !PASSWORD_INPUT.is_match(&body));
        if !accepted {
            return Err(Error::Authentication {
                message: if status.is_success() {
                    "login rejected: identity provider returned the sign-in form again".into()
                } else {
                    format!("login failed (HTTP {})", status.as_u16())
                },
            });
        }

        let cookie = self.cookie_header().filter(|c| !c.is_empty()).ok_or_else(|| {
            Error::Authentication {
                message: "login succeeded but the portal issued no session cookie".into(),
            }
        })?;

        info!("portal login successful");
        Ok(SecretString::from(cookie))
    }
}
