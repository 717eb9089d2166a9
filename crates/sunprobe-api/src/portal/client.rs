// Portal HTTP client
//
// Wraps `reqwest::Client` with portal URL construction, browser-like
// request headers, cookie-authenticated GETs and status classification.
// Endpoint-specific calls live in sibling modules as inherent methods.

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONTENT_TYPE, COOKIE, HeaderValue, REFERER,
};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::session::Credential;
use crate::transport::TransportConfig;

/// `Accept` header sent on probe requests: the portal answers either JSON or HTML.
pub(crate) const PROBE_ACCEPT: &str = "application/json, text/html, */*";

/// `Accept` header for page navigations in the login flow.
pub(crate) const HTML_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// Path of the dashboard page, used as `Referer`.
const DASHBOARD_PATH: &str = "/dashboard";

/// A successful (HTTP 200) portal response, body already read.
#[derive(Debug, Clone)]
pub struct PortalResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
    /// Final URL after redirects.
    pub url: Url,
}

/// Raw HTTP client for the portal.
///
/// Every data request carries the session cookie explicitly from a
/// [`Credential`]; the internal cookie jar is only used by the login flow.
pub struct PortalClient {
    http: reqwest::Client,
    base_url: Url,
    timeout_secs: u64,
    cookie_jar: Option<Arc<Jar>>,
}

impl std::fmt::Debug for PortalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

impl PortalClient {
    /// Create a new portal client from a `TransportConfig`.
    ///
    /// If the config doesn't already include a cookie jar, one is created
    /// so that [`login`](Self::login) can capture the session cookies.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };
        let cookie_jar = config.cookie_jar.clone();
        let http = config.build_client()?;
        Ok(Self {
            http,
            base_url,
            timeout_secs: config.timeout_secs(),
            cookie_jar,
        })
    }

    /// The underlying HTTP client (for auth flows that need direct access).
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// The portal base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Cookie header accumulated in the jar for the portal origin.
    pub fn cookie_header(&self) -> Option<String> {
        let jar = self.cookie_jar.as_ref()?;
        let cookies = jar.cookies(&self.base_url)?;
        cookies.to_str().ok().map(String::from)
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a full URL for a portal path (may carry a query string).
    pub fn url_for(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let full = if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        };
        Ok(Url::parse(&full)?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Issue one authenticated GET against a candidate path.
    ///
    /// Returns the body for HTTP 200. 401/403 map to
    /// [`Error::Authentication`]; every other status to [`Error::Status`].
    pub async fn fetch(&self, path: &str, credential: &Credential) -> Result<PortalResponse, Error> {
        let url = self.url_for(path)?;
        debug!("GET {}", url);

        let resp = self
            .authenticated(self.http.get(url), credential)
            .header(ACCEPT, PROBE_ACCEPT)
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(Error::Authentication {
                message: format!("portal rejected the session (HTTP {})", status.as_u16()),
            });
        }
        if status != reqwest::StatusCode::OK {
            return Err(Error::Status {
                status: status.as_u16(),
                path: path.to_owned(),
            });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let url = resp.url().clone();
        let body = resp.text().await.map_err(|e| self.transport_error(e))?;
        trace!(bytes = body.len(), content_type = ?content_type, "response body read");

        Ok(PortalResponse {
            status: status.as_u16(),
            content_type,
            body,
            url,
        })
    }

    /// GET a JSON resource and deserialize it.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        credential: &Credential,
        query: &[(&str, String)],
    ) -> Result<T, Error> {
        let mut url = self.url_for(path)?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        debug!("GET {}", url);

        let resp = self
            .authenticated(self.http.get(url), credential)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(Error::Authentication {
                message: format!("portal rejected the session (HTTP {})", status.as_u16()),
            });
        }
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                path: path.to_owned(),
            });
        }

        let body = resp.text().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_str(&body).map_err(|e| {
            let preview = body.chars().take(200).collect::<String>();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })
    }

    /// Attach the session cookie and the browser-like headers the portal expects.
    fn authenticated(
        &self,
        builder: reqwest::RequestBuilder,
        credential: &Credential,
    ) -> reqwest::RequestBuilder {
        let mut builder = builder
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header(CACHE_CONTROL, "no-cache");

        match HeaderValue::from_str(credential.cookie_header()) {
            Ok(mut value) => {
                value.set_sensitive(true);
                builder = builder.header(COOKIE, value);
            }
            Err(_) => debug!("session credential is not a valid header value; sending without it"),
        }

        if let Ok(referer) = self.url_for(DASHBOARD_PATH) {
            builder = builder.header(REFERER, referer.as_str());
        }
        builder
    }

    /// Map a reqwest failure, turning timeouts into [`Error::Timeout`].
    pub(crate) fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            Error::Transport(err)
        }
    }
}
