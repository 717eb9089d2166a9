#![allow(clippy::unwrap_used)]
// Integration tests for `PortalClient` using wiremock.

use pretty_assertions::assert_eq;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sunprobe_api::{Credential, Error, PortalClient, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, PortalClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = PortalClient::new(base_url, &TransportConfig::default()).unwrap();
    (server, client)
}

fn credential() -> Credential {
    Credential::new(SecretString::from("SESSION=abc123".to_string()))
}

fn secret(s: &str) -> SecretString {
    SecretString::from(s.to_string())
}

// ── Fetch ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_sends_session_and_browser_headers() {
    let (server, client) = setup().await;
    let referer = format!("{}/dashboard", server.uri());

    Mock::given(method("GET"))
        .and(path("/api/v1/powerflow/livedata"))
        .and(header("cookie", "SESSION=abc123"))
        .and(header("x-requested-with", "XMLHttpRequest"))
        .and(header("referer", referer.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "pvPower": 1520 })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client
        .fetch("/api/v1/powerflow/livedata", &credential())
        .await
        .unwrap();

    assert_eq!(resp.status, 200);
    assert_eq!(resp.content_type.as_deref(), Some("application/json"));
    assert!(resp.body.contains("pvPower"));
}

#[tokio::test]
async fn test_fetch_html_page() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/dashboard/data"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html><body>1.5 kW</body></html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let resp = client.fetch("/dashboard/data", &credential()).await.unwrap();
    assert_eq!(resp.content_type.as_deref(), Some("text/html; charset=utf-8"));
    assert_eq!(resp.body, "<html><body>1.5 kW</body></html>");
}

#[tokio::test]
async fn test_fetch_forbidden_is_authentication() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/plants"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let result = client.fetch("/api/v1/plants", &credential()).await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_fetch_unauthorized_is_authentication() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/plants"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.fetch("/api/v1/plants", &credential()).await.unwrap_err();
    assert!(err.is_auth_rejected());
}

#[tokio::test]
async fn test_fetch_not_found_is_status() {
    let (_server, client) = setup().await;

    let err = client.fetch("/live", &credential()).await.unwrap_err();
    assert!(err.is_not_found(), "got {err:?}");
    assert_eq!(err.status(), Some(404));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_fetch_server_error_is_transient() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/live"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client.fetch("/live", &credential()).await.unwrap_err();
    assert!(err.is_transient());
    assert!(!err.is_auth_rejected());
}

#[tokio::test]
async fn test_fetch_connection_refused_is_transient() {
    let base_url = Url::parse("http://127.0.0.1:1").unwrap();
    let client = PortalClient::new(base_url, &TransportConfig::default()).unwrap();

    let err = client.fetch("/live", &credential()).await.unwrap_err();
    assert!(err.is_transient(), "got {err:?}");
}

// ── Plants ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_first_plant_id_and_measurements() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/plants"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "plantId": "P-1" }])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/plants/P-1/measurements"))
        .and(query_param("resolution", "15min"))
        .and(query_param("from", "2024-06-01T00:00:00Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "measurements": [
                { "timestamp": "2024-06-01T10:00:00Z", "power": 1200 },
                { "timestamp": "2024-06-01T10:15:00Z", "energy": "0.3" }
            ]
        })))
        .mount(&server)
        .await;

    let cred = credential();
    let plant = client.first_plant_id(&cred).await.unwrap();
    assert_eq!(plant, "P-1");

    let series = client
        .measurements(&cred, &plant, "2024-06-01T00:00:00Z", "2024-06-01T23:59:59Z", "15min")
        .await
        .unwrap();
    let values: Vec<_> = series.measurements.iter().map(|p| p.value()).collect();
    assert_eq!(values, vec![Some(1200.0), Some(0.3)]);
}

#[tokio::test]
async fn test_empty_plant_listing_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/plants"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "plants": [] })))
        .mount(&server)
        .await;

    let result = client.first_plant_id(&credential()).await;
    assert!(matches!(result, Err(Error::Deserialization { .. })));
}

// ── Login ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_direct_form() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<form method="post" action="/auth/login">
                 <input type="hidden" name="csrf" value="tok-1">
                 <input type="password" name="password">
               </form>"#,
            "text/html",
        ))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_string_contains("csrf=tok-1"))
        .and(body_string_contains("username=alice"))
        .and(body_string_contains("password=hunter2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "SESSION=fresh; Path=/")
                .set_body_raw("<html>dashboard</html>", "text/html"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let cookie = client.login("alice", &secret("hunter2")).await.unwrap();
    assert!(cookie.expose_secret().contains("SESSION=fresh"));
}

#[tokio::test]
async fn test_login_via_identity_provider() {
    let (portal, client) = setup().await;
    let idp = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("{}/authorize?client_id=portal", idp.uri())),
        )
        .mount(&portal)
        .await;

    Mock::given(method("GET"))
        .and(path("/authorize"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<form id="kc-form-login" action="/authenticate?session_code=s1&amp;tab_id=t1" method="post">
                 <input type="hidden" name="execution" value="e1">
                 <input type="text" name="username">
                 <input type="password" name="password">
               </form>"#,
            "text/html",
        ))
        .mount(&idp)
        .await;

    Mock::given(method("POST"))
        .and(path("/authenticate"))
        .and(query_param("session_code", "s1"))
        .and(query_param("tab_id", "t1"))
        .and(body_string_contains("execution=e1"))
        .and(body_string_contains("email=alice%40example.com"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("{}/dashboard", portal.uri())),
        )
        .expect(1)
        .mount(&idp)
        .await;

    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "SESSION=from-idp; Path=/")
                .set_body_raw("<html>ok</html>", "text/html"),
        )
        .mount(&portal)
        .await;

    let cookie = client
        .login("alice@example.com", &secret("hunter2"))
        .await
        .unwrap();
    assert!(cookie.expose_secret().contains("SESSION=from-idp"));
}

#[tokio::test]
async fn test_login_rejected_by_identity_provider() {
    let (portal, client) = setup().await;
    let idp = MockServer::start().await;

    let form = r#"<form action="/authenticate" method="post">
                    <input type="password" name="password">
                  </form>"#;

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", format!("{}/authorize", idp.uri())),
        )
        .mount(&portal)
        .await;

    Mock::given(method("GET"))
        .and(path("/authorize"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(form, "text/html"))
        .mount(&idp)
        .await;

    Mock::given(method("POST"))
        .and(path("/authenticate"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(form, "text/html"))
        .mount(&idp)
        .await;

    let result = client.login("alice", &secret("wrong")).await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_login_server_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client.login("alice", &secret("pw")).await.unwrap_err();
    assert!(err.is_auth_rejected());
}
