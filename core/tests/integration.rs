//! End-to-end tests against the live mock build server.
//!
//! # Design
//! Each test starts the mock server on a random port, then drives a
//! `CrumbClient` over real HTTP through the default `ureq` transport.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use crumb_core::{
    AuthenticationError, ClientConfig, ConfigurationError, CrumbClient, SecurityClient,
    SecurityError, UnclassifiedPolicy,
};
use mock_server::{AppState, Journal, View, BIG_BODY_BYTES, SLOW_DELAY};
use tempfile::NamedTempFile;

/// Start the mock server and return its base URL and request journal.
fn start_server(crumb: Option<&str>) -> (String, Arc<Journal>) {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    let state = AppState::new(crumb);
    let journal = state.journal();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener, state).await
        })
        .unwrap();
    });

    (format!("http://{addr}"), journal)
}

fn crumb_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn client_with_crumb(file: &NamedTempFile) -> CrumbClient {
    CrumbClient::new(ClientConfig::default().with_crumb_file(file.path())).unwrap()
}

#[test]
fn fetches_view_with_crumb() {
    let (base, journal) = start_server(Some("abc123"));
    let file = crumb_file("abc123\n");
    let client = client_with_crumb(&file);

    let url = format!("{base}/api/json");
    client.connect(&url).unwrap();
    let body = client.execute(&url).unwrap();
    let view: View = serde_json::from_str(&body).unwrap();
    assert_eq!(view.name, "All");
    assert_eq!(view.jobs[0].name, "build-core");
    assert_eq!(journal.last_crumb().as_deref(), Some("abc123"));
}

#[test]
fn missing_crumb_is_reported() {
    let (base, _journal) = start_server(Some("abc123"));
    let client = CrumbClient::new(ClientConfig::default()).unwrap();

    let err = client.execute(&format!("{base}/api/json")).unwrap_err();
    assert!(matches!(
        err,
        SecurityError::Authentication(AuthenticationError::BadCrumb)
    ));
}

#[test]
fn stale_crumb_is_reported() {
    let (base, _journal) = start_server(Some("abc123"));
    let file = crumb_file("expired\n");
    let client = client_with_crumb(&file);

    let err = client.execute(&format!("{base}/api/json")).unwrap_err();
    assert_eq!(err.to_string(), "CSRF enabled -> Missing or bad crumb data");
}

#[test]
fn follows_one_redirect_with_crumb() {
    let (base, journal) = start_server(Some("abc123"));
    let file = crumb_file("abc123");
    let client = client_with_crumb(&file);

    let body = client.execute(&format!("{base}/redirect")).unwrap();
    let view: View = serde_json::from_str(&body).unwrap();
    assert_eq!(view.jobs.len(), 2);
    assert_eq!(journal.requests(), 2);
}

#[test]
fn second_redirect_is_not_followed() {
    let (base, journal) = start_server(None);
    let client = CrumbClient::new(ClientConfig::default()).unwrap();

    let body = client.execute(&format!("{base}/redirect/twice")).unwrap();
    assert_eq!(body, "/api/json");
    assert_eq!(journal.requests(), 2);
}

#[test]
fn redirect_loop_is_bounded() {
    let (base, journal) = start_server(None);
    let client = CrumbClient::new(ClientConfig::default().with_max_redirects(5)).unwrap();

    let body = client.execute(&format!("{base}/redirect/loop")).unwrap();
    assert_eq!(body, "/redirect/loop");
    assert_eq!(journal.requests(), 6);
}

#[test]
fn authentication_challenges() {
    let (base, _journal) = start_server(None);
    let client = CrumbClient::new(ClientConfig::default()).unwrap();

    let err = client.execute(&format!("{base}/login")).unwrap_err();
    assert!(matches!(
        err,
        SecurityError::Authentication(AuthenticationError::AuthenticationRequired)
    ));

    let err = client.execute(&format!("{base}/denied")).unwrap_err();
    assert!(matches!(
        err,
        SecurityError::Authentication(AuthenticationError::BadCredentials)
    ));
}

#[test]
fn not_found_and_server_error() {
    let (base, _journal) = start_server(None);
    let client = CrumbClient::new(ClientConfig::default()).unwrap();

    let err = client.execute(&format!("{base}/job/missing")).unwrap_err();
    assert_eq!(err.to_string(), "Not found");

    let err = client.execute(&format!("{base}/broken")).unwrap_err();
    assert_eq!(err.to_string(), "Server Internal Error: Server unavailable");
}

#[test]
fn unclassified_status_policies() {
    let (base, _journal) = start_server(None);
    let url = format!("{base}/created");

    let lenient = CrumbClient::new(ClientConfig::default()).unwrap();
    assert_eq!(lenient.execute(&url).unwrap(), "");

    let strict =
        CrumbClient::new(ClientConfig::default().with_unclassified(UnclassifiedPolicy::Strict))
            .unwrap();
    let err = strict.execute(&url).unwrap_err();
    assert!(matches!(
        err,
        SecurityError::UnexpectedStatus { status: 201, .. }
    ));
}

#[test]
fn body_decoded_with_declared_charset() {
    let (base, _journal) = start_server(None);
    let client = CrumbClient::new(ClientConfig::default()).unwrap();

    let body = client.execute(&format!("{base}/api/latin1")).unwrap();
    assert_eq!(body, "café");
}

#[test]
fn crumb_cached_across_calls() {
    let (base, journal) = start_server(Some("abc123"));
    let file = crumb_file("abc123\n");
    let path = file.path().to_path_buf();
    let client = CrumbClient::new(ClientConfig::default().with_crumb_file(&path)).unwrap();

    client.execute(&format!("{base}/api/json")).unwrap();
    drop(file);
    client.execute(&format!("{base}/api/json")).unwrap();
    assert_eq!(journal.requests(), 2);
}

#[test]
fn missing_crumb_file_fails_before_any_request() {
    let (base, journal) = start_server(None);
    let dir = tempfile::tempdir().unwrap();
    let client =
        CrumbClient::new(ClientConfig::default().with_crumb_file(dir.path().join("crumb")))
            .unwrap();

    let err = client.execute(&format!("{base}/api/json")).unwrap_err();
    assert!(matches!(
        err,
        SecurityError::Configuration(ConfigurationError::CrumbFileNotFound { .. })
    ));
    assert_eq!(journal.requests(), 0);
}

#[test]
fn connection_refused_is_configuration_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = CrumbClient::new(ClientConfig::default()).unwrap();
    let url = format!("http://{addr}/api/json");
    let err = client.execute(&url).unwrap_err();
    match err {
        SecurityError::Configuration(ConfigurationError::Transport { url: failed, .. }) => {
            assert_eq!(failed, url);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn sub_second_timeout_allows_fast_responses() {
    let (base, journal) = start_server(None);
    let config = ClientConfig::default().with_timeout(Duration::from_millis(500));
    let client = CrumbClient::new(config).unwrap();

    let body = client.execute(&format!("{base}/api/json")).unwrap();
    let view: View = serde_json::from_str(&body).unwrap();
    assert_eq!(view.name, "All");
    assert_eq!(journal.requests(), 1);
}

#[test]
fn slow_response_times_out() {
    let (base, _journal) = start_server(None);
    let timeout = Duration::from_millis(200);
    assert!(timeout < SLOW_DELAY);
    let client = CrumbClient::new(ClientConfig::default().with_timeout(timeout)).unwrap();

    let url = format!("{base}/slow");
    let err = client.execute(&url).unwrap_err();
    match err {
        SecurityError::Configuration(ConfigurationError::Transport { url: failed, .. }) => {
            assert_eq!(failed, url);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn large_body_read_in_full_by_default() {
    let (base, _journal) = start_server(None);
    let client = CrumbClient::new(ClientConfig::default()).unwrap();

    let body = client.execute(&format!("{base}/api/big")).unwrap();
    assert_eq!(body.len(), BIG_BODY_BYTES);
    assert!(body.bytes().all(|b| b == b'x'));
}

#[test]
fn body_over_configured_cap_is_transport_error() {
    let (base, _journal) = start_server(None);
    let config = ClientConfig::default().with_max_body_bytes(1024 * 1024);
    let client = CrumbClient::new(config).unwrap();

    let err = client.execute(&format!("{base}/api/big")).unwrap_err();
    assert!(matches!(
        err,
        SecurityError::Configuration(ConfigurationError::Transport { .. })
    ));
}

#[test]
fn non_ascii_location_is_collected_lossily() {
    let (base, journal) = start_server(None);
    let client = CrumbClient::new(ClientConfig::default().with_max_redirects(0)).unwrap();

    let body = client.execute(&format!("{base}/redirect/latin1")).unwrap();
    assert_eq!(body, "/job/caf\u{fffd}");
    assert_eq!(journal.requests(), 1);
}
