use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

pub const CRUMB_HEADER: &str = ".crumb";

const HTML: &str = "text/html;charset=utf-8";

/// Size of the `/api/big` body, past ureq's default 10 MiB read cap.
pub const BIG_BODY_BYTES: usize = 11 * 1024 * 1024;

/// How long `/slow` waits before answering.
pub const SLOW_DELAY: Duration = Duration::from_secs(2);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    pub color: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub name: String,
    pub jobs: Vec<Job>,
}

/// Requests seen by the server, for test assertions.
#[derive(Debug, Default)]
pub struct Journal {
    requests: AtomicUsize,
    last_crumb: Mutex<Option<String>>,
}

impl Journal {
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn last_crumb(&self) -> Option<String> {
        self.last_crumb.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, crumb: Option<&str>) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_crumb.lock() {
            *last = crumb.map(str::to_string);
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct AppState {
    crumb: Option<Arc<str>>,
    journal: Arc<Journal>,
}

impl AppState {
    /// With `Some(crumb)`, protected routes reject requests whose `.crumb`
    /// header does not match.
    pub fn new(crumb: Option<&str>) -> Self {
        Self {
            crumb: crumb.map(Arc::from),
            journal: Arc::default(),
        }
    }

    pub fn journal(&self) -> Arc<Journal> {
        Arc::clone(&self.journal)
    }

    fn check_crumb(&self, headers: &HeaderMap) -> Result<(), Response> {
        let Some(expected) = self.crumb.as_deref() else {
            return Ok(());
        };
        let sent = headers.get(CRUMB_HEADER).and_then(|v| v.to_str().ok());
        if sent == Some(expected) {
            Ok(())
        } else {
            Err(page(
                StatusCode::FORBIDDEN,
                "Error 403 No valid crumb was included in the request",
            ))
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/json", post(api_json))
        .route("/api/latin1", post(api_latin1))
        .route("/api/big", post(api_big))
        .route("/slow", post(slow))
        .route("/redirect", post(redirect))
        .route("/redirect/twice", post(redirect_twice))
        .route("/redirect/loop", post(redirect_loop))
        .route("/redirect/latin1", post(redirect_latin1))
        .route("/created", post(created))
        .route("/login", post(login))
        .route("/denied", post(denied))
        .route("/broken", post(broken))
        .layer(middleware::from_fn_with_state(state.clone(), record))
        .with_state(state)
}

pub async fn run(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, app(state)).await
}

async fn record(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let crumb = request
        .headers()
        .get(CRUMB_HEADER)
        .and_then(|v| v.to_str().ok());
    state.journal.record(crumb);
    tracing::debug!(method = %request.method(), uri = %request.uri(), "request");
    next.run(request).await
}

fn page(status: StatusCode, message: &str) -> Response {
    let body = format!("<html><head><title>{message}</title></head><body><h2>{message}</h2></body></html>");
    (status, [(header::CONTENT_TYPE, HTML)], body).into_response()
}

fn found(location: &'static str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

async fn api_json(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<View>, Response> {
    state.check_crumb(&headers)?;
    Ok(Json(View {
        name: "All".to_string(),
        jobs: vec![
            Job {
                name: "build-core".to_string(),
                color: "blue".to_string(),
            },
            Job {
                name: "deploy".to_string(),
                color: "red".to_string(),
            },
        ],
    }))
}

/// "café" in ISO-8859-1.
async fn api_latin1(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, Response> {
    state.check_crumb(&headers)?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=ISO-8859-1")],
        b"caf\xe9".to_vec(),
    )
        .into_response())
}

async fn api_big(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, Response> {
    state.check_crumb(&headers)?;
    Ok((StatusCode::OK, "x".repeat(BIG_BODY_BYTES)).into_response())
}

async fn slow(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, Response> {
    state.check_crumb(&headers)?;
    tokio::time::sleep(SLOW_DELAY).await;
    Ok((StatusCode::OK, "finally").into_response())
}

async fn redirect(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, Response> {
    state.check_crumb(&headers)?;
    Ok(found("/api/json"))
}

async fn redirect_twice(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, Response> {
    state.check_crumb(&headers)?;
    Ok(found("/redirect"))
}

async fn redirect_loop(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, Response> {
    state.check_crumb(&headers)?;
    Ok(found("/redirect/loop"))
}

/// `Location` carries a raw ISO-8859-1 byte, as some servers still send.
async fn redirect_latin1(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, Response> {
    state.check_crumb(&headers)?;
    let mut response = StatusCode::FOUND.into_response();
    if let Ok(location) = HeaderValue::from_bytes(b"/job/caf\xe9") {
        response.headers_mut().insert(header::LOCATION, location);
    }
    Ok(response)
}

async fn created(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, Response> {
    state.check_crumb(&headers)?;
    Ok((StatusCode::CREATED, "created").into_response())
}

async fn login() -> Response {
    page(StatusCode::UNAUTHORIZED, "Authentication required")
}

async fn denied() -> Response {
    page(StatusCode::FORBIDDEN, "Unauthorized")
}

async fn broken() -> Response {
    page(StatusCode::INTERNAL_SERVER_ERROR, "java.lang.NullPointerException")
}
