//! Integration-test harness.
//!
//! [`TestApp`] spins up a full Gatehouse server on a random port with an
//! in-memory session store, an echoing [`GraphQLExecutor`], and a small set
//! of harness routes that exercise the guards. The [`TestClient`] keeps a
//! cookie jar and does not follow redirects, so tests can assert on the
//! redirect responses the guards produce.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;

use crate::app::{App, AppState};
use crate::config::Config;
use crate::context::RequestContext;
use crate::error::GateError;
use crate::extractors::CurrentUser;
use crate::graphql::{graphql_routes, GraphQLContext, GraphQLExecutor, GraphQLRequest};
use crate::response::ApiResponse;
use crate::session::csrf::issue_csrf_token;
use crate::session::guards;
use crate::session::middleware::{build_session_cookie, CSRF_HEADER};
use crate::session::store::SessionService;
use axum_extra::extract::cookie::CookieJar;

/// Executor double: echoes the query and the dispatch context back, so tests
/// can assert what the dispatcher packaged.
pub struct EchoExecutor;

#[async_trait]
impl GraphQLExecutor for EchoExecutor {
    async fn execute(
        &self,
        request: GraphQLRequest,
        ctx: GraphQLContext,
    ) -> Result<serde_json::Value, GateError> {
        Ok(json!({
            "data": { "echo": request.query },
            "extensions": {
                "context": {
                    "sessionId": ctx.session_id,
                    "userId": ctx.user_id,
                }
            }
        }))
    }
}

// ── Harness routes ──

#[derive(Debug, Deserialize)]
struct HarnessLogin {
    user_id: i64,
}

/// A page behind `require_user` (via the `CurrentUser` extractor).
async fn settings_page(CurrentUser(user): CurrentUser) -> ApiResponse<serde_json::Value> {
    ApiResponse::success(json!({ "user_id": user.0 }))
}

/// A visitors-only page; renders the CSRF token the way a server-rendered
/// form would embed it.
async fn login_page(
    Extension(ctx): Extension<RequestContext>,
) -> Result<ApiResponse<serde_json::Value>, GateError> {
    guards::require_no_user(&ctx)?;
    Ok(ApiResponse::success(json!({
        "session_id": ctx.session.id,
        "csrf_token": ctx.csrf_token,
    })))
}

/// Privilege elevation: regenerates the session and re-issues the cookie.
/// Credential verification itself is the host application's business.
async fn api_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<HarnessLogin>,
) -> Result<(CookieJar, ApiResponse<serde_json::Value>), GateError> {
    let session = state.sessions.log_in(&ctx.session, payload.user_id).await?;
    let jar = jar.add(build_session_cookie(&state.config, &session));
    Ok((
        jar,
        ApiResponse::success(json!({
            "session_id": session.id,
            "csrf_token": issue_csrf_token(&session),
        })),
    ))
}

async fn api_logout(
    State(state): State<AppState>,
    jar: CookieJar,
    Extension(ctx): Extension<RequestContext>,
) -> Result<(CookieJar, ApiResponse<serde_json::Value>), GateError> {
    let session = state.sessions.log_out(&ctx.session).await?;
    let jar = jar.add(build_session_cookie(&state.config, &session));
    Ok((
        jar,
        ApiResponse::success(json!({
            "session_id": session.id,
            "csrf_token": issue_csrf_token(&session),
        })),
    ))
}

/// Echoes the raw request body: proves the CSRF gate's body peek left the
/// body consumable downstream.
async fn echo_body(body: String) -> String {
    body
}

/// Routes used by the integration tests to exercise the pipeline.
pub fn harness_routes() -> Router<AppState> {
    Router::new()
        .route("/settings", get(settings_page))
        .route("/login", get(login_page))
        .route("/api/login", post(api_login))
        .route("/api/logout", post(api_logout))
        .route("/echo", post(echo_body))
}

// ── TestApp ──

/// A test application wrapping a running Gatehouse server.
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_csrf_round_trip() {
///     let app = TestApp::new().await;
///     let token = app.prime_session().await;
///     let res = app.client.post_with_csrf(&app.url("/graphql"), &token, r#"{"query":"{ me }"}"#).await;
///     assert_eq!(res.status, 200);
/// }
/// ```
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: TestClient,
    pub sessions: SessionService,
    pub config: Config,
}

impl TestApp {
    /// Default test configuration: in-memory store, no playground bypass.
    pub fn test_config() -> Config {
        Config {
            root_url: "http://localhost:3000".to_string(),
            environment: "test".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 0, // OS assigns a random port
            database_url: None,
            redis_url: None,
            session_secret: "test-secret-key-for-testing".to_string(),
            session_cookie: "session".to_string(),
            session_ttl_hours: 24,
            store_timeout_secs: 5,
            enable_playground_bypass: false,
        }
    }

    /// Create a new test app with the default config.
    pub async fn new() -> Self {
        Self::with_config(Self::test_config()).await
    }

    /// Create a new test app with a custom config.
    pub async fn with_config(config: Config) -> Self {
        let app = App::with_config(config.clone())
            .await
            .expect("Failed to create test app")
            .routes(graphql_routes(
                Arc::new(EchoExecutor),
                !config.is_production(),
            ))
            .routes(harness_routes());

        let sessions = app.sessions.clone();
        let router = app.router();
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test server");
        let addr = listener.local_addr().expect("Failed to get local addr");

        // Spawn the server in the background
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let client = TestClient::new();

        TestApp {
            addr,
            client,
            sessions,
            config,
        }
    }

    /// Get the base URL for the test server.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Prime a session: GET `/` to obtain the session cookie (kept in the
    /// client's jar) and return the issued CSRF token.
    pub async fn prime_session(&self) -> String {
        let res = self.client.get(&self.url("/")).await;
        assert_eq!(res.status, 200, "priming request failed: {}", res.body);
        res.header(CSRF_HEADER)
            .expect("fresh session should carry a CSRF token header")
    }

    /// Log in through the harness endpoint; returns the regenerated
    /// session's CSRF token.
    pub async fn login_as(&self, user_id: i64, csrf_token: &str) -> String {
        let body = json!({ "user_id": user_id }).to_string();
        let res = self
            .client
            .post_with_csrf(&self.url("/api/login"), csrf_token, &body)
            .await;
        assert_eq!(res.status, 200, "login failed: {}", res.body);
        res.data()["csrf_token"]
            .as_str()
            .expect("login response should carry a csrf token")
            .to_string()
    }
}

/// A simple HTTP test client with a cookie jar and redirects disabled.
#[derive(Clone)]
pub struct TestClient {
    inner: reqwest::Client,
}

impl Default for TestClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TestClient {
    pub fn new() -> Self {
        let inner = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to build test client");
        TestClient { inner }
    }

    /// Send a GET request.
    pub async fn get(&self, url: &str) -> TestResponse {
        let res = self.inner.get(url).send().await.expect("GET request failed");
        TestResponse::from_response(res).await
    }

    /// Send a POST request with a JSON body and no CSRF token.
    pub async fn post(&self, url: &str, body: &str) -> TestResponse {
        let res = self
            .inner
            .post(url)
            .header("Content-Type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .expect("POST request failed");
        TestResponse::from_response(res).await
    }

    /// Send a POST request with a JSON body and the CSRF token header.
    pub async fn post_with_csrf(&self, url: &str, token: &str, body: &str) -> TestResponse {
        let res = self
            .inner
            .post(url)
            .header("Content-Type", "application/json")
            .header("CSRF-Token", token)
            .body(body.to_string())
            .send()
            .await
            .expect("POST request failed");
        TestResponse::from_response(res).await
    }

    /// Send a POST request with extra headers (e.g. `Origin`).
    pub async fn post_with_headers(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &str,
    ) -> TestResponse {
        let mut builder = self
            .inner
            .post(url)
            .header("Content-Type", "application/json")
            .body(body.to_string());
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let res = builder.send().await.expect("POST request failed");
        TestResponse::from_response(res).await
    }

    /// Send a form-encoded POST (the CSRF token travels in the `csrf` field).
    pub async fn post_form(&self, url: &str, body: &str) -> TestResponse {
        let res = self
            .inner
            .post(url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body.to_string())
            .send()
            .await
            .expect("POST request failed");
        TestResponse::from_response(res).await
    }
}

/// A simplified HTTP response for test assertions.
#[derive(Debug)]
pub struct TestResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let headers = res.headers().clone();
        let body = res.text().await.unwrap_or_default();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Parse the body as JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("Failed to parse response as JSON")
    }

    /// Check if the response indicates success.
    pub fn is_success(&self) -> bool {
        self.json()["success"].as_bool().unwrap_or(false)
    }

    /// Get the data field from the response.
    pub fn data(&self) -> serde_json::Value {
        self.json()["data"].clone()
    }

    /// Get the error field from the response.
    pub fn error(&self) -> serde_json::Value {
        self.json()["error"].clone()
    }

    /// Get a response header as a string.
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
    }
}
