// # qBittorrent Port Target
//
// This crate provides the qBittorrent Web API implementation of
// `ClientPortTarget` for portsync.
//
// ## Session Handling
//
// - Login happens lazily before the first request when a username is set
// - The session cookie from the login response is sent on every request
// - A 403 on a request drops the session and retries once after a fresh login
//
// Only the final outcome of each operation reaches the engine.
//
// ## Security Requirements
//
// - The password NEVER appears in logs or Debug output
// - TLS verification can be disabled for self-signed Web UI certificates
//
// ## API Reference
//
// - Login: POST `/api/v2/auth/login` (form: username, password) → `Ok.`
// - Preferences: GET `/api/v2/app/preferences` → `{"listen_port": 6881, ...}`
// - Update: POST `/api/v2/app/setPreferences` (form: json=`{"listen_port": N}`)

use async_trait::async_trait;
use portsync_core::config::ClientConfig;
use portsync_core::traits::{ClientPortTarget, PortQuery};
use portsync_core::{Error, Result};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Method, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;

const LOGIN_PATH: &str = "/api/v2/auth/login";
const PREFERENCES_PATH: &str = "/api/v2/app/preferences";
const SET_PREFERENCES_PATH: &str = "/api/v2/app/setPreferences";

/// Default HTTP timeout for Web API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Login state
#[derive(Debug, Default)]
enum Session {
    /// No successful login yet, or the last one was rejected
    #[default]
    LoggedOut,

    /// Logged in; holds the `name=value` cookie pair, if the server sent one
    Active(Option<String>),
}

/// qBittorrent Web API client
pub struct QBittorrentPortTarget {
    /// Web UI base URL, without trailing slash
    base_url: String,

    /// Login username; no login when unset
    username: Option<String>,

    /// Login password
    /// ⚠️ NEVER log this value
    password: Option<String>,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Current login session
    session: Mutex<Session>,
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for QBittorrentPortTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QBittorrentPortTarget")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

impl QBittorrentPortTarget {
    /// Create a new qBittorrent client with the default request timeout
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::with_timeout(config, DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a new qBittorrent client
    ///
    /// # Parameters
    ///
    /// - `config`: Web UI URL, credentials and TLS verification setting
    /// - `timeout`: Per-request timeout
    pub fn with_timeout(config: &ClientConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone().filter(|u| !u.is_empty()),
            password: config.password.clone(),
            client,
            session: Mutex::new(Session::LoggedOut),
        })
    }

    /// Log in if needed and return the session cookie to send
    async fn ensure_session(&self) -> std::result::Result<Option<String>, PortQuery> {
        let Some(username) = &self.username else {
            return Ok(None);
        };

        let mut session = self.session.lock().await;
        if let Session::Active(cookie) = &*session {
            return Ok(cookie.clone());
        }

        let url = format!("{}{}", self.base_url, LOGIN_PATH);
        tracing::debug!("POST {} (login)", url);

        let form = [
            ("username", username.as_str()),
            ("password", self.password.as_deref().unwrap_or_default()),
        ];
        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| transport_failure("Login request", &e))?;

        let status = response.status();
        let cookie = session_cookie(&response);
        let body = response
            .text()
            .await
            .map_err(|e| transport_failure("Login request", &e))?;
        tracing::debug!("Response: {} {}", status.as_u16(), body);

        if status == StatusCode::FORBIDDEN {
            return Err(PortQuery::auth_failure("Authentication failed"));
        }
        if status != StatusCode::OK {
            return Err(PortQuery::transient(format!(
                "Login failed: {}",
                status.as_u16()
            )));
        }
        if !body.trim().eq_ignore_ascii_case("ok.") {
            return Err(PortQuery::auth_failure(
                "Authentication failed (invalid credentials)",
            ));
        }

        tracing::debug!("qBittorrent login successful");
        *session = Session::Active(cookie.clone());
        Ok(cookie)
    }

    /// Send an authenticated request, re-logging in once on 403
    async fn request(
        &self,
        method: Method,
        path: &str,
        form: Option<&[(&str, String)]>,
    ) -> std::result::Result<Response, PortQuery> {
        let url = format!("{}{}", self.base_url, path);
        let mut retried = false;

        loop {
            let cookie = self.ensure_session().await?;
            tracing::debug!("{} {}", method, url);

            let mut request = self.client.request(method.clone(), &url);
            if let Some(cookie) = cookie {
                request = request.header(COOKIE, cookie);
            }
            if let Some(form) = form {
                request = request.form(form);
            }

            let response = request
                .send()
                .await
                .map_err(|e| transport_failure("Request", &e))?;
            tracing::debug!("Response: {}", response.status().as_u16());

            if response.status() == StatusCode::FORBIDDEN && !retried {
                tracing::debug!("Got 403, retrying with fresh login");
                *self.session.lock().await = Session::LoggedOut;
                retried = true;
                continue;
            }

            return Ok(response);
        }
    }
}

#[async_trait]
impl ClientPortTarget for QBittorrentPortTarget {
    async fn read_listen_port(&self) -> PortQuery {
        let response = match self.request(Method::GET, PREFERENCES_PATH, None).await {
            Ok(response) => response,
            Err(failure) => return failure,
        };

        let status = response.status();
        if status != StatusCode::OK {
            return PortQuery::transient(format!(
                "Failed to get preferences: {}",
                status.as_u16()
            ));
        }

        match response.json::<Value>().await {
            Ok(preferences) => parse_listen_port(&preferences),
            Err(e) => PortQuery::transient(format!("Invalid response format: {}", e)),
        }
    }

    async fn write_listen_port(&self, port: u16) -> PortQuery {
        tracing::debug!("Setting listen_port={}", port);

        let form = [("json", serde_json::json!({ "listen_port": port }).to_string())];
        let response = match self
            .request(Method::POST, SET_PREFERENCES_PATH, Some(&form[..]))
            .await
        {
            Ok(response) => response,
            Err(failure) => return failure,
        };

        let status = response.status();
        if status != StatusCode::OK {
            return PortQuery::transient(format!("Failed to set port: {}", status.as_u16()));
        }

        PortQuery::port(port)
    }
}

/// Extract the `name=value` pair of the first cookie the server set
fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .map(str::trim)
        .find(|pair| pair.contains('='))
        .map(str::to_string)
}

fn parse_listen_port(preferences: &Value) -> PortQuery {
    match preferences.get("listen_port") {
        None | Some(Value::Null) => PortQuery::transient("listen_port not in response"),
        Some(port) => match port.as_u64().and_then(|p| u16::try_from(p).ok()) {
            Some(port) => {
                tracing::debug!("Current listen port: {}", port);
                PortQuery::port(port)
            }
            None => PortQuery::transient(format!("Invalid response format: listen_port {}", port)),
        },
    }
}

fn transport_failure(what: &str, e: &reqwest::Error) -> PortQuery {
    if e.is_timeout() {
        PortQuery::transient(format!("{} timed out", what))
    } else if e.is_connect() {
        PortQuery::transient(format!("Connection error: {}", e))
    } else {
        PortQuery::transient(format!("{} failed: {}", what, e))
    }
}
