//! Configuration types for portsync
//!
//! This module defines all configuration structures used throughout the crate.
//! Loading from the environment is done by the daemon; the types here only
//! hold and validate values.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;
use url::Url;

/// Main portsync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// VPN gateway (Gluetun) connection
    pub gateway: GatewayConfig,

    /// Torrent client (qBittorrent) connection
    pub client: ClientConfig,

    /// Delays, intervals and retry budgets
    #[serde(default)]
    pub timing: TimingConfig,

    /// Health endpoint settings
    #[serde(default)]
    pub health: HealthConfig,
}

impl SyncConfig {
    /// Create a configuration with default timing and health settings
    pub fn new(gateway: GatewayConfig, client: ClientConfig) -> Self {
        Self {
            gateway,
            client,
            timing: TimingConfig::default(),
            health: HealthConfig::default(),
        }
    }

    /// Validate the configuration, collecting every problem found
    pub fn validate(&self) -> Result<(), crate::Error> {
        let mut errors = Vec::new();

        if let Err(e) = validate_url("gateway", &self.gateway.url) {
            errors.push(e);
        }
        if let Err(e) = validate_url("client", &self.client.url) {
            errors.push(e);
        }
        if let GatewayAuth::Basic { username, .. } = &self.gateway.auth
            && username.is_empty()
        {
            errors.push("gateway basic auth username cannot be empty".to_string());
        }
        errors.extend(self.timing.problems());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(crate::Error::config(errors.join("; ")))
        }
    }

    /// Log the effective configuration without exposing secrets
    pub fn log_summary(&self) {
        info!("Gluetun URL: {}", self.gateway.url);
        info!("qBittorrent URL: {}", self.client.url);

        match &self.gateway.auth {
            GatewayAuth::ApiKey { .. } => info!("Gluetun auth: API key"),
            GatewayAuth::Basic { username, .. } => {
                info!("Gluetun auth: Basic auth (user: {})", username)
            }
            GatewayAuth::None => info!("Gluetun auth: None"),
        }

        match &self.client.username {
            Some(username) => info!("qBittorrent auth: Enabled (user: {})", username),
            None => info!("qBittorrent auth: Disabled"),
        }
        if !self.client.verify_ssl {
            info!("qBittorrent SSL verification: disabled");
        }

        let t = &self.timing;
        info!("Poll interval: {}s", t.poll_interval_secs);
        info!("Startup check delay: {}s", t.startup_check_delay_secs);
        info!("Startup check interval: {}s", t.startup_check_interval_secs);
        info!("Startup max attempts: {}", t.startup_max_attempts);
        info!("Verify delay: {}s", t.verify_delay_secs);
        info!("Verify max attempts: {}", t.verify_max_attempts);
        info!("Request timeout: {}s", t.request_timeout_secs);

        if self.health.enabled {
            info!("Health endpoint: enabled (port {})", self.health.port);
        } else {
            info!("Health endpoint: disabled");
        }
    }
}

/// Strip trailing slashes so paths can be appended directly
pub fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn validate_url(name: &str, url: &str) -> Result<(), String> {
    if url.is_empty() {
        return Err(format!("{} URL is required", name));
    }

    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(url::ParseError::EmptyHost) => {
            return Err(format!("{} URL has no host: {}", name, url));
        }
        Err(e) => {
            return Err(format!(
                "{} URL is not a valid http(s) URL: {} ({})",
                name, url, e
            ));
        }
    };

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("{} URL is not a valid http(s) URL: {}", name, url));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(format!("{} URL has no host: {}", name, url));
    }

    Ok(())
}

/// VPN gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the control server (e.g., "http://gluetun:8000")
    pub url: String,

    /// Authentication mode
    #[serde(default)]
    pub auth: GatewayAuth,
}

impl GatewayConfig {
    pub fn new(url: impl AsRef<str>) -> Self {
        Self {
            url: normalize_url(url.as_ref()),
            auth: GatewayAuth::None,
        }
    }

    /// Set the authentication mode
    pub fn with_auth(mut self, auth: GatewayAuth) -> Self {
        self.auth = auth;
        self
    }
}

/// Gateway authentication mode
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayAuth {
    /// No authentication
    #[default]
    None,

    /// `X-API-Key` header
    ApiKey {
        /// API key (never logged)
        key: String,
    },

    /// HTTP basic authentication
    Basic {
        username: String,
        /// Password (never logged)
        password: String,
    },
}

impl GatewayAuth {
    /// Pick the auth mode from optional credentials
    ///
    /// An API key wins over basic auth; basic auth needs both parts.
    pub fn from_parts(
        api_key: Option<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> Self {
        match (api_key, username, password) {
            (Some(key), _, _) if !key.is_empty() => GatewayAuth::ApiKey { key },
            (_, Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                GatewayAuth::Basic { username, password }
            }
            _ => GatewayAuth::None,
        }
    }
}

// Custom Debug implementation that hides credentials
impl std::fmt::Debug for GatewayAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayAuth::None => f.write_str("None"),
            GatewayAuth::ApiKey { .. } => f
                .debug_struct("ApiKey")
                .field("key", &"<REDACTED>")
                .finish(),
            GatewayAuth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<REDACTED>")
                .finish(),
        }
    }
}

/// Torrent client configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the Web UI (e.g., "http://qbittorrent:8080")
    pub url: String,

    /// Login username; no login is attempted when unset
    #[serde(default)]
    pub username: Option<String>,

    /// Login password
    #[serde(default)]
    pub password: Option<String>,

    /// Verify TLS certificates
    #[serde(default = "default_true")]
    pub verify_ssl: bool,
}

impl ClientConfig {
    pub fn new(url: impl AsRef<str>) -> Self {
        Self {
            url: normalize_url(url.as_ref()),
            username: None,
            password: None,
            verify_ssl: true,
        }
    }

    /// Set login credentials
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Enable or disable TLS certificate verification
    pub fn with_verify_ssl(mut self, verify_ssl: bool) -> Self {
        self.verify_ssl = verify_ssl;
        self
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<REDACTED>"))
            .field("verify_ssl", &self.verify_ssl)
            .finish()
    }
}

/// Timing configuration
///
/// All intervals are fixed; there is no backoff growth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Per-request timeout for collaborator calls (in seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Delay before the first startup check (in seconds)
    #[serde(default = "default_startup_check_delay_secs")]
    pub startup_check_delay_secs: u64,

    /// Delay between startup check attempts (in seconds)
    #[serde(default = "default_startup_check_interval_secs")]
    pub startup_check_interval_secs: u64,

    /// Startup check attempts before giving up
    #[serde(default = "default_startup_max_attempts")]
    pub startup_max_attempts: u32,

    /// Delay between reconcile cycles (in seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Delay before each verification read (in seconds)
    #[serde(default = "default_verify_delay_secs")]
    pub verify_delay_secs: u64,

    /// Verification reads after a port write
    #[serde(default = "default_verify_max_attempts")]
    pub verify_max_attempts: u32,
}

impl TimingConfig {
    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.request_timeout_secs == 0 {
            problems.push("request timeout must be > 0".to_string());
        }
        if self.startup_max_attempts == 0 {
            problems.push("startup max attempts must be > 0".to_string());
        }
        if self.poll_interval_secs == 0 {
            problems.push("poll interval must be > 0".to_string());
        }
        if self.verify_max_attempts == 0 {
            problems.push("verify max attempts must be > 0".to_string());
        }
        problems
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn startup_check_delay(&self) -> Duration {
        Duration::from_secs(self.startup_check_delay_secs)
    }

    pub fn startup_check_interval(&self) -> Duration {
        Duration::from_secs(self.startup_check_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn verify_delay(&self) -> Duration {
        Duration::from_secs(self.verify_delay_secs)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            startup_check_delay_secs: default_startup_check_delay_secs(),
            startup_check_interval_secs: default_startup_check_interval_secs(),
            startup_max_attempts: default_startup_max_attempts(),
            poll_interval_secs: default_poll_interval_secs(),
            verify_delay_secs: default_verify_delay_secs(),
            verify_max_attempts: default_verify_max_attempts(),
        }
    }
}

/// Health endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Whether to serve the health endpoint
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// TCP port for the health endpoint
    #[serde(default = "default_health_port")]
    pub port: u16,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_health_port(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_startup_check_delay_secs() -> u64 {
    5
}

fn default_startup_check_interval_secs() -> u64 {
    5
}

fn default_startup_max_attempts() -> u32 {
    60
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_verify_delay_secs() -> u64 {
    2
}

fn default_verify_max_attempts() -> u32 {
    3
}

fn default_health_port() -> u16 {
    8081
}
