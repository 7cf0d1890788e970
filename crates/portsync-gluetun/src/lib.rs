// # Gluetun Port Source
//
// This crate provides the Gluetun control server implementation of
// `GatewayPortSource` for portsync.
//
// ## API Reference
//
// - Forwarded port: GET `/v1/portforward` → `{"port": 54321}`
// - A port of `0` (or no port field) means forwarding is not active
//
// ## Authentication
//
// - `X-API-Key` header when an API key is configured
// - HTTP basic auth when a username and password are configured
// - Nothing otherwise
//
// ## Constraints
//
// One request per call, bounded by the request timeout. No retries, no
// background tasks: the engine owns all timing decisions.

use async_trait::async_trait;
use portsync_core::config::{GatewayAuth, GatewayConfig};
use portsync_core::traits::{GatewayPortSource, PortQuery};
use portsync_core::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// Forwarded port endpoint, relative to the control server URL
const PORT_FORWARD_PATH: &str = "/v1/portforward";

/// Default HTTP timeout for control server requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Response body of the forwarded port endpoint
#[derive(Debug, Deserialize)]
struct PortForwardResponse {
    #[serde(default)]
    port: Option<u64>,
}

/// Gluetun control server client
pub struct GluetunPortSource {
    /// Full URL of the forwarded port endpoint
    endpoint: String,

    /// Authentication mode (credentials never logged)
    auth: GatewayAuth,

    /// HTTP client
    client: reqwest::Client,
}

// Custom Debug implementation that hides credentials
impl std::fmt::Debug for GluetunPortSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GluetunPortSource")
            .field("endpoint", &self.endpoint)
            .field("auth", &self.auth)
            .finish()
    }
}

impl GluetunPortSource {
    /// Create a new Gluetun port source with the default request timeout
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        Self::with_timeout(config, DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a new Gluetun port source
    ///
    /// # Parameters
    ///
    /// - `config`: Control server URL and authentication
    /// - `timeout`: Per-request timeout
    pub fn with_timeout(config: &GatewayConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: format!(
                "{}{}",
                config.url.trim_end_matches('/'),
                PORT_FORWARD_PATH
            ),
            auth: config.auth.clone(),
            client,
        })
    }

    fn request(&self) -> reqwest::RequestBuilder {
        let request = self.client.get(&self.endpoint);
        match &self.auth {
            GatewayAuth::ApiKey { key } => request.header("X-API-Key", key),
            GatewayAuth::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
            GatewayAuth::None => request,
        }
    }
}

#[async_trait]
impl GatewayPortSource for GluetunPortSource {
    async fn fetch_forwarded_port(&self) -> PortQuery {
        tracing::debug!("GET {}", self.endpoint);

        let response = match self.request().send().await {
            Ok(response) => response,
            Err(e) => return transport_failure(&e),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return transport_failure(&e),
        };
        tracing::debug!("Response: {} {}", status.as_u16(), body);

        classify(status.as_u16(), &body)
    }
}

/// Map a control server response to a port query result
fn classify(status: u16, body: &str) -> PortQuery {
    match status {
        401 => PortQuery::auth_failure("Authentication failed"),
        403 => PortQuery::auth_failure("Access forbidden"),
        // VPN may not be connected
        404 => PortQuery::no_port(),
        500..=599 => PortQuery::transient(format!("Server error: {}", status)),
        200 => parse_port(body),
        _ => PortQuery::transient(format!("Unexpected status: {}", status)),
    }
}

fn parse_port(body: &str) -> PortQuery {
    let parsed: PortForwardResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(e) => return PortQuery::transient(format!("Invalid response format: {}", e)),
    };

    match parsed.port {
        None | Some(0) => {
            tracing::debug!("No port forwarded (port forwarding not active)");
            PortQuery::no_port()
        }
        Some(port) => match u16::try_from(port) {
            Ok(port) => PortQuery::port(port),
            Err(_) => PortQuery::transient(format!(
                "Invalid response format: port {} out of range",
                port
            )),
        },
    }
}

fn transport_failure(e: &reqwest::Error) -> PortQuery {
    if e.is_timeout() {
        PortQuery::transient("Request timed out")
    } else if e.is_connect() {
        PortQuery::transient(format!("Connection error: {}", e))
    } else {
        PortQuery::transient(format!("Request failed: {}", e))
    }
}
