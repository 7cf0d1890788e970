//! Configuration from environment variables
//!
//! Every problem is collected before failing so a misconfigured container
//! reports all of them in one go.

use anyhow::Result;
use portsync_core::{
    ClientConfig, GatewayAuth, GatewayConfig, HealthConfig, SyncConfig, TimingConfig,
};
use std::str::FromStr;
use tracing::Level;

/// Everything the daemon reads from its environment
#[derive(Debug)]
pub struct DaemonConfig {
    pub sync: SyncConfig,
    pub log_level: Level,
}

impl DaemonConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut errors = Vec::new();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let gateway_url = var("GLUETUN_URL").unwrap_or_default();
        let client_url = var("QBITTORRENT_URL").unwrap_or_default();

        let gateway = GatewayConfig::new(&gateway_url).with_auth(GatewayAuth::from_parts(
            var("GLUETUN_API_KEY"),
            var("GLUETUN_USERNAME"),
            var("GLUETUN_PASSWORD"),
        ));

        let mut client = ClientConfig::new(&client_url)
            .with_verify_ssl(var("QBITTORRENT_VERIFY_SSL").is_none_or(|v| parse_flag(&v)));
        if let Some(username) = var("QBITTORRENT_USERNAME") {
            let password = lookup("QBITTORRENT_PASSWORD").unwrap_or_default();
            client = client.with_credentials(username, password);
        }

        let defaults = TimingConfig::default();
        let mut number =
            |key: &str, default: u64| -> u64 { parse_or(var(key), key, default, &mut errors) };
        let mut timing = TimingConfig {
            request_timeout_secs: number("REQUEST_TIMEOUT", defaults.request_timeout_secs),
            startup_check_delay_secs: number(
                "STARTUP_CHECK_DELAY",
                defaults.startup_check_delay_secs,
            ),
            startup_check_interval_secs: number(
                "STARTUP_CHECK_INTERVAL",
                defaults.startup_check_interval_secs,
            ),
            poll_interval_secs: number("POLL_INTERVAL", defaults.poll_interval_secs),
            verify_delay_secs: number("VERIFY_DELAY", defaults.verify_delay_secs),
            ..defaults
        };
        timing.startup_max_attempts = parse_or(
            var("STARTUP_MAX_ATTEMPTS"),
            "STARTUP_MAX_ATTEMPTS",
            timing.startup_max_attempts,
            &mut errors,
        );
        timing.verify_max_attempts = parse_or(
            var("VERIFY_MAX_ATTEMPTS"),
            "VERIFY_MAX_ATTEMPTS",
            timing.verify_max_attempts,
            &mut errors,
        );

        let health = HealthConfig {
            enabled: var("HEALTH_ENABLED").is_none_or(|v| parse_flag(&v)),
            port: parse_or(
                var("HEALTH_PORT"),
                "HEALTH_PORT",
                HealthConfig::default().port,
                &mut errors,
            ),
        };

        let log_level = match parse_log_level(var("LOG_LEVEL").as_deref().unwrap_or("INFO")) {
            Ok(level) => level,
            Err(e) => {
                errors.push(e);
                Level::INFO
            }
        };

        let sync = SyncConfig {
            gateway,
            client,
            timing,
            health,
        };

        if let Err(e) = sync.validate() {
            errors.push(e.to_string());
        }

        if !errors.is_empty() {
            anyhow::bail!("{}", errors.join("\n"));
        }

        Ok(Self { sync, log_level })
    }
}

/// `true`, `1` and `yes` (any case) enable a flag; anything else disables it
fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

fn parse_or<T: FromStr>(
    value: Option<String>,
    key: &str,
    default: T,
    errors: &mut Vec<String>,
) -> T {
    match value {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                errors.push(format!("{} is not a valid number: {}", key, raw));
                default
            }
        },
    }
}

fn parse_log_level(value: &str) -> Result<Level, String> {
    match value.trim().to_uppercase().as_str() {
        "DEBUG" => Ok(Level::DEBUG),
        "INFO" => Ok(Level::INFO),
        "WARN" | "WARNING" => Ok(Level::WARN),
        "ERROR" => Ok(Level::ERROR),
        other => Err(format!("LOG_LEVEL must be DEBUG, INFO, WARN, or ERROR: {}", other)),
    }
}
