//! Port sync engine
//!
//! The SyncEngine is responsible for:
//! - Gating startup until both collaborators answer
//! - Reconciling the client's listening port with the gateway's forwarded port
//! - Verifying every write by reading the port back
//! - Keeping the shared [`HealthStatus`] current
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────┐                     ┌───────────────────┐
//! │ GatewayPortSource │◄── fetch ──┐  ┌───► │ ClientPortTarget  │
//! └───────────────────┘            │  │     └───────────────────┘
//!                                  │  │ read / write / verify
//!                             ┌──────────────┐
//!                             │  SyncEngine  │
//!                             └──────────────┘
//!                                     │
//!                                     ▼
//!                             ┌──────────────┐
//!                             │ HealthStatus │◄── health endpoint
//!                             └──────────────┘
//! ```
//!
//! ## Cycle Flow
//!
//! 1. Fetch the forwarded port from the gateway
//! 2. Read the client's current listening port
//! 3. If they match, stop (no write traffic in steady state)
//! 4. Otherwise write the new port, then re-read until it matches or the
//!    verification budget runs out

use crate::config::TimingConfig;
use crate::error::{Error, Result};
use crate::health::HealthStatus;
use crate::traits::{ClientPortTarget, GatewayPortSource, PortQuery};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Successful outcome of a reconcile cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The gateway has no forwarded port; nothing to do
    NoPortForwarded,

    /// The client already listens on the forwarded port
    Unchanged {
        port: u16,
    },

    /// The client was updated and the new port was read back
    Updated {
        from: u16,
        to: u16,
    },
}

/// Core port sync engine
///
/// ## Lifecycle
///
/// 1. Create with [`SyncEngine::new()`]
/// 2. Start with [`SyncEngine::run()`] (or drive [`SyncEngine::wait_for_services()`]
///    and [`SyncEngine::sync_port()`] directly)
/// 3. The loop runs until the process is stopped or a shutdown signal fires
///
/// ## Threading
///
/// All work is strictly sequential. The engine is cheap to clone; clones share
/// the collaborators and the health status.
#[derive(Clone)]
pub struct SyncEngine {
    /// Source of the forwarded port
    gateway: Arc<dyn GatewayPortSource>,

    /// Client whose listening port is kept in sync
    client: Arc<dyn ClientPortTarget>,

    /// Shared health state, also read by the health endpoint
    health: Arc<HealthStatus>,

    /// Delays and retry budgets
    timing: TimingConfig,
}

impl SyncEngine {
    /// Create a new sync engine
    ///
    /// # Parameters
    ///
    /// - `gateway`: Gateway port source implementation
    /// - `client`: Client port target implementation
    /// - `health`: Shared health status
    /// - `timing`: Timing configuration
    pub fn new(
        gateway: Arc<dyn GatewayPortSource>,
        client: Arc<dyn ClientPortTarget>,
        health: Arc<HealthStatus>,
        timing: TimingConfig,
    ) -> Self {
        Self {
            gateway,
            client,
            health,
            timing,
        }
    }

    /// Block until both services answer, or give up
    ///
    /// Readiness means "reachable": a gateway answering with no forwarded port
    /// is ready. A side that is ready is not checked again.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: both services answered; health is marked reachable
    /// - `Err(Error::Authentication)`: credentials were rejected (no further attempts)
    /// - `Err(Error::StartupTimeout)`: the attempt budget ran out
    pub async fn wait_for_services(&self) -> Result<()> {
        self.wait_for_services_internal(&mut None).await.map(|_| ())
    }

    /// Startup gate; `Ok(false)` means shutdown was requested while waiting
    async fn wait_for_services_internal(
        &self,
        shutdown: &mut Option<oneshot::Receiver<()>>,
    ) -> Result<bool> {
        info!("Waiting for services to be ready...");

        let max_attempts = self.timing.startup_max_attempts;
        let (gateway, client) = (self.gateway.name(), self.client.name());
        let mut gateway_ready = false;
        let mut client_ready = false;

        for attempt in 1..=max_attempts {
            if !gateway_ready {
                info!("Checking {}... (attempt {}/{})", gateway, attempt, max_attempts);
                gateway_ready = classify_readiness(gateway, self.gateway.check_ready().await)?;
            }

            if !client_ready {
                info!("Checking {}... (attempt {}/{})", client, attempt, max_attempts);
                client_ready = classify_readiness(client, self.client.check_ready().await)?;
            }

            if gateway_ready && client_ready {
                info!("Both services ready");
                self.health.set_service_status(true, true);
                return Ok(true);
            }

            if attempt < max_attempts
                && pause(self.timing.startup_check_interval(), shutdown).await
            {
                return Ok(false);
            }
        }

        error!("Services not ready after {} attempts", max_attempts);
        Err(Error::StartupTimeout {
            attempts: max_attempts,
        })
    }

    /// Perform a single reconcile cycle
    ///
    /// Every collaborator failure is classified, logged and reflected in the
    /// health status before this returns.
    ///
    /// # Returns
    ///
    /// - `Ok(SyncOutcome)`: the client listens on the forwarded port, or
    ///   there is nothing to sync
    /// - `Err(Error)`: the cycle failed; see the variant for the reason
    pub async fn sync_port(&self) -> Result<SyncOutcome> {
        let (gateway, client) = (self.gateway.name(), self.client.name());

        let target_port = match self.gateway.fetch_forwarded_port().await {
            PortQuery::AuthFailure(msg) => {
                return Err(self.fail_auth(gateway, msg));
            }
            PortQuery::TransientFailure(msg) => {
                warn!("Failed to get {} port: {}", gateway, msg);
                // Client reachability is whatever it was last cycle
                let client_ok = self.health.client_reachable();
                self.health.set_service_status(false, client_ok);
                return Err(Error::unreachable(gateway, msg));
            }
            PortQuery::Ok(None) => {
                warn!("No port forwarded (VPN may be disconnected)");
                self.health.set_service_status(true, true);
                return Ok(SyncOutcome::NoPortForwarded);
            }
            PortQuery::Ok(Some(port)) => port,
        };

        let current_port = match self.client.read_listen_port().await {
            PortQuery::AuthFailure(msg) => {
                return Err(self.fail_auth(client, msg));
            }
            PortQuery::TransientFailure(msg) => {
                warn!("Failed to get {} port: {}", client, msg);
                self.health.set_service_status(true, false);
                return Err(Error::unreachable(client, msg));
            }
            PortQuery::Ok(None) => {
                let msg = "listening port missing from response";
                warn!("Failed to get {} port: {}", client, msg);
                self.health.set_service_status(true, false);
                return Err(Error::unreachable(client, msg));
            }
            PortQuery::Ok(Some(port)) => port,
        };

        self.health.set_service_status(true, true);

        if current_port == target_port {
            info!("Port unchanged ({})", current_port);
            return Ok(SyncOutcome::Unchanged { port: current_port });
        }

        info!(
            "Port changed: {} -> {}, updating {}",
            current_port, target_port, client
        );

        if let Some(msg) = self.client.write_listen_port(target_port).await.error_message() {
            // The write may have landed anyway; the read-back decides
            error!("Failed to update port: {}", msg);
        }

        self.verify_port(current_port, target_port).await
    }

    /// Re-read the client's port until it reports `target_port`
    async fn verify_port(&self, previous_port: u16, target_port: u16) -> Result<SyncOutcome> {
        let max_attempts = self.timing.verify_max_attempts;
        let mut last_seen = None;

        for attempt in 1..=max_attempts {
            tokio::time::sleep(self.timing.verify_delay()).await;

            match self.client.read_listen_port().await {
                PortQuery::Ok(Some(port)) if port == target_port => {
                    info!("Port updated successfully to {}", target_port);
                    return Ok(SyncOutcome::Updated {
                        from: previous_port,
                        to: target_port,
                    });
                }
                PortQuery::Ok(port) => {
                    debug!(
                        "Port not yet updated (attempt {}/{}): expected {}, got {:?}",
                        attempt, max_attempts, target_port, port
                    );
                    last_seen = port;
                }
                failure => {
                    warn!(
                        "Failed to verify port update (attempt {}/{}): {}",
                        attempt,
                        max_attempts,
                        failure.error_message().unwrap_or_default()
                    );
                }
            }
        }

        let error = Error::VerificationFailed {
            expected: target_port,
            last_seen,
        };
        warn!("{} after {} attempts", error, max_attempts);
        Err(error)
    }

    fn fail_auth(&self, service: &'static str, msg: String) -> Error {
        let error = Error::auth(service, msg);
        error!("{}", error);
        self.health.set_healthy(false, error.to_string());
        error
    }

    /// Run the engine
    ///
    /// Waits `startup_check_delay`, gates on service readiness, then
    /// reconciles every `poll_interval` until SIGINT is received.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: Startup failed
    pub async fn run(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    let _ = tx.send(());
                }
                Err(e) => warn!("Failed to listen for CTRL-C, running until stopped: {}", e),
            }
        });
        self.run_internal(Some(rx)).await
    }

    /// Run the engine until `shutdown_rx` fires
    ///
    /// Shutdown takes effect at the next startup or poll sleep; a cycle in
    /// progress always completes. With `None` the loop never ends.
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&self, mut shutdown: Option<oneshot::Receiver<()>>) -> Result<()> {
        let startup_delay = self.timing.startup_check_delay();
        if !startup_delay.is_zero() {
            info!("Waiting {}s before startup checks...", startup_delay.as_secs());
            if pause(startup_delay, &mut shutdown).await {
                info!("Shutdown signal received");
                return Ok(());
            }
        }

        if !self.wait_for_services_internal(&mut shutdown).await? {
            info!("Shutdown signal received during startup");
            return Ok(());
        }

        info!("Starting port sync loop");
        loop {
            self.run_cycle().await;

            debug!("Sleeping for {}s", self.timing.poll_interval_secs);
            if pause(self.timing.poll_interval(), &mut shutdown).await {
                info!("Shutdown signal received, engine stopped");
                return Ok(());
            }
        }
    }

    /// Run one cycle in its own task so a panicking collaborator cannot take
    /// the loop down with it
    async fn run_cycle(&self) {
        let engine = self.clone();
        match tokio::spawn(async move { engine.sync_port().await }).await {
            Ok(Ok(outcome)) => debug!("Sync cycle complete: {:?}", outcome),
            Ok(Err(e)) => debug!("Sync cycle failed: {}", e),
            Err(join_error) => {
                let reason = if join_error.is_panic() {
                    panic_message(join_error.into_panic())
                } else {
                    join_error.to_string()
                };
                error!("Unexpected error in sync loop: {}", reason);
                self.health.set_healthy(false, reason);
            }
        }
    }
}

/// Classify a readiness check result
fn classify_readiness(service: &'static str, result: PortQuery) -> Result<bool> {
    match result {
        PortQuery::Ok(_) => {
            info!("{} is ready", service);
            Ok(true)
        }
        PortQuery::AuthFailure(msg) => {
            error!("{} authentication failed: {}", service, msg);
            Err(Error::auth(service, msg))
        }
        PortQuery::TransientFailure(msg) => {
            debug!("{} not ready: {}", service, msg);
            Ok(false)
        }
    }
}

/// Sleep for `duration`; returns `true` if shutdown was requested instead
///
/// A sender dropped without sending is not a shutdown request: the receiver
/// is discarded and the sleep runs to completion.
async fn pause(duration: Duration, shutdown: &mut Option<oneshot::Receiver<()>>) -> bool {
    let sleep = tokio::time::sleep(duration);
    tokio::pin!(sleep);

    let sender_dropped = match shutdown.as_mut() {
        Some(rx) => tokio::select! {
            _ = &mut sleep => return false,
            result = rx => match result {
                Ok(()) => return true,
                Err(_) => true,
            },
        },
        None => false,
    };
    if sender_dropped {
        debug!("Shutdown sender dropped, no longer listening for shutdown");
        *shutdown = None;
    }

    sleep.await;
    false
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "sync cycle panicked".to_string()
    }
}
