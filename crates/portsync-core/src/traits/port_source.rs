// # Gateway Port Source Trait
//
// Defines the interface for querying the VPN gateway's forwarded port.
//
// ## Implementations
//
// - Gluetun control server: `portsync-gluetun` crate
//
// ## Usage
//
// ```rust,ignore
// use portsync_core::{GatewayPortSource, PortQuery};
//
// async fn show(source: &dyn GatewayPortSource) {
//     match source.fetch_forwarded_port().await {
//         PortQuery::Ok(Some(port)) => println!("forwarded port: {port}"),
//         PortQuery::Ok(None) => println!("no port forwarded"),
//         other => println!("query failed: {:?}", other.error_message()),
//     }
// }
// ```

use async_trait::async_trait;

use super::PortQuery;

/// Trait for VPN gateway implementations
///
/// # Contract
///
/// - Exactly one request per call, bounded by the configured request timeout
/// - Never panics on transport failures; every outcome is classified
/// - No retries, no sleeping: the engine owns retry cadence
#[async_trait]
pub trait GatewayPortSource: Send + Sync {
    /// Query the currently forwarded port
    ///
    /// # Returns
    ///
    /// - `PortQuery::Ok(Some(port))`: forwarding is active
    /// - `PortQuery::Ok(None)`: gateway answered but nothing is forwarded
    /// - `PortQuery::AuthFailure` / `PortQuery::TransientFailure`: the query failed
    async fn fetch_forwarded_port(&self) -> PortQuery;

    /// Readiness check used by the startup gate
    ///
    /// Any success outcome means ready, including "no port".
    async fn check_ready(&self) -> PortQuery {
        self.fetch_forwarded_port().await
    }

    /// Name used in logs and health reasons
    fn name(&self) -> &'static str {
        "Gateway"
    }
}
