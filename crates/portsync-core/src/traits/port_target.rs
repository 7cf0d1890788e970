// # Client Port Target Trait
//
// Defines the interface for reading and writing the torrent client's
// listening port.
//
// ## Implementations
//
// - qBittorrent Web API: `portsync-qbittorrent` crate

use async_trait::async_trait;

use super::PortQuery;

/// Trait for torrent client implementations
///
/// Implementations handle their own session and authentication renewal.
/// Only the final outcome of each operation is surfaced.
#[async_trait]
pub trait ClientPortTarget: Send + Sync {
    /// Read the configured listening port
    async fn read_listen_port(&self) -> PortQuery;

    /// Write a new listening port
    ///
    /// Only the outcome matters on success; the port field is unspecified.
    /// A successful write does not guarantee the client applied the value,
    /// callers verify by reading it back.
    async fn write_listen_port(&self, port: u16) -> PortQuery;

    /// Readiness check used by the startup gate
    async fn check_ready(&self) -> PortQuery {
        self.read_listen_port().await
    }

    /// Name used in logs and health reasons
    fn name(&self) -> &'static str {
        "Client"
    }
}
