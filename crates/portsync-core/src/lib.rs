// # portsync-core
//
// Core library for keeping a torrent client's listening port in sync with a
// VPN gateway's dynamically forwarded port.
//
// ## Architecture Overview
//
// This library provides the core functionality for port reconciliation:
// - **PortQuery**: Tri-state outcome every collaborator call returns
// - **GatewayPortSource**: Trait for querying the forwarded port
// - **ClientPortTarget**: Trait for reading and writing the listening port
// - **HealthStatus**: Shared, lock-protected health record for the health endpoint
// - **SyncEngine**: Orchestrates startup gating and the reconcile loop
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from HTTP clients
// 2. **Classified Results**: Collaborators never raise; every outcome is a `PortQuery`
// 3. **Read-back Verification**: A write only counts once the client reports it
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Idempotency**: A matching port never generates write traffic

pub mod traits;
pub mod engine;
pub mod health;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{ClientPortTarget, GatewayPortSource, PortQuery};
pub use engine::{SyncEngine, SyncOutcome};
pub use health::{HealthReport, HealthSnapshot, HealthStatus};
pub use config::{ClientConfig, GatewayAuth, GatewayConfig, HealthConfig, SyncConfig, TimingConfig};
pub use error::{Error, Result};
