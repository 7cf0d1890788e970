//! Core traits for portsync
//!
//! This module defines the abstract interfaces the sync engine consumes.
//!
//! - [`PortQuery`]: Classified outcome of every collaborator call
//! - [`GatewayPortSource`]: Query the VPN gateway for its forwarded port
//! - [`ClientPortTarget`]: Read and write the torrent client's listening port

pub mod port_query;
pub mod port_source;
pub mod port_target;

pub use port_query::PortQuery;
pub use port_source::GatewayPortSource;
pub use port_target::ClientPortTarget;
