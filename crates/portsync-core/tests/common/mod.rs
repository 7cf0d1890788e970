//! Test doubles and common utilities for engine contract tests
//!
//! The doubles replay scripted `PortQuery` results and count every call, so
//! tests can assert exactly which collaborator operations a cycle performed.

#![allow(dead_code)]

use portsync_core::config::TimingConfig;
use portsync_core::traits::{ClientPortTarget, GatewayPortSource, PortQuery};
use portsync_core::{HealthStatus, SyncEngine};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Pop the next scripted result; the last entry repeats forever
fn next_result(script: &Mutex<VecDeque<PortQuery>>) -> Option<PortQuery> {
    let mut script = script.lock().unwrap();
    if script.len() > 1 {
        script.pop_front()
    } else {
        script.front().cloned()
    }
}

/// A gateway that replays scripted results
pub struct ScriptedGateway {
    name: &'static str,
    script: Mutex<VecDeque<PortQuery>>,
    fetch_calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new(script: Vec<PortQuery>) -> Arc<Self> {
        Self::named("Gateway", script)
    }

    /// A scripted gateway reporting `name` in logs and errors
    pub fn named(name: &'static str, script: Vec<PortQuery>) -> Arc<Self> {
        Arc::new(Self {
            name,
            script: Mutex::new(script.into()),
            fetch_calls: AtomicUsize::new(0),
        })
    }

    /// A gateway that always forwards `port`
    pub fn forwarding(port: u16) -> Arc<Self> {
        Self::new(vec![PortQuery::port(port)])
    }

    /// Get the number of times the gateway was queried
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl GatewayPortSource for ScriptedGateway {
    async fn fetch_forwarded_port(&self) -> PortQuery {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        next_result(&self.script)
            .unwrap_or_else(|| PortQuery::transient("gateway script exhausted"))
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// A client that replays scripted reads and records writes
///
/// Once the read script is empty, reads report the stored port. With
/// `applying_writes()`, successful writes update the stored port.
pub struct ScriptedClient {
    port: Mutex<Option<u16>>,
    read_script: Mutex<VecDeque<PortQuery>>,
    write_script: Mutex<VecDeque<PortQuery>>,
    apply_writes: bool,
    read_calls: AtomicUsize,
    written_ports: Mutex<Vec<u16>>,
}

impl ScriptedClient {
    /// A client listening on `port` that ignores writes
    pub fn listening_on(port: u16) -> Self {
        Self {
            port: Mutex::new(Some(port)),
            read_script: Mutex::new(VecDeque::new()),
            write_script: Mutex::new(VecDeque::new()),
            apply_writes: false,
            read_calls: AtomicUsize::new(0),
            written_ports: Mutex::new(Vec::new()),
        }
    }

    /// Successful writes change the port reported by later reads
    pub fn applying_writes(mut self) -> Self {
        self.apply_writes = true;
        self
    }

    /// Results returned by reads before falling back to the stored port
    pub fn with_reads(self, reads: Vec<PortQuery>) -> Self {
        *self.read_script.lock().unwrap() = reads.into();
        self
    }

    /// Results returned by writes, in order; writes succeed once exhausted
    pub fn with_writes(self, writes: Vec<PortQuery>) -> Self {
        *self.write_script.lock().unwrap() = writes.into();
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Get the number of times the port was read
    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    /// Get the number of times the port was written
    pub fn write_calls(&self) -> usize {
        self.written_ports.lock().unwrap().len()
    }

    /// Ports passed to write_listen_port(), in order
    pub fn written_ports(&self) -> Vec<u16> {
        self.written_ports.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ClientPortTarget for ScriptedClient {
    async fn read_listen_port(&self) -> PortQuery {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(result) = self.read_script.lock().unwrap().pop_front() {
            return result;
        }
        PortQuery::Ok(*self.port.lock().unwrap())
    }

    async fn write_listen_port(&self, port: u16) -> PortQuery {
        self.written_ports.lock().unwrap().push(port);
        let result = self
            .write_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(PortQuery::port(port));

        if self.apply_writes && result.is_success() {
            *self.port.lock().unwrap() = Some(port);
        }
        result
    }
}

/// A gateway whose every query panics
pub struct PanickingGateway;

#[async_trait::async_trait]
impl GatewayPortSource for PanickingGateway {
    async fn fetch_forwarded_port(&self) -> PortQuery {
        panic!("gateway exploded");
    }

    async fn check_ready(&self) -> PortQuery {
        PortQuery::no_port()
    }
}

/// Timing with the documented defaults except no initial startup delay
pub fn test_timing() -> TimingConfig {
    TimingConfig {
        startup_check_delay_secs: 0,
        ..TimingConfig::default()
    }
}

/// Build an engine over the given doubles with a fresh health status
pub fn engine_with(
    gateway: Arc<dyn GatewayPortSource>,
    client: Arc<dyn ClientPortTarget>,
    timing: TimingConfig,
) -> (SyncEngine, Arc<HealthStatus>) {
    let health = Arc::new(HealthStatus::new());
    let engine = SyncEngine::new(gateway, client, Arc::clone(&health), timing);
    (engine, health)
}
