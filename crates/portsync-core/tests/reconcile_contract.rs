//! Contract Test: Reconcile Cycle
//!
//! This test verifies the fetch → compare → update → verify cycle.
//!
//! Constraints verified:
//! - A matching port never generates write traffic
//! - A differing port is written exactly once, then verified by reading back
//! - "No port forwarded" is a success and touches nothing else
//! - Auth failures stop the cycle and mark health unhealthy with the service name
//! - Transient failures mark the failing service unreachable
//! - A failed write still proceeds to verification

mod common;

use common::*;
use portsync_core::traits::PortQuery;
use portsync_core::{Error, SyncOutcome};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn matching_port_does_not_write() {
    let gateway = ScriptedGateway::forwarding(54321);
    let client = ScriptedClient::listening_on(54321).build();
    let (engine, health) = engine_with(gateway.clone(), client.clone(), test_timing());

    let outcome = engine.sync_port().await.expect("cycle succeeds");

    assert_eq!(outcome, SyncOutcome::Unchanged { port: 54321 });
    assert_eq!(client.write_calls(), 0, "steady state must not write");
    assert_eq!(client.read_calls(), 1);
    assert!(health.status().healthy);
}

#[tokio::test(start_paused = true)]
async fn repeated_cycles_in_steady_state_never_write() {
    let gateway = ScriptedGateway::forwarding(6881);
    let client = ScriptedClient::listening_on(6881).build();
    let (engine, _health) = engine_with(gateway.clone(), client.clone(), test_timing());

    for _ in 0..5 {
        engine.sync_port().await.expect("cycle succeeds");
    }

    assert_eq!(gateway.fetch_calls(), 5);
    assert_eq!(client.write_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn changed_port_is_written_and_verified_once() {
    let gateway = ScriptedGateway::forwarding(54321);
    let client = ScriptedClient::listening_on(12345).applying_writes().build();
    let (engine, health) = engine_with(gateway.clone(), client.clone(), test_timing());

    let started = tokio::time::Instant::now();
    let outcome = engine.sync_port().await.expect("cycle succeeds");

    assert_eq!(
        outcome,
        SyncOutcome::Updated {
            from: 12345,
            to: 54321
        }
    );
    assert_eq!(client.written_ports(), vec![54321]);
    // Initial read plus exactly one verification read
    assert_eq!(client.read_calls(), 2);
    // One verify delay elapsed before the verification read
    assert_eq!(started.elapsed(), Duration::from_secs(2));
    assert!(health.status().healthy);
}

#[tokio::test(start_paused = true)]
async fn verification_succeeds_on_a_later_attempt() {
    let gateway = ScriptedGateway::forwarding(54321);
    let client = ScriptedClient::listening_on(12345)
        .with_reads(vec![
            PortQuery::port(12345),
            PortQuery::port(12345),
            PortQuery::port(54321),
        ])
        .build();
    let (engine, _health) = engine_with(gateway.clone(), client.clone(), test_timing());

    let outcome = engine.sync_port().await;

    assert!(matches!(outcome, Ok(SyncOutcome::Updated { to: 54321, .. })));
    assert_eq!(client.write_calls(), 1);
    assert_eq!(client.read_calls(), 3, "stops as soon as the port matches");
}

#[tokio::test(start_paused = true)]
async fn verification_fails_after_max_attempts() {
    let gateway = ScriptedGateway::forwarding(54321);
    // Write "succeeds" but the client keeps reporting the old port
    let client = ScriptedClient::listening_on(12345).build();
    let (engine, _health) = engine_with(gateway.clone(), client.clone(), test_timing());

    let result = engine.sync_port().await;

    match result {
        Err(Error::VerificationFailed {
            expected,
            last_seen,
        }) => {
            assert_eq!(expected, 54321);
            assert_eq!(last_seen, Some(12345));
        }
        other => panic!("expected verification failure, got {:?}", other),
    }
    assert_eq!(client.write_calls(), 1);
    // Initial read plus verify_max_attempts (3) verification reads
    assert_eq!(client.read_calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn verification_budget_is_configurable() {
    let gateway = ScriptedGateway::forwarding(54321);
    let client = ScriptedClient::listening_on(12345).build();
    let mut timing = test_timing();
    timing.verify_max_attempts = 5;
    let (engine, _health) = engine_with(gateway.clone(), client.clone(), timing);

    assert!(engine.sync_port().await.is_err());
    assert_eq!(client.read_calls(), 6);
}

#[tokio::test(start_paused = true)]
async fn failed_write_still_verifies() {
    let gateway = ScriptedGateway::forwarding(54321);
    // The write reports a failure but the change lands anyway
    let client = ScriptedClient::listening_on(12345)
        .with_reads(vec![PortQuery::port(12345), PortQuery::port(54321)])
        .with_writes(vec![PortQuery::transient("Request timed out")])
        .build();
    let (engine, _health) = engine_with(gateway.clone(), client.clone(), test_timing());

    let outcome = engine.sync_port().await;

    assert!(matches!(outcome, Ok(SyncOutcome::Updated { .. })));
    assert_eq!(client.write_calls(), 1);
    assert_eq!(client.read_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn verification_read_failures_are_not_fatal() {
    let gateway = ScriptedGateway::forwarding(54321);
    let client = ScriptedClient::listening_on(12345)
        .with_reads(vec![
            PortQuery::port(12345),
            PortQuery::transient("Connection error"),
            PortQuery::port(54321),
        ])
        .build();
    let (engine, _health) = engine_with(gateway.clone(), client.clone(), test_timing());

    assert!(engine.sync_port().await.is_ok());
    assert_eq!(client.read_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn verification_failure_without_any_successful_read() {
    let gateway = ScriptedGateway::forwarding(54321);
    let client = ScriptedClient::listening_on(12345)
        .with_reads(vec![
            PortQuery::port(12345),
            PortQuery::transient("Request timed out"),
            PortQuery::transient("Request timed out"),
            PortQuery::transient("Request timed out"),
        ])
        .build();
    let (engine, _health) = engine_with(gateway.clone(), client.clone(), test_timing());

    match engine.sync_port().await {
        Err(Error::VerificationFailed { last_seen, .. }) => assert_eq!(last_seen, None),
        other => panic!("expected verification failure, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn no_forwarded_port_is_success_without_client_calls() {
    let gateway = ScriptedGateway::new(vec![PortQuery::no_port()]);
    let client = ScriptedClient::listening_on(12345).build();
    let (engine, health) = engine_with(gateway.clone(), client.clone(), test_timing());

    let outcome = engine.sync_port().await.expect("no port is not an error");

    assert_eq!(outcome, SyncOutcome::NoPortForwarded);
    assert_eq!(client.read_calls(), 0);
    assert_eq!(client.write_calls(), 0);
    assert!(health.status().healthy);
    assert!(health.client_reachable());
}

#[tokio::test(start_paused = true)]
async fn gateway_auth_failure_stops_the_cycle() {
    let gateway = ScriptedGateway::new(vec![PortQuery::auth_failure("Authentication failed")]);
    let client = ScriptedClient::listening_on(12345).build();
    let (engine, health) = engine_with(gateway.clone(), client.clone(), test_timing());
    health.set_service_status(true, true);

    let result = engine.sync_port().await;

    assert!(result.unwrap_err().is_auth());
    assert_eq!(client.read_calls(), 0, "client must not be queried");

    let status = health.status();
    assert!(!status.healthy);
    assert!(status.reason.contains("Gateway"));
    assert!(status.reason.contains("Authentication failed"));
    // Credentials problem, not reachability
    assert!(health.gateway_reachable());
    assert!(health.client_reachable());
}

#[tokio::test(start_paused = true)]
async fn failures_carry_the_collaborator_name() {
    let gateway = ScriptedGateway::named(
        "Gluetun",
        vec![PortQuery::auth_failure("Authentication failed")],
    );
    let client = ScriptedClient::listening_on(12345).build();
    let (engine, health) = engine_with(gateway.clone(), client.clone(), test_timing());

    match engine.sync_port().await {
        Err(Error::Authentication { service, .. }) => assert_eq!(service, "Gluetun"),
        other => panic!("expected auth failure, got {:?}", other),
    }
    assert_eq!(
        health.status().reason,
        "Gluetun auth error: Authentication failed"
    );
}

#[tokio::test(start_paused = true)]
async fn client_auth_failure_stops_before_write() {
    let gateway = ScriptedGateway::forwarding(54321);
    let client = ScriptedClient::listening_on(12345)
        .with_reads(vec![PortQuery::auth_failure("Authentication failed")])
        .build();
    let (engine, health) = engine_with(gateway.clone(), client.clone(), test_timing());

    let result = engine.sync_port().await;

    assert!(result.unwrap_err().is_auth());
    assert_eq!(client.write_calls(), 0);
    assert_eq!(client.read_calls(), 1);

    let status = health.status();
    assert!(!status.healthy);
    assert!(status.reason.contains("Client"));
    assert!(!status.reason.contains("Gateway"));
}

#[tokio::test(start_paused = true)]
async fn gateway_timeout_marks_gateway_unreachable() {
    let gateway = ScriptedGateway::new(vec![PortQuery::transient("Request timed out")]);
    let client = ScriptedClient::listening_on(12345).build();
    let (engine, health) = engine_with(gateway.clone(), client.clone(), test_timing());
    // Both sides were reachable after startup
    health.set_service_status(true, true);

    let result = engine.sync_port().await;

    assert!(matches!(
        result,
        Err(Error::Unreachable {
            service: "Gateway",
            ..
        })
    ));
    assert_eq!(client.read_calls(), 0, "client must not be queried");

    let status = health.status();
    assert!(!status.healthy);
    assert_eq!(status.reason, "Gateway unreachable");
}

#[tokio::test(start_paused = true)]
async fn gateway_failure_keeps_previous_client_reachability() {
    let gateway = ScriptedGateway::new(vec![PortQuery::transient("Connection error")]);
    let client = ScriptedClient::listening_on(12345).build();
    let (engine, health) = engine_with(gateway.clone(), client.clone(), test_timing());
    health.set_service_status(true, false);

    assert!(engine.sync_port().await.is_err());

    assert!(!health.client_reachable());
    assert_eq!(
        health.status().reason,
        "Gateway unreachable, Client unreachable"
    );
}

#[tokio::test(start_paused = true)]
async fn client_failure_marks_client_unreachable() {
    let gateway = ScriptedGateway::forwarding(54321);
    let client = ScriptedClient::listening_on(12345)
        .with_reads(vec![PortQuery::transient("Server error: 500")])
        .build();
    let (engine, health) = engine_with(gateway.clone(), client.clone(), test_timing());

    let result = engine.sync_port().await;

    assert!(matches!(
        result,
        Err(Error::Unreachable {
            service: "Client",
            ..
        })
    ));
    assert_eq!(client.write_calls(), 0);
    assert!(health.gateway_reachable());
    assert_eq!(health.status().reason, "Client unreachable");
}

#[tokio::test(start_paused = true)]
async fn recovery_restores_health_after_auth_override() {
    let gateway = ScriptedGateway::new(vec![
        PortQuery::auth_failure("Authentication failed"),
        PortQuery::port(6881),
    ]);
    let client = ScriptedClient::listening_on(6881).build();
    let (engine, health) = engine_with(gateway.clone(), client.clone(), test_timing());

    assert!(engine.sync_port().await.is_err());
    assert!(!health.status().healthy);

    assert!(engine.sync_port().await.is_ok());
    let status = health.status();
    assert!(status.healthy);
    assert!(status.reason.is_empty());
}
