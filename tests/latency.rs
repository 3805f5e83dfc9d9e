//! Latency probe against a loopback echo server.

mod harness;

use std::time::Duration;

use harness::{ServerOptions, TestServer};
use wsprobe::{
    Config, Error, FanOut, FixedClock, LatencyProbe, Operation, Party, SystemClock, Timeouts,
    WsConnector,
};

fn literal_clock() -> FixedClock {
    FixedClock::new(Duration::new(1_700_000_000, 123_456_000))
}

#[tokio::test]
async fn test_literal_payload_round_trip() {
    let (server, _) = TestServer::spawn().await;
    let config = Config::new(server.endpoint());

    let report = LatencyProbe::from_config(&config)
        .run(&WsConnector::new(), &literal_clock())
        .await
        .unwrap();

    assert_eq!(
        report.sent,
        "Hello Gemini QA Project, Sent at: 1700000000.123456"
    );
    assert_eq!(report.received, report.sent);
    assert!(report.elapsed() < Duration::from_millis(2000));
    assert!(report.passed(), "{:?}", report.failures);

    server.shutdown().await;
}

#[tokio::test]
async fn test_system_clock_payload_is_echoed() {
    let (server, _) = TestServer::spawn().await;
    let probe = LatencyProbe::new(server.endpoint());

    let report = probe.run(&WsConnector::new(), &SystemClock).await.unwrap();
    assert!(report.sent.starts_with("Hello Gemini QA Project, Sent at: "));
    assert_eq!(report.received, report.sent);
    println!("Latency: {:.2} ms", report.elapsed().as_secs_f64() * 1000.0);

    server.shutdown().await;
}

#[tokio::test]
async fn test_zero_threshold_reports_latency_but_keeps_fidelity() {
    let (server, _) = TestServer::spawn().await;
    let probe = LatencyProbe::new(server.endpoint()).with_threshold(Duration::ZERO);

    let report = probe.run(&WsConnector::new(), &literal_clock()).await.unwrap();
    assert_eq!(report.received, report.sent);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        report.failures[0],
        Error::LatencyExceeded { threshold, .. } if threshold == Duration::ZERO
    ));

    server.shutdown().await;
}

#[tokio::test]
async fn test_corrupting_server_reports_fidelity_mismatch() {
    let (server, _) = TestServer::spawn_with(ServerOptions::corrupting()).await;
    let probe = LatencyProbe::new(server.endpoint());

    let report = probe.run(&WsConnector::new(), &literal_clock()).await.unwrap();
    assert_eq!(
        report.failures,
        vec![Error::FidelityMismatch {
            sent: report.sent.clone(),
            received: format!("{}\u{fffd}", report.sent),
        }]
    );

    let err = report.into_result().unwrap_err();
    assert!(err.to_string().contains("does not match"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_silent_server_times_out() {
    let (server, _) = TestServer::spawn_with(ServerOptions::fan_out(FanOut::relay_only())).await;
    let probe = LatencyProbe::new(server.endpoint())
        .with_timeouts(Timeouts::uniform(Duration::from_millis(200)));

    let err = probe.run(&WsConnector::new(), &literal_clock()).await.unwrap_err();
    assert_eq!(
        err,
        Error::Timeout {
            party: Party::Probe,
            operation: Operation::Recv,
            after: Duration::from_millis(200),
        }
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_refused_connection() {
    let addr = harness::unused_addr().await;
    let probe = LatencyProbe::new(harness::endpoint(addr));

    let err = probe.run(&WsConnector::new(), &literal_clock()).await.unwrap_err();
    assert!(
        matches!(err, Error::Connection { party: Party::Probe, .. }),
        "unexpected error: {err}"
    );
}
