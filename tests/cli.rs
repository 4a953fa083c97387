mod support;

use std::io::ErrorKind;
use std::net::TcpListener;
use std::process::{Command, Output};

use anyhow::{Context, Result};
use support::{FULL_CAPABILITIES, FakeBroker, connack};

const EXPECTED_REPORT: &str = "\
CapabilityDetection initializing...

Guaranteed Publish Flow - Allowed
Guaranteed Subscription Flow - Not Allowed
Endpoint Management - Allowed
Temporary Endpoints - Allowed
Queue Browser - Not Allowed
On-Behalf-Of Subscription Manager - Not Allowed
Peer Software Version = 10.4.1.32
Message Router Name = edge-router-1
MAX Direct Message Size = 10000000
MAX Guaranteed Message Size = 30000000

Completed capability detection. Exiting.
";

fn run_detection(args: &[&str]) -> Result<Output> {
    Command::new(env!("CARGO_BIN_EXE_capability-detection"))
        .args(args)
        .args(["--timeout-ms", "5000"])
        .env_remove("RUST_LOG")
        .output()
        .context("failed to run capability-detection")
}

#[test]
fn prints_full_report_and_exits_cleanly() -> Result<()> {
    let broker = FakeBroker::spawn(connack(0, &FULL_CAPABILITIES))?;
    let endpoint = broker.endpoint();

    let output = run_detection(&[&endpoint, "alice@default", "secret"])?;
    let received = broker.finish()?;

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(String::from_utf8(output.stdout)?, EXPECTED_REPORT);
    assert!(
        received.ends_with(&[0xE0, 0x00]),
        "client should say DISCONNECT before hanging up"
    );
    Ok(())
}

#[test]
fn refused_connection_exits_with_failure() -> Result<()> {
    let broker = FakeBroker::spawn(connack(0x86, &[]))?;
    let endpoint = broker.endpoint();

    let output = run_detection(&[&endpoint, "alice@default", "wrong"])?;
    broker.finish()?;

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("refused"), "stderr: {stderr}");
    let stdout = String::from_utf8(output.stdout)?;
    assert!(!stdout.contains("Completed capability detection"));
    Ok(())
}

#[test]
fn flags_print_before_a_missing_scalar_aborts() -> Result<()> {
    let broker = FakeBroker::spawn(connack(
        0,
        &[("PUB_GUARANTEED", "true"), ("SUB_FLOW_GUARANTEED", "false")],
    ))?;
    let endpoint = broker.endpoint();

    let output = run_detection(&[&endpoint, "alice@default", "secret"])?;
    let received = broker.finish()?;

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        String::from_utf8(output.stdout)?,
        "\
CapabilityDetection initializing...

Guaranteed Publish Flow - Allowed
Guaranteed Subscription Flow - Not Allowed
Endpoint Management - Not Allowed
Temporary Endpoints - Not Allowed
Queue Browser - Not Allowed
On-Behalf-Of Subscription Manager - Not Allowed
"
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("PEER_SOFTWARE_VERSION"), "stderr: {stderr}");
    assert!(
        received.ends_with(&[0xE0, 0x00]),
        "session is closed before exiting"
    );
    Ok(())
}

#[test]
fn identity_without_domain_is_a_usage_error() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    listener.set_nonblocking(true)?;
    let endpoint = listener.local_addr()?.to_string();

    let output = run_detection(&[&endpoint, "alice", "secret"])?;

    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty(), "nothing printed before validation");
    match listener.accept() {
        Err(err) if err.kind() == ErrorKind::WouldBlock => {}
        other => panic!("broker should never see a connection, got {other:?}"),
    }
    Ok(())
}

#[test]
fn missing_arguments_are_a_usage_error() -> Result<()> {
    let output = run_detection(&["127.0.0.1:1"])?;
    assert_eq!(output.status.code(), Some(2));
    Ok(())
}
