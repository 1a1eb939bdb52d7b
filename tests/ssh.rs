// ABOUTME: Integration tests for SSH session setup.
// ABOUTME: Covers failures that are detectable without a reachable SSH server.

use std::time::Duration;
use stevedore::ssh::{CommandOutput, Error, Session, SessionConfig};

/// Test: Connection to an unresolvable host returns Connection error.
#[tokio::test]
async fn invalid_host_returns_connection_error() {
    let config = SessionConfig::new("nonexistent.invalid.host.example", "testuser")
        .password("unused")
        .connect_timeout(Duration::from_secs(5));

    let err = Session::connect(config).await.unwrap_err();

    assert!(
        matches!(err, Error::Connection(_)),
        "expected Connection error, got: {:?}",
        err
    );
    assert!(err.is_connect_error());
}

/// Test: Closed local port is reported as a connection failure.
#[tokio::test]
async fn refused_port_returns_connection_error() {
    let config = SessionConfig::new("127.0.0.1", "testuser")
        .port(1)
        .password("unused")
        .connect_timeout(Duration::from_secs(5));

    let err = Session::connect(config).await.unwrap_err();
    assert!(matches!(err, Error::Connection(_)), "got: {:?}", err);
}

/// Test: Missing key file fails before any network traffic.
#[tokio::test]
async fn missing_key_file_returns_key_error() {
    let config = SessionConfig::new("nonexistent.invalid.host.example", "testuser")
        .key_path("/nonexistent/key/path");

    let err = Session::connect(config).await.unwrap_err();

    assert!(
        matches!(err, Error::KeyLoadFailed { .. }),
        "expected KeyLoadFailed, got: {:?}",
        err
    );
}

#[test]
fn mid_session_errors_are_not_connect_errors() {
    assert!(!Error::ChannelClosed.is_connect_error());
    assert!(!Error::CommandTimeout(Duration::from_secs(1)).is_connect_error());
    assert!(Error::AuthenticationFailed.is_connect_error());
}

#[test]
fn command_output_success_means_exit_zero() {
    assert!(CommandOutput::new(0, "out", "").success());
    assert!(!CommandOutput::new(1, "", "err").success());
}
