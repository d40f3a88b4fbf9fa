use leafsync_logger::{Logger, LoggerError};

#[test]
fn second_init_reports_subscriber_error() {
    let _logger = Logger::builder().name("leafsync-first").init().expect("first init should succeed");

    let err = Logger::builder().name("leafsync-second").init().expect_err("second init should fail");

    assert!(matches!(err, LoggerError::Subscriber { .. }), "expected subscriber error, got {err}");
    assert_eq!(err.kind(), "subscriber");
}
