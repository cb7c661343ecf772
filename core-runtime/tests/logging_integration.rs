//! Integration tests for logging system

use bridge_traits::LogLevel;
use core_runtime::config::CoreConfig;
use core_runtime::logging::{init_logging, redact_uri, strip_path, LogFormat, LoggingConfig};

#[test]
fn test_logging_config_rides_on_core_config() {
    let logging = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_path_redaction(false)
        .with_spans(false);

    let config = CoreConfig::builder().logging(logging).build().unwrap();

    assert_eq!(config.logging.format, LogFormat::Compact);
    assert_eq!(config.logging.level, LogLevel::Warn);
    assert!(!config.logging.redact_paths);
    assert!(!config.logging.enable_spans);
}

#[test]
fn test_uri_redaction() {
    assert_eq!(
        redact_uri("file:///home/ana/Music/Album/01%20Intro.flac"),
        "file://.../01%20Intro.flac"
    );
    assert_eq!(
        redact_uri("mms://radio.example.net/live"),
        "mms://radio.example.net/..."
    );
    assert_eq!(redact_uri("C:\\Music\\song.mp3"), "song.mp3");
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("/var/log/app.log"), "app.log");
    assert_eq!(strip_path("D:\\data\\file.txt"), "file.txt");
    assert_eq!(strip_path("filename.txt"), "filename.txt");
    assert_eq!(strip_path(""), "");
}

#[test]
fn test_invalid_filter_is_rejected() {
    let config = LoggingConfig::default().with_filter("core_playback=loudest");
    assert!(init_logging(config).is_err());
}

#[test]
fn test_second_initialization_fails() {
    // The global subscriber can only be installed once per process; whichever
    // call wins, the other must report an error.
    let first = init_logging(LoggingConfig::default().with_format(LogFormat::Json));
    let second = init_logging(LoggingConfig::default());
    assert!(first.is_err() || second.is_err());
}
