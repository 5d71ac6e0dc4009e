//! Tests for config module

use std::path::Path;
use std::time::Duration;

use iptv_checker::config::Config;
use serial_test::serial;

const ENV_KEYS: [&str; 5] = [
    "IPTV_CHECKER_TIMEOUT",
    "IPTV_CHECKER_CONCURRENT",
    "IPTV_CHECKER_PROCESSES",
    "IPTV_CHECKER_OUTPUT_PREFIX",
    "IPTV_CHECKER_LOG_LEVEL",
];

fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}

#[test]
fn test_config_file_exists() {
    let config_path = Path::new("config.toml");
    assert!(
        config_path.exists(),
        "config.toml should exist in project root"
    );
}

#[test]
fn test_config_toml_readable() {
    let content =
        std::fs::read_to_string("config.toml").expect("Should be able to read config.toml");

    for section in [
        "[checker]",
        "[input]",
        "[output]",
        "[report]",
        "[resume]",
        "[logging]",
    ] {
        assert!(
            content.contains(section),
            "config.toml should have {section} section"
        );
    }
}

#[test]
fn test_sample_config_matches_defaults() {
    let config = Config::from_file(Path::new("config.toml")).unwrap();
    config.validate().unwrap();

    let defaults = Config::default();
    assert_eq!(config.checker.concurrent, defaults.checker.concurrent);
    assert_eq!(config.checker.processes, defaults.checker.processes);
    assert_eq!(config.checker.max_retries, defaults.checker.max_retries);
    assert_eq!(config.timeout(), Duration::from_secs(10));
    assert_eq!(config.input.encodings, defaults.input.encodings);
    assert_eq!(config.output.prefix, "checked");
    assert!(config.output.working_dir.is_none());
}

#[test]
fn test_missing_config_file() {
    assert!(Config::from_file(Path::new("/nonexistent/iptv.toml")).is_err());
}

#[test]
#[serial]
fn test_env_overrides() {
    clear_env();
    std::env::set_var("IPTV_CHECKER_TIMEOUT", "2.5");
    std::env::set_var("IPTV_CHECKER_CONCURRENT", "12");
    std::env::set_var("IPTV_CHECKER_OUTPUT_PREFIX", "scan");
    std::env::set_var("IPTV_CHECKER_LOG_LEVEL", "debug");

    let config = Config::from_env();
    clear_env();

    let config = config.unwrap();
    assert_eq!(config.timeout(), Duration::from_millis(2500));
    assert_eq!(config.checker.concurrent, 12);
    assert_eq!(config.checker.processes, 1);
    assert_eq!(config.output.prefix, "scan");
    assert_eq!(config.logging.level, "debug");
}

#[test]
#[serial]
fn test_env_overrides_file() {
    clear_env();
    std::env::set_var("IPTV_CHECKER_PROCESSES", "3");

    let config = Config::load(Some(Path::new("config.toml")));
    clear_env();

    let config = config.unwrap();
    assert_eq!(config.checker.processes, 3);
    assert_eq!(config.scheduler_config().processes, 3);
}

#[test]
#[serial]
fn test_invalid_env_value() {
    clear_env();
    std::env::set_var("IPTV_CHECKER_CONCURRENT", "many");

    let result = Config::from_env();
    clear_env();

    let err = result.unwrap_err();
    assert!(err.to_string().contains("IPTV_CHECKER_CONCURRENT"));
}

#[test]
#[serial]
fn test_blank_env_value_is_ignored() {
    clear_env();
    std::env::set_var("IPTV_CHECKER_OUTPUT_PREFIX", "   ");

    let config = Config::from_env();
    clear_env();

    assert_eq!(config.unwrap().output.prefix, "checked");
}
