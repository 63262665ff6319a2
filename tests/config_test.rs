//! Unit tests for the configuration layer

use std::time::Duration;

use abstractu_content::config::{AppConfig, DatabaseConfig, RetryConfig};

#[test]
fn test_default_config_values() {
    let config = AppConfig::default();

    assert_eq!(config.database.url, "sqlite:data/abstractu.db");
    assert_eq!(config.database.max_connections, 10);
    assert_eq!(config.database.connection_timeout_secs, 30);
    assert_eq!(config.database.busy_timeout_ms, 5000);
    assert_eq!(config.server.bind_address, "127.0.0.1:3000");
    assert!(config.admin.addresses.is_empty());
}

#[test]
fn test_default_logging_config() {
    let config = AppConfig::default();

    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.file_path, None);
    assert_eq!(config.logging.format, "text");
}

#[test]
fn test_default_retry_config() {
    let retry = AppConfig::default().retry;
    assert_eq!(retry, RetryConfig::default());
    assert_eq!(retry.max_attempts, 3);
    assert_eq!(retry.backoff(1), Duration::from_millis(25));
    assert_eq!(retry.backoff(2), Duration::from_millis(50));
}

#[test]
fn test_config_validation_success() {
    assert!(AppConfig::default().validate().is_ok());
}

#[test]
fn test_config_validation_zero_max_connections() {
    let mut config = AppConfig::default();
    config.database.max_connections = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_empty_database_url() {
    let mut config = AppConfig::default();
    config.database.url = "  ".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_invalid_log_level() {
    let mut config = AppConfig::default();
    config.logging.level = "invalid".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_valid_log_levels() {
    for level in ["trace", "debug", "info", "warn", "error"] {
        let mut config = AppConfig::default();
        config.logging.level = level.to_string();
        assert!(config.validate().is_ok(), "Failed for level: {level}");
    }
}

#[test]
fn test_config_validation_invalid_log_format() {
    let mut config = AppConfig::default();
    config.logging.format = "xml".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_bad_bind_address() {
    let mut config = AppConfig::default();
    config.server.bind_address = "localhost".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_admin_addresses() {
    let mut config = AppConfig::default();
    config.admin.addresses = vec!["0xAbCdEf0123456789abcdef0123456789ABCDEF01".to_string()];
    assert!(config.validate().is_ok());

    config.admin.addresses.push("0x123".to_string());
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_retry_bounds() {
    let mut config = AppConfig::default();
    config.retry.max_attempts = 0;
    assert!(config.validate().is_err());

    let mut config = AppConfig::default();
    config.retry.base_backoff_ms = 1000;
    config.retry.max_backoff_ms = 10;
    assert!(config.validate().is_err());
}

#[test]
fn test_database_path_variants() {
    let config = DatabaseConfig {
        url: "sqlite:content.db".to_string(),
        max_connections: 1,
        connection_timeout_secs: 1,
        busy_timeout_ms: 0,
    };
    assert_eq!(config.path(), "content.db");

    let absolute = DatabaseConfig {
        url: "sqlite:///var/lib/abstractu.db".to_string(),
        ..config
    };
    assert_eq!(absolute.path(), "/var/lib/abstractu.db");
}

#[test]
fn test_yaml_round_trip() {
    let mut config = AppConfig::default();
    config.admin.addresses = vec!["0x1111111111111111111111111111111111111111".to_string()];

    let yaml = config.to_yaml().expect("yaml");
    assert!(yaml.contains("bind_address"));
    let parsed: AppConfig = serde_yaml::from_str(&yaml).expect("parse");
    assert_eq!(parsed, config);
}
