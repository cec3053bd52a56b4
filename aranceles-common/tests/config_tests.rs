//! Tests for configuration resolution
//!
//! Covers the CLI → ENV → TOML → defaults priority and graceful handling
//! of a missing default config file.
//!
//! Note: Uses serial_test to prevent ENV variable race conditions. Tests
//! that manipulate ARANCELES_* / MONGO_* / BROKER_URL are marked #[serial].

use std::env;
use std::fs;

use aranceles_common::config::{load_toml, ServiceArgs, ServiceConfig};
use aranceles_common::Error;
use clap::Parser;
use serial_test::serial;
use tempfile::TempDir;

#[derive(Parser, Debug)]
struct TestCli {
    #[command(flatten)]
    service: ServiceArgs,
}

const ENV_VARS: &[&str] = &[
    "ARANCELES_PORT",
    "ARANCELES_DATABASE",
    "ARANCELES_CONFIG",
    "MONGO_HOST",
    "MONGO_ADMIN_USER",
    "MONGO_ADMIN_PASS",
    "BROKER_URL",
];

fn clear_env() {
    for var in ENV_VARS {
        env::remove_var(var);
    }
}

fn parse(args: &[&str]) -> ServiceArgs {
    let mut argv = vec!["test"];
    argv.extend_from_slice(args);
    TestCli::parse_from(argv).service
}

fn write_config(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

// ============================================================================
// Priority
// ============================================================================

#[test]
#[serial]
fn test_env_overrides_toml() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "debts.toml",
        r#"
        port = 9001
        [mongo]
        host = "toml-host:27017"
        "#,
    );

    env::set_var("MONGO_HOST", "env-host:27017");
    let args = parse(&["--config", path.to_str().unwrap()]);
    let config = ServiceConfig::resolve("debts", 8003, args).unwrap();

    assert_eq!(config.mongo.host, "env-host:27017");
    assert_eq!(config.port, 9001);
    assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
    clear_env();
}

#[test]
#[serial]
fn test_cli_overrides_env() {
    clear_env();
    env::set_var("ARANCELES_PORT", "7000");
    env::set_var("BROKER_URL", "nats://env:4222");

    let args = parse(&["--port", "7100"]);
    assert_eq!(args.port, Some(7100));
    assert_eq!(args.broker_url.as_deref(), Some("nats://env:4222"));
    clear_env();
}

#[test]
#[serial]
fn test_credentials_from_env() {
    clear_env();
    env::set_var("MONGO_ADMIN_USER", "admin");
    env::set_var("MONGO_ADMIN_PASS", "secret");

    let args = parse(&[]);
    assert!(args.config.is_none());
    let config = ServiceConfig::resolve("payments", 8002, args).unwrap();
    assert_eq!(config.mongo.user.as_deref(), Some("admin"));
    assert_eq!(config.mongo.password.as_deref(), Some("secret"));
    assert_eq!(config.mongo.database, "payments");
    clear_env();
}

// ============================================================================
// Config file handling
// ============================================================================

#[test]
#[serial]
fn test_explicit_missing_config_is_error() {
    clear_env();
    let args = parse(&["--config", "/nonexistent/aranceles.toml"]);
    let result = ServiceConfig::resolve("benefits", 8001, args);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
#[cfg(target_os = "linux")]
fn test_missing_default_config_uses_defaults() {
    clear_env();
    let dir = TempDir::new().unwrap();
    env::set_var("XDG_CONFIG_HOME", dir.path());

    let config = ServiceConfig::resolve("benefits", 8001, parse(&[])).unwrap();
    assert_eq!(config.port, 8001);
    assert!(config.config_path.is_none());

    env::remove_var("XDG_CONFIG_HOME");
}

#[test]
#[serial]
#[cfg(target_os = "linux")]
fn test_default_config_location_is_read() {
    clear_env();
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("aranceles")).unwrap();
    fs::write(
        dir.path().join("aranceles").join("payments.toml"),
        "[broker]\nstream = \"CUSTOM\"\nmax_deliver = 3\n",
    )
    .unwrap();
    env::set_var("XDG_CONFIG_HOME", dir.path());

    let config = ServiceConfig::resolve("payments", 8002, parse(&[])).unwrap();
    assert_eq!(config.broker.stream, "CUSTOM");
    assert_eq!(config.broker.max_deliver, 3);
    assert_eq!(config.broker.connect_attempts, 10);

    env::remove_var("XDG_CONFIG_HOME");
}

#[test]
fn test_invalid_toml_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "bad.toml", "port = \"not a number\"");
    assert!(matches!(load_toml(&path), Err(Error::Config(_))));
}

#[test]
fn test_logging_level_from_toml() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "log.toml", "[logging]\nlevel = \"debug\"\n");
    let toml = load_toml(&path).unwrap();
    assert_eq!(toml.logging.level, "debug");
}
