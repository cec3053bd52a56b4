//! Service configuration
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (`--port`, `--mongo-host`, ...)
//! 2. Environment variables (`ARANCELES_PORT`, `MONGO_HOST`, `BROKER_URL`, ...)
//! 3. TOML configuration file (`--config`, or `<config_dir>/aranceles/<service>.toml`)
//! 4. Built-in defaults
//!
//! Flags and environment variables are both handled by clap; the TOML file
//! fills whatever they leave unset.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use serde::Deserialize;

use crate::{Error, Result};

pub const DEFAULT_MONGO_HOST: &str = "mongodb:27017";
pub const DEFAULT_BROKER_URL: &str = "nats://nats:4222";
pub const DEFAULT_STREAM: &str = "ARANCELES";

/// Flags shared by every service binary (flatten into the binary's parser)
#[derive(Args, Debug, Clone, Default)]
pub struct ServiceArgs {
    /// Port to listen on
    #[arg(short, long, env = "ARANCELES_PORT")]
    pub port: Option<u16>,

    /// MongoDB host:port
    #[arg(long, env = "MONGO_HOST")]
    pub mongo_host: Option<String>,

    /// MongoDB user
    #[arg(long, env = "MONGO_ADMIN_USER", hide_env_values = true)]
    pub mongo_user: Option<String>,

    /// MongoDB password
    #[arg(long, env = "MONGO_ADMIN_PASS", hide_env_values = true)]
    pub mongo_password: Option<String>,

    /// Database name (defaults to the service name)
    #[arg(long, env = "ARANCELES_DATABASE")]
    pub database: Option<String>,

    /// NATS server URL
    #[arg(long, env = "BROKER_URL")]
    pub broker_url: Option<String>,

    /// Path to a TOML config file
    #[arg(short, long, env = "ARANCELES_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Configuration file contents; every key is optional
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub mongo: MongoSection,

    #[serde(default)]
    pub broker: BrokerSection,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MongoSection {
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerSection {
    #[serde(default)]
    pub url: Option<String>,

    /// JetStream stream holding every entity subject
    #[serde(default = "default_stream")]
    pub stream: String,

    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    #[serde(default = "default_connect_delay_secs")]
    pub connect_delay_secs: u64,

    /// Deliveries before the broker drops a message that keeps failing
    #[serde(default = "default_max_deliver")]
    pub max_deliver: i64,

    #[serde(default = "default_nak_delay_secs")]
    pub nak_delay_secs: u64,

    #[serde(default = "default_ack_wait_secs")]
    pub ack_wait_secs: u64,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            url: None,
            stream: default_stream(),
            connect_attempts: default_connect_attempts(),
            connect_delay_secs: default_connect_delay_secs(),
            max_deliver: default_max_deliver(),
            nak_delay_secs: default_nak_delay_secs(),
            ack_wait_secs: default_ack_wait_secs(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` overrides
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_stream() -> String {
    DEFAULT_STREAM.to_string()
}

fn default_connect_attempts() -> u32 {
    10
}

fn default_connect_delay_secs() -> u64 {
    5
}

fn default_max_deliver() -> i64 {
    5
}

fn default_nak_delay_secs() -> u64 {
    2
}

fn default_ack_wait_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolved MongoDB connection settings
#[derive(Debug, Clone)]
pub struct MongoSettings {
    pub host: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: String,
}

/// Resolved broker settings
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub url: String,
    pub stream: String,
    /// Durable consumer name and subject prefix (`<service>.*.*`)
    pub service: String,
    pub connect_attempts: u32,
    pub connect_delay: Duration,
    pub max_deliver: i64,
    pub nak_delay: Duration,
    pub ack_wait: Duration,
}

impl BrokerSettings {
    /// Subjects covered by the shared stream
    pub fn stream_subjects(&self) -> Vec<String> {
        ["benefits", "debts", "enrollments", "payments"]
            .iter()
            .map(|kind| format!("{}.>", kind))
            .collect()
    }

    /// Filter subject of this service's consumer
    pub fn filter_subject(&self) -> String {
        format!("{}.*.*", self.service)
    }
}

/// Fully resolved configuration of one service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub service: String,
    pub port: u16,
    pub mongo: MongoSettings,
    pub broker: BrokerSettings,
    pub log_level: String,
    /// File the TOML layer was read from; `None` when running on defaults
    pub config_path: Option<PathBuf>,
}

impl ServiceConfig {
    /// Merge CLI/env arguments, the TOML file and defaults
    pub fn resolve(service: &str, default_port: u16, mut args: ServiceArgs) -> Result<Self> {
        let (toml, config_path) = match args.config.take() {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                (load_toml(&path)?, Some(path))
            }
            None => match default_config_path(service) {
                Some(path) if path.exists() => (load_toml(&path)?, Some(path)),
                _ => (TomlConfig::default(), None),
            },
        };

        Ok(Self::merge(service, default_port, args, toml, config_path))
    }

    fn merge(
        service: &str,
        default_port: u16,
        args: ServiceArgs,
        toml: TomlConfig,
        config_path: Option<PathBuf>,
    ) -> Self {
        let TomlConfig {
            port,
            mongo,
            broker,
            logging,
        } = toml;

        let mongo = MongoSettings {
            host: args
                .mongo_host
                .or(mongo.host)
                .unwrap_or_else(|| DEFAULT_MONGO_HOST.to_string()),
            user: args.mongo_user.or(mongo.user),
            password: args.mongo_password.or(mongo.password),
            database: args
                .database
                .or(mongo.database)
                .unwrap_or_else(|| service.to_string()),
        };

        let broker = BrokerSettings {
            url: args
                .broker_url
                .or(broker.url)
                .unwrap_or_else(|| DEFAULT_BROKER_URL.to_string()),
            stream: broker.stream,
            service: service.to_string(),
            connect_attempts: broker.connect_attempts,
            connect_delay: Duration::from_secs(broker.connect_delay_secs),
            max_deliver: broker.max_deliver,
            nak_delay: Duration::from_secs(broker.nak_delay_secs),
            ack_wait: Duration::from_secs(broker.ack_wait_secs),
        };

        Self {
            service: service.to_string(),
            port: args.port.or(port).unwrap_or(default_port),
            mongo,
            broker,
            log_level: logging.level,
            config_path,
        }
    }
}

/// `<config_dir>/aranceles/<service>.toml`, when the platform has a config dir
pub fn default_config_path(service: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("aranceles").join(format!("{}.toml", service)))
}

/// Read and parse a TOML config file
pub fn load_toml(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse TOML {}: {}", path.display(), e)))
}
