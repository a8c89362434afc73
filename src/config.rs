use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use tracing::trace;

/// Storage backend configuration
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[default]
    #[serde(rename = "none")]
    None,

    /// SQLite database
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./redis-monitoring.db")
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// Fleet roster, in probe order
    #[serde(rename = "RedisServers", default)]
    pub servers: Vec<ServerConfig>,

    #[serde(rename = "Mail")]
    pub mail: MailConfig,

    /// Storage configuration (optional - defaults to in-memory)
    pub storage: Option<StorageConfig>,

    /// Seconds between two INFO polls of the same server
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    /// Connect timeout used by the liveness probe and the collectors
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

impl Config {
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }
}

/// One monitored Redis server.
///
/// Identity is `host:port`, see [`ServerConfig::id`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ServerConfig {
    pub server: String,
    #[serde(default = "crate::util::get_default_redis_port", deserialize_with = "deserialize_port")]
    pub port: u16,
    pub password: Option<String>,
}

impl ServerConfig {
    pub fn new(server: impl Into<String>, port: u16) -> Self {
        Self {
            server: server.into(),
            port,
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn id(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }
}

impl fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.server, self.port)
    }
}

/// Rosters in the wild carry the port both as a number and as a string.
fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port: {text:?}"))),
    }
}

/// Where alert mails go.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct MailConfig {
    #[serde(rename = "FromAddr")]
    pub from_addr: String,
    #[serde(rename = "ToAddr")]
    pub to_addr: String,
    /// `host` or `host:port`
    #[serde(rename = "SMTPServer")]
    pub smtp_server: String,
}

fn default_stats_interval() -> u64 {
    1
}

fn default_probe_timeout() -> u64 {
    5
}

pub fn parse_config(content: &str) -> anyhow::Result<Config> {
    serde_json::from_str(content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read configuration file {path}: {e}"))?;
    parse_config(&file_content)
}
