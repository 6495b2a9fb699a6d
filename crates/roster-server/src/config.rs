use serde::{Deserialize, Serialize};
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Roster source file
    #[serde(default)]
    pub source: SourceConfig,
    /// Cache-aside settings
    #[serde(default)]
    pub cache: CacheConfig,
    /// Redis configuration
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.source.path.as_os_str().is_empty() {
            return Err("source.path must not be empty".into());
        }
        self.source.delimiter_byte()?;
        if self.cache.key.is_empty() {
            return Err("cache.key must not be empty".into());
        }
        if self.cache.timeout_ms == 0 {
            return Err("cache.timeout_ms must be > 0".into());
        }
        if self.redis.enabled {
            if self.redis.pool_size == 0 {
                return Err("redis.pool_size must be > 0".into());
            }
            if self.redis.timeout_ms == 0 {
                return Err("redis.timeout_ms must be > 0".into());
            }
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    3001
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// CSV file the roster is built from
    #[serde(default = "default_source_path")]
    pub path: PathBuf,
    /// Single-byte field delimiter
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

fn default_source_path() -> PathBuf {
    PathBuf::from("accounts.csv")
}
fn default_delimiter() -> String {
    ",".into()
}

impl SourceConfig {
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Name shown to clients when the source cannot be loaded.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn delimiter_byte(&self) -> Result<u8, String> {
        match self.delimiter.as_bytes() {
            [b] if b.is_ascii() && *b != b'"' && *b != b'\n' && *b != b'\r' => Ok(*b),
            _ => Err(format!(
                "source.delimiter must be a single ASCII character, got {:?}",
                self.delimiter
            )),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: default_source_path(),
            delimiter: default_delimiter(),
        }
    }
}

/// Cache-aside configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Key the serialized roster is stored under
    #[serde(default = "default_cache_key")]
    pub key: String,

    /// Upper bound for a single cache GET or SET, in milliseconds
    #[serde(default = "default_cache_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_cache_key() -> String {
    "users".into()
}

fn default_cache_timeout_ms() -> u64 {
    2000
}

impl CacheConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key: default_cache_key(),
            timeout_ms: default_cache_timeout_ms(),
        }
    }
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Enable Redis (falls back to an in-process store without it)
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Pool wait/create/recycle timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_enabled() -> bool {
    false
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    2000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default configuration file, read when present.
    pub const DEFAULT_CONFIG_FILE: &str = "roster.toml";

    /// Load configuration from an optional TOML file plus environment.
    ///
    /// Precedence: defaults < file < `ROSTER__SECTION__KEY` < `PORT`.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., ROSTER__SOURCE__PATH=/data/accounts.csv
        builder = builder.add_source(
            Environment::with_prefix("ROSTER")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let mut merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        apply_port_env(&mut merged)?;
        merged.validate()?;
        Ok(merged)
    }

    // Plain PORT is the conventional process setting and wins over everything else.
    fn apply_port_env(cfg: &mut AppConfig) -> Result<(), String> {
        match std::env::var("PORT") {
            Ok(port) if !port.trim().is_empty() => {
                cfg.server.port = port
                    .trim()
                    .parse()
                    .map_err(|e| format!("invalid PORT {port:?}: {e}"))?;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
