use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub lock: LockConfig,
    pub jwt: JwtConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Backing cache for the distributed lock service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub host: String,
    pub port: u16,
}

impl CacheConfig {
    pub fn url(&self) -> String {
        format!("redis://{}:{}", self.host, self.port)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub url: String,
    /// Bridge latency above which consumers log a warning.
    #[serde(default = "default_queue_delay_warning_ms")]
    pub delay_warning_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            delay_warning_ms: default_queue_delay_warning_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_scheduler_interval_ms")]
    pub interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_scheduler_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_lock_ttl_ms")]
    pub default_ttl_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: default_lock_ttl_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_in: i64, // seconds
}

fn default_max_connections() -> u32 {
    10
}

fn default_queue_delay_warning_ms() -> u64 {
    5_000
}

fn default_scheduler_interval_ms() -> u64 {
    10_000
}

fn default_lock_ttl_ms() -> u64 {
    30_000
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => {
                toml::from_str(&config_str)
                    .map_err(|e| format!("Failed to parse config file: {e}"))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // No config file: build from environment variables and defaults
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                let database_url = get_env("DATABASE_URL")
                    .ok_or("DATABASE_URL env var missing and no config.toml found")?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    cache: CacheConfig {
                        host: get_env("CACHE_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
                        port: get_env_parse("CACHE_PORT", 6379u16),
                    },
                    queue: QueueConfig {
                        url: get_env("QUEUE_URL")
                            .unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
                        delay_warning_ms: get_env_parse(
                            "QUEUE_DELAY_WARNING_MS",
                            default_queue_delay_warning_ms(),
                        ),
                    },
                    scheduler: SchedulerConfig {
                        interval_ms: get_env_parse(
                            "SCHEDULER_INTERVAL_MS",
                            default_scheduler_interval_ms(),
                        ),
                    },
                    lock: LockConfig {
                        default_ttl_ms: get_env_parse("LOCK_DEFAULT_TTL_MS", default_lock_ttl_ms()),
                    },
                    jwt: JwtConfig {
                        secret: get_env("JWT_SECRET")
                            .unwrap_or_else(|| "change-me-in-production".to_string()),
                        access_token_expires_in: get_env_parse("JWT_ACCESS_EXPIRES_IN", 86_400i64),
                    },
                }
            }
            Err(e) => {
                return Err(format!("Failed to read config file {config_path}: {e}").into());
            }
        };

        // Env var overrides (applied even when the file exists)
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            config.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            config.database.max_connections = mc;
        }
        if let Ok(v) = env::var("CACHE_HOST") {
            config.cache.host = v;
        }
        if let Ok(v) = env::var("CACHE_PORT")
            && let Ok(p) = v.parse()
        {
            config.cache.port = p;
        }
        if let Ok(v) = env::var("QUEUE_URL") {
            config.queue.url = v;
        }
        if let Ok(v) = env::var("QUEUE_DELAY_WARNING_MS")
            && let Ok(n) = v.parse()
        {
            config.queue.delay_warning_ms = n;
        }
        if let Ok(v) = env::var("SCHEDULER_INTERVAL_MS")
            && let Ok(n) = v.parse()
        {
            config.scheduler.interval_ms = n;
        }
        if let Ok(v) = env::var("LOCK_DEFAULT_TTL_MS")
            && let Ok(n) = v.parse()
        {
            config.lock.default_ttl_ms = n;
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            config.jwt.secret = v;
        }
        if let Ok(v) = env::var("JWT_ACCESS_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            config.jwt.access_token_expires_in = n;
        }

        Ok(config)
    }
}
