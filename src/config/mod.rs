// Configuration module entry point
// Layered settings: optional config file, OPDISPATCH__* environment, defaults

mod types;

use std::net::SocketAddr;
use std::time::Duration;

pub use types::{Config, DispatchConfig, HttpConfig, LoggingConfig, PerformanceConfig, ServerConfig};

/// Environment variable naming the config file (without extension)
pub const CONFIG_PATH_ENV: &str = "OPDISPATCH_CONFIG";

impl Config {
    /// Load from the path in `OPDISPATCH_CONFIG`, falling back to `config`
    pub fn load() -> Result<Self, config::ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config".to_string());
        Self::load_from(&path)
    }

    /// Load configuration from specified file path (without extension)
    /// A missing file is fine; defaults and environment still apply
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("OPDISPATCH")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "opdispatch")?
            .set_default("http.max_body_size", 10_485_760)? // 10MB
            .set_default("dispatch.mode", "positional")?
            .set_default("dispatch.check_arity", true)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    /// Upper bound for serving a single connection
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(std::cmp::max(
            self.performance.read_timeout,
            self.performance.write_timeout,
        ))
    }
}
