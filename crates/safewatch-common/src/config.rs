//! Configuration for SafeWatch

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Token and login configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// SMS delivery configuration
    #[serde(default)]
    pub sms: SmsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// API port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for `TcpListener::bind`
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Seconds to wait for a free connection
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_acquire_timeout() -> u64 {
    30
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign bearer tokens. No default: `validate` rejects
    /// anything shorter than [`MIN_TOKEN_SECRET_BYTES`].
    #[serde(default)]
    pub token_secret: String,

    /// Token lifetime in hours
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,

    /// Reject unauthenticated requests on every `/api` route
    #[serde(default)]
    pub require_auth: bool,

    /// Administrator created on startup when no users exist
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: String::new(),
            token_ttl_hours: default_token_ttl_hours(),
            require_auth: false,
            bootstrap_admin: None,
        }
    }
}

/// Shortest accepted HS256 signing secret
pub const MIN_TOKEN_SECRET_BYTES: usize = 32;

fn default_token_ttl_hours() -> i64 {
    24
}

/// Initial administrator account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default = "default_admin_name")]
    pub full_name: String,
}

fn default_admin_name() -> String {
    "System Administrator".to_string()
}

/// Which SMS gateway implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayKind {
    /// Random outcome per message, no network traffic
    Simulated,
    /// JSON POST to an HTTP SMS provider
    Http,
}

/// SMS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsConfig {
    /// Gateway implementation
    #[serde(default = "default_gateway")]
    pub gateway: GatewayKind,

    /// Probability that a simulated message is delivered
    #[serde(default = "default_success_rate")]
    pub success_rate: f64,

    /// Cost charged per sent message
    #[serde(default = "default_cost_per_message")]
    pub cost_per_message: f64,

    /// Run the background dispatcher for scheduled alerts
    #[serde(default = "default_dispatch_enabled")]
    pub dispatch_enabled: bool,

    /// Seconds between dispatcher ticks
    #[serde(default = "default_dispatch_interval")]
    pub dispatch_interval_secs: u64,

    /// HTTP gateway settings (required when `gateway = "http"`)
    pub http: Option<HttpGatewayConfig>,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            gateway: default_gateway(),
            success_rate: default_success_rate(),
            cost_per_message: default_cost_per_message(),
            dispatch_enabled: default_dispatch_enabled(),
            dispatch_interval_secs: default_dispatch_interval(),
            http: None,
        }
    }
}

fn default_gateway() -> GatewayKind {
    GatewayKind::Simulated
}

fn default_success_rate() -> f64 {
    0.95
}

fn default_cost_per_message() -> f64 {
    0.05
}

fn default_dispatch_enabled() -> bool {
    true
}

fn default_dispatch_interval() -> u64 {
    30
}

/// HTTP SMS provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpGatewayConfig {
    /// Endpoint receiving `{"to", "message"}` JSON
    pub url: String,

    /// Bearer key sent with every request
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,
}

fn default_gateway_timeout() -> u64 {
    10
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default file locations and the environment.
    ///
    /// Sources, later ones winning:
    /// `/etc/safewatch/config.toml`, `./safewatch.toml`, then `SAFEWATCH__*`
    /// variables (`SAFEWATCH__DATABASE__URL`, `SAFEWATCH__SMS__GATEWAY`, ...).
    pub fn load() -> crate::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name("/etc/safewatch/config").required(false))
            .add_source(::config::File::with_name("safewatch").required(false))
            .add_source(
                ::config::Environment::with_prefix("SAFEWATCH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::Error::Config(format!("Failed to load configuration: {}", e)))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> crate::Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(crate::Error::Config("database.url is required".to_string()));
        }
        if self.auth.token_secret.trim().len() < MIN_TOKEN_SECRET_BYTES {
            return Err(crate::Error::Config(format!(
                "auth.token_secret must be at least {} bytes",
                MIN_TOKEN_SECRET_BYTES
            )));
        }
        if self.auth.token_ttl_hours <= 0 {
            return Err(crate::Error::Config(
                "auth.token_ttl_hours must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.sms.success_rate) {
            return Err(crate::Error::Config(
                "sms.success_rate must be between 0 and 1".to_string(),
            ));
        }
        if self.sms.cost_per_message < 0.0 {
            return Err(crate::Error::Config(
                "sms.cost_per_message must not be negative".to_string(),
            ));
        }
        if self.sms.gateway == GatewayKind::Http && self.sms.http.is_none() {
            return Err(crate::Error::Config(
                "sms.http must be set when sms.gateway = \"http\"".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sections() {
        let server = ServerConfig::default();
        assert_eq!(server.listen_addr(), "0.0.0.0:8080");

        let sms = SmsConfig::default();
        assert_eq!(sms.gateway, GatewayKind::Simulated);
        assert_eq!(sms.success_rate, 0.95);
        assert_eq!(sms.cost_per_message, 0.05);

        let auth = AuthConfig::default();
        assert_eq!(auth.token_ttl_hours, 24);
        assert!(!auth.require_auth);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
port = 9000

[database]
url = "postgres://localhost/safewatch"

[auth]
token_secret = "0c5f9e2a7b41d8836e10f4a9b2c7d5e8"
require_auth = true

[sms]
gateway = "http"
cost_per_message = 0.08

[sms.http]
url = "https://sms.example.com/send"
api_key = "key"
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.database.url, "postgres://localhost/safewatch");
        assert!(config.auth.require_auth);
        assert_eq!(config.sms.gateway, GatewayKind::Http);
        assert_eq!(config.sms.http.as_ref().unwrap().timeout_secs, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_http_gateway_requires_settings() {
        let toml = r#"
[database]
url = "postgres://localhost/safewatch"

[auth]
token_secret = "0c5f9e2a7b41d8836e10f4a9b2c7d5e8"

[sms]
gateway = "http"
"#;

        let config: Config = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sms.http"));
    }

    #[test]
    fn test_success_rate_out_of_range() {
        let toml = r#"
[database]
url = "postgres://localhost/safewatch"

[auth]
token_secret = "0c5f9e2a7b41d8836e10f4a9b2c7d5e8"

[sms]
success_rate = 1.5
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_token_secret_is_required() {
        let toml = r#"
[database]
url = "postgres://localhost/safewatch"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: auth.token_secret must be at least 32 bytes"
        );

        let mut config = config;
        config.auth.token_secret = "change-me-in-production".to_string();
        assert!(config.validate().is_err());

        config.auth.token_secret = "x".repeat(MIN_TOKEN_SECRET_BYTES);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("safewatch-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            "[database]\nurl = \"postgres://localhost/safewatch\"\n\n[auth]\ntoken_secret = \"0c5f9e2a7b41d8836e10f4a9b2c7d5e8\"\n\n[logging]\nformat = \"json\"\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");

        assert!(Config::from_file(Path::new("/nonexistent/safewatch.toml")).is_err());
    }
}
