//! Configuration management for FleetCore services
//!
//! Supports loading configuration from:
//! - Default values
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Environment variables prefixed with APP__ (e.g. APP__SERVER__PORT)
//! - The flat deployment variables set by the hosting platform
//!   (DB_USER, GCP_PROJECT_ID, PORT, K_SERVICE, ...)

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Managed instance configuration
    #[serde(default)]
    pub cloudsql: CloudSqlConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Idle keep-alive timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Shutdown grace period in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Health check database ping timeout in seconds
    #[serde(default = "default_health_timeout")]
    pub health_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Target database
    #[serde(default = "default_db_name")]
    pub name: String,

    /// Non-superuser role
    #[serde(default)]
    pub user: String,

    /// Password (local proxy mode only)
    #[serde(default)]
    pub password: Option<String>,

    /// Local proxy host
    #[serde(default = "default_db_host")]
    pub host: String,

    /// Local proxy port
    #[serde(default = "default_db_port")]
    pub port: u16,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Acquire wait budget in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_db_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Total retry budget for the initial pool build, in seconds
    #[serde(default = "default_connect_retry")]
    pub connect_retry_secs: u64,

    /// Session variable the RLS policies read the tenant from
    #[serde(default = "default_tenant_setting")]
    pub tenant_setting: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CloudSqlConfig {
    /// GCP project id
    #[serde(default)]
    pub project_id: Option<String>,

    /// GCP region
    #[serde(default = "default_region")]
    pub region: String,

    /// Instance name
    #[serde(default)]
    pub instance_name: Option<String>,

    /// Platform service name; presence selects the IAM dialer
    #[serde(default)]
    pub k_service: Option<String>,

    /// Directory holding the instance unix sockets
    #[serde(default = "default_socket_dir")]
    pub socket_dir: String,

    /// Metadata server token endpoint
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// IAM token refresh period in seconds
    #[serde(default = "default_token_refresh")]
    pub token_refresh_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// HS256 signing secret
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Token issuer
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Access token lifetime in seconds
    #[serde(default = "default_access_ttl")]
    pub access_token_ttl_secs: u64,

    /// Refresh token lifetime in seconds
    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl_secs: u64,

    /// Post-login redirect target
    #[serde(default)]
    pub frontend_url: Option<String>,

    /// Organization header name
    #[serde(default = "default_organization_header")]
    pub organization_header: String,

    #[serde(default)]
    pub google: OAuthProviderConfig,

    #[serde(default)]
    pub line: OAuthProviderConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OAuthProviderConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Login requests per second
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_idle_timeout() -> u64 { 120 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_health_timeout() -> u64 { 5 }
fn default_db_name() -> String { "postgres".to_string() }
fn default_db_host() -> String { "localhost".to_string() }
fn default_db_port() -> u16 { 5432 }
fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 0 }
fn default_acquire_timeout() -> u64 { 10 }
fn default_db_idle_timeout() -> u64 { 300 }
fn default_connect_retry() -> u64 { 30 }
fn default_tenant_setting() -> String { "app.organization_id".to_string() }
fn default_region() -> String { "asia-northeast1".to_string() }
fn default_socket_dir() -> String { "/cloudsql".to_string() }
fn default_token_url() -> String {
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token"
        .to_string()
}
fn default_token_refresh() -> u64 { 1800 }
fn default_issuer() -> String { "postgres-prod".to_string() }
fn default_access_ttl() -> u64 { 3600 }
fn default_refresh_ttl() -> u64 { 7 * 24 * 3600 }
fn default_organization_header() -> String { "x-organization-id".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_rate_limit() -> u32 { 10 }
fn default_burst() -> u32 { 20 }
fn default_enabled() -> bool { true }

/// Flat deployment variables and the config keys they land on.
const DEPLOYMENT_VARS: &[(&str, &str)] = &[
    ("GCP_PROJECT_ID", "cloudsql.project_id"),
    ("GCP_REGION", "cloudsql.region"),
    ("CLOUDSQL_INSTANCE_NAME", "cloudsql.instance_name"),
    ("K_SERVICE", "cloudsql.k_service"),
    ("DB_NAME", "database.name"),
    ("DB_USER", "database.user"),
    ("DB_PASSWORD", "database.password"),
    ("DB_PORT", "database.port"),
    ("PORT", "server.port"),
    ("FRONTEND_URL", "auth.frontend_url"),
    ("JWT_SECRET", "auth.jwt_secret"),
    ("GOOGLE_CLIENT_ID", "auth.google.client_id"),
    ("GOOGLE_CLIENT_SECRET", "auth.google.client_secret"),
    ("GOOGLE_REDIRECT_URI", "auth.google.redirect_uri"),
    ("LINE_CHANNEL_ID", "auth.line.client_id"),
    ("LINE_CHANNEL_SECRET", "auth.line.client_secret"),
    ("LINE_REDIRECT_URI", "auth.line.redirect_uri"),
];

/// How the pool reaches Postgres
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialMode {
    /// IAM-authenticated unix socket to the managed instance
    CloudSqlIam,
    /// Local proxy on localhost
    LocalProxy,
}

impl AppConfig {
    /// Load configuration from files and the process environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load configuration, resolving the flat deployment variables through `lookup`
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = lookup("APP_ENV").unwrap_or_else(|| "development".to_string());

        let mut builder = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // APP__DATABASE__MAX_CONNECTIONS=20
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        // Deployment variables win; empty values count as unset
        for (var, key) in DEPLOYMENT_VARS {
            let value = lookup(var).filter(|v| !v.is_empty());
            builder = builder.set_override_option(*key, value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Check the fail-fast rules that must hold before dialing
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.user.is_empty() {
            return Err(ConfigError::Message(
                "database user not configured; set DB_USER".to_string(),
            ));
        }
        if self.dial_mode() == DialMode::CloudSqlIam && self.instance_connection().is_none() {
            return Err(ConfigError::Message(
                "instance connection not configured; set GCP_PROJECT_ID, GCP_REGION and CLOUDSQL_INSTANCE_NAME"
                    .to_string(),
            ));
        }
        if self.auth.jwt_secret.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::Message(
                "JWT secret not configured; set JWT_SECRET".to_string(),
            ));
        }
        if self.database.tenant_setting.is_empty() || !self.database.tenant_setting.contains('.') {
            return Err(ConfigError::Message(format!(
                "tenant setting {:?} must be a dotted custom parameter name",
                self.database.tenant_setting
            )));
        }
        Ok(())
    }

    /// Managed instance identifier in `project:region:instance` form
    pub fn instance_connection(&self) -> Option<String> {
        let project = self.cloudsql.project_id.as_deref().filter(|s| !s.is_empty())?;
        let instance = self.cloudsql.instance_name.as_deref().filter(|s| !s.is_empty())?;
        if self.cloudsql.region.is_empty() {
            return None;
        }
        Some(format!("{}:{}:{}", project, self.cloudsql.region, instance))
    }

    /// Dial mode, decided by the platform-set service variable
    pub fn dial_mode(&self) -> DialMode {
        match self.cloudsql.k_service {
            Some(_) => DialMode::CloudSqlIam,
            None => DialMode::LocalProxy,
        }
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown grace as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get health ping timeout as Duration
    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.server.health_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            health_timeout_secs: default_health_timeout(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: default_db_name(),
            user: String::new(),
            password: None,
            host: default_db_host(),
            port: default_db_port(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
            idle_timeout_secs: default_db_idle_timeout(),
            connect_retry_secs: default_connect_retry(),
            tenant_setting: default_tenant_setting(),
        }
    }
}

impl Default for CloudSqlConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            region: default_region(),
            instance_name: None,
            k_service: None,
            socket_dir: default_socket_dir(),
            token_url: default_token_url(),
            token_refresh_secs: default_token_refresh(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            issuer: default_issuer(),
            access_token_ttl_secs: default_access_ttl(),
            refresh_token_ttl_secs: default_refresh_ttl(),
            frontend_url: None,
            organization_header: default_organization_header(),
            google: OAuthProviderConfig::default(),
            line: OAuthProviderConfig::default(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            cloudsql: CloudSqlConfig::default(),
            auth: AuthConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::load_with(|key| map.get(key).cloned()).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.name, "postgres");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.cloudsql.region, "asia-northeast1");
        assert_eq!(config.database.tenant_setting, "app.organization_id");
        assert_eq!(config.health_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_deployment_vars_override() {
        let config = load(&[
            ("DB_USER", "fleet_app"),
            ("DB_PORT", "6543"),
            ("PORT", "9000"),
            ("FRONTEND_URL", "https://app.example.com"),
        ]);
        assert_eq!(config.database.user, "fleet_app");
        assert_eq!(config.database.port, 6543);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.auth.frontend_url.as_deref(), Some("https://app.example.com"));
        assert_eq!(config.dial_mode(), DialMode::LocalProxy);
    }

    #[test]
    fn test_empty_vars_count_as_unset() {
        let config = load(&[("DB_NAME", ""), ("GCP_REGION", "")]);
        assert_eq!(config.database.name, "postgres");
        assert_eq!(config.cloudsql.region, "asia-northeast1");
    }

    #[test]
    fn test_instance_connection() {
        let config = load(&[
            ("GCP_PROJECT_ID", "proj"),
            ("CLOUDSQL_INSTANCE_NAME", "main"),
            ("K_SERVICE", "backoffice"),
        ]);
        assert_eq!(config.instance_connection().as_deref(), Some("proj:asia-northeast1:main"));
        assert_eq!(config.dial_mode(), DialMode::CloudSqlIam);
    }

    #[test]
    fn test_validate_requires_user_and_instance() {
        let config = load(&[("JWT_SECRET", "s")]);
        assert!(config.validate().is_err());

        let config = load(&[("DB_USER", "u"), ("JWT_SECRET", "s"), ("K_SERVICE", "svc")]);
        assert!(config.validate().is_err());

        let config = load(&[("DB_USER", "u"), ("JWT_SECRET", "s")]);
        assert!(config.validate().is_ok());
    }
}
