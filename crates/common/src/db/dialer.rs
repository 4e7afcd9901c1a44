//! Dial strategies for the pool
//!
//! Two deployment modes exist:
//! - on the managed platform, a unix socket to the instance with IAM
//!   database authentication (the password is a short-lived OAuth2 token)
//! - everywhere else, a local proxy on `localhost:<port>` with a password
//!
//! The strategy is picked once at startup; the pool only ever sees
//! `PgConnectOptions`.

use crate::config::{AppConfig, DialMode};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Produces connection options for new pool connections
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Options for the next connection. May fetch fresh credentials.
    async fn connect_options(&self) -> Result<PgConnectOptions>;

    /// How often credentials must be renewed, if they expire
    fn refresh_interval(&self) -> Option<Duration>;

    /// Human-readable target for logs
    fn describe(&self) -> String;

    /// Release dialer resources; later dials fail
    async fn close(&self) -> Result<()>;
}

/// Pick the dialer for this deployment
pub fn from_config(config: &AppConfig) -> Result<Arc<dyn Dialer>> {
    let dialer: Arc<dyn Dialer> = match config.dial_mode() {
        DialMode::CloudSqlIam => Arc::new(CloudSqlIamDialer::new(config)?),
        DialMode::LocalProxy => Arc::new(LocalProxyDialer::new(config)),
    };
    info!(mode = ?config.dial_mode(), target = %dialer.describe(), "Selected database dialer");
    Ok(dialer)
}

/// TCP to a proxy listening on the local host
pub struct LocalProxyDialer {
    host: String,
    port: u16,
    user: String,
    password: Option<String>,
    database: String,
}

impl LocalProxyDialer {
    pub fn new(config: &AppConfig) -> Self {
        let db = &config.database;
        Self {
            host: db.host.clone(),
            port: db.port,
            user: db.user.clone(),
            password: db.password.clone(),
            database: db.name.clone(),
        }
    }
}

#[async_trait]
impl Dialer for LocalProxyDialer {
    async fn connect_options(&self) -> Result<PgConnectOptions> {
        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.database)
            .ssl_mode(PgSslMode::Disable);
        if let Some(password) = &self.password {
            options = options.password(password);
        }
        Ok(options)
    }

    fn refresh_interval(&self) -> Option<Duration> {
        None
    }

    fn describe(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

/// Unix socket to the managed instance, authenticated with an IAM token
/// from the instance metadata server
pub struct CloudSqlIamDialer {
    client: reqwest::Client,
    socket: String,
    user: String,
    database: String,
    token_url: String,
    refresh: Duration,
    closed: AtomicBool,
}

impl CloudSqlIamDialer {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let instance = config.instance_connection().ok_or_else(|| AppError::Configuration {
            message: "GCP_PROJECT_ID, GCP_REGION and CLOUDSQL_INSTANCE_NAME are required for IAM connections"
                .to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            socket: format!("{}/{}", config.cloudsql.socket_dir, instance),
            user: config.database.user.clone(),
            database: config.database.name.clone(),
            token_url: config.cloudsql.token_url.clone(),
            refresh: Duration::from_secs(config.cloudsql.token_refresh_secs),
            closed: AtomicBool::new(false),
        })
    }

    async fn fetch_token(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.token_url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ConnectFailed {
                message: format!("metadata token request failed {}: {}", status, body),
            });
        }

        let token: MetadataToken = response.json().await?;
        debug!(expires_in = token.expires_in, "Fetched IAM database token");
        Ok(token.access_token)
    }
}

#[async_trait]
impl Dialer for CloudSqlIamDialer {
    async fn connect_options(&self) -> Result<PgConnectOptions> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AppError::ConnectFailed {
                message: "dialer closed".to_string(),
            });
        }
        let token = self.fetch_token().await?;
        Ok(PgConnectOptions::new()
            .socket(&self.socket)
            .username(&self.user)
            .database(&self.database)
            .password(&token))
    }

    fn refresh_interval(&self) -> Option<Duration> {
        Some(self.refresh)
    }

    fn describe(&self) -> String {
        format!("{}@unix:{}/{}", self.user, self.socket, self.database)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        info!(target = %self.describe(), "IAM dialer closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let vars: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::load_with(|key| {
            vars.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_local_proxy_options() {
        let config = config(&[("DB_USER", "fleet"), ("DB_PORT", "6432"), ("DB_PASSWORD", "pw")]);
        let dialer = LocalProxyDialer::new(&config);
        let options = dialer.connect_options().await.unwrap();
        assert_eq!(options.get_host(), "localhost");
        assert_eq!(options.get_port(), 6432);
        assert_eq!(options.get_username(), "fleet");
        assert_eq!(options.get_database(), Some("postgres"));
        assert!(dialer.refresh_interval().is_none());
    }

    #[test]
    fn test_iam_dialer_socket_path() {
        let config = config(&[
            ("DB_USER", "svc@proj.iam"),
            ("GCP_PROJECT_ID", "proj"),
            ("CLOUDSQL_INSTANCE_NAME", "main"),
            ("K_SERVICE", "backoffice"),
        ]);
        let dialer = CloudSqlIamDialer::new(&config).unwrap();
        assert_eq!(dialer.socket, "/cloudsql/proj:asia-northeast1:main");
        assert_eq!(dialer.refresh_interval(), Some(Duration::from_secs(1800)));
    }

    #[test]
    fn test_iam_dialer_requires_instance() {
        let config = config(&[("DB_USER", "svc"), ("K_SERVICE", "backoffice")]);
        assert!(matches!(
            CloudSqlIamDialer::new(&config),
            Err(AppError::Configuration { .. })
        ));
        assert!(from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_closed_iam_dialer_refuses() {
        let config = config(&[
            ("DB_USER", "svc"),
            ("GCP_PROJECT_ID", "proj"),
            ("CLOUDSQL_INSTANCE_NAME", "main"),
            ("K_SERVICE", "backoffice"),
        ]);
        let dialer = CloudSqlIamDialer::new(&config).unwrap();
        dialer.close().await.unwrap();
        assert!(matches!(
            dialer.connect_options().await,
            Err(AppError::ConnectFailed { .. })
        ));
    }
}
