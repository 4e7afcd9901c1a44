//! Database layer for FleetCore
//!
//! Provides:
//! - The `Db` contract every repository is written against
//! - `DbPool`, the raw pool adapter (dial strategy, session reset on release)
//! - `RlsPool`, which binds the request's tenant to each connection
//! - Row guards, positional parameters and statement builders

pub mod dialer;
mod params;
mod record;
mod rls;
mod row;
pub mod sql;

pub use dialer::{CloudSqlIamDialer, Dialer, LocalProxyDialer};
pub use params::Params;
pub use record::Record;
pub(crate) use record::record;
pub use rls::RlsPool;
pub use row::{CommandTag, Row, Rows};

use crate::config::DatabaseConfig;
use crate::context::TenantContext;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use backoff::ExponentialBackoff;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Connection, Postgres, Transaction};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The statement contract repositories depend on.
///
/// Implemented by the raw pool and by the tenant-binding wrapper, so the
/// same repository serves pre-login paths and tenant-scoped paths.
#[async_trait]
pub trait Db: Send + Sync {
    /// Run a statement expected to yield at most one row
    async fn query_row(&self, ctx: &TenantContext, sql: &str, params: Params) -> Result<Row>;

    /// Run a statement yielding any number of rows
    async fn query(&self, ctx: &TenantContext, sql: &str, params: Params) -> Result<Rows>;

    /// Run a statement for its command tag
    async fn exec(&self, ctx: &TenantContext, sql: &str, params: Params) -> Result<CommandTag>;

    /// Open a transaction. Statements in it share one connection.
    async fn begin(&self, ctx: &TenantContext) -> Result<Transaction<'static, Postgres>>;
}

/// Pool occupancy snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub size: u32,
    pub idle: usize,
    pub in_use: usize,
}

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    pool: PgPool,
    dialer: Option<Arc<dyn Dialer>>,
    refresh: CancellationToken,
}

impl DbPool {
    /// Build the pool through `dialer`, retrying the first connection with
    /// exponential backoff for up to `connect_retry_secs`.
    pub async fn connect(config: &DatabaseConfig, dialer: Arc<dyn Dialer>) -> Result<Self> {
        info!(target_db = %dialer.describe(), "Connecting to database...");

        let options = pool_options(config);
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(config.connect_retry_secs)),
            ..Default::default()
        };

        let options_ref = &options;
        let dialer_ref = dialer.as_ref();
        let pool = backoff::future::retry(backoff, move || async move {
            connect_once(options_ref, dialer_ref)
                .await
                .map_err(backoff::Error::transient)
        })
        .await
        .map_err(|e| AppError::ConnectFailed {
            message: format!("initial pool build failed: {}", e),
        })?;

        let refresh = CancellationToken::new();
        if let Some(interval) = dialer.refresh_interval() {
            tokio::spawn(refresh_credentials(
                pool.clone(),
                dialer.clone(),
                interval,
                refresh.clone(),
            ));
        }

        info!(
            max_connections = config.max_connections,
            "Database pool established"
        );

        Ok(Self {
            pool,
            dialer: Some(dialer),
            refresh,
        })
    }

    /// Wrap an existing pool. No dial strategy, no credential refresh.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            dialer: None,
            refresh: CancellationToken::new(),
        }
    }

    /// Pool options shared by every deployment mode, for callers that
    /// build their own pool (tests, tools)
    pub fn options(config: &DatabaseConfig) -> PgPoolOptions {
        pool_options(config)
    }

    /// Take a connection, waiting no longer than the context deadline.
    /// Running out of time here is `ResourceExhausted`.
    pub async fn acquire(&self, ctx: &TenantContext) -> Result<PoolConnection<Postgres>> {
        let started = Instant::now();
        let conn = within_deadline(ctx, self.pool.acquire()).await?;
        metrics::record_acquire(started.elapsed());
        Ok(conn)
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self, ctx: &TenantContext) -> Result<()> {
        ctx.run(ping_once(self, ctx)).await
    }

    pub fn stats(&self) -> PoolStats {
        let size = self.pool.size();
        let idle = self.pool.num_idle();
        metrics::record_pool(size, idle);
        PoolStats {
            size,
            idle,
            in_use: (size as usize).saturating_sub(idle),
        }
    }

    /// Underlying sqlx pool
    pub fn inner(&self) -> &PgPool {
        &self.pool
    }

    /// Stop credential refresh, drain live connections, then close the dialer
    pub async fn close(&self) -> Result<()> {
        self.refresh.cancel();
        self.pool.close().await;
        info!("Database pool closed");
        match &self.dialer {
            Some(dialer) => dialer.close().await,
            None => Ok(()),
        }
    }
}

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        // one round trip per fresh connection, none per acquire
        .test_before_acquire(false)
        .after_connect(|conn, _meta| Box::pin(async move { conn.ping().await }))
        // session state never survives a release
        .after_release(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("RESET ALL").execute(&mut *conn).await?;
                Ok(true)
            })
        })
}

/// Await a pool operation, giving up at the context deadline
async fn within_deadline<F, T>(ctx: &TenantContext, fut: F) -> Result<T>
where
    F: std::future::Future<Output = std::result::Result<T, sqlx::Error>>,
{
    ctx.check()?;
    match ctx.deadline() {
        Some(deadline) => match tokio::time::timeout_at(deadline, fut).await {
            Ok(res) => Ok(res?),
            Err(_) => Err(AppError::ResourceExhausted {
                message: "context deadline reached waiting for a connection".to_string(),
            }),
        },
        None => Ok(fut.await?),
    }
}

async fn connect_once(options: &PgPoolOptions, dialer: &dyn Dialer) -> Result<PgPool> {
    let connect = dialer.connect_options().await?;
    match options.clone().connect_with(connect).await {
        Ok(pool) => Ok(pool),
        Err(e) => {
            warn!(error = %e, target_db = %dialer.describe(), "Database dial failed, retrying");
            Err(AppError::ConnectFailed {
                message: e.to_string(),
            })
        }
    }
}

async fn ping_once(pool: &DbPool, ctx: &TenantContext) -> Result<()> {
    let mut conn = pool.acquire(ctx).await?;
    conn.ping().await?;
    Ok(())
}

async fn refresh_credentials(
    pool: PgPool,
    dialer: Arc<dyn Dialer>,
    interval: Duration,
    stop: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
    // first tick fires immediately
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => match dialer.connect_options().await {
                Ok(options) => {
                    pool.set_connect_options(options);
                    info!("Refreshed database credentials");
                }
                Err(e) => warn!(error = %e, "Database credential refresh failed"),
            },
        }
    }
    debug!("Credential refresh stopped");
}

async fn run_raw_row(pool: &DbPool, ctx: &TenantContext, sql: &str, params: Params) -> Result<Row> {
    let args = params.into_arguments()?;
    let mut conn = pool.acquire(ctx).await?;
    let started = Instant::now();
    let row = sqlx::query_with(sql, args).fetch_optional(&mut *conn).await?;
    metrics::record_statement("query_row", false, started.elapsed());
    Ok(Row::new(None, row))
}

async fn run_raw_rows(
    pool: &DbPool,
    ctx: &TenantContext,
    sql: &str,
    params: Params,
) -> Result<Rows> {
    let args = params.into_arguments()?;
    let mut conn = pool.acquire(ctx).await?;
    let started = Instant::now();
    let rows = sqlx::query_with(sql, args).fetch_all(&mut *conn).await?;
    metrics::record_statement("query", false, started.elapsed());
    Ok(Rows::new(None, rows))
}

async fn run_raw_exec(
    pool: &DbPool,
    ctx: &TenantContext,
    sql: &str,
    params: Params,
) -> Result<CommandTag> {
    let args = params.into_arguments()?;
    let mut conn = pool.acquire(ctx).await?;
    let started = Instant::now();
    let tag = sqlx::query_with(sql, args).execute(&mut *conn).await?;
    metrics::record_statement("exec", false, started.elapsed());
    Ok(tag)
}

async fn begin_raw(pool: &DbPool, ctx: &TenantContext) -> Result<Transaction<'static, Postgres>> {
    within_deadline(ctx, pool.pool.begin()).await
}

#[async_trait]
impl Db for DbPool {
    async fn query_row(&self, ctx: &TenantContext, sql: &str, params: Params) -> Result<Row> {
        ctx.run(run_raw_row(self, ctx, sql, params)).await
    }

    async fn query(&self, ctx: &TenantContext, sql: &str, params: Params) -> Result<Rows> {
        ctx.run(run_raw_rows(self, ctx, sql, params)).await
    }

    async fn exec(&self, ctx: &TenantContext, sql: &str, params: Params) -> Result<CommandTag> {
        ctx.run(run_raw_exec(self, ctx, sql, params)).await
    }

    async fn begin(&self, ctx: &TenantContext) -> Result<Transaction<'static, Postgres>> {
        ctx.run(begin_raw(self, ctx)).await
    }
}
