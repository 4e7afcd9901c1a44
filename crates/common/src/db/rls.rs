//! Tenant-binding pool
//!
//! `RlsPool` presents the same `Db` contract as the raw pool. When the
//! context carries an organization, every statement runs on a connection
//! whose session setting (`app.organization_id` by default) was assigned
//! the tenant immediately before, on that same connection:
//!
//! 1. acquire
//! 2. `SELECT set_config($1, $2, false)`; on failure the connection goes
//!    back and the caller gets `TenantBindFailed`, no statement runs
//! 3. run the caller's statement
//! 4. release: `exec` before returning, `query_row` on scan, `query` on close
//!
//! The pool's release hook issues `RESET ALL`, so a returned connection
//! never carries a tenant into its next use. Without an organization the
//! call goes straight to the raw pool and no RLS guarantee applies.

use super::{CommandTag, Db, DbPool, Params, Row, Rows};
use crate::context::TenantContext;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{Postgres, Transaction};
use std::time::Instant;
use tracing::warn;

/// `Db` implementation that binds the context's tenant to each connection
#[derive(Clone)]
pub struct RlsPool {
    pool: DbPool,
    setting: String,
}

impl RlsPool {
    /// Wrap `pool`, binding tenants through the session setting `setting`
    pub fn new(pool: DbPool, setting: impl Into<String>) -> Self {
        Self {
            pool,
            setting: setting.into(),
        }
    }

    pub fn setting(&self) -> &str {
        &self.setting
    }

    /// Raw pool underneath
    pub fn raw(&self) -> &DbPool {
        &self.pool
    }

    /// Acquire a connection bound to `organization_id`
    async fn bind(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
    ) -> Result<PoolConnection<Postgres>> {
        if organization_id.is_empty() {
            return Err(AppError::Validation {
                message: "organization id must not be empty".to_string(),
            });
        }
        let mut conn = self.pool.acquire(ctx).await?;
        match set_tenant(&mut *conn, &self.setting, organization_id, false).await {
            Ok(()) => {
                metrics::record_tenant_bind(true);
                Ok(conn)
            }
            Err(source) => {
                metrics::record_tenant_bind(false);
                warn!(organization_id = %organization_id, error = %source, "Tenant bind failed");
                drop(conn);
                Err(AppError::TenantBindFailed {
                    organization_id: organization_id.to_string(),
                    source,
                })
            }
        }
    }
}

/// Assign the tenant setting. `local` limits it to the current transaction.
pub(crate) async fn set_tenant(
    conn: &mut sqlx::PgConnection,
    setting: &str,
    organization_id: &str,
    local: bool,
) -> std::result::Result<(), sqlx::Error> {
    sqlx::query("SELECT set_config($1, $2, $3)")
        .bind(setting)
        .bind(organization_id)
        .bind(local)
        .execute(conn)
        .await?;
    Ok(())
}

async fn bound_row(
    pool: &RlsPool,
    ctx: &TenantContext,
    organization_id: &str,
    sql: &str,
    params: Params,
) -> Result<Row> {
    let args = params.into_arguments()?;
    let mut conn = pool.bind(ctx, organization_id).await?;
    let started = Instant::now();
    let row = sqlx::query_with(sql, args).fetch_optional(&mut *conn).await?;
    metrics::record_statement("query_row", true, started.elapsed());
    Ok(Row::new(Some(conn), row))
}

async fn bound_rows(
    pool: &RlsPool,
    ctx: &TenantContext,
    organization_id: &str,
    sql: &str,
    params: Params,
) -> Result<Rows> {
    let args = params.into_arguments()?;
    let mut conn = pool.bind(ctx, organization_id).await?;
    let started = Instant::now();
    let rows = sqlx::query_with(sql, args).fetch_all(&mut *conn).await?;
    metrics::record_statement("query", true, started.elapsed());
    Ok(Rows::new(Some(conn), rows))
}

async fn bound_exec(
    pool: &RlsPool,
    ctx: &TenantContext,
    organization_id: &str,
    sql: &str,
    params: Params,
) -> Result<CommandTag> {
    let args = params.into_arguments()?;
    let mut conn = pool.bind(ctx, organization_id).await?;
    let started = Instant::now();
    let tag = sqlx::query_with(sql, args).execute(&mut *conn).await?;
    metrics::record_statement("exec", true, started.elapsed());
    drop(conn);
    Ok(tag)
}

async fn bound_begin(
    pool: &RlsPool,
    ctx: &TenantContext,
    organization_id: &str,
) -> Result<Transaction<'static, Postgres>> {
    if organization_id.is_empty() {
        return Err(AppError::Validation {
            message: "organization id must not be empty".to_string(),
        });
    }
    let mut tx = pool.pool.begin(ctx).await?;
    if let Err(source) = set_tenant(&mut *tx, &pool.setting, organization_id, true).await {
        metrics::record_tenant_bind(false);
        warn!(organization_id = %organization_id, error = %source, "Tenant bind failed");
        return Err(AppError::TenantBindFailed {
            organization_id: organization_id.to_string(),
            source,
        });
    }
    metrics::record_tenant_bind(true);
    Ok(tx)
}

#[async_trait]
impl Db for RlsPool {
    async fn query_row(&self, ctx: &TenantContext, sql: &str, params: Params) -> Result<Row> {
        match ctx.organization_id() {
            Some(org) => ctx.run(bound_row(self, ctx, org, sql, params)).await,
            None => self.pool.query_row(ctx, sql, params).await,
        }
    }

    async fn query(&self, ctx: &TenantContext, sql: &str, params: Params) -> Result<Rows> {
        match ctx.organization_id() {
            Some(org) => ctx.run(bound_rows(self, ctx, org, sql, params)).await,
            None => self.pool.query(ctx, sql, params).await,
        }
    }

    async fn exec(&self, ctx: &TenantContext, sql: &str, params: Params) -> Result<CommandTag> {
        match ctx.organization_id() {
            Some(org) => ctx.run(bound_exec(self, ctx, org, sql, params)).await,
            None => self.pool.exec(ctx, sql, params).await,
        }
    }

    async fn begin(&self, ctx: &TenantContext) -> Result<Transaction<'static, Postgres>> {
        match ctx.organization_id() {
            Some(org) => ctx.run(bound_begin(self, ctx, org)).await,
            None => self.pool.begin(ctx).await,
        }
    }
}
