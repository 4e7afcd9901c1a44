//! Shared setup for the database integration tests
//!
//! Tests run only when both `TEST_DATABASE_URL` (a superuser, used for
//! fixtures and for reads that must bypass row-level security) and
//! `TEST_APP_DATABASE_URL` (a non-superuser role, used for the pools under
//! test) are set. Otherwise each test returns early.

#![allow(dead_code)]

use fleetcore_common::config::DatabaseConfig;
use fleetcore_common::db::{Db, DbPool, RlsPool};
use sqlx::postgres::PgPool;
use sqlx::{Connection, PgConnection};
use std::sync::Arc;
use tokio::sync::OnceCell;

const SCHEMA: &str = include_str!("../fixtures/schema.sql");

/// Arbitrary key shared by every test binary applying the schema
const SCHEMA_LOCK: i64 = 0x666c_6565_7463;

static SCHEMA_READY: OnceCell<()> = OnceCell::const_new();

pub struct Harness {
    /// Superuser pool; RLS does not apply to it
    pub admin: PgPool,
    pub pool: DbPool,
    pub raw: Arc<dyn Db>,
    pub rls: Arc<dyn Db>,
}

fn urls() -> Option<(String, String)> {
    match (
        std::env::var("TEST_DATABASE_URL"),
        std::env::var("TEST_APP_DATABASE_URL"),
    ) {
        (Ok(admin), Ok(app)) if !admin.is_empty() && !app.is_empty() => Some((admin, app)),
        _ => {
            eprintln!("TEST_DATABASE_URL / TEST_APP_DATABASE_URL not set, skipping");
            None
        }
    }
}

async fn apply_schema(admin_url: &str, app_url: &str) {
    let mut app = PgConnection::connect(app_url).await.unwrap();
    let (role, is_super): (String, bool) = sqlx::query_as(
        "SELECT current_user::text, rolsuper FROM pg_roles WHERE rolname = current_user",
    )
    .fetch_one(&mut app)
    .await
    .unwrap();
    app.close().await.unwrap();
    assert!(!is_super, "TEST_APP_DATABASE_URL must not connect as a superuser");

    let mut admin = PgConnection::connect(admin_url).await.unwrap();
    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(SCHEMA_LOCK)
        .execute(&mut admin)
        .await
        .unwrap();
    sqlx::raw_sql(SCHEMA).execute(&mut admin).await.unwrap();
    let role = role.replace('"', "\"\"");
    sqlx::raw_sql(&format!(
        "GRANT SELECT, INSERT, UPDATE, DELETE ON ALL TABLES IN SCHEMA public TO \"{role}\";\n\
         GRANT USAGE, SELECT ON ALL SEQUENCES IN SCHEMA public TO \"{role}\";"
    ))
    .execute(&mut admin)
    .await
    .unwrap();
    sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(SCHEMA_LOCK)
        .execute(&mut admin)
        .await
        .unwrap();
    admin.close().await.unwrap();
}

/// Pools over the application role, capped at `max_connections`
pub async fn harness(max_connections: u32) -> Option<Harness> {
    let (admin_url, app_url) = urls()?;
    SCHEMA_READY
        .get_or_init(|| apply_schema(&admin_url, &app_url))
        .await;

    let admin = PgPool::connect(&admin_url).await.unwrap();
    let config = DatabaseConfig {
        max_connections,
        min_connections: 0,
        acquire_timeout_secs: 5,
        ..DatabaseConfig::default()
    };
    let pg = DbPool::options(&config).connect(&app_url).await.unwrap();
    let pool = DbPool::from_pool(pg);
    let rls = RlsPool::new(pool.clone(), config.tenant_setting.clone());

    Some(Harness {
        admin,
        raw: Arc::new(pool.clone()),
        rls: Arc::new(rls),
        pool,
    })
}

/// Wait until every connection has been handed back to the pool
pub async fn settle(pool: &DbPool) -> usize {
    for _ in 0..250 {
        if pool.stats().in_use == 0 {
            return 0;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    pool.stats().in_use
}
