//! Tenant binding against a live Postgres with row-level security

mod common;

use fleetcore_common::context::TenantContext;
use fleetcore_common::db::Params;
use fleetcore_common::errors::AppError;
use fleetcore_common::repository::cam_files::{CamFile, CamFileRepository};
use fleetcore_common::repository::new_id;
use std::time::{Duration, Instant};
use tokio_test::{assert_err, assert_ok};

async fn seed_cam_file(admin: &sqlx::PgPool, name: &str, organization_id: &str) {
    sqlx::query(
        "INSERT INTO cam_files (name, organization_id, date, hour, type, cam) \
         VALUES ($1, $2, '2024-01-01', '12', 'image', 'cam1')",
    )
    .bind(name)
    .bind(organization_id)
    .execute(admin)
    .await
    .unwrap();
}

async fn count_named(db: &dyn fleetcore_common::Db, ctx: &TenantContext, name: &str) -> i64 {
    let (count,): (i64,) = db
        .query_row(
            ctx,
            "SELECT count(*) FROM cam_files WHERE name = $1",
            Params::new().bind(name.to_string()),
        )
        .await
        .unwrap()
        .scan()
        .unwrap();
    count
}

#[tokio::test]
async fn test_tenant_isolation_reads() {
    let Some(h) = common::harness(4).await else { return };
    let (org_a, org_b) = (new_id(), new_id());
    let (name_a, name_b) = (format!("t-A-{}", org_a), format!("t-B-{}", org_b));
    seed_cam_file(&h.admin, &name_a, &org_a).await;
    seed_cam_file(&h.admin, &name_b, &org_b).await;

    let ctx_a = TenantContext::background().with_organization_id(org_a.clone());
    let ctx_b = TenantContext::background().with_organization_id(org_b.clone());

    assert_eq!(count_named(h.rls.as_ref(), &ctx_a, &name_b).await, 0);
    assert_eq!(count_named(h.rls.as_ref(), &ctx_a, &name_a).await, 1);
    assert_eq!(count_named(h.rls.as_ref(), &ctx_b, &name_a).await, 0);
    assert_eq!(count_named(h.rls.as_ref(), &ctx_b, &name_b).await, 1);

    // the same lookups through a repository
    let repo = CamFileRepository::new(h.rls.clone());
    assert!(matches!(
        repo.get(&ctx_a, &name_b, &org_b).await,
        Err(AppError::NotFound { .. })
    ));
    assert_ok!(repo.get(&ctx_a, &name_a, &org_a).await);
}

#[tokio::test]
async fn test_cross_tenant_write_blocked() {
    let Some(h) = common::harness(4).await else { return };
    let (org_a, org_b) = (new_id(), new_id());
    let name_b = format!("t-B-{}", org_b);
    seed_cam_file(&h.admin, &name_b, &org_b).await;

    let ctx_a = TenantContext::background().with_organization_id(org_a.clone());
    let tag = h
        .rls
        .exec(
            &ctx_a,
            "UPDATE cam_files SET hour = '99' WHERE name = $1",
            Params::new().bind(name_b.clone()),
        )
        .await
        .unwrap();
    assert_eq!(tag.rows_affected(), 0);

    let (hour,): (String,) = sqlx::query_as("SELECT hour FROM cam_files WHERE name = $1")
        .bind(&name_b)
        .fetch_one(&h.admin)
        .await
        .unwrap();
    assert_eq!(hour, "12");

    // inserting a row owned by another tenant fails the policy check
    let foreign = CamFile {
        name: format!("t-X-{}", org_a),
        organization_id: org_b.clone(),
        date: "2024-01-02".to_string(),
        hour: "01".to_string(),
        file_type: "image".to_string(),
        cam: "cam1".to_string(),
        flickr_id: None,
    };
    assert_err!(CamFileRepository::new(h.rls.clone()).create(&ctx_a, &foreign).await);
}

#[tokio::test]
async fn test_setting_visible_to_statement_and_reset_on_release() {
    // one connection, so every call below reuses it
    let Some(h) = common::harness(1).await else { return };
    let org = new_id();
    let ctx = TenantContext::background().with_organization_id(org.clone());

    let (bound,): (Option<String>,) = h
        .rls
        .query_row(
            &ctx,
            "SELECT current_setting('app.organization_id', true)",
            Params::new(),
        )
        .await
        .unwrap()
        .scan()
        .unwrap();
    assert_eq!(bound.as_deref(), Some(org.as_str()));

    assert_eq!(common::settle(&h.pool).await, 0);
    let (after,): (Option<String>,) = h
        .raw
        .query_row(
            &TenantContext::background(),
            "SELECT current_setting('app.organization_id', true)",
            Params::new(),
        )
        .await
        .unwrap()
        .scan()
        .unwrap();
    assert!(after.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_transaction_binding_is_local() {
    let Some(h) = common::harness(1).await else { return };
    let org = new_id();
    let name = format!("t-tx-{}", org);
    let ctx = TenantContext::background().with_organization_id(org.clone());

    let mut tx = h.rls.begin(&ctx).await.unwrap();
    sqlx::query(
        "INSERT INTO cam_files (name, organization_id, date, hour, type, cam) \
         VALUES ($1, $2, '2024-02-01', '08', 'video', 'cam2')",
    )
    .bind(&name)
    .bind(&org)
    .execute(&mut *tx)
    .await
    .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(count_named(h.rls.as_ref(), &ctx, &name).await, 1);
    // without a tenant the policy hides every row
    assert_eq!(count_named(h.raw.as_ref(), &TenantContext::background(), &name).await, 0);
}

#[tokio::test]
async fn test_connection_released_after_scan_error() {
    let Some(h) = common::harness(1).await else { return };
    let org = new_id();
    seed_cam_file(&h.admin, &format!("t-S6-{}", org), &org).await;
    let ctx = TenantContext::background().with_organization_id(org.clone());

    // a text column cannot decode as an integer
    let failed = h
        .rls
        .query_row(&ctx, "SELECT name FROM cam_files LIMIT 1", Params::new())
        .await
        .unwrap()
        .scan::<(i64,)>();
    assert_err!(failed);

    let started = Instant::now();
    let next = TenantContext::background().with_organization_id(org.clone());
    let files = CamFileRepository::new(h.rls.clone())
        .list(&next, fleetcore_common::repository::Page::new(10, 0))
        .await
        .unwrap();
    assert_eq!(files.len(), 1);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_pool_in_use_restored_on_every_path() {
    let Some(h) = common::harness(2).await else { return };
    let org = new_id();
    let ctx = TenantContext::background().with_organization_id(org.clone());
    assert_eq!(common::settle(&h.pool).await, 0);

    // success
    let _ = h.rls.exec(&ctx, "SELECT 1", Params::new()).await.unwrap();
    assert_eq!(common::settle(&h.pool).await, 0);

    // statement error
    assert_err!(h.rls.exec(&ctx, "SELECT * FROM no_such_table", Params::new()).await);
    assert_eq!(common::settle(&h.pool).await, 0);

    // row dropped without scan
    let row = h.rls.query_row(&ctx, "SELECT 1", Params::new()).await.unwrap();
    drop(row);
    assert_eq!(common::settle(&h.pool).await, 0);

    // rows read partially, then closed
    let mut rows = h
        .rls
        .query(&ctx, "SELECT generate_series(1, 3)", Params::new())
        .await
        .unwrap();
    let first: (i32,) = rows.next().unwrap().unwrap();
    assert_eq!(first.0, 1);
    rows.close();
    assert_eq!(common::settle(&h.pool).await, 0);

    // deadline hit mid-statement
    let short = ctx.with_timeout(Duration::from_millis(100));
    assert!(matches!(
        h.rls.exec(&short, "SELECT pg_sleep(1)", Params::new()).await,
        Err(AppError::DeadlineExceeded)
    ));
    assert_eq!(common::settle(&h.pool).await, 0);

    // cancelled before the call
    let cancelled = ctx.child();
    cancelled.cancel();
    assert!(matches!(
        h.rls.exec(&cancelled, "SELECT 1", Params::new()).await,
        Err(AppError::Cancelled)
    ));
    assert_eq!(common::settle(&h.pool).await, 0);
}

#[tokio::test]
async fn test_empty_tenant_rejected_without_statement() {
    let Some(h) = common::harness(1).await else { return };
    let ctx = TenantContext::background().with_organization_id("");
    assert!(matches!(
        h.rls.exec(&ctx, "SELECT 1", Params::new()).await,
        Err(AppError::Validation { .. })
    ));
}
