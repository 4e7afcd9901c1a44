//! Entity repositories
//!
//! One repository per table. Each holds only an `Arc<dyn Db>`, so the same
//! type serves pre-login paths (raw pool) and tenant-scoped paths (RLS pool).
//!
//! Shared rules:
//! - soft-deleted rows are invisible to every read, update and delete
//! - a write that touches zero live rows is the entity's `NotFound`
//! - list limits are clamped (non-positive to 10, above 100 to 100) and
//!   every ordering ends in a tiebreaker so offset paging is stable
//! - create and update return the row as persisted (`RETURNING`)

use crate::context::TenantContext;
use crate::db::sql::Table;
use crate::db::{Db, Params, Record};
use crate::errors::{AppError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub mod app_users;
pub mod cam_file_exe;
pub mod cam_file_exe_stage;
pub mod cam_files;
pub mod car_ins_sheet_ichiban_cars;
pub mod car_ins_sheet_ichiban_cars_a;
pub mod car_inspection;
pub mod car_inspection_deregistration;
pub mod car_inspection_deregistration_files;
pub mod car_inspection_files;
pub mod car_inspection_files_a;
pub mod car_inspection_files_b;
pub mod dtako_cars_ichiban_cars;
pub mod dtakologs;
pub mod etc_meisai;
pub mod files;
pub mod flickr_photo;
pub mod ichiban_cars;
pub mod invitations;
pub mod kudgcst;
pub mod kudgfry;
pub mod kudgful;
pub mod kudgivt;
pub mod kudgsir;
pub mod kudguri;
pub mod oauth_accounts;
pub mod organizations;
pub mod uriage;
pub mod uriage_jisha;
pub mod user_organizations;

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

/// Limit/offset pair, already clamped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPage")]
pub struct Page {
    limit: i64,
    offset: i64,
}

/// Wire form of [`Page`]; every decoded page goes through the clamps
#[derive(Deserialize)]
struct RawPage {
    #[serde(default)]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

impl From<RawPage> for Page {
    fn from(raw: RawPage) -> Self {
        Page::new(raw.limit, raw.offset)
    }
}

impl Page {
    pub fn new(limit: i64, offset: i64) -> Self {
        let limit = if limit <= 0 {
            DEFAULT_LIMIT
        } else {
            limit.min(MAX_LIMIT)
        };
        Self {
            limit,
            offset: offset.max(0),
        }
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Following page under the same limit
    pub fn next(&self) -> Self {
        Self {
            limit: self.limit,
            offset: self.offset.saturating_add(self.limit),
        }
    }

    fn bind(&self, params: Params) -> Params {
        params.bind(self.limit).bind(self.offset)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, 0)
    }
}

/// Source of "now" for repositories that stamp or compare times
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Text form used by tables that keep timestamps in text columns
pub fn text_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Fresh surrogate id
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Translate the driver's "no rows" into the entity's not-found
pub(crate) fn or_not_found<T>(
    res: Result<T>,
    table: &Table,
    key: impl FnOnce() -> String,
) -> Result<T> {
    match res {
        Err(AppError::NoRows) => Err(AppError::not_found(table.entity, key())),
        other => other,
    }
}

// ============================================
// Table-shaped operations
// ============================================

/// Insert every column of `record` and return the stored row
pub(crate) async fn insert<R: Record>(
    db: &dyn Db,
    ctx: &TenantContext,
    table: &Table,
    record: &R,
) -> Result<R> {
    let params = record.bind_columns(table.columns, Params::new());
    db.query_row(ctx, &table.insert(), params).await?.scan()
}

/// Live row by primary key; `key` is bound in `table.key` order
pub(crate) async fn get<R: Record>(
    db: &dyn Db,
    ctx: &TenantContext,
    table: &Table,
    key: Params,
    describe: impl FnOnce() -> String,
) -> Result<R> {
    let res = db.query_row(ctx, &table.select_by_key(), key).await;
    or_not_found(res.and_then(|row| row.scan()), table, describe)
}

/// First live row matching the filter columns
pub(crate) async fn find<R: Record>(
    db: &dyn Db,
    ctx: &TenantContext,
    table: &Table,
    filters: &[&str],
    values: Params,
    describe: impl FnOnce() -> String,
) -> Result<R> {
    let sql = format!("{} LIMIT 1", table.select_where(filters));
    let res = db.query_row(ctx, &sql, values).await;
    or_not_found(res.and_then(|row| row.scan()), table, describe)
}

/// Update `set` columns from `record`, locating the row by the key columns
/// of the same record. Both come from column lists, so bind order always
/// matches the statement.
pub(crate) async fn update<R: Record>(
    db: &dyn Db,
    ctx: &TenantContext,
    table: &Table,
    set: &[&str],
    record: &R,
    describe: impl FnOnce() -> String,
) -> Result<R> {
    let params = record.bind_columns(set, Params::new());
    let params = record.bind_columns(table.key, params);
    let res = db.query_row(ctx, &table.update(set), params).await;
    or_not_found(res.and_then(|row| row.scan()), table, describe)
}

/// Update every column outside the primary key and the delete marker
pub(crate) async fn update_all<R: Record>(
    db: &dyn Db,
    ctx: &TenantContext,
    table: &Table,
    record: &R,
    describe: impl FnOnce() -> String,
) -> Result<R> {
    update(db, ctx, table, &table.writable_columns(), record, describe).await
}

/// Delete by key. Soft tables flip their marker; zero rows is not-found.
pub(crate) async fn delete(
    db: &dyn Db,
    ctx: &TenantContext,
    table: &Table,
    key: Params,
    stamp: DateTime<Utc>,
    describe: impl FnOnce() -> String,
) -> Result<()> {
    let params = if table.live.stamps_text() {
        key.bind(text_timestamp(stamp))
    } else {
        key
    };
    let tag = db.exec(ctx, &table.delete(), params).await?;
    if tag.rows_affected() == 0 {
        return Err(AppError::not_found(table.entity, describe()));
    }
    Ok(())
}

/// Ordered page of live rows
pub(crate) async fn list<R: Record>(
    db: &dyn Db,
    ctx: &TenantContext,
    table: &Table,
    page: Page,
) -> Result<Vec<R>> {
    list_where(db, ctx, table, &[], Params::new(), page).await
}

/// Ordered page of live rows matching every filter column
pub(crate) async fn list_where<R: Record>(
    db: &dyn Db,
    ctx: &TenantContext,
    table: &Table,
    filters: &[&str],
    values: Params,
    page: Page,
) -> Result<Vec<R>> {
    let params = page.bind(values);
    db.query(ctx, &table.list_where(filters), params)
        .await?
        .scan_all()
}
