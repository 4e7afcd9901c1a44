//! ETC toll statement lines
//!
//! Append-only facts keyed by a serial `id`. Each line carries a content
//! `hash` so imports can be replayed without duplicating rows. Listing uses
//! keyset pages over `(date_to, id)`, newest first.

use crate::context::TenantContext;
use crate::db::sql::{column_list, ident, placeholder, Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::{AppError, Result};
use crate::metrics;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

record! {
    pub struct EtcMeisai {
        id: i64 => "id",
        organization_id: String => "organization_id",
        date_fr: Option<DateTime<Utc>> => "date_fr",
        date_to: DateTime<Utc> => "date_to",
        date_to_date: String => "date_to_date",
        ic_fr: String => "ic_fr",
        ic_to: String => "ic_to",
        price_bf: Option<i32> => "price_bf",
        discount: Option<i32> => "discount",
        price: i32 => "price",
        shashu: i32 => "shashu",
        car_id_num: Option<i32> => "car_id_num",
        etc_num: String => "etc_num",
        detail: Option<String> => "detail",
        dtako_row_id: Option<String> => "dtako_row_id",
        hash: String => "hash",
        created_at: DateTime<Utc> => "created_at",
        updated_at: DateTime<Utc> => "updated_at",
    }
}

pub(crate) const ETC_MEISAI: Table =
    Table::new("etc_meisai", "etc meisai", EtcMeisai::COLUMNS, &["id"])
        .updated_at("updated_at")
        .order_by(&[("date_to", Order::Desc), ("id", Order::Desc)]);

/// Columns written on insert; `id` comes from the sequence
const INSERT_COLUMNS: &[&str] = &[
    "organization_id",
    "date_fr",
    "date_to",
    "date_to_date",
    "ic_fr",
    "ic_to",
    "price_bf",
    "discount",
    "price",
    "shashu",
    "car_id_num",
    "etc_num",
    "detail",
    "dtako_row_id",
    "hash",
    "created_at",
    "updated_at",
];

/// Columns an update rewrites
const UPDATE_COLUMNS: &[&str] = &[
    "date_fr",
    "date_to",
    "date_to_date",
    "ic_fr",
    "ic_to",
    "price_bf",
    "discount",
    "price",
    "shashu",
    "car_id_num",
    "etc_num",
    "detail",
    "dtako_row_id",
    "hash",
];

/// One statement line as supplied by an import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEtcMeisai {
    #[serde(default)]
    pub date_fr: Option<DateTime<Utc>>,
    pub date_to: DateTime<Utc>,
    pub date_to_date: String,
    pub ic_fr: String,
    pub ic_to: String,
    #[serde(default)]
    pub price_bf: Option<i32>,
    #[serde(default)]
    pub discount: Option<i32>,
    pub price: i32,
    pub shashu: i32,
    #[serde(default)]
    pub car_id_num: Option<i32>,
    pub etc_num: String,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub dtako_row_id: Option<String>,
    /// Left empty, the content hash is computed on insert
    #[serde(default)]
    pub hash: String,
}

impl NewEtcMeisai {
    /// Hex SHA-256 over the fields that identify a toll passage
    pub fn content_hash(&self) -> String {
        let stamp = |at: &DateTime<Utc>| at.to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut hasher = Sha256::new();
        for part in [
            self.date_fr.as_ref().map(stamp).unwrap_or_default(),
            stamp(&self.date_to),
            self.ic_fr.clone(),
            self.ic_to.clone(),
            self.price.to_string(),
            self.shashu.to_string(),
            self.etc_num.clone(),
            self.car_id_num.map(|n| n.to_string()).unwrap_or_default(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update(b"\x1f");
        }
        hex::encode(hasher.finalize())
    }

    fn hash_or_content(&self) -> String {
        if self.hash.is_empty() {
            self.content_hash()
        } else {
            self.hash.clone()
        }
    }
}

/// Filters and paging for [`EtcMeisaiRepository::list`]. Empty strings
/// count as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EtcMeisaiFilter {
    #[serde(default)]
    pub page_size: i64,
    #[serde(default)]
    pub page_token: Option<String>,
    /// Inclusive lower bound on `date_to_date` (`YYYY-MM-DD`)
    #[serde(default)]
    pub date_from: Option<String>,
    /// Inclusive upper bound on `date_to_date`
    #[serde(default)]
    pub date_to: Option<String>,
    #[serde(default)]
    pub etc_num: Option<String>,
}

impl EtcMeisaiFilter {
    pub fn page_size(&self) -> i64 {
        if self.page_size <= 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.page_size.min(MAX_PAGE_SIZE)
        }
    }

    fn conditions(&self) -> Vec<(&'static str, &'static str, String)> {
        let present = |v: &Option<String>| v.as_ref().filter(|s| !s.is_empty()).cloned();
        let mut out = Vec::new();
        if let Some(v) = present(&self.date_from) {
            out.push(("date_to_date", ">=", v));
        }
        if let Some(v) = present(&self.date_to) {
            out.push(("date_to_date", "<=", v));
        }
        if let Some(v) = present(&self.etc_num) {
            out.push(("etc_num", "=", v));
        }
        out
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EtcMeisaiPage {
    pub items: Vec<EtcMeisai>,
    /// Rows matching the filters, ignoring the page token
    pub total_count: i64,
    pub next_page_token: Option<String>,
}

/// Keyset position of the last row on a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    pub date_to: DateTime<Utc>,
    pub id: i64,
}

impl PageCursor {
    pub fn encode(&self) -> String {
        let text = format!(
            "{}|{}",
            self.date_to.to_rfc3339_opts(SecondsFormat::Micros, true),
            self.id
        );
        URL_SAFE_NO_PAD.encode(text)
    }

    pub fn decode(token: &str) -> Result<Self> {
        let invalid = || AppError::InvalidInput {
            message: "malformed page token".to_string(),
            constraint: Some("page_token".to_string()),
        };
        let bytes = URL_SAFE_NO_PAD.decode(token).map_err(|_| invalid())?;
        let text = String::from_utf8(bytes).map_err(|_| invalid())?;
        let (at, id) = text.split_once('|').ok_or_else(invalid)?;
        Ok(Self {
            date_to: DateTime::parse_from_rfc3339(at)
                .map_err(|_| invalid())?
                .with_timezone(&Utc),
            id: id.parse().map_err(|_| invalid())?,
        })
    }
}

/// Result of a bulk import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub created: usize,
    pub skipped: usize,
    /// One message per failed record, prefixed with its index
    pub errors: Vec<String>,
}

/// `WHERE` body over the filter conditions, plus the keyset bound when
/// `cursor` is set. Placeholders start at `$1`.
fn list_predicate(conditions: &[(&str, &str, String)], cursor: bool) -> String {
    let mut parts = conditions
        .iter()
        .enumerate()
        .map(|(i, (col, op, _))| format!("{} {} {}", ident(col), op, placeholder(i + 1)))
        .collect::<Vec<_>>();
    if cursor {
        let n = conditions.len();
        parts.push(format!(
            "({}, {}) < ({}, {})",
            ident("date_to"),
            ident("id"),
            placeholder(n + 1),
            placeholder(n + 2)
        ));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

fn bind_conditions(conditions: &[(&str, &str, String)], params: Params) -> Params {
    conditions
        .iter()
        .fold(params, |params, (_, _, value)| params.bind(value.clone()))
}

fn insert_sql() -> String {
    let values = (1..=INSERT_COLUMNS.len())
        .map(placeholder)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        ident(ETC_MEISAI.name),
        column_list(INSERT_COLUMNS),
        values,
        column_list(ETC_MEISAI.columns)
    )
}

#[derive(Clone)]
pub struct EtcMeisaiRepository {
    db: Arc<dyn Db>,
}

impl EtcMeisaiRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        line: &NewEtcMeisai,
    ) -> Result<EtcMeisai> {
        let now = Utc::now();
        let row = EtcMeisai {
            id: 0,
            organization_id: organization_id.to_string(),
            date_fr: line.date_fr,
            date_to: line.date_to,
            date_to_date: line.date_to_date.clone(),
            ic_fr: line.ic_fr.clone(),
            ic_to: line.ic_to.clone(),
            price_bf: line.price_bf,
            discount: line.discount,
            price: line.price,
            shashu: line.shashu,
            car_id_num: line.car_id_num,
            etc_num: line.etc_num.clone(),
            detail: line.detail.clone(),
            dtako_row_id: line.dtako_row_id.clone(),
            hash: line.hash_or_content(),
            created_at: now,
            updated_at: now,
        };
        let params = row.bind_columns(INSERT_COLUMNS, Params::new());
        self.db.query_row(ctx, &insert_sql(), params).await?.scan()
    }

    pub async fn get_by_id(&self, ctx: &TenantContext, id: i64) -> Result<EtcMeisai> {
        super::get(
            self.db.as_ref(),
            ctx,
            &ETC_MEISAI,
            Params::new().bind(id),
            || id.to_string(),
        )
        .await
    }

    pub async fn get_by_hash(&self, ctx: &TenantContext, hash: &str) -> Result<EtcMeisai> {
        super::find(
            self.db.as_ref(),
            ctx,
            &ETC_MEISAI,
            &["hash"],
            Params::new().bind(hash.to_string()),
            || format!("hash {}", hash),
        )
        .await
    }

    pub async fn exists_by_hash(&self, ctx: &TenantContext, hash: &str) -> Result<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = $1)",
            ident(ETC_MEISAI.name),
            ident("hash")
        );
        let (exists,): (bool,) = self
            .db
            .query_row(ctx, &sql, Params::new().bind(hash.to_string()))
            .await?
            .scan()?;
        Ok(exists)
    }

    /// Rewrite the statement fields of an existing line
    pub async fn update(&self, ctx: &TenantContext, line: &EtcMeisai) -> Result<EtcMeisai> {
        super::update(
            self.db.as_ref(),
            ctx,
            &ETC_MEISAI,
            UPDATE_COLUMNS,
            line,
            || line.id.to_string(),
        )
        .await
    }

    pub async fn delete(&self, ctx: &TenantContext, id: i64) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &ETC_MEISAI,
            Params::new().bind(id),
            Utc::now(),
            || id.to_string(),
        )
        .await
    }

    /// One keyset page plus the total match count
    pub async fn list(
        &self,
        ctx: &TenantContext,
        filter: &EtcMeisaiFilter,
    ) -> Result<EtcMeisaiPage> {
        let conditions = filter.conditions();
        let page_size = filter.page_size();
        let cursor = match filter.page_token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => Some(PageCursor::decode(token)?),
            None => None,
        };

        let count_sql = format!(
            "SELECT count(*) FROM {}{}",
            ident(ETC_MEISAI.name),
            list_predicate(&conditions, false)
        );
        let (total_count,): (i64,) = self
            .db
            .query_row(ctx, &count_sql, bind_conditions(&conditions, Params::new()))
            .await?
            .scan()?;

        let mut sql = format!(
            "SELECT {} FROM {}{} ORDER BY {} DESC, {} DESC LIMIT ",
            column_list(ETC_MEISAI.columns),
            ident(ETC_MEISAI.name),
            list_predicate(&conditions, cursor.is_some()),
            ident("date_to"),
            ident("id")
        );
        let mut params = bind_conditions(&conditions, Params::new());
        if let Some(cursor) = cursor {
            params = params.bind(cursor.date_to).bind(cursor.id);
        }
        sql.push_str(&placeholder(params.len() + 1));
        // one extra row tells whether another page exists
        params = params.bind(page_size + 1);

        let mut items: Vec<EtcMeisai> = self.db.query(ctx, &sql, params).await?.scan_all()?;
        let next_page_token = if items.len() as i64 > page_size {
            items.truncate(page_size as usize);
            items.last().map(|last| {
                PageCursor {
                    date_to: last.date_to,
                    id: last.id,
                }
                .encode()
            })
        } else {
            None
        };

        Ok(EtcMeisaiPage {
            items,
            total_count,
            next_page_token,
        })
    }

    /// Insert each line on its own. With `skip_duplicates`, lines whose hash
    /// already exists are counted as skipped. A failing line is reported and
    /// the batch carries on.
    pub async fn bulk_create(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        lines: &[NewEtcMeisai],
        skip_duplicates: bool,
    ) -> Result<BulkOutcome> {
        let mut outcome = BulkOutcome::default();
        for (i, line) in lines.iter().enumerate() {
            ctx.check()?;
            if skip_duplicates {
                match self.exists_by_hash(ctx, &line.hash_or_content()).await {
                    Ok(true) => {
                        outcome.skipped += 1;
                        continue;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        outcome.errors.push(format!("record {}: {}", i, e));
                        continue;
                    }
                }
            }
            match self.create(ctx, organization_id, line).await {
                Ok(_) => outcome.created += 1,
                Err(e) => {
                    warn!(index = i, error = %e, "etc_meisai line rejected");
                    outcome.errors.push(format!("record {}: {}", i, e));
                }
            }
        }

        metrics::record_bulk(
            "etc_meisai",
            outcome.created,
            outcome.skipped,
            outcome.errors.len(),
        );
        info!(
            organization_id = %organization_id,
            created = outcome.created,
            skipped = outcome.skipped,
            failed = outcome.errors.len(),
            "etc_meisai bulk import finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn line() -> NewEtcMeisai {
        NewEtcMeisai {
            date_fr: None,
            date_to: Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap(),
            date_to_date: "2024-03-01".into(),
            ic_fr: "Tokyo".into(),
            ic_to: "Yokohama".into(),
            price_bf: Some(1200),
            discount: None,
            price: 1000,
            shashu: 2,
            car_id_num: Some(7),
            etc_num: "1234-5678".into(),
            detail: None,
            dtako_row_id: None,
            hash: String::new(),
        }
    }

    #[test]
    fn test_page_size_clamps() {
        let mut filter = EtcMeisaiFilter::default();
        assert_eq!(filter.page_size(), 20);
        filter.page_size = 500;
        assert_eq!(filter.page_size(), 100);
        filter.page_size = 5;
        assert_eq!(filter.page_size(), 5);
    }

    #[test]
    fn test_cursor_token() {
        let cursor = PageCursor {
            date_to: Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap(),
            id: 42,
        };
        let token = cursor.encode();
        assert!(!token.contains('='));
        assert_eq!(PageCursor::decode(&token).unwrap(), cursor);
        assert!(matches!(
            PageCursor::decode("not a token"),
            Err(AppError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_list_predicate_numbers_past_nine() {
        let filter = EtcMeisaiFilter {
            date_from: Some("2024-01-01".into()),
            date_to: Some(String::new()),
            etc_num: Some("1234".into()),
            ..Default::default()
        };
        let conditions = filter.conditions();
        assert_eq!(conditions.len(), 2);
        assert_eq!(
            list_predicate(&conditions, true),
            " WHERE \"date_to_date\" >= $1 AND \"etc_num\" = $2 AND (\"date_to\", \"id\") < ($3, $4)"
        );
        assert_eq!(list_predicate(&[], false), "");
    }

    #[test]
    fn test_insert_skips_serial_id() {
        let sql = insert_sql();
        assert!(sql.starts_with("INSERT INTO \"etc_meisai\" (\"organization_id\", \"date_fr\""));
        assert!(sql.contains("VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)"));
        assert!(sql.contains("RETURNING \"id\", \"organization_id\""));
    }

    #[test]
    fn test_content_hash_is_stable_and_field_sensitive() {
        let a = line();
        assert_eq!(a.content_hash(), line().content_hash());
        assert_eq!(a.content_hash().len(), 64);

        let mut b = line();
        b.price = 1001;
        assert_ne!(a.content_hash(), b.content_hash());

        let mut c = line();
        c.hash = "given".into();
        assert_eq!(c.hash_or_content(), "given");
    }

    #[test]
    fn test_update_binds_id_last() {
        assert!(ETC_MEISAI
            .update(UPDATE_COLUMNS)
            .contains("\"updated_at\" = now() WHERE \"id\" = $15 RETURNING"));
    }
}
