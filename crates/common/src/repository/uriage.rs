//! Sales per driver and department
//!
//! Key `(name, bumon, date, organization_id)`, hard delete, newest date first.

use super::Page;
use crate::context::TenantContext;
use crate::db::sql::{Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::Utc;
use std::sync::Arc;

record! {
    pub struct Uriage {
        name: String => "name",
        bumon: String => "bumon",
        organization_id: String => "organization_id",
        kingaku: Option<i32> => "kingaku",
        #[serde(rename = "type")]
        sale_type: Option<i32> => "type",
        cam: Option<i32> => "cam",
        date: String => "date",
    }
}

pub(crate) const URIAGE: Table = Table::new(
    "uriage",
    "uriage",
    Uriage::COLUMNS,
    &["name", "bumon", "date", "organization_id"],
)
.order_by(&[
    ("date", Order::Desc),
    ("name", Order::Asc),
    ("bumon", Order::Asc),
    ("organization_id", Order::Asc),
]);

#[derive(Clone)]
pub struct UriageRepository {
    db: Arc<dyn Db>,
}

impl UriageRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(&self, ctx: &TenantContext, sale: &Uriage) -> Result<Uriage> {
        super::insert(self.db.as_ref(), ctx, &URIAGE, sale).await
    }

    pub async fn get(
        &self,
        ctx: &TenantContext,
        name: &str,
        bumon: &str,
        date: &str,
        organization_id: &str,
    ) -> Result<Uriage> {
        super::get(
            self.db.as_ref(),
            ctx,
            &URIAGE,
            Params::new()
                .bind(name.to_string())
                .bind(bumon.to_string())
                .bind(date.to_string())
                .bind(organization_id.to_string()),
            || format!("{}/{}/{}/{}", name, bumon, date, organization_id),
        )
        .await
    }

    /// Replace amount, type and camera count
    pub async fn update(&self, ctx: &TenantContext, sale: &Uriage) -> Result<Uriage> {
        super::update_all(
            self.db.as_ref(),
            ctx,
            &URIAGE,
            sale,
            || format!("{}/{}/{}/{}", sale.name, sale.bumon, sale.date, sale.organization_id),
        )
        .await
    }

    pub async fn delete(
        &self,
        ctx: &TenantContext,
        name: &str,
        bumon: &str,
        date: &str,
        organization_id: &str,
    ) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &URIAGE,
            Params::new()
                .bind(name.to_string())
                .bind(bumon.to_string())
                .bind(date.to_string())
                .bind(organization_id.to_string()),
            Utc::now(),
            || format!("{}/{}/{}/{}", name, bumon, date, organization_id),
        )
        .await
    }

    pub async fn list(&self, ctx: &TenantContext, page: Page) -> Result<Vec<Uriage>> {
        super::list(self.db.as_ref(), ctx, &URIAGE, page).await
    }

    pub async fn list_by_organization(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        page: Page,
    ) -> Result<Vec<Uriage>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &URIAGE,
            &["organization_id"],
            Params::new().bind(organization_id.to_string()),
            page,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_keeps_key_order() {
        assert_eq!(
            URIAGE.update(&URIAGE.non_key_columns()),
            "UPDATE \"uriage\" SET \"kingaku\" = $1, \"type\" = $2, \"cam\" = $3 \
             WHERE \"name\" = $4 AND \"bumon\" = $5 AND \"date\" = $6 AND \"organization_id\" = $7 \
             RETURNING \"name\", \"bumon\", \"organization_id\", \"kingaku\", \"type\", \"cam\", \"date\""
        );
    }

    #[test]
    fn test_null_amount_round_trips_json() {
        let sale = Uriage {
            name: "driver".into(),
            bumon: "01".into(),
            organization_id: "org".into(),
            kingaku: None,
            sale_type: Some(2),
            cam: None,
            date: "2024-05-01".into(),
        };
        let json = serde_json::to_value(&sale).unwrap();
        assert!(json["kingaku"].is_null());
        assert_eq!(json["type"], 2);
        let back: Uriage = serde_json::from_value(json).unwrap();
        assert_eq!(back, sale);
    }
}
