//! In-house sales per department

use super::Page;
use crate::context::TenantContext;
use crate::db::sql::{Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::Utc;
use std::sync::Arc;

record! {
    pub struct UriageJisha {
        bumon: String => "bumon",
        organization_id: String => "organization_id",
        kingaku: Option<i32> => "kingaku",
        #[serde(rename = "type")]
        sale_type: Option<i32> => "type",
        date: String => "date",
    }
}

pub(crate) const URIAGE_JISHA: Table = Table::new(
    "uriage_jisha",
    "uriage jisha",
    UriageJisha::COLUMNS,
    &["bumon", "date", "organization_id"],
)
.order_by(&[
    ("date", Order::Desc),
    ("bumon", Order::Asc),
    ("organization_id", Order::Asc),
]);

#[derive(Clone)]
pub struct UriageJishaRepository {
    db: Arc<dyn Db>,
}

impl UriageJishaRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(&self, ctx: &TenantContext, sale: &UriageJisha) -> Result<UriageJisha> {
        super::insert(self.db.as_ref(), ctx, &URIAGE_JISHA, sale).await
    }

    pub async fn get(
        &self,
        ctx: &TenantContext,
        bumon: &str,
        date: &str,
        organization_id: &str,
    ) -> Result<UriageJisha> {
        super::get(
            self.db.as_ref(),
            ctx,
            &URIAGE_JISHA,
            Params::new()
                .bind(bumon.to_string())
                .bind(date.to_string())
                .bind(organization_id.to_string()),
            || format!("{}/{}/{}", bumon, date, organization_id),
        )
        .await
    }

    pub async fn update(&self, ctx: &TenantContext, sale: &UriageJisha) -> Result<UriageJisha> {
        super::update_all(
            self.db.as_ref(),
            ctx,
            &URIAGE_JISHA,
            sale,
            || format!("{}/{}/{}", sale.bumon, sale.date, sale.organization_id),
        )
        .await
    }

    pub async fn delete(
        &self,
        ctx: &TenantContext,
        bumon: &str,
        date: &str,
        organization_id: &str,
    ) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &URIAGE_JISHA,
            Params::new()
                .bind(bumon.to_string())
                .bind(date.to_string())
                .bind(organization_id.to_string()),
            Utc::now(),
            || format!("{}/{}/{}", bumon, date, organization_id),
        )
        .await
    }

    pub async fn list(&self, ctx: &TenantContext, page: Page) -> Result<Vec<UriageJisha>> {
        super::list(self.db.as_ref(), ctx, &URIAGE_JISHA, page).await
    }

    pub async fn list_by_organization(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        page: Page,
    ) -> Result<Vec<UriageJisha>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &URIAGE_JISHA,
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
    fn test_delete_is_hard() {
        assert_eq!(
            URIAGE_JISHA.delete(),
            "DELETE FROM \"uriage_jisha\" WHERE \"bumon\" = $1 AND \"date\" = $2 AND \"organization_id\" = $3"
        );
    }
}
