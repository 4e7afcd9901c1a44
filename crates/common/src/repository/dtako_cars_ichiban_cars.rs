//! Mapping from tachograph vehicle ids to fleet vehicles

use super::Page;
use crate::context::TenantContext;
use crate::db::sql::{Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::Utc;
use std::sync::Arc;

record! {
    pub struct DtakoCarsIchibanCars {
        id_dtako: String => "id_dtako",
        organization_id: String => "organization_id",
        id: Option<String> => "id",
    }
}

pub(crate) const DTAKO_CARS_ICHIBAN_CARS: Table = Table::new(
    "dtako_cars_ichiban_cars",
    "dtako car link",
    DtakoCarsIchibanCars::COLUMNS,
    &["id_dtako", "organization_id"],
)
.order_by(&[
    ("organization_id", Order::Asc),
    ("id_dtako", Order::Asc),
]);

#[derive(Clone)]
pub struct DtakoCarsIchibanCarsRepository {
    db: Arc<dyn Db>,
}

impl DtakoCarsIchibanCarsRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        ctx: &TenantContext,
        link: &DtakoCarsIchibanCars,
    ) -> Result<DtakoCarsIchibanCars> {
        super::insert(self.db.as_ref(), ctx, &DTAKO_CARS_ICHIBAN_CARS, link).await
    }

    pub async fn get(
        &self,
        ctx: &TenantContext,
        id_dtako: &str,
        organization_id: &str,
    ) -> Result<DtakoCarsIchibanCars> {
        super::get(
            self.db.as_ref(),
            ctx,
            &DTAKO_CARS_ICHIBAN_CARS,
            Params::new()
                .bind(id_dtako.to_string())
                .bind(organization_id.to_string()),
            || format!("{}/{}", id_dtako, organization_id),
        )
        .await
    }

    pub async fn update(
        &self,
        ctx: &TenantContext,
        link: &DtakoCarsIchibanCars,
    ) -> Result<DtakoCarsIchibanCars> {
        super::update_all(
            self.db.as_ref(),
            ctx,
            &DTAKO_CARS_ICHIBAN_CARS,
            link,
            || format!("{}/{}", link.id_dtako, link.organization_id),
        )
        .await
    }

    pub async fn delete(
        &self,
        ctx: &TenantContext,
        id_dtako: &str,
        organization_id: &str,
    ) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &DTAKO_CARS_ICHIBAN_CARS,
            Params::new()
                .bind(id_dtako.to_string())
                .bind(organization_id.to_string()),
            Utc::now(),
            || format!("{}/{}", id_dtako, organization_id),
        )
        .await
    }

    pub async fn list(&self, ctx: &TenantContext, page: Page) -> Result<Vec<DtakoCarsIchibanCars>> {
        super::list(self.db.as_ref(), ctx, &DTAKO_CARS_ICHIBAN_CARS, page).await
    }

    pub async fn list_by_organization(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        page: Page,
    ) -> Result<Vec<DtakoCarsIchibanCars>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &DTAKO_CARS_ICHIBAN_CARS,
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
    fn test_update_sets_vehicle() {
        assert!(DTAKO_CARS_ICHIBAN_CARS
            .update(&DTAKO_CARS_ICHIBAN_CARS.non_key_columns())
            .starts_with("UPDATE \"dtako_cars_ichiban_cars\" SET \"id\" = $1 WHERE \"id_dtako\" = $2"));
    }
}
