//! Fleet vehicles
//!
//! Key `(id, organization_id)`, hard delete.

use super::Page;
use crate::context::TenantContext;
use crate::db::sql::{Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::Utc;
use std::sync::Arc;

record! {
    pub struct IchibanCar {
        id: String => "id",
        organization_id: String => "organization_id",
        id4: String => "id4",
        name: Option<String> => "name",
        name_r: Option<String> => "name_R",
        shashu: String => "shashu",
        sekisai: Option<f64> => "sekisai",
        reg_date: Option<String> => "reg_date",
        parch_date: Option<String> => "parch_date",
        scrap_date: Option<String> => "scrap_date",
        bumon_code_id: Option<String> => "bumon_code_id",
        driver_id: Option<String> => "driver_id",
    }
}

pub(crate) const ICHIBAN_CARS: Table = Table::new(
    "ichiban_cars",
    "ichiban car",
    IchibanCar::COLUMNS,
    &["id", "organization_id"],
)
.order_by(&[
    ("organization_id", Order::Asc),
    ("id", Order::Asc),
]);

#[derive(Clone)]
pub struct IchibanCarRepository {
    db: Arc<dyn Db>,
}

impl IchibanCarRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(&self, ctx: &TenantContext, car: &IchibanCar) -> Result<IchibanCar> {
        super::insert(self.db.as_ref(), ctx, &ICHIBAN_CARS, car).await
    }

    pub async fn get(
        &self,
        ctx: &TenantContext,
        id: &str,
        organization_id: &str,
    ) -> Result<IchibanCar> {
        super::get(
            self.db.as_ref(),
            ctx,
            &ICHIBAN_CARS,
            Params::new()
                .bind(id.to_string())
                .bind(organization_id.to_string()),
            || format!("{}/{}", id, organization_id),
        )
        .await
    }

    /// Replace every vehicle attribute
    pub async fn update(&self, ctx: &TenantContext, car: &IchibanCar) -> Result<IchibanCar> {
        super::update_all(
            self.db.as_ref(),
            ctx,
            &ICHIBAN_CARS,
            car,
            || format!("{}/{}", car.id, car.organization_id),
        )
        .await
    }

    pub async fn delete(&self, ctx: &TenantContext, id: &str, organization_id: &str) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &ICHIBAN_CARS,
            Params::new()
                .bind(id.to_string())
                .bind(organization_id.to_string()),
            Utc::now(),
            || format!("{}/{}", id, organization_id),
        )
        .await
    }

    pub async fn list(&self, ctx: &TenantContext, page: Page) -> Result<Vec<IchibanCar>> {
        super::list(self.db.as_ref(), ctx, &ICHIBAN_CARS, page).await
    }

    pub async fn list_by_organization(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        page: Page,
    ) -> Result<Vec<IchibanCar>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &ICHIBAN_CARS,
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
    fn test_mixed_case_column_is_quoted() {
        assert!(ICHIBAN_CARS.insert().contains("\"name_R\""));
    }

    #[test]
    fn test_update_binds_ten_columns_then_key() {
        assert!(ICHIBAN_CARS
            .update(&ICHIBAN_CARS.non_key_columns())
            .contains("WHERE \"id\" = $11 AND \"organization_id\" = $12"));
    }
}
