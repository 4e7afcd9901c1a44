//! Links from inspection certificates to fleet vehicles
//!
//! Keyed by the certificate number and its publish date (era, year, month,
//! day) within an organization.

use super::Page;
use crate::context::TenantContext;
use crate::db::sql::{Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::Utc;
use std::sync::Arc;

record! {
    pub struct CarInsSheetIchibanCars {
        organization_id: String => "organization_id",
        id_cars: Option<String> => "id_cars",
        elect_cert_mg_no: String => "ElectCertMgNo",
        elect_cert_publishdate_e: String => "ElectCertPublishdateE",
        elect_cert_publishdate_y: String => "ElectCertPublishdateY",
        elect_cert_publishdate_m: String => "ElectCertPublishdateM",
        elect_cert_publishdate_d: String => "ElectCertPublishdateD",
    }
}

pub(crate) const CAR_INS_SHEET_ICHIBAN_CARS: Table = Table::new(
    "car_ins_sheet_ichiban_cars",
    "car ins sheet link",
    CarInsSheetIchibanCars::COLUMNS,
    &[
        "organization_id",
        "ElectCertMgNo",
        "ElectCertPublishdateE",
        "ElectCertPublishdateY",
        "ElectCertPublishdateM",
        "ElectCertPublishdateD",
    ],
)
.order_by(&[
    ("organization_id", Order::Asc),
    ("ElectCertMgNo", Order::Asc),
    ("ElectCertPublishdateE", Order::Asc),
    ("ElectCertPublishdateY", Order::Asc),
    ("ElectCertPublishdateM", Order::Asc),
    ("ElectCertPublishdateD", Order::Asc),
]);

/// Primary key of [`CarInsSheetIchibanCars`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarInsSheetIchibanCarsKey {
    pub organization_id: String,
    pub elect_cert_mg_no: String,
    pub elect_cert_publishdate_e: String,
    pub elect_cert_publishdate_y: String,
    pub elect_cert_publishdate_m: String,
    pub elect_cert_publishdate_d: String,
}

impl CarInsSheetIchibanCarsKey {
    fn params(&self) -> Params {
        Params::new()
            .bind(self.organization_id.clone())
            .bind(self.elect_cert_mg_no.clone())
            .bind(self.elect_cert_publishdate_e.clone())
            .bind(self.elect_cert_publishdate_y.clone())
            .bind(self.elect_cert_publishdate_m.clone())
            .bind(self.elect_cert_publishdate_d.clone())
    }

    fn describe(&self) -> String {
        format!(
            "{}/{}/{}/{}/{}/{}",
            self.organization_id,
            self.elect_cert_mg_no,
            self.elect_cert_publishdate_e,
            self.elect_cert_publishdate_y,
            self.elect_cert_publishdate_m,
            self.elect_cert_publishdate_d,
        )
    }
}

impl From<&CarInsSheetIchibanCars> for CarInsSheetIchibanCarsKey {
    fn from(row: &CarInsSheetIchibanCars) -> Self {
        Self {
            organization_id: row.organization_id.clone(),
            elect_cert_mg_no: row.elect_cert_mg_no.clone(),
            elect_cert_publishdate_e: row.elect_cert_publishdate_e.clone(),
            elect_cert_publishdate_y: row.elect_cert_publishdate_y.clone(),
            elect_cert_publishdate_m: row.elect_cert_publishdate_m.clone(),
            elect_cert_publishdate_d: row.elect_cert_publishdate_d.clone(),
        }
    }
}

#[derive(Clone)]
pub struct CarInsSheetIchibanCarsRepository {
    db: Arc<dyn Db>,
}

impl CarInsSheetIchibanCarsRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        ctx: &TenantContext,
        link: &CarInsSheetIchibanCars,
    ) -> Result<CarInsSheetIchibanCars> {
        super::insert(self.db.as_ref(), ctx, &CAR_INS_SHEET_ICHIBAN_CARS, link).await
    }

    pub async fn get(
        &self,
        ctx: &TenantContext,
        key: &CarInsSheetIchibanCarsKey,
    ) -> Result<CarInsSheetIchibanCars> {
        super::get(
            self.db.as_ref(),
            ctx,
            &CAR_INS_SHEET_ICHIBAN_CARS,
            key.params(),
            || key.describe(),
        )
        .await
    }

    /// Point the certificate at another vehicle (`id_cars`)
    pub async fn update(
        &self,
        ctx: &TenantContext,
        link: &CarInsSheetIchibanCars,
    ) -> Result<CarInsSheetIchibanCars> {
        super::update_all(
            self.db.as_ref(),
            ctx,
            &CAR_INS_SHEET_ICHIBAN_CARS,
            link,
            || CarInsSheetIchibanCarsKey::from(link).describe(),
        )
        .await
    }

    pub async fn delete(&self, ctx: &TenantContext, key: &CarInsSheetIchibanCarsKey) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &CAR_INS_SHEET_ICHIBAN_CARS,
            key.params(),
            Utc::now(),
            || key.describe(),
        )
        .await
    }

    pub async fn list(
        &self,
        ctx: &TenantContext,
        page: Page,
    ) -> Result<Vec<CarInsSheetIchibanCars>> {
        super::list(self.db.as_ref(), ctx, &CAR_INS_SHEET_ICHIBAN_CARS, page).await
    }

    pub async fn list_by_organization(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        page: Page,
    ) -> Result<Vec<CarInsSheetIchibanCars>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &CAR_INS_SHEET_ICHIBAN_CARS,
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
    fn test_update_binds_vehicle_before_six_keys() {
        let sql = CAR_INS_SHEET_ICHIBAN_CARS.update(&CAR_INS_SHEET_ICHIBAN_CARS.non_key_columns());
        let head = "UPDATE \"car_ins_sheet_ichiban_cars\" SET \"id_cars\" = $1 WHERE";
        assert!(sql.starts_with(head));
        assert!(sql.contains("\"ElectCertPublishdateD\" = $7 RETURNING"));
    }

    #[test]
    fn test_key_from_row() {
        let link = CarInsSheetIchibanCars {
            organization_id: "org".into(),
            id_cars: None,
            elect_cert_mg_no: "123".into(),
            elect_cert_publishdate_e: "R".into(),
            elect_cert_publishdate_y: "6".into(),
            elect_cert_publishdate_m: "1".into(),
            elect_cert_publishdate_d: "2".into(),
        };
        let key = CarInsSheetIchibanCarsKey::from(&link);
        assert_eq!(key.describe(), "org/123/R/6/1/2");
        assert_eq!(key.params().len(), 6);
    }
}
