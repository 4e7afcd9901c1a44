//! Links from inspection certificates to fleet vehicles, by grant date

use super::Page;
use crate::context::TenantContext;
use crate::db::sql::{Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::Utc;
use std::sync::Arc;

record! {
    pub struct CarInsSheetIchibanCarsA {
        organization_id: String => "organization_id",
        id_cars: Option<String> => "id_cars",
        elect_cert_mg_no: String => "ElectCertMgNo",
        grantdate_e: String => "GrantdateE",
        grantdate_y: String => "GrantdateY",
        grantdate_m: String => "GrantdateM",
        grantdate_d: String => "GrantdateD",
    }
}

pub(crate) const CAR_INS_SHEET_ICHIBAN_CARS_A: Table = Table::new(
    "car_ins_sheet_ichiban_cars_a",
    "car ins sheet link",
    CarInsSheetIchibanCarsA::COLUMNS,
    &[
        "organization_id",
        "ElectCertMgNo",
        "GrantdateE",
        "GrantdateY",
        "GrantdateM",
        "GrantdateD",
    ],
)
.order_by(&[
    ("organization_id", Order::Asc),
    ("ElectCertMgNo", Order::Asc),
    ("GrantdateE", Order::Asc),
    ("GrantdateY", Order::Asc),
    ("GrantdateM", Order::Asc),
    ("GrantdateD", Order::Asc),
]);

/// Primary key of [`CarInsSheetIchibanCarsA`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarInsSheetIchibanCarsAKey {
    pub organization_id: String,
    pub elect_cert_mg_no: String,
    pub grantdate_e: String,
    pub grantdate_y: String,
    pub grantdate_m: String,
    pub grantdate_d: String,
}

impl CarInsSheetIchibanCarsAKey {
    fn params(&self) -> Params {
        Params::new()
            .bind(self.organization_id.clone())
            .bind(self.elect_cert_mg_no.clone())
            .bind(self.grantdate_e.clone())
            .bind(self.grantdate_y.clone())
            .bind(self.grantdate_m.clone())
            .bind(self.grantdate_d.clone())
    }

    fn describe(&self) -> String {
        format!(
            "{}/{}/{}/{}/{}/{}",
            self.organization_id,
            self.elect_cert_mg_no,
            self.grantdate_e,
            self.grantdate_y,
            self.grantdate_m,
            self.grantdate_d,
        )
    }
}

impl From<&CarInsSheetIchibanCarsA> for CarInsSheetIchibanCarsAKey {
    fn from(row: &CarInsSheetIchibanCarsA) -> Self {
        Self {
            organization_id: row.organization_id.clone(),
            elect_cert_mg_no: row.elect_cert_mg_no.clone(),
            grantdate_e: row.grantdate_e.clone(),
            grantdate_y: row.grantdate_y.clone(),
            grantdate_m: row.grantdate_m.clone(),
            grantdate_d: row.grantdate_d.clone(),
        }
    }
}

#[derive(Clone)]
pub struct CarInsSheetIchibanCarsARepository {
    db: Arc<dyn Db>,
}

impl CarInsSheetIchibanCarsARepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        ctx: &TenantContext,
        link: &CarInsSheetIchibanCarsA,
    ) -> Result<CarInsSheetIchibanCarsA> {
        super::insert(self.db.as_ref(), ctx, &CAR_INS_SHEET_ICHIBAN_CARS_A, link).await
    }

    pub async fn get(
        &self,
        ctx: &TenantContext,
        key: &CarInsSheetIchibanCarsAKey,
    ) -> Result<CarInsSheetIchibanCarsA> {
        super::get(
            self.db.as_ref(),
            ctx,
            &CAR_INS_SHEET_ICHIBAN_CARS_A,
            key.params(),
            || key.describe(),
        )
        .await
    }

    /// Point the certificate at another vehicle (`id_cars`)
    pub async fn update(
        &self,
        ctx: &TenantContext,
        link: &CarInsSheetIchibanCarsA,
    ) -> Result<CarInsSheetIchibanCarsA> {
        super::update_all(
            self.db.as_ref(),
            ctx,
            &CAR_INS_SHEET_ICHIBAN_CARS_A,
            link,
            || CarInsSheetIchibanCarsAKey::from(link).describe(),
        )
        .await
    }

    pub async fn delete(
        &self,
        ctx: &TenantContext,
        key: &CarInsSheetIchibanCarsAKey,
    ) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &CAR_INS_SHEET_ICHIBAN_CARS_A,
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
    ) -> Result<Vec<CarInsSheetIchibanCarsA>> {
        super::list(self.db.as_ref(), ctx, &CAR_INS_SHEET_ICHIBAN_CARS_A, page).await
    }

    pub async fn list_by_organization(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        page: Page,
    ) -> Result<Vec<CarInsSheetIchibanCarsA>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &CAR_INS_SHEET_ICHIBAN_CARS_A,
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
        let sql =
            CAR_INS_SHEET_ICHIBAN_CARS_A.update(&CAR_INS_SHEET_ICHIBAN_CARS_A.non_key_columns());
        let head = "UPDATE \"car_ins_sheet_ichiban_cars_a\" SET \"id_cars\" = $1 WHERE";
        assert!(sql.starts_with(head));
        assert!(sql.contains("\"GrantdateD\" = $7 RETURNING"));
    }

    #[test]
    fn test_key_from_row() {
        let link = CarInsSheetIchibanCarsA {
            organization_id: "org".into(),
            id_cars: None,
            elect_cert_mg_no: "123".into(),
            grantdate_e: "R".into(),
            grantdate_y: "6".into(),
            grantdate_m: "1".into(),
            grantdate_d: "2".into(),
        };
        let key = CarInsSheetIchibanCarsAKey::from(&link);
        assert_eq!(key.describe(), "org/123/R/6/1/2");
        assert_eq!(key.params().len(), 6);
    }
}
