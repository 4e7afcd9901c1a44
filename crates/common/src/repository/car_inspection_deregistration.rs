//! Deregistered vehicle inspection records

use super::Page;
use crate::context::TenantContext;
use crate::db::sql::{Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::Utc;
use std::sync::Arc;

record! {
    pub struct CarInspectionDeregistration {
        organization_id: String => "organization_id",
        car_id: String => "CarId",
        twodimension_code_info_car_no: String => "TwodimensionCodeInfoCarNo",
        car_no: String => "CarNo",
        valid_period_expirdate_e: String => "ValidPeriodExpirdateE",
        valid_period_expirdate_y: String => "ValidPeriodExpirdateY",
        valid_period_expirdate_m: String => "ValidPeriodExpirdateM",
        valid_period_expirdate_d: String => "ValidPeriodExpirdateD",
        twodimension_code_info_valid_period_expirdate: String => "TwodimensionCodeInfoValidPeriodExpirdate",
    }
}

pub(crate) const CAR_INSPECTION_DEREGISTRATIONS: Table = Table::new(
    "car_inspection_deregistration",
    "car inspection deregistration",
    CarInspectionDeregistration::COLUMNS,
    &["organization_id", "CarId", "TwodimensionCodeInfoValidPeriodExpirdate"],
)
.order_by(&[
    ("organization_id", Order::Asc),
    ("CarId", Order::Asc),
    ("TwodimensionCodeInfoValidPeriodExpirdate", Order::Asc),
]);

#[derive(Clone)]
pub struct CarInspectionDeregistrationRepository {
    db: Arc<dyn Db>,
}

impl CarInspectionDeregistrationRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        ctx: &TenantContext,
        dereg: &CarInspectionDeregistration,
    ) -> Result<CarInspectionDeregistration> {
        super::insert(self.db.as_ref(), ctx, &CAR_INSPECTION_DEREGISTRATIONS, dereg).await
    }

    pub async fn get(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        car_id: &str,
        twodimension_code_info_valid_period_expirdate: &str,
    ) -> Result<CarInspectionDeregistration> {
        super::get(
            self.db.as_ref(),
            ctx,
            &CAR_INSPECTION_DEREGISTRATIONS,
            Params::new()
                .bind(organization_id.to_string())
                .bind(car_id.to_string())
                .bind(twodimension_code_info_valid_period_expirdate.to_string()),
            || {
                format!(
                    "{}/{}/{}",
                    organization_id, car_id, twodimension_code_info_valid_period_expirdate
                )
            },
        )
        .await
    }

    pub async fn update(
        &self,
        ctx: &TenantContext,
        dereg: &CarInspectionDeregistration,
    ) -> Result<CarInspectionDeregistration> {
        super::update_all(
            self.db.as_ref(),
            ctx,
            &CAR_INSPECTION_DEREGISTRATIONS,
            dereg,
            || {
                format!(
                    "{}/{}/{}",
                    dereg.organization_id,
                    dereg.car_id,
                    dereg.twodimension_code_info_valid_period_expirdate
                )
            },
        )
        .await
    }

    pub async fn delete(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        car_id: &str,
        twodimension_code_info_valid_period_expirdate: &str,
    ) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &CAR_INSPECTION_DEREGISTRATIONS,
            Params::new()
                .bind(organization_id.to_string())
                .bind(car_id.to_string())
                .bind(twodimension_code_info_valid_period_expirdate.to_string()),
            Utc::now(),
            || {
                format!(
                    "{}/{}/{}",
                    organization_id, car_id, twodimension_code_info_valid_period_expirdate
                )
            },
        )
        .await
    }

    pub async fn list(
        &self,
        ctx: &TenantContext,
        page: Page,
    ) -> Result<Vec<CarInspectionDeregistration>> {
        super::list(self.db.as_ref(), ctx, &CAR_INSPECTION_DEREGISTRATIONS, page).await
    }

    pub async fn list_by_organization(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        page: Page,
    ) -> Result<Vec<CarInspectionDeregistration>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &CAR_INSPECTION_DEREGISTRATIONS,
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
    fn test_select_by_key() {
        assert!(CAR_INSPECTION_DEREGISTRATIONS.select_by_key().ends_with(
            "WHERE \"organization_id\" = $1 AND \"CarId\" = $2 \
             AND \"TwodimensionCodeInfoValidPeriodExpirdate\" = $3"
        ));
    }
}
