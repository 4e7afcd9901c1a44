//! Files attached to deregistration records
//!
//! Every column is part of the key, so rows are only created and deleted.

use super::Page;
use crate::context::TenantContext;
use crate::db::sql::{ident, Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::Utc;
use std::sync::Arc;

record! {
    pub struct CarInspectionDeregistrationFile {
        organization_id: String => "organization_id",
        car_id: String => "CarId",
        twodimension_code_info_valid_period_expirdate: String => "TwodimensionCodeInfoValidPeriodExpirdate",
        file_uuid: String => "fileUuid",
    }
}

pub(crate) const CAR_INSPECTION_DEREGISTRATION_FILES: Table = Table::new(
    "car_inspection_deregistration_files",
    "car inspection deregistration file",
    CarInspectionDeregistrationFile::COLUMNS,
    &[
        "organization_id",
        "CarId",
        "TwodimensionCodeInfoValidPeriodExpirdate",
        "fileUuid",
    ],
)
.order_by(&[
    ("organization_id", Order::Asc),
    ("CarId", Order::Asc),
    ("TwodimensionCodeInfoValidPeriodExpirdate", Order::Asc),
    ("fileUuid", Order::Asc),
]);

/// Filter selecting the files of one deregistration record
const BY_DEREGISTRATION: &[&str] = &[
    "organization_id",
    "CarId",
    "TwodimensionCodeInfoValidPeriodExpirdate",
];

/// Primary key of [`CarInspectionDeregistrationFile`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeregistrationFileKey {
    pub organization_id: String,
    pub car_id: String,
    pub twodimension_code_info_valid_period_expirdate: String,
    pub file_uuid: String,
}

impl DeregistrationFileKey {
    fn params(&self) -> Params {
        Params::new()
            .bind(self.organization_id.clone())
            .bind(self.car_id.clone())
            .bind(self.twodimension_code_info_valid_period_expirdate.clone())
            .bind(self.file_uuid.clone())
    }

    fn describe(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.organization_id,
            self.car_id,
            self.twodimension_code_info_valid_period_expirdate,
            self.file_uuid,
        )
    }
}

impl From<&CarInspectionDeregistrationFile> for DeregistrationFileKey {
    fn from(row: &CarInspectionDeregistrationFile) -> Self {
        Self {
            organization_id: row.organization_id.clone(),
            car_id: row.car_id.clone(),
            twodimension_code_info_valid_period_expirdate: row.twodimension_code_info_valid_period_expirdate.clone(),
            file_uuid: row.file_uuid.clone(),
        }
    }
}

#[derive(Clone)]
pub struct CarInspectionDeregistrationFileRepository {
    db: Arc<dyn Db>,
}

impl CarInspectionDeregistrationFileRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        ctx: &TenantContext,
        file: &CarInspectionDeregistrationFile,
    ) -> Result<CarInspectionDeregistrationFile> {
        super::insert(self.db.as_ref(), ctx, &CAR_INSPECTION_DEREGISTRATION_FILES, file).await
    }

    pub async fn get(
        &self,
        ctx: &TenantContext,
        key: &DeregistrationFileKey,
    ) -> Result<CarInspectionDeregistrationFile> {
        super::get(
            self.db.as_ref(),
            ctx,
            &CAR_INSPECTION_DEREGISTRATION_FILES,
            key.params(),
            || key.describe(),
        )
        .await
    }

    pub async fn delete(&self, ctx: &TenantContext, key: &DeregistrationFileKey) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &CAR_INSPECTION_DEREGISTRATION_FILES,
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
    ) -> Result<Vec<CarInspectionDeregistrationFile>> {
        super::list(self.db.as_ref(), ctx, &CAR_INSPECTION_DEREGISTRATION_FILES, page).await
    }

    pub async fn list_by_organization(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        page: Page,
    ) -> Result<Vec<CarInspectionDeregistrationFile>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &CAR_INSPECTION_DEREGISTRATION_FILES,
            &["organization_id"],
            Params::new().bind(organization_id.to_string()),
            page,
        )
        .await
    }

    /// Files attached to one deregistration, by file uuid
    pub async fn list_by_deregistration(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        car_id: &str,
        valid_period_expirdate: &str,
        page: Page,
    ) -> Result<Vec<CarInspectionDeregistrationFile>> {
        let sql = format!(
            "{} ORDER BY {} LIMIT $4 OFFSET $5",
            CAR_INSPECTION_DEREGISTRATION_FILES.select_where(BY_DEREGISTRATION),
            ident("fileUuid")
        );
        let params = Params::new()
            .bind(organization_id.to_string())
            .bind(car_id.to_string())
            .bind(valid_period_expirdate.to_string())
            .bind(page.limit())
            .bind(page.offset());
        self.db.query(ctx, &sql, params).await?.scan_all()
    }
}
