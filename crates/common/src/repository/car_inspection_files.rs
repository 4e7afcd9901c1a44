//! Files attached to inspection certificates, by publish date
//!
//! `deleted IS NULL` marks live rows.

use super::{new_id, Page};
use crate::context::TenantContext;
use crate::db::sql::{Live, Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::Utc;
use std::sync::Arc;

record! {
    pub struct CarInspectionFile {
        uuid: String => "uuid",
        organization_id: String => "organization_id",
        #[serde(rename = "type")]
        file_type: String => "type",
        elect_cert_mg_no: String => "ElectCertMgNo",
        elect_cert_publishdate_e: String => "ElectCertPublishdateE",
        elect_cert_publishdate_y: String => "ElectCertPublishdateY",
        elect_cert_publishdate_m: String => "ElectCertPublishdateM",
        elect_cert_publishdate_d: String => "ElectCertPublishdateD",
        created: String => "created",
        modified: String => "modified",
        deleted: Option<String> => "deleted",
    }
}

pub(crate) const CAR_INSPECTION_FILES: Table = Table::new(
    "car_inspection_files",
    "car inspection file",
    CarInspectionFile::COLUMNS,
    &["uuid"],
)
.live(Live::NullText("deleted"))
.order_by(&[("created", Order::Desc), ("uuid", Order::Asc)]);

#[derive(Clone)]
pub struct CarInspectionFileRepository {
    db: Arc<dyn Db>,
}

impl CarInspectionFileRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        ctx: &TenantContext,
        file: &CarInspectionFile,
    ) -> Result<CarInspectionFile> {
        let mut file = file.clone();
        if file.uuid.is_empty() {
            file.uuid = new_id();
        }
        file.deleted = None;
        super::insert(self.db.as_ref(), ctx, &CAR_INSPECTION_FILES, &file).await
    }

    pub async fn get_by_uuid(&self, ctx: &TenantContext, uuid: &str) -> Result<CarInspectionFile> {
        super::get(
            self.db.as_ref(),
            ctx,
            &CAR_INSPECTION_FILES,
            Params::new().bind(uuid.to_string()),
            || uuid.to_string(),
        )
        .await
    }

    pub async fn update(
        &self,
        ctx: &TenantContext,
        file: &CarInspectionFile,
    ) -> Result<CarInspectionFile> {
        super::update_all(
            self.db.as_ref(),
            ctx,
            &CAR_INSPECTION_FILES,
            file,
            || file.uuid.clone(),
        )
        .await
    }

    pub async fn delete(&self, ctx: &TenantContext, uuid: &str) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &CAR_INSPECTION_FILES,
            Params::new().bind(uuid.to_string()),
            Utc::now(),
            || uuid.to_string(),
        )
        .await
    }

    pub async fn list(&self, ctx: &TenantContext, page: Page) -> Result<Vec<CarInspectionFile>> {
        super::list(self.db.as_ref(), ctx, &CAR_INSPECTION_FILES, page).await
    }

    pub async fn list_by_organization(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        page: Page,
    ) -> Result<Vec<CarInspectionFile>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &CAR_INSPECTION_FILES,
            &["organization_id"],
            Params::new().bind(organization_id.to_string()),
            page,
        )
        .await
    }
}
