//! Second set of grant-date certificate files

use super::{new_id, Page};
use crate::context::TenantContext;
use crate::db::sql::{Live, Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::Utc;
use std::sync::Arc;

record! {
    pub struct CarInspectionFileB {
        uuid: String => "uuid",
        organization_id: String => "organization_id",
        #[serde(rename = "type")]
        file_type: String => "type",
        elect_cert_mg_no: String => "ElectCertMgNo",
        grantdate_e: String => "GrantdateE",
        grantdate_y: String => "GrantdateY",
        grantdate_m: String => "GrantdateM",
        grantdate_d: String => "GrantdateD",
        created: String => "created",
        modified: String => "modified",
        deleted: Option<String> => "deleted",
    }
}

pub(crate) const CAR_INSPECTION_FILES_B: Table = Table::new(
    "car_inspection_files_b",
    "car inspection file",
    CarInspectionFileB::COLUMNS,
    &["uuid"],
)
.live(Live::NullText("deleted"))
.delete_stamps(&["modified"])
.order_by(&[("created", Order::Desc), ("uuid", Order::Asc)]);

#[derive(Clone)]
pub struct CarInspectionFileBRepository {
    db: Arc<dyn Db>,
}

impl CarInspectionFileBRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        ctx: &TenantContext,
        file: &CarInspectionFileB,
    ) -> Result<CarInspectionFileB> {
        let mut file = file.clone();
        if file.uuid.is_empty() {
            file.uuid = new_id();
        }
        file.deleted = None;
        super::insert(self.db.as_ref(), ctx, &CAR_INSPECTION_FILES_B, &file).await
    }

    pub async fn get_by_uuid(&self, ctx: &TenantContext, uuid: &str) -> Result<CarInspectionFileB> {
        super::get(
            self.db.as_ref(),
            ctx,
            &CAR_INSPECTION_FILES_B,
            Params::new().bind(uuid.to_string()),
            || uuid.to_string(),
        )
        .await
    }

    pub async fn update(
        &self,
        ctx: &TenantContext,
        file: &CarInspectionFileB,
    ) -> Result<CarInspectionFileB> {
        super::update_all(
            self.db.as_ref(),
            ctx,
            &CAR_INSPECTION_FILES_B,
            file,
            || file.uuid.clone(),
        )
        .await
    }

    pub async fn delete(&self, ctx: &TenantContext, uuid: &str) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &CAR_INSPECTION_FILES_B,
            Params::new().bind(uuid.to_string()),
            Utc::now(),
            || uuid.to_string(),
        )
        .await
    }

    pub async fn list(&self, ctx: &TenantContext, page: Page) -> Result<Vec<CarInspectionFileB>> {
        super::list(self.db.as_ref(), ctx, &CAR_INSPECTION_FILES_B, page).await
    }

    pub async fn list_by_organization(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        page: Page,
    ) -> Result<Vec<CarInspectionFileB>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &CAR_INSPECTION_FILES_B,
            &["organization_id"],
            Params::new().bind(organization_id.to_string()),
            page,
        )
        .await
    }
}
