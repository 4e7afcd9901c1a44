//! Files attached to inspection certificates, by grant date
//!
//! Deletion stamps both `deleted` and `modified`.

use super::{new_id, Page};
use crate::context::TenantContext;
use crate::db::sql::{Live, Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::Utc;
use std::sync::Arc;

record! {
    pub struct CarInspectionFileA {
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

pub(crate) const CAR_INSPECTION_FILES_A: Table = Table::new(
    "car_inspection_files_a",
    "car inspection file",
    CarInspectionFileA::COLUMNS,
    &["uuid"],
)
.live(Live::NullText("deleted"))
.delete_stamps(&["modified"])
.order_by(&[("created", Order::Desc), ("uuid", Order::Asc)]);

#[derive(Clone)]
pub struct CarInspectionFileARepository {
    db: Arc<dyn Db>,
}

impl CarInspectionFileARepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        ctx: &TenantContext,
        file: &CarInspectionFileA,
    ) -> Result<CarInspectionFileA> {
        let mut file = file.clone();
        if file.uuid.is_empty() {
            file.uuid = new_id();
        }
        file.deleted = None;
        super::insert(self.db.as_ref(), ctx, &CAR_INSPECTION_FILES_A, &file).await
    }

    pub async fn get_by_uuid(&self, ctx: &TenantContext, uuid: &str) -> Result<CarInspectionFileA> {
        super::get(
            self.db.as_ref(),
            ctx,
            &CAR_INSPECTION_FILES_A,
            Params::new().bind(uuid.to_string()),
            || uuid.to_string(),
        )
        .await
    }

    pub async fn update(
        &self,
        ctx: &TenantContext,
        file: &CarInspectionFileA,
    ) -> Result<CarInspectionFileA> {
        super::update_all(
            self.db.as_ref(),
            ctx,
            &CAR_INSPECTION_FILES_A,
            file,
            || file.uuid.clone(),
        )
        .await
    }

    pub async fn delete(&self, ctx: &TenantContext, uuid: &str) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &CAR_INSPECTION_FILES_A,
            Params::new().bind(uuid.to_string()),
            Utc::now(),
            || uuid.to_string(),
        )
        .await
    }

    pub async fn list(&self, ctx: &TenantContext, page: Page) -> Result<Vec<CarInspectionFileA>> {
        super::list(self.db.as_ref(), ctx, &CAR_INSPECTION_FILES_A, page).await
    }

    pub async fn list_by_organization(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        page: Page,
    ) -> Result<Vec<CarInspectionFileA>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &CAR_INSPECTION_FILES_A,
            &["organization_id"],
            Params::new().bind(organization_id.to_string()),
            page,
        )
        .await
    }
}
