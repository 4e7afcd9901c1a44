//! Refuelling and inspection stops

use super::{new_id, Page};
use crate::context::TenantContext;
use crate::db::sql::{Live, Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::Utc;
use std::sync::Arc;

record! {
    pub struct Kudgfry {
        uuid: String => "uuid",
        organization_id: String => "OrganizationID",
        hash: String => "Hash",
        created: String => "Created",
        deleted: Option<String> => "Deleted",
        kudguri_uuid: Option<String> => "KudguriUuid",
        target_driver_type: String => "TargetDriverType",
        unkou_no: Option<String> => "UnkouNo",
        unkou_date: Option<String> => "UnkouDate",
        read_date: Option<String> => "ReadDate",
        office_cd: Option<String> => "OfficeCd",
        office_name: Option<String> => "OfficeName",
        vehicle_cd: Option<String> => "VehicleCd",
        vehicle_name: Option<String> => "VehicleName",
        driver_cd1: Option<String> => "DriverCd1",
        driver_name1: Option<String> => "DriverName1",
        driver_cd2: Option<String> => "DriverCd2",
        driver_name2: Option<String> => "DriverName2",
        relevant_datetime: Option<String> => "RelevantDatetime",
        refuel_inspect_category: Option<String> => "RefuelInspectCategory",
        refuel_inspect_category_name: Option<String> => "RefuelInspectCategoryName",
        refuel_inspect_type: Option<String> => "RefuelInspectType",
        refuel_inspect_type_name: Option<String> => "RefuelInspectTypeName",
        refuel_inspect_kind: Option<String> => "RefuelInspectKind",
        refuel_inspect_kind_name: Option<String> => "RefuelInspectKindName",
        refill_amount: Option<String> => "RefillAmount",
        own_other_type: Option<String> => "OwnOtherType",
        mileage: Option<String> => "mileage",
        meter_value: Option<String> => "MeterValue",
    }
}

pub(crate) const KUDGFRY: Table = Table::new("kudgfry", "kudgfry", Kudgfry::COLUMNS, &["uuid"])
    .live(Live::NullText("Deleted"))
    .order_by(&[("Created", Order::Desc), ("uuid", Order::Asc)]);

#[derive(Clone)]
pub struct KudgfryRepository {
    db: Arc<dyn Db>,
}

impl KudgfryRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(&self, ctx: &TenantContext, row: &Kudgfry) -> Result<Kudgfry> {
        let mut row = row.clone();
        if row.uuid.is_empty() {
            row.uuid = new_id();
        }
        row.deleted = None;
        super::insert(self.db.as_ref(), ctx, &KUDGFRY, &row).await
    }

    pub async fn get_by_uuid(&self, ctx: &TenantContext, uuid: &str) -> Result<Kudgfry> {
        super::get(
            self.db.as_ref(),
            ctx,
            &KUDGFRY,
            Params::new().bind(uuid.to_string()),
            || uuid.to_string(),
        )
        .await
    }

    pub async fn update(&self, ctx: &TenantContext, row: &Kudgfry) -> Result<Kudgfry> {
        super::update_all(self.db.as_ref(), ctx, &KUDGFRY, row, || row.uuid.clone()).await
    }

    pub async fn delete(&self, ctx: &TenantContext, uuid: &str) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &KUDGFRY,
            Params::new().bind(uuid.to_string()),
            Utc::now(),
            || uuid.to_string(),
        )
        .await
    }

    pub async fn list(&self, ctx: &TenantContext, page: Page) -> Result<Vec<Kudgfry>> {
        super::list(self.db.as_ref(), ctx, &KUDGFRY, page).await
    }

    pub async fn list_by_organization(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        page: Page,
    ) -> Result<Vec<Kudgfry>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &KUDGFRY,
            &["OrganizationID"],
            Params::new().bind(organization_id.to_string()),
            page,
        )
        .await
    }
}
