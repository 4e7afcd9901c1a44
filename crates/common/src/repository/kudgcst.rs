//! Ferry crossings recorded during an operation

use super::{new_id, Page};
use crate::context::TenantContext;
use crate::db::sql::{Live, Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::Utc;
use std::sync::Arc;

record! {
    pub struct Kudgcst {
        uuid: String => "UUID",
        organization_id: String => "OrganizationID",
        hash: String => "Hash",
        created: String => "Created",
        deleted: Option<String> => "Deleted",
        kudguri_uuid: Option<String> => "KudguriUuid",
        unkou_no: Option<String> => "UnkouNo",
        unkou_date: Option<String> => "UnkouDate",
        read_date: Option<String> => "ReadDate",
        office_cd: Option<String> => "OfficeCd",
        office_name: Option<String> => "OfficeName",
        vehicle_cd: Option<String> => "VehicleCd",
        vehicle_name: Option<String> => "VehicleName",
        driver_cd1: Option<String> => "DriverCd1",
        driver_name1: Option<String> => "DriverName1",
        target_driver_type: String => "TargetDriverType",
        start_datetime: Option<String> => "StartDatetime",
        end_datetime: Option<String> => "EndDatetime",
        ferry_company_cd: Option<String> => "FerryCompanyCd",
        ferry_company_name: Option<String> => "FerryCompanyName",
        boarding_place_cd: Option<String> => "BoardingPlaceCd",
        boarding_place_name: Option<String> => "BoardingPlaceName",
        trip_number: Option<String> => "TripNumber",
        dropoff_place_cd: Option<String> => "DropoffPlaceCd",
        dropoff_place_name: Option<String> => "DropoffPlaceName",
        settlement_type: Option<String> => "SettlementType",
        settlement_type_name: Option<String> => "SettlementTypeName",
        standard_fare: Option<String> => "StandardFare",
        contract_fare: Option<String> => "ContractFare",
        ferry_vehicle_type: Option<String> => "FerryVehicleType",
        ferry_vehicle_type_name: Option<String> => "FerryVehicleTypeName",
        assumed_distance: Option<String> => "AssumedDistance",
    }
}

pub(crate) const KUDGCST: Table = Table::new("kudgcst", "kudgcst", Kudgcst::COLUMNS, &["UUID"])
    .live(Live::NullText("Deleted"))
    .order_by(&[("Created", Order::Desc), ("UUID", Order::Asc)]);

#[derive(Clone)]
pub struct KudgcstRepository {
    db: Arc<dyn Db>,
}

impl KudgcstRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(&self, ctx: &TenantContext, row: &Kudgcst) -> Result<Kudgcst> {
        let mut row = row.clone();
        if row.uuid.is_empty() {
            row.uuid = new_id();
        }
        row.deleted = None;
        super::insert(self.db.as_ref(), ctx, &KUDGCST, &row).await
    }

    pub async fn get_by_uuid(&self, ctx: &TenantContext, uuid: &str) -> Result<Kudgcst> {
        super::get(
            self.db.as_ref(),
            ctx,
            &KUDGCST,
            Params::new().bind(uuid.to_string()),
            || uuid.to_string(),
        )
        .await
    }

    pub async fn update(&self, ctx: &TenantContext, row: &Kudgcst) -> Result<Kudgcst> {
        super::update_all(self.db.as_ref(), ctx, &KUDGCST, row, || row.uuid.clone()).await
    }

    pub async fn delete(&self, ctx: &TenantContext, uuid: &str) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &KUDGCST,
            Params::new().bind(uuid.to_string()),
            Utc::now(),
            || uuid.to_string(),
        )
        .await
    }

    pub async fn list(&self, ctx: &TenantContext, page: Page) -> Result<Vec<Kudgcst>> {
        super::list(self.db.as_ref(), ctx, &KUDGCST, page).await
    }

    pub async fn list_by_organization(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        page: Page,
    ) -> Result<Vec<Kudgcst>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &KUDGCST,
            &["OrganizationID"],
            Params::new().bind(organization_id.to_string()),
            page,
        )
        .await
    }
}
