//! Full tachograph event segments

use super::{new_id, Page};
use crate::context::TenantContext;
use crate::db::sql::{Live, Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::Utc;
use std::sync::Arc;

record! {
    pub struct Kudgful {
        uuid: String => "uuid",
        organization_id: String => "OrganizationID",
        hash: String => "Hash",
        created: String => "Created",
        deleted: Option<String> => "Deleted",
        kudguri_uuid: Option<String> => "KudguriUuid",
        unkou_no: Option<String> => "UnkouNo",
        target_driver_type: String => "TargetDriverType",
        read_date: Option<String> => "ReadDate",
        office_cd: Option<String> => "OfficeCd",
        office_name: Option<String> => "OfficeName",
        vehicle_cd: Option<String> => "VehicleCd",
        vehicle_name: Option<String> => "VehicleName",
        driver_cd1: Option<String> => "DriverCd1",
        driver_name1: Option<String> => "DriverName1",
        target_driver_cd: Option<String> => "TargetDriverCd",
        target_driver_name: Option<String> => "TargetDriverName",
        start_datetime: Option<String> => "StartDatetime",
        end_datetime: Option<String> => "EndDatetime",
        event_cd: Option<String> => "EventCd",
        event_name: Option<String> => "EventName",
        start_mileage: Option<String> => "StartMileage",
        end_mileage: Option<String> => "EndMileage",
        section_time: Option<String> => "SectionTime",
        section_distance: Option<String> => "SectionDistance",
        start_city_cd: Option<String> => "StartCityCd",
        start_city_name: Option<String> => "StartCityName",
        end_city_cd: Option<String> => "EndCityCd",
        end_city_name: Option<String> => "EndCityName",
        start_place_cd: Option<String> => "StartPlaceCd",
        start_place_name: Option<String> => "StartPlaceName",
        end_place_cd: Option<String> => "EndPlaceCd",
        end_place_name: Option<String> => "EndPlaceName",
        start_gps_valid: Option<String> => "StartGpsValid",
        start_gps_lat: Option<String> => "StartGpsLat",
        start_gps_lng: Option<String> => "StartGpsLng",
        end_gps_valid: Option<String> => "EndGpsValid",
        end_gps_lat: Option<String> => "EndGpsLat",
        end_gps_lng: Option<String> => "EndGpsLng",
        over_limit_max: Option<String> => "OverLimitMax",
    }
}

pub(crate) const KUDGFUL: Table = Table::new("kudgful", "kudgful", Kudgful::COLUMNS, &["uuid"])
    .live(Live::NullText("Deleted"))
    .order_by(&[("Created", Order::Desc), ("uuid", Order::Asc)]);

#[derive(Clone)]
pub struct KudgfulRepository {
    db: Arc<dyn Db>,
}

impl KudgfulRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(&self, ctx: &TenantContext, row: &Kudgful) -> Result<Kudgful> {
        let mut row = row.clone();
        if row.uuid.is_empty() {
            row.uuid = new_id();
        }
        row.deleted = None;
        super::insert(self.db.as_ref(), ctx, &KUDGFUL, &row).await
    }

    pub async fn get_by_uuid(&self, ctx: &TenantContext, uuid: &str) -> Result<Kudgful> {
        super::get(
            self.db.as_ref(),
            ctx,
            &KUDGFUL,
            Params::new().bind(uuid.to_string()),
            || uuid.to_string(),
        )
        .await
    }

    pub async fn update(&self, ctx: &TenantContext, row: &Kudgful) -> Result<Kudgful> {
        super::update_all(self.db.as_ref(), ctx, &KUDGFUL, row, || row.uuid.clone()).await
    }

    pub async fn delete(&self, ctx: &TenantContext, uuid: &str) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &KUDGFUL,
            Params::new().bind(uuid.to_string()),
            Utc::now(),
            || uuid.to_string(),
        )
        .await
    }

    pub async fn list(&self, ctx: &TenantContext, page: Page) -> Result<Vec<Kudgful>> {
        super::list(self.db.as_ref(), ctx, &KUDGFUL, page).await
    }

    pub async fn list_by_organization(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        page: Page,
    ) -> Result<Vec<Kudgful>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &KUDGFUL,
            &["OrganizationID"],
            Params::new().bind(organization_id.to_string()),
            page,
        )
        .await
    }
}
