//! Tachograph operation segments
//!
//! `"Deleted" IS NULL` marks live rows; deletion stamps the time as text.

use super::{new_id, Page};
use crate::context::TenantContext;
use crate::db::sql::{Live, Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::Utc;
use std::sync::Arc;

record! {
    pub struct Kudguri {
        uuid: String => "uuid",
        organization_id: String => "OrganizationID",
        hash: String => "Hash",
        created: String => "Created",
        deleted: Option<String> => "Deleted",
        unkou_no: String => "unkouNo",
        kudguri_uuid: String => "kudguriUuid",
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

pub(crate) const KUDGURI: Table = Table::new("kudguri", "kudguri", Kudguri::COLUMNS, &["uuid"])
    .live(Live::NullText("Deleted"))
    .order_by(&[("Created", Order::Desc), ("uuid", Order::Asc)]);

#[derive(Clone)]
pub struct KudguriRepository {
    db: Arc<dyn Db>,
}

impl KudguriRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(&self, ctx: &TenantContext, row: &Kudguri) -> Result<Kudguri> {
        let mut row = row.clone();
        if row.uuid.is_empty() {
            row.uuid = new_id();
        }
        row.deleted = None;
        super::insert(self.db.as_ref(), ctx, &KUDGURI, &row).await
    }

    pub async fn get_by_uuid(&self, ctx: &TenantContext, uuid: &str) -> Result<Kudguri> {
        super::get(
            self.db.as_ref(),
            ctx,
            &KUDGURI,
            Params::new().bind(uuid.to_string()),
            || uuid.to_string(),
        )
        .await
    }

    pub async fn update(&self, ctx: &TenantContext, row: &Kudguri) -> Result<Kudguri> {
        super::update_all(self.db.as_ref(), ctx, &KUDGURI, row, || row.uuid.clone()).await
    }

    pub async fn delete(&self, ctx: &TenantContext, uuid: &str) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &KUDGURI,
            Params::new().bind(uuid.to_string()),
            Utc::now(),
            || uuid.to_string(),
        )
        .await
    }

    pub async fn list(&self, ctx: &TenantContext, page: Page) -> Result<Vec<Kudguri>> {
        super::list(self.db.as_ref(), ctx, &KUDGURI, page).await
    }

    pub async fn list_by_organization(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        page: Page,
    ) -> Result<Vec<Kudguri>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &KUDGURI,
            &["OrganizationID"],
            Params::new().bind(organization_id.to_string()),
            page,
        )
        .await
    }
}
