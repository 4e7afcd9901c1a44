//! Tachograph position and state snapshots
//!
//! Key `(organization_id, DataDateTime, VehicleCD)`, newest snapshot first.

use super::Page;
use crate::context::TenantContext;
use crate::db::sql::{Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::Utc;
use std::sync::Arc;

record! {
    pub struct Dtakolog {
        organization_id: String => "organization_id",
        #[serde(rename = "__type")]
        record_type: String => "__type",
        address_disp_c: Option<String> => "AddressDispC",
        address_disp_p: Option<String> => "AddressDispP",
        all_state: Option<String> => "AllState",
        all_state_ex: Option<String> => "AllStateEx",
        all_state_font_color: Option<String> => "AllStateFontColor",
        all_state_font_color_index: i32 => "AllStateFontColorIndex",
        all_state_ryout_color: String => "AllStateRyoutColor",
        branch_cd: i32 => "BranchCD",
        branch_name: String => "BranchName",
        comu_date_time: Option<String> => "ComuDateTime",
        current_work_cd: i32 => "CurrentWorkCD",
        current_work_name: Option<String> => "CurrentWorkName",
        data_date_time: String => "DataDateTime",
        data_filter_type: i32 => "DataFilterType",
        disp_flag: i32 => "DispFlag",
        driver_cd: i32 => "DriverCD",
        driver_name: Option<String> => "DriverName",
        event_val: Option<String> => "EventVal",
        gps_direction: i32 => "GpsDirection",
        gps_enable: i32 => "GpsEnable",
        gps_lati_and_long: Option<String> => "GpsLatiAndLong",
        gps_latitude: i32 => "GpsLatitude",
        gps_longitude: i32 => "GpsLongitude",
        gps_satellite_num: i32 => "GpsSatelliteNum",
        odo_meter: Option<String> => "OdoMeter",
        operation_state: i32 => "OperationState",
        recive_event_type: i32 => "ReciveEventType",
        recive_packet_type: i32 => "RecivePacketType",
        recive_type_color_name: Option<String> => "ReciveTypeColorName",
        recive_type_name: Option<String> => "ReciveTypeName",
        recive_work_cd: i32 => "ReciveWorkCD",
        revo: i32 => "Revo",
        setting_temp: String => "SettingTemp",
        setting_temp1: String => "SettingTemp1",
        setting_temp3: String => "SettingTemp3",
        setting_temp4: String => "SettingTemp4",
        speed: f32 => "Speed",
        start_work_date_time: Option<String> => "StartWorkDateTime",
        state: Option<String> => "State",
        state1: Option<String> => "State1",
        state2: Option<String> => "State2",
        state3: Option<String> => "State3",
        state_flag: String => "StateFlag",
        sub_driver_cd: i32 => "SubDriverCD",
        temp1: Option<String> => "Temp1",
        temp2: Option<String> => "Temp2",
        temp3: Option<String> => "Temp3",
        temp4: Option<String> => "Temp4",
        temp_state: i32 => "TempState",
        vehicle_cd: i32 => "VehicleCD",
        vehicle_icon_color: Option<String> => "VehicleIconColor",
        vehicle_icon_label_for_datetime: Option<String> => "VehicleIconLabelForDatetime",
        vehicle_icon_label_for_driver: Option<String> => "VehicleIconLabelForDriver",
        vehicle_icon_label_for_vehicle: Option<String> => "VehicleIconLabelForVehicle",
        vehicle_name: String => "VehicleName",
    }
}

pub(crate) const DTAKOLOGS: Table = Table::new(
    "dtakologs",
    "dtakolog",
    Dtakolog::COLUMNS,
    &["organization_id", "DataDateTime", "VehicleCD"],
)
.order_by(&[
    ("organization_id", Order::Asc),
    ("DataDateTime", Order::Desc),
    ("VehicleCD", Order::Asc),
]);

#[derive(Clone)]
pub struct DtakologRepository {
    db: Arc<dyn Db>,
}

impl DtakologRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(&self, ctx: &TenantContext, log: &Dtakolog) -> Result<Dtakolog> {
        super::insert(self.db.as_ref(), ctx, &DTAKOLOGS, log).await
    }

    pub async fn get(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        data_date_time: &str,
        vehicle_cd: i32,
    ) -> Result<Dtakolog> {
        super::get(
            self.db.as_ref(),
            ctx,
            &DTAKOLOGS,
            Params::new()
                .bind(organization_id.to_string())
                .bind(data_date_time.to_string())
                .bind(vehicle_cd),
            || format!("{}/{}/{}", organization_id, data_date_time, vehicle_cd),
        )
        .await
    }

    pub async fn update(&self, ctx: &TenantContext, log: &Dtakolog) -> Result<Dtakolog> {
        super::update_all(
            self.db.as_ref(),
            ctx,
            &DTAKOLOGS,
            log,
            || format!("{}/{}/{}", log.organization_id, log.data_date_time, log.vehicle_cd),
        )
        .await
    }

    pub async fn delete(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        data_date_time: &str,
        vehicle_cd: i32,
    ) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &DTAKOLOGS,
            Params::new()
                .bind(organization_id.to_string())
                .bind(data_date_time.to_string())
                .bind(vehicle_cd),
            Utc::now(),
            || format!("{}/{}/{}", organization_id, data_date_time, vehicle_cd),
        )
        .await
    }

    pub async fn list(&self, ctx: &TenantContext, page: Page) -> Result<Vec<Dtakolog>> {
        super::list(self.db.as_ref(), ctx, &DTAKOLOGS, page).await
    }

    pub async fn list_by_organization(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        page: Page,
    ) -> Result<Vec<Dtakolog>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &DTAKOLOGS,
            &["organization_id"],
            Params::new().bind(organization_id.to_string()),
            page,
        )
        .await
    }
}
