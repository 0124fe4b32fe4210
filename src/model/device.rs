use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Device id reserved for check-ins made from the web application.
pub const MANUAL_DEVICE_ID: u64 = 0;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Device {
    pub id: u64,
    pub name: String,
    pub model: Option<String>,
    pub ip_address: Option<String>,
    pub port: Option<i32>,
    pub active: bool,
    pub last_synced_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct NewDevice {
    pub name: String,
    pub model: Option<String>,
    pub ip_address: Option<String>,
    pub port: Option<i32>,
}

/// Link between a personnel record and the user id a terminal reports.
///
/// `device_id = None` means the mapping applies to every terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct DeviceMapping {
    pub id: u64,
    pub personnel_id: u64,
    pub external_user_id: String,
    pub device_id: Option<u64>,
    pub badge_number: Option<String>,
    pub active: bool,
    pub created_at: NaiveDateTime,
    pub modified_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct NewDeviceMapping {
    pub personnel_id: u64,
    pub external_user_id: String,
    pub device_id: Option<u64>,
    pub badge_number: Option<String>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
pub enum SyncStatus {
    Success,
    Partial,
    Failed,
}

impl TryFrom<String> for SyncStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct DeviceSyncLog {
    pub id: u64,
    pub device_id: u64,
    #[sqlx(try_from = "String")]
    pub status: SyncStatus,
    pub imported: i32,
    pub duplicates: i32,
    pub errored: i32,
    pub duration_ms: i64,
    pub errors: Option<String>,
    pub synced_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewDeviceSyncLog {
    pub device_id: u64,
    pub status: SyncStatus,
    pub imported: i32,
    pub duplicates: i32,
    pub errored: i32,
    pub duration_ms: i64,
    pub errors: Option<String>,
    pub synced_at: NaiveDateTime,
}
