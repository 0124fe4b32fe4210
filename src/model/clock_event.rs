use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
pub enum ClockEventType {
    CheckIn,
    CheckOut,
}

impl ClockEventType {
    /// Maps the punch codes terminals and bridges report onto an event type.
    pub fn from_vendor(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "0" | "in" | "checkin" | "check-in" | "check_in" | "entrée" | "entree" => {
                Some(ClockEventType::CheckIn)
            }
            "1" | "out" | "checkout" | "check-out" | "check_out" | "sortie" => {
                Some(ClockEventType::CheckOut)
            }
            _ => None,
        }
    }
}

impl TryFrom<String> for ClockEventType {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Immutable record of a single clock event, as imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct RawClockEvent {
    pub id: u64,
    pub device_id: u64,
    pub external_user_id: String,
    pub resolved_personnel_id: Option<u64>,
    pub occurred_at: NaiveDateTime,
    #[sqlx(try_from = "String")]
    pub event_type: ClockEventType,
    pub raw_payload: Option<String>,
    pub imported_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewRawClockEvent {
    pub device_id: u64,
    pub external_user_id: String,
    pub resolved_personnel_id: Option<u64>,
    pub occurred_at: NaiveDateTime,
    pub event_type: ClockEventType,
    pub raw_payload: Option<String>,
}
