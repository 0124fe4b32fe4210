use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
pub enum PresenceStatus {
    Present,
    Absent,
    OnLeave,
}

impl TryFrom<String> for PresenceStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 41,
        "personnel_id": 7,
        "work_date": "2024-03-04",
        "arrival_time": "08:15:00",
        "departure_time": "17:00:00",
        "status": "Present",
        "lateness_minutes": 15,
        "worked_minutes": 525,
        "overtime_minutes": 45,
        "validated": false,
        "validator_id": null,
        "validated_at": null
    })
)]
pub struct DailyPresence {
    pub id: u64,
    pub personnel_id: u64,
    pub work_date: NaiveDate,
    pub arrival_time: Option<NaiveTime>,
    pub departure_time: Option<NaiveTime>,
    #[sqlx(try_from = "String")]
    pub status: PresenceStatus,
    pub lateness_minutes: i32,
    pub worked_minutes: i32,
    pub overtime_minutes: i32,
    pub validated: bool,
    pub validator_id: Option<u64>,
    pub validated_at: Option<NaiveDateTime>,
}

impl DailyPresence {
    /// Present with an arrival but no departure yet.
    #[cfg(test)]
    pub fn is_open(&self) -> bool {
        self.status == PresenceStatus::Present && self.departure_time.is_none()
    }

    pub fn figures(&self) -> PresenceFigures {
        PresenceFigures {
            arrival_time: self.arrival_time,
            departure_time: self.departure_time,
            status: self.status,
            lateness_minutes: self.lateness_minutes,
            worked_minutes: self.worked_minutes,
            overtime_minutes: self.overtime_minutes,
        }
    }
}

/// The derived part of a presence row, as computed from raw events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PresenceFigures {
    pub arrival_time: Option<NaiveTime>,
    pub departure_time: Option<NaiveTime>,
    pub status: PresenceStatus,
    pub lateness_minutes: i32,
    pub worked_minutes: i32,
    pub overtime_minutes: i32,
}

/// How a queued discrepancy was closed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
pub enum DiscrepancyResolution {
    /// Still waiting for a decision.
    Pending,
    /// The queued figures replaced the validated ones.
    Accepted,
    /// The validated figures were kept.
    Dismissed,
    /// Replaced by a later recomputation of the same day.
    Superseded,
}

impl TryFrom<String> for DiscrepancyResolution {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Recomputed figures for a validated row, waiting for a supervisor decision.
///
/// At most one discrepancy per presence row is open at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct PresenceDiscrepancy {
    pub id: u64,
    pub presence_id: u64,
    pub personnel_id: u64,
    pub work_date: NaiveDate,
    pub arrival_time: Option<NaiveTime>,
    pub departure_time: Option<NaiveTime>,
    #[sqlx(try_from = "String")]
    pub status: PresenceStatus,
    pub lateness_minutes: i32,
    pub worked_minutes: i32,
    pub overtime_minutes: i32,
    pub detected_at: NaiveDateTime,
    pub resolved: bool,
    #[sqlx(try_from = "String")]
    pub resolution: DiscrepancyResolution,
    pub resolved_by: Option<u64>,
    pub resolved_at: Option<NaiveDateTime>,
}

impl PresenceDiscrepancy {
    pub fn figures(&self) -> PresenceFigures {
        PresenceFigures {
            arrival_time: self.arrival_time,
            departure_time: self.departure_time,
            status: self.status,
            lateness_minutes: self.lateness_minutes,
            worked_minutes: self.worked_minutes,
            overtime_minutes: self.overtime_minutes,
        }
    }
}

/// Monthly attendance figures for one personnel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PresenceStats {
    pub days_recorded: u32,
    pub days_present: u32,
    pub days_absent: u32,
    pub days_on_leave: u32,
    pub late_days: u32,
    pub total_lateness_minutes: i64,
    pub total_worked_minutes: i64,
    pub total_overtime_minutes: i64,
    pub average_worked_minutes: f64,
    /// Percentage of recorded days with status Present.
    pub presence_rate: f64,
}
