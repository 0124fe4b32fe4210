use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Leave type categories that draw on the yearly leave balance.
pub const BALANCE_DEDUCTING_CATEGORIES: [&str; 2] = ["Congé", "Congés payés"];

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl LeaveStatus {
    /// `Approved -> Rejected` is the reversal path; `Rejected` and `Cancelled` are final.
    pub fn can_transition_to(self, next: LeaveStatus) -> bool {
        matches!(
            (self, next),
            (LeaveStatus::Pending, LeaveStatus::Approved)
                | (LeaveStatus::Pending, LeaveStatus::Rejected)
                | (LeaveStatus::Pending, LeaveStatus::Cancelled)
                | (LeaveStatus::Approved, LeaveStatus::Rejected)
        )
    }
}

impl TryFrom<String> for LeaveStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveType {
    pub id: u64,
    pub label: String,
    pub category: String,
    /// Overrides the configured default allotment when set.
    pub annual_allotment: Option<i32>,
    pub active: bool,
}

impl LeaveType {
    pub fn deducts_balance(&self) -> bool {
        BALANCE_DEDUCTING_CATEGORIES.contains(&self.category.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 12,
        "reference": "ABS-20240301093000-1f2e3d4c",
        "personnel_id": 7,
        "leave_type_id": 1,
        "date_start": "2024-03-10",
        "date_end": "2024-03-12",
        "day_count": 3,
        "reason": "Family visit",
        "status": "Pending",
        "requester_id": 7,
        "validator_id": null,
        "validation_date": null,
        "validation_comment": null,
        "created_at": "2024-03-01T09:30:00"
    })
)]
pub struct LeaveRequest {
    pub id: u64,
    pub reference: String,
    pub personnel_id: u64,
    pub leave_type_id: u64,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub day_count: i32,
    pub reason: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: LeaveStatus,
    pub requester_id: u64,
    pub validator_id: Option<u64>,
    pub validation_date: Option<NaiveDateTime>,
    pub validation_comment: Option<String>,
    pub created_at: NaiveDateTime,
}

impl LeaveRequest {
    /// Balance bucket of the request: the year of its first day, even across a year boundary.
    pub fn balance_year(&self) -> i32 {
        self.date_start.year()
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.date_start <= date && date <= self.date_end
    }
}

#[derive(Debug, Clone)]
pub struct NewLeaveRequest {
    pub reference: String,
    pub personnel_id: u64,
    pub leave_type_id: u64,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub day_count: i32,
    pub reason: Option<String>,
    pub requester_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveBalance {
    pub personnel_id: u64,
    pub year: i32,
    pub acquired_days: i32,
    pub taken_days: i32,
    pub remaining_days: i32,
}

impl LeaveBalance {
    pub fn opening(personnel_id: u64, year: i32, acquired_days: i32) -> Self {
        Self {
            personnel_id,
            year,
            acquired_days,
            taken_days: 0,
            remaining_days: acquired_days,
        }
    }

    pub fn deduct(&mut self, days: i32) {
        self.taken_days += days;
        self.remaining_days -= days;
    }

    pub fn restore(&mut self, days: i32) {
        self.taken_days -= days;
        self.remaining_days += days;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct ValidationHistory {
    pub id: u64,
    pub leave_request_id: u64,
    pub validator_id: u64,
    #[sqlx(try_from = "String")]
    pub action: LeaveStatus,
    pub comment: Option<String>,
    pub acted_at: NaiveDateTime,
}
