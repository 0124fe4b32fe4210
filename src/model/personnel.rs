use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
pub enum PersonnelStatus {
    Active,
    Inactive,
}

impl TryFrom<String> for PersonnelStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Read-only view of a personnel record owned by the directory module.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 7,
        "employee_code": "LAB-007",
        "first_name": "Amina",
        "last_name": "Benali",
        "email": "a.benali@labo.example",
        "phone": null,
        "hire_date": "2021-09-01",
        "status": "Active"
    })
)]
pub struct Personnel {
    pub id: u64,
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub hire_date: NaiveDate,
    #[sqlx(try_from = "String")]
    pub status: PersonnelStatus,
}

impl Personnel {
    pub fn is_active(&self) -> bool {
        self.status == PersonnelStatus::Active
    }

    /// A personnel is expected at work from the hire date onwards.
    pub fn is_expected_on(&self, date: NaiveDate) -> bool {
        self.is_active() && date >= self.hire_date
    }
}
