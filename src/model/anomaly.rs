use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum AnomalyKind {
    MissingCheckout,
    UnjustifiedAbsence,
    RepeatedLateness,
}

impl AnomalyKind {
    pub fn severity(self) -> Severity {
        match self {
            AnomalyKind::MissingCheckout => Severity::Major,
            AnomalyKind::UnjustifiedAbsence => Severity::Critical,
            AnomalyKind::RepeatedLateness => Severity::Minor,
        }
    }
}

impl TryFrom<String> for AnomalyKind {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum Severity {
    Minor,
    Major,
    Critical,
}

impl TryFrom<String> for Severity {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Anomaly {
    pub id: u64,
    pub personnel_id: u64,
    pub anomaly_date: NaiveDate,
    #[sqlx(try_from = "String")]
    pub kind: AnomalyKind,
    #[sqlx(try_from = "String")]
    pub severity: Severity,
    pub description: String,
    pub resolved: bool,
    pub resolved_by: Option<u64>,
    pub resolution_text: Option<String>,
    pub resolved_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAnomaly {
    pub personnel_id: u64,
    pub anomaly_date: NaiveDate,
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct AnomalyResolution {
    pub anomaly_id: u64,
    pub resolved_by: u64,
    pub resolution_text: String,
    pub resolved_at: NaiveDateTime,
}
