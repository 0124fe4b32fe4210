use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};

use crate::config::Config;

/// Thresholds used by presence aggregation and the anomaly scanner.
#[derive(Debug, Clone)]
pub struct AttendancePolicy {
    pub scheduled_start: NaiveTime,
    pub standard_workday_minutes: i32,
    pub lateness_grace_minutes: i32,
    pub repeated_lateness_threshold: u32,
    pub working_days: Vec<Weekday>,
}

impl AttendancePolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            scheduled_start: config.scheduled_start,
            standard_workday_minutes: config.standard_workday_minutes,
            lateness_grace_minutes: config.lateness_grace_minutes,
            repeated_lateness_threshold: config.repeated_lateness_threshold,
            working_days: config.working_days.clone(),
        }
    }

    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        self.working_days.contains(&date.weekday())
    }

    pub fn is_late(&self, lateness_minutes: i32) -> bool {
        lateness_minutes > self.lateness_grace_minutes
    }
}

impl Default for AttendancePolicy {
    fn default() -> Self {
        Self {
            scheduled_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            standard_workday_minutes: 480,
            lateness_grace_minutes: 0,
            repeated_lateness_threshold: 3,
            working_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LeavePolicy {
    /// Acquired days given to a balance row created on first approval.
    pub default_allotment: i32,
}

impl LeavePolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_allotment: config.default_leave_allotment,
        }
    }
}

impl Default for LeavePolicy {
    fn default() -> Self {
        Self {
            default_allotment: 30,
        }
    }
}
