//! Storage seams for the ledger.
//!
//! Services take a store by reference instead of reaching for a shared pool, so the same
//! logic runs against MySQL in production and against [`memory::MemoryStore`] in tests.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use std::future::Future;
use utoipa::{IntoParams, ToSchema};

use crate::error::LedgerError;
use crate::ledger::aggregator::month_bounds;
use crate::ledger::leave::{LeaveDecision, LeaveDecisionOutcome, LeaveRevision};
use crate::ledger::policy::LeavePolicy;
use crate::model::anomaly::{Anomaly, AnomalyKind, AnomalyResolution, NewAnomaly};
use crate::model::InsertOutcome;
use crate::model::clock_event::{NewRawClockEvent, RawClockEvent};
use crate::model::device::{
    Device, DeviceMapping, DeviceSyncLog, NewDevice, NewDeviceMapping, NewDeviceSyncLog,
};
use crate::model::leave_request::{
    LeaveBalance, LeaveRequest, LeaveStatus, LeaveType, NewLeaveRequest, ValidationHistory,
};
use crate::model::personnel::Personnel;
use crate::model::presence::{DailyPresence, PresenceDiscrepancy, PresenceFigures};

#[cfg(test)]
pub mod memory;
pub mod mysql;

pub type StoreResult<T> = Result<T, LedgerError>;

#[derive(Debug, Clone, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct PresenceFilter {
    /// First day of the period (inclusive)
    pub from: NaiveDate,
    /// Last day of the period (inclusive)
    pub to: NaiveDate,
    pub personnel_id: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct AnomalyFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub resolved: Option<bool>,
    pub kind: Option<AnomalyKind>,
    pub personnel_id: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct OrphanFilter {
    pub device_id: Option<u64>,
    pub external_user_id: Option<String>,
    /// Maximum rows returned (default 200)
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct LeaveFilter {
    pub personnel_id: Option<u64>,
    pub status: Option<LeaveStatus>,
    /// Month of date_start (1-12), only applied together with `year`
    pub month: Option<u32>,
    pub year: Option<i32>,
    /// Pagination page number (start with 1)
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl LeaveFilter {
    /// First and last day of the `month`/`year` filter when both are set and valid.
    pub fn month_window(&self) -> Option<(NaiveDate, NaiveDate)> {
        month_bounds(self.year?, self.month?)
    }
}

pub trait AttendanceStore: Send + Sync {
    fn find_personnel(&self, id: u64)
    -> impl Future<Output = StoreResult<Option<Personnel>>> + Send;

    fn active_personnel(&self) -> impl Future<Output = StoreResult<Vec<Personnel>>> + Send;

    fn find_device(&self, id: u64) -> impl Future<Output = StoreResult<Option<Device>>> + Send;

    fn list_devices(&self, active_only: bool)
    -> impl Future<Output = StoreResult<Vec<Device>>> + Send;

    fn insert_device(&self, device: &NewDevice) -> impl Future<Output = StoreResult<u64>> + Send;

    /// Active mappings carrying this external user id, whatever their device scope.
    fn mapping_candidates(
        &self,
        external_user_id: &str,
    ) -> impl Future<Output = StoreResult<Vec<DeviceMapping>>> + Send;

    fn active_mapping_for(
        &self,
        personnel_id: u64,
    ) -> impl Future<Output = StoreResult<Option<DeviceMapping>>> + Send;

    fn list_active_mappings(&self) -> impl Future<Output = StoreResult<Vec<DeviceMapping>>> + Send;

    fn insert_mapping(
        &self,
        mapping: &NewDeviceMapping,
        at: NaiveDateTime,
    ) -> impl Future<Output = StoreResult<u64>> + Send;

    fn update_mapping(
        &self,
        id: u64,
        mapping: &NewDeviceMapping,
        at: NaiveDateTime,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Soft-deactivates the active mapping of a personnel; returns affected rows.
    fn deactivate_mapping(
        &self,
        personnel_id: u64,
        at: NaiveDateTime,
    ) -> impl Future<Output = StoreResult<u64>> + Send;

    /// Single atomic insert; a (device, user, timestamp) duplicate is reported, not raised.
    fn insert_raw_event(
        &self,
        event: &NewRawClockEvent,
    ) -> impl Future<Output = StoreResult<InsertOutcome>> + Send;

    /// Resolved events of a personnel within `[date 00:00, date+1 00:00)`, oldest first.
    fn events_for_day(
        &self,
        personnel_id: u64,
        date: NaiveDate,
    ) -> impl Future<Output = StoreResult<Vec<RawClockEvent>>> + Send;

    fn orphan_events(
        &self,
        filter: &OrphanFilter,
    ) -> impl Future<Output = StoreResult<Vec<RawClockEvent>>> + Send;

    /// Points unresolved events of `external_user_id` (on `device_id`, or any device when `None`)
    /// at `personnel_id`; returns the distinct days touched.
    fn attach_orphans(
        &self,
        external_user_id: &str,
        device_id: Option<u64>,
        personnel_id: u64,
    ) -> impl Future<Output = StoreResult<Vec<NaiveDate>>> + Send;

    fn scheduled_start_override(
        &self,
        personnel_id: u64,
        date: NaiveDate,
    ) -> impl Future<Output = StoreResult<Option<NaiveTime>>> + Send;

    fn find_presence(
        &self,
        personnel_id: u64,
        date: NaiveDate,
    ) -> impl Future<Output = StoreResult<Option<DailyPresence>>> + Send;

    fn find_presence_by_id(
        &self,
        id: u64,
    ) -> impl Future<Output = StoreResult<Option<DailyPresence>>> + Send;

    /// Upsert by (personnel_id, date); a validated row keeps its values.
    fn upsert_presence(
        &self,
        personnel_id: u64,
        date: NaiveDate,
        figures: &PresenceFigures,
    ) -> impl Future<Output = StoreResult<u64>> + Send;

    /// Marks a row validated; returns 0 when it was already validated.
    fn validate_presence(
        &self,
        id: u64,
        validator_id: u64,
        at: NaiveDateTime,
    ) -> impl Future<Output = StoreResult<u64>> + Send;

    fn presence_between(
        &self,
        filter: &PresenceFilter,
    ) -> impl Future<Output = StoreResult<Vec<DailyPresence>>> + Send;

    /// Makes `figures` the single open discrepancy of a validated row, superseding an
    /// older open one. Returns `None` when the latest discrepancy of the row, open or
    /// dismissed, already carries the same figures.
    fn queue_discrepancy(
        &self,
        presence: &DailyPresence,
        figures: &PresenceFigures,
        at: NaiveDateTime,
    ) -> impl Future<Output = StoreResult<Option<u64>>> + Send;

    /// Closes an open discrepancy. Accepting also copies its figures onto the validated
    /// presence row in the same transaction, with `resolved_by` as the new validator.
    fn resolve_discrepancy(
        &self,
        id: u64,
        accept: bool,
        resolved_by: u64,
        at: NaiveDateTime,
    ) -> impl Future<Output = StoreResult<PresenceDiscrepancy>> + Send;

    fn list_open_discrepancies(
        &self,
    ) -> impl Future<Output = StoreResult<Vec<PresenceDiscrepancy>>> + Send;

    /// Single atomic insert; an existing (personnel, date, kind) anomaly, open or closed,
    /// is reported as a duplicate.
    fn insert_anomaly(
        &self,
        anomaly: &NewAnomaly,
        at: NaiveDateTime,
    ) -> impl Future<Output = StoreResult<InsertOutcome>> + Send;

    fn find_anomaly(&self, id: u64) -> impl Future<Output = StoreResult<Option<Anomaly>>> + Send;

    /// Closes an open anomaly; returns 0 when it was already resolved.
    fn resolve_anomaly(
        &self,
        resolution: &AnomalyResolution,
    ) -> impl Future<Output = StoreResult<u64>> + Send;

    fn list_anomalies(
        &self,
        filter: &AnomalyFilter,
    ) -> impl Future<Output = StoreResult<Vec<Anomaly>>> + Send;

    fn record_sync_log(
        &self,
        log: &NewDeviceSyncLog,
    ) -> impl Future<Output = StoreResult<u64>> + Send;

    fn sync_logs(
        &self,
        device_id: u64,
        limit: u32,
    ) -> impl Future<Output = StoreResult<Vec<DeviceSyncLog>>> + Send;
}

pub trait LeaveStore: Send + Sync {
    fn list_leave_types(&self) -> impl Future<Output = StoreResult<Vec<LeaveType>>> + Send;

    fn find_leave_type(&self, id: u64)
    -> impl Future<Output = StoreResult<Option<LeaveType>>> + Send;

    fn insert_leave_request(
        &self,
        request: &NewLeaveRequest,
        at: NaiveDateTime,
    ) -> impl Future<Output = StoreResult<u64>> + Send;

    fn find_leave_request(
        &self,
        id: u64,
    ) -> impl Future<Output = StoreResult<Option<LeaveRequest>>> + Send;

    /// Matching requests for the requested page, and the total match count.
    fn list_leave_requests(
        &self,
        filter: &LeaveFilter,
    ) -> impl Future<Output = StoreResult<(Vec<LeaveRequest>, i64)>> + Send;

    /// Rewrites a request that is still Pending; returns 0 otherwise.
    fn revise_pending_leave(
        &self,
        id: u64,
        revision: &LeaveRevision,
    ) -> impl Future<Output = StoreResult<u64>> + Send;

    fn validation_history(
        &self,
        leave_request_id: u64,
    ) -> impl Future<Output = StoreResult<Vec<ValidationHistory>>> + Send;

    fn leave_balance(
        &self,
        personnel_id: u64,
        year: i32,
    ) -> impl Future<Output = StoreResult<Option<LeaveBalance>>> + Send;

    /// Applies a status transition, its history row and its balance effect atomically,
    /// serialising concurrent writers on the request and on the (personnel, year) balance.
    fn apply_leave_decision(
        &self,
        decision: &LeaveDecision,
        policy: &LeavePolicy,
    ) -> impl Future<Output = StoreResult<LeaveDecisionOutcome>> + Send;

    /// Approved requests overlapping `[from, to]`.
    fn approved_leaves_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        personnel_id: Option<u64>,
    ) -> impl Future<Output = StoreResult<Vec<LeaveRequest>>> + Send;
}
