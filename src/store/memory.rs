//! In-process store used by the ledger tests.
//!
//! One mutex guards all tables, so every call is serialised the way the MySQL
//! transactions serialise writers on locked rows.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};

use super::{AnomalyFilter, AttendanceStore, LeaveFilter, LeaveStore, OrphanFilter, PresenceFilter, StoreResult};
use crate::error::LedgerError;
use crate::ledger::leave::{
    LeaveDecision, LeaveDecisionOutcome, LeaveRevision, allotment_for, apply_effect, plan_decision,
};
use crate::ledger::policy::LeavePolicy;
use crate::model::anomaly::{Anomaly, AnomalyResolution, NewAnomaly};
use crate::model::InsertOutcome;
use crate::model::clock_event::{NewRawClockEvent, RawClockEvent};
use crate::model::device::{
    Device, DeviceMapping, DeviceSyncLog, NewDevice, NewDeviceMapping, NewDeviceSyncLog, SyncStatus,
};
use crate::model::leave_request::{
    LeaveBalance, LeaveRequest, LeaveStatus, LeaveType, NewLeaveRequest, ValidationHistory,
};
use crate::model::personnel::Personnel;
use crate::model::presence::{DailyPresence, DiscrepancyResolution, PresenceDiscrepancy, PresenceFigures};
use crate::utils::db_utils::page_bounds;

#[derive(Default)]
struct Tables {
    next_id: u64,
    personnel: BTreeMap<u64, Personnel>,
    devices: BTreeMap<u64, Device>,
    mappings: Vec<DeviceMapping>,
    events: Vec<RawClockEvent>,
    schedules: HashMap<(u64, NaiveDate), NaiveTime>,
    presence: Vec<DailyPresence>,
    discrepancies: Vec<PresenceDiscrepancy>,
    anomalies: Vec<Anomaly>,
    sync_logs: Vec<DeviceSyncLog>,
    leave_types: BTreeMap<u64, LeaveType>,
    leave_requests: Vec<LeaveRequest>,
    balances: HashMap<(u64, i32), LeaveBalance>,
    history: Vec<ValidationHistory>,
}

impl Tables {
    fn id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_mapping_keys(&self, id: Option<u64>, mapping: &NewDeviceMapping) -> StoreResult<()> {
        let clash = self.mappings.iter().any(|m| {
            m.active
                && Some(m.id) != id
                && (m.personnel_id == mapping.personnel_id
                    || m.external_user_id == mapping.external_user_id)
        });
        if clash {
            return Err(LedgerError::conflict("Duplicate active mapping"));
        }
        Ok(())
    }
}

fn write_figures(row: &mut DailyPresence, figures: &PresenceFigures) {
    row.arrival_time = figures.arrival_time;
    row.departure_time = figures.departure_time;
    row.status = figures.status;
    row.lateness_minutes = figures.lateness_minutes;
    row.worked_minutes = figures.worked_minutes;
    row.overtime_minutes = figures.overtime_minutes;
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    pub fn add_personnel(&self, personnel: Personnel) {
        self.lock().personnel.insert(personnel.id, personnel);
    }

    pub fn add_device(&self, device: Device) {
        self.lock().devices.insert(device.id, device);
    }

    pub fn add_mapping(&self, mapping: DeviceMapping) {
        let mut tables = self.lock();
        tables.next_id = tables.next_id.max(mapping.id);
        tables.mappings.push(mapping);
    }

    pub fn add_leave_type(&self, leave_type: LeaveType) {
        self.lock().leave_types.insert(leave_type.id, leave_type);
    }

    pub fn set_balance(&self, balance: LeaveBalance) {
        self.lock()
            .balances
            .insert((balance.personnel_id, balance.year), balance);
    }

    pub fn set_schedule(&self, personnel_id: u64, date: NaiveDate, start: NaiveTime) {
        self.lock().schedules.insert((personnel_id, date), start);
    }

    pub fn force_leave_status(&self, id: u64, status: LeaveStatus) {
        if let Some(request) = self.lock().leave_requests.iter_mut().find(|r| r.id == id) {
            request.status = status;
        }
    }

    pub fn discrepancy(&self, id: u64) -> Option<PresenceDiscrepancy> {
        self.lock().discrepancies.iter().find(|d| d.id == id).cloned()
    }

    pub fn presence_count(&self) -> usize {
        self.lock().presence.len()
    }

    pub fn raw_event_count(&self) -> usize {
        self.lock().events.len()
    }
}

impl AttendanceStore for MemoryStore {
    async fn find_personnel(&self, id: u64) -> StoreResult<Option<Personnel>> {
        Ok(self.lock().personnel.get(&id).cloned())
    }

    async fn active_personnel(&self) -> StoreResult<Vec<Personnel>> {
        Ok(self
            .lock()
            .personnel
            .values()
            .filter(|p| p.is_active())
            .cloned()
            .collect())
    }

    async fn find_device(&self, id: u64) -> StoreResult<Option<Device>> {
        Ok(self.lock().devices.get(&id).cloned())
    }

    async fn list_devices(&self, active_only: bool) -> StoreResult<Vec<Device>> {
        Ok(self
            .lock()
            .devices
            .values()
            .filter(|d| d.active || !active_only)
            .cloned()
            .collect())
    }

    async fn insert_device(&self, device: &NewDevice) -> StoreResult<u64> {
        let mut tables = self.lock();
        let id = tables.devices.keys().next_back().map_or(1, |last| last + 1);
        tables.devices.insert(
            id,
            Device {
                id,
                name: device.name.clone(),
                model: device.model.clone(),
                ip_address: device.ip_address.clone(),
                port: device.port,
                active: true,
                last_synced_at: None,
            },
        );
        Ok(id)
    }

    async fn mapping_candidates(&self, external_user_id: &str) -> StoreResult<Vec<DeviceMapping>> {
        Ok(self
            .lock()
            .mappings
            .iter()
            .filter(|m| m.active && m.external_user_id == external_user_id)
            .cloned()
            .collect())
    }

    async fn active_mapping_for(&self, personnel_id: u64) -> StoreResult<Option<DeviceMapping>> {
        Ok(self
            .lock()
            .mappings
            .iter()
            .find(|m| m.active && m.personnel_id == personnel_id)
            .cloned())
    }

    async fn list_active_mappings(&self) -> StoreResult<Vec<DeviceMapping>> {
        Ok(self.lock().mappings.iter().filter(|m| m.active).cloned().collect())
    }

    async fn insert_mapping(&self, mapping: &NewDeviceMapping, at: NaiveDateTime) -> StoreResult<u64> {
        let mut tables = self.lock();
        tables.check_mapping_keys(None, mapping)?;
        let id = tables.id();
        tables.mappings.push(DeviceMapping {
            id,
            personnel_id: mapping.personnel_id,
            external_user_id: mapping.external_user_id.clone(),
            device_id: mapping.device_id,
            badge_number: mapping.badge_number.clone(),
            active: true,
            created_at: at,
            modified_at: None,
        });
        Ok(id)
    }

    async fn update_mapping(&self, id: u64, mapping: &NewDeviceMapping, at: NaiveDateTime) -> StoreResult<()> {
        let mut tables = self.lock();
        tables.check_mapping_keys(Some(id), mapping)?;
        let row = tables
            .mappings
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| LedgerError::not_found(format!("Mapping {id}")))?;
        row.external_user_id = mapping.external_user_id.clone();
        row.device_id = mapping.device_id;
        row.badge_number = mapping.badge_number.clone();
        row.modified_at = Some(at);
        Ok(())
    }

    async fn deactivate_mapping(&self, personnel_id: u64, at: NaiveDateTime) -> StoreResult<u64> {
        let mut affected = 0;
        for mapping in self
            .lock()
            .mappings
            .iter_mut()
            .filter(|m| m.active && m.personnel_id == personnel_id)
        {
            mapping.active = false;
            mapping.modified_at = Some(at);
            affected += 1;
        }
        Ok(affected)
    }

    async fn insert_raw_event(&self, event: &NewRawClockEvent) -> StoreResult<InsertOutcome> {
        let mut tables = self.lock();
        let duplicate = tables.events.iter().any(|e| {
            e.device_id == event.device_id
                && e.external_user_id == event.external_user_id
                && e.occurred_at == event.occurred_at
        });
        if duplicate {
            return Ok(InsertOutcome::Duplicate);
        }
        let id = tables.id();
        tables.events.push(RawClockEvent {
            id,
            device_id: event.device_id,
            external_user_id: event.external_user_id.clone(),
            resolved_personnel_id: event.resolved_personnel_id,
            occurred_at: event.occurred_at,
            event_type: event.event_type,
            raw_payload: event.raw_payload.clone(),
            imported_at: Local::now().naive_local(),
        });
        Ok(InsertOutcome::Inserted(id))
    }

    async fn events_for_day(&self, personnel_id: u64, date: NaiveDate) -> StoreResult<Vec<RawClockEvent>> {
        let mut events: Vec<_> = self
            .lock()
            .events
            .iter()
            .filter(|e| e.resolved_personnel_id == Some(personnel_id) && e.occurred_at.date() == date)
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.occurred_at, e.id));
        Ok(events)
    }

    async fn orphan_events(&self, filter: &OrphanFilter) -> StoreResult<Vec<RawClockEvent>> {
        let limit = filter.limit.unwrap_or(200) as usize;
        Ok(self
            .lock()
            .events
            .iter()
            .filter(|e| e.resolved_personnel_id.is_none())
            .filter(|e| filter.device_id.is_none_or(|d| e.device_id == d))
            .filter(|e| {
                filter
                    .external_user_id
                    .as_deref()
                    .is_none_or(|u| e.external_user_id == u)
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn attach_orphans(
        &self,
        external_user_id: &str,
        device_id: Option<u64>,
        personnel_id: u64,
    ) -> StoreResult<Vec<NaiveDate>> {
        let mut days = BTreeSet::new();
        for event in self.lock().events.iter_mut().filter(|e| {
            e.resolved_personnel_id.is_none()
                && e.external_user_id == external_user_id
                && device_id.is_none_or(|d| e.device_id == d)
        }) {
            event.resolved_personnel_id = Some(personnel_id);
            days.insert(event.occurred_at.date());
        }
        Ok(days.into_iter().collect())
    }

    async fn scheduled_start_override(&self, personnel_id: u64, date: NaiveDate) -> StoreResult<Option<NaiveTime>> {
        Ok(self.lock().schedules.get(&(personnel_id, date)).copied())
    }

    async fn find_presence(&self, personnel_id: u64, date: NaiveDate) -> StoreResult<Option<DailyPresence>> {
        Ok(self
            .lock()
            .presence
            .iter()
            .find(|p| p.personnel_id == personnel_id && p.work_date == date)
            .cloned())
    }

    async fn find_presence_by_id(&self, id: u64) -> StoreResult<Option<DailyPresence>> {
        Ok(self.lock().presence.iter().find(|p| p.id == id).cloned())
    }

    async fn upsert_presence(&self, personnel_id: u64, date: NaiveDate, figures: &PresenceFigures) -> StoreResult<u64> {
        let mut tables = self.lock();
        if let Some(row) = tables
            .presence
            .iter_mut()
            .find(|p| p.personnel_id == personnel_id && p.work_date == date)
        {
            if !row.validated {
                write_figures(row, figures);
            }
            return Ok(row.id);
        }
        let id = tables.id();
        tables.presence.push(DailyPresence {
            id,
            personnel_id,
            work_date: date,
            arrival_time: figures.arrival_time,
            departure_time: figures.departure_time,
            status: figures.status,
            lateness_minutes: figures.lateness_minutes,
            worked_minutes: figures.worked_minutes,
            overtime_minutes: figures.overtime_minutes,
            validated: false,
            validator_id: None,
            validated_at: None,
        });
        Ok(id)
    }

    async fn validate_presence(&self, id: u64, validator_id: u64, at: NaiveDateTime) -> StoreResult<u64> {
        let mut tables = self.lock();
        match tables.presence.iter_mut().find(|p| p.id == id && !p.validated) {
            Some(row) => {
                row.validated = true;
                row.validator_id = Some(validator_id);
                row.validated_at = Some(at);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn presence_between(&self, filter: &PresenceFilter) -> StoreResult<Vec<DailyPresence>> {
        let mut rows: Vec<_> = self
            .lock()
            .presence
            .iter()
            .filter(|p| filter.from <= p.work_date && p.work_date <= filter.to)
            .filter(|p| filter.personnel_id.is_none_or(|id| p.personnel_id == id))
            .cloned()
            .collect();
        rows.sort_by_key(|p| (p.work_date, p.personnel_id));
        Ok(rows)
    }

    async fn queue_discrepancy(
        &self,
        presence: &DailyPresence,
        figures: &PresenceFigures,
        at: NaiveDateTime,
    ) -> StoreResult<Option<u64>> {
        let mut tables = self.lock();
        let latest = tables.discrepancies.iter().rev().find(|d| d.presence_id == presence.id);
        if latest.is_some_and(|d| d.figures() == *figures) {
            return Ok(None);
        }
        for older in tables
            .discrepancies
            .iter_mut()
            .filter(|d| d.presence_id == presence.id && !d.resolved)
        {
            older.resolved = true;
            older.resolution = DiscrepancyResolution::Superseded;
            older.resolved_at = Some(at);
        }
        let id = tables.id();
        tables.discrepancies.push(PresenceDiscrepancy {
            id,
            presence_id: presence.id,
            personnel_id: presence.personnel_id,
            work_date: presence.work_date,
            arrival_time: figures.arrival_time,
            departure_time: figures.departure_time,
            status: figures.status,
            lateness_minutes: figures.lateness_minutes,
            worked_minutes: figures.worked_minutes,
            overtime_minutes: figures.overtime_minutes,
            detected_at: at,
            resolved: false,
            resolution: DiscrepancyResolution::Pending,
            resolved_by: None,
            resolved_at: None,
        });
        Ok(Some(id))
    }

    async fn resolve_discrepancy(
        &self,
        id: u64,
        accept: bool,
        resolved_by: u64,
        at: NaiveDateTime,
    ) -> StoreResult<PresenceDiscrepancy> {
        let mut tables = self.lock();
        let Tables {
            discrepancies,
            presence,
            ..
        } = &mut *tables;
        let discrepancy = discrepancies
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| LedgerError::not_found(format!("Discrepancy {id}")))?;
        if discrepancy.resolved {
            return Err(LedgerError::conflict(format!("Discrepancy {id} is already resolved")));
        }

        if accept {
            let row = presence
                .iter_mut()
                .find(|p| p.id == discrepancy.presence_id)
                .ok_or_else(|| LedgerError::not_found(format!("Presence {}", discrepancy.presence_id)))?;
            write_figures(row, &discrepancy.figures());
            row.validator_id = Some(resolved_by);
            row.validated_at = Some(at);
        }

        discrepancy.resolved = true;
        discrepancy.resolution = if accept {
            DiscrepancyResolution::Accepted
        } else {
            DiscrepancyResolution::Dismissed
        };
        discrepancy.resolved_by = Some(resolved_by);
        discrepancy.resolved_at = Some(at);
        Ok(discrepancy.clone())
    }

    async fn list_open_discrepancies(&self) -> StoreResult<Vec<PresenceDiscrepancy>> {
        Ok(self
            .lock()
            .discrepancies
            .iter()
            .filter(|d| !d.resolved)
            .cloned()
            .collect())
    }

    async fn insert_anomaly(&self, anomaly: &NewAnomaly, at: NaiveDateTime) -> StoreResult<InsertOutcome> {
        let mut tables = self.lock();
        let duplicate = tables.anomalies.iter().any(|a| {
            a.personnel_id == anomaly.personnel_id
                && a.anomaly_date == anomaly.anomaly_date
                && a.kind == anomaly.kind
        });
        if duplicate {
            return Ok(InsertOutcome::Duplicate);
        }
        let id = tables.id();
        tables.anomalies.push(Anomaly {
            id,
            personnel_id: anomaly.personnel_id,
            anomaly_date: anomaly.anomaly_date,
            kind: anomaly.kind,
            severity: anomaly.severity,
            description: anomaly.description.clone(),
            resolved: false,
            resolved_by: None,
            resolution_text: None,
            resolved_at: None,
            created_at: at,
        });
        Ok(InsertOutcome::Inserted(id))
    }

    async fn find_anomaly(&self, id: u64) -> StoreResult<Option<Anomaly>> {
        Ok(self.lock().anomalies.iter().find(|a| a.id == id).cloned())
    }

    async fn resolve_anomaly(&self, resolution: &AnomalyResolution) -> StoreResult<u64> {
        let mut tables = self.lock();
        match tables
            .anomalies
            .iter_mut()
            .find(|a| a.id == resolution.anomaly_id && !a.resolved)
        {
            Some(anomaly) => {
                anomaly.resolved = true;
                anomaly.resolved_by = Some(resolution.resolved_by);
                anomaly.resolution_text = Some(resolution.resolution_text.clone());
                anomaly.resolved_at = Some(resolution.resolved_at);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn list_anomalies(&self, filter: &AnomalyFilter) -> StoreResult<Vec<Anomaly>> {
        let mut rows: Vec<_> = self
            .lock()
            .anomalies
            .iter()
            .filter(|a| filter.from.is_none_or(|d| a.anomaly_date >= d))
            .filter(|a| filter.to.is_none_or(|d| a.anomaly_date <= d))
            .filter(|a| filter.resolved.is_none_or(|r| a.resolved == r))
            .filter(|a| filter.kind.is_none_or(|k| a.kind == k))
            .filter(|a| filter.personnel_id.is_none_or(|id| a.personnel_id == id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.anomaly_date.cmp(&a.anomaly_date).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn record_sync_log(&self, log: &NewDeviceSyncLog) -> StoreResult<u64> {
        let mut tables = self.lock();
        let id = tables.id();
        tables.sync_logs.push(DeviceSyncLog {
            id,
            device_id: log.device_id,
            status: log.status,
            imported: log.imported,
            duplicates: log.duplicates,
            errored: log.errored,
            duration_ms: log.duration_ms,
            errors: log.errors.clone(),
            synced_at: log.synced_at,
        });
        if log.status != SyncStatus::Failed {
            if let Some(device) = tables.devices.get_mut(&log.device_id) {
                device.last_synced_at = Some(log.synced_at);
            }
        }
        Ok(id)
    }

    async fn sync_logs(&self, device_id: u64, limit: u32) -> StoreResult<Vec<DeviceSyncLog>> {
        Ok(self
            .lock()
            .sync_logs
            .iter()
            .rev()
            .filter(|l| l.device_id == device_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

impl LeaveStore for MemoryStore {
    async fn list_leave_types(&self) -> StoreResult<Vec<LeaveType>> {
        Ok(self.lock().leave_types.values().cloned().collect())
    }

    async fn find_leave_type(&self, id: u64) -> StoreResult<Option<LeaveType>> {
        Ok(self.lock().leave_types.get(&id).cloned())
    }

    async fn insert_leave_request(&self, request: &NewLeaveRequest, at: NaiveDateTime) -> StoreResult<u64> {
        let mut tables = self.lock();
        if tables
            .leave_requests
            .iter()
            .any(|r| r.reference == request.reference)
        {
            return Err(LedgerError::conflict(format!(
                "Reference {} already exists",
                request.reference
            )));
        }
        let id = tables.id();
        tables.leave_requests.push(LeaveRequest {
            id,
            reference: request.reference.clone(),
            personnel_id: request.personnel_id,
            leave_type_id: request.leave_type_id,
            date_start: request.date_start,
            date_end: request.date_end,
            day_count: request.day_count,
            reason: request.reason.clone(),
            status: LeaveStatus::Pending,
            requester_id: request.requester_id,
            validator_id: None,
            validation_date: None,
            validation_comment: None,
            created_at: at,
        });
        Ok(id)
    }

    async fn find_leave_request(&self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        Ok(self.lock().leave_requests.iter().find(|r| r.id == id).cloned())
    }

    async fn list_leave_requests(&self, filter: &LeaveFilter) -> StoreResult<(Vec<LeaveRequest>, i64)> {
        let window = filter.month_window();
        let mut rows: Vec<_> = self
            .lock()
            .leave_requests
            .iter()
            .filter(|r| filter.personnel_id.is_none_or(|id| r.personnel_id == id))
            .filter(|r| filter.status.is_none_or(|s| r.status == s))
            .filter(|r| window.is_none_or(|(first, last)| first <= r.date_start && r.date_start <= last))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = rows.len() as i64;
        let (_, per_page, offset) = page_bounds(filter.page, filter.per_page);
        let page = rows
            .into_iter()
            .skip(offset as usize)
            .take(per_page as usize)
            .collect();
        Ok((page, total))
    }

    async fn revise_pending_leave(&self, id: u64, revision: &LeaveRevision) -> StoreResult<u64> {
        let mut tables = self.lock();
        match tables
            .leave_requests
            .iter_mut()
            .find(|r| r.id == id && r.status == LeaveStatus::Pending)
        {
            Some(request) => {
                request.leave_type_id = revision.leave_type_id;
                request.date_start = revision.date_start;
                request.date_end = revision.date_end;
                request.day_count = revision.day_count;
                request.reason = revision.reason.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn validation_history(&self, leave_request_id: u64) -> StoreResult<Vec<ValidationHistory>> {
        Ok(self
            .lock()
            .history
            .iter()
            .filter(|h| h.leave_request_id == leave_request_id)
            .cloned()
            .collect())
    }

    async fn leave_balance(&self, personnel_id: u64, year: i32) -> StoreResult<Option<LeaveBalance>> {
        Ok(self.lock().balances.get(&(personnel_id, year)).copied())
    }

    async fn apply_leave_decision(
        &self,
        decision: &LeaveDecision,
        policy: &LeavePolicy,
    ) -> StoreResult<LeaveDecisionOutcome> {
        let mut tables = self.lock();
        let request = tables
            .leave_requests
            .iter()
            .find(|r| r.id == decision.request_id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(format!("Leave request {}", decision.request_id)))?;
        let leave_type = tables
            .leave_types
            .get(&request.leave_type_id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(format!("Leave type {}", request.leave_type_id)))?;

        // Everything is computed before the first write, so an error leaves no trace.
        let effect = plan_decision(&request, &leave_type, decision.target)?;
        let year = request.balance_year();
        let balance = apply_effect(
            tables.balances.get(&(request.personnel_id, year)).copied(),
            effect,
            request.personnel_id,
            year,
            allotment_for(&leave_type, policy),
        )?;

        let mut updated = request.clone();
        updated.status = decision.target;
        updated.validator_id = Some(decision.validator_id);
        updated.validation_date = Some(decision.decided_at);
        updated.validation_comment = decision.comment.clone();

        if let Some(row) = tables.leave_requests.iter_mut().find(|r| r.id == request.id) {
            *row = updated.clone();
        }
        let history_id = tables.id();
        tables.history.push(ValidationHistory {
            id: history_id,
            leave_request_id: request.id,
            validator_id: decision.validator_id,
            action: decision.target,
            comment: decision.comment.clone(),
            acted_at: decision.decided_at,
        });
        if let Some(balance) = balance {
            tables.balances.insert((balance.personnel_id, balance.year), balance);
        }

        Ok(LeaveDecisionOutcome {
            request: updated,
            previous_status: request.status,
            effect,
            balance,
        })
    }

    async fn approved_leaves_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        personnel_id: Option<u64>,
    ) -> StoreResult<Vec<LeaveRequest>> {
        Ok(self
            .lock()
            .leave_requests
            .iter()
            .filter(|r| r.status == LeaveStatus::Approved && r.date_start <= to && r.date_end >= from)
            .filter(|r| personnel_id.is_none_or(|id| r.personnel_id == id))
            .cloned()
            .collect())
    }
}
