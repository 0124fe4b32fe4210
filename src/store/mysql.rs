use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::{MySql, MySqlPool, QueryBuilder};

use super::{AnomalyFilter, AttendanceStore, LeaveFilter, LeaveStore, OrphanFilter, PresenceFilter, StoreResult};
use crate::error::{LedgerError, is_duplicate_key};
use crate::ledger::leave::{
    BalanceEffect, LeaveDecision, LeaveDecisionOutcome, LeaveRevision, allotment_for, apply_effect,
    plan_decision,
};
use crate::ledger::policy::LeavePolicy;
use crate::model::anomaly::{Anomaly, AnomalyResolution, NewAnomaly};
use crate::model::InsertOutcome;
use crate::model::clock_event::{NewRawClockEvent, RawClockEvent};
use crate::model::device::{
    Device, DeviceMapping, DeviceSyncLog, NewDevice, NewDeviceMapping, NewDeviceSyncLog, SyncStatus,
};
use crate::model::leave_request::{
    LeaveBalance, LeaveRequest, LeaveType, NewLeaveRequest, ValidationHistory,
};
use crate::model::personnel::Personnel;
use crate::model::presence::{DailyPresence, DiscrepancyResolution, PresenceDiscrepancy, PresenceFigures};
use crate::utils::db_utils::{FilterSet, page_bounds};

const PERSONNEL_COLUMNS: &str =
    "SELECT id, employee_code, first_name, last_name, email, phone, hire_date, status FROM personnel";
const DEVICE_COLUMNS: &str =
    "SELECT id, name, model, ip_address, port, active, last_synced_at FROM devices";
const MAPPING_COLUMNS: &str = "SELECT id, personnel_id, external_user_id, device_id, badge_number, active, created_at, modified_at FROM device_mappings";
const EVENT_COLUMNS: &str = "SELECT id, device_id, external_user_id, resolved_personnel_id, occurred_at, event_type, raw_payload, imported_at FROM raw_clock_events";
const PRESENCE_COLUMNS: &str = "SELECT id, personnel_id, work_date, arrival_time, departure_time, status, lateness_minutes, worked_minutes, overtime_minutes, validated, validator_id, validated_at FROM daily_presence";
const DISCREPANCY_COLUMNS: &str = "SELECT id, presence_id, personnel_id, work_date, arrival_time, departure_time, status, lateness_minutes, worked_minutes, overtime_minutes, detected_at, resolved, resolution, resolved_by, resolved_at FROM presence_discrepancies";
const ANOMALY_COLUMNS: &str = "SELECT id, personnel_id, anomaly_date, kind, severity, description, resolved, resolved_by, resolution_text, resolved_at, created_at FROM anomalies";
const LEAVE_COLUMNS: &str = "SELECT id, reference, personnel_id, leave_type_id, date_start, date_end, day_count, reason, status, requester_id, validator_id, validation_date, validation_comment, created_at FROM leave_requests";
const BALANCE_COLUMNS: &str =
    "SELECT personnel_id, year, acquired_days, taken_days, remaining_days FROM leave_balances";

/// Upper bound on rows returned by unpaginated listings.
const LIST_LIMIT: u32 = 500;

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

fn conflict_on_duplicate(e: sqlx::Error, message: impl FnOnce() -> String) -> LedgerError {
    if is_duplicate_key(&e) {
        LedgerError::Conflict(message())
    } else {
        LedgerError::Transaction(e)
    }
}

impl AttendanceStore for MySqlStore {
    async fn find_personnel(&self, id: u64) -> StoreResult<Option<Personnel>> {
        let sql = format!("{PERSONNEL_COLUMNS} WHERE id = ?");
        Ok(sqlx::query_as::<_, Personnel>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn active_personnel(&self) -> StoreResult<Vec<Personnel>> {
        let sql = format!("{PERSONNEL_COLUMNS} WHERE status = 'Active' ORDER BY id");
        Ok(sqlx::query_as::<_, Personnel>(&sql).fetch_all(&self.pool).await?)
    }

    async fn find_device(&self, id: u64) -> StoreResult<Option<Device>> {
        let sql = format!("{DEVICE_COLUMNS} WHERE id = ?");
        Ok(sqlx::query_as::<_, Device>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_devices(&self, active_only: bool) -> StoreResult<Vec<Device>> {
        let filters = FilterSet::new().eq("active", active_only.then_some(true));

        let mut qb = QueryBuilder::<MySql>::new(DEVICE_COLUMNS);
        filters.push_where(&mut qb);
        qb.push(" ORDER BY name, id");

        Ok(qb.build_query_as::<Device>().fetch_all(&self.pool).await?)
    }

    async fn insert_device(&self, device: &NewDevice) -> StoreResult<u64> {
        let result = sqlx::query(
            "INSERT INTO devices (name, model, ip_address, port, active) VALUES (?, ?, ?, ?, TRUE)",
        )
        .bind(&device.name)
        .bind(&device.model)
        .bind(&device.ip_address)
        .bind(device.port)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_id())
    }

    async fn mapping_candidates(&self, external_user_id: &str) -> StoreResult<Vec<DeviceMapping>> {
        let sql = format!("{MAPPING_COLUMNS} WHERE external_user_id = ? AND active = TRUE");
        Ok(sqlx::query_as::<_, DeviceMapping>(&sql)
            .bind(external_user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn active_mapping_for(&self, personnel_id: u64) -> StoreResult<Option<DeviceMapping>> {
        let sql = format!("{MAPPING_COLUMNS} WHERE personnel_id = ? AND active = TRUE");
        Ok(sqlx::query_as::<_, DeviceMapping>(&sql)
            .bind(personnel_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_active_mappings(&self) -> StoreResult<Vec<DeviceMapping>> {
        let sql = format!("{MAPPING_COLUMNS} WHERE active = TRUE ORDER BY personnel_id");
        Ok(sqlx::query_as::<_, DeviceMapping>(&sql).fetch_all(&self.pool).await?)
    }

    async fn insert_mapping(&self, mapping: &NewDeviceMapping, at: NaiveDateTime) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO device_mappings
                (personnel_id, external_user_id, device_id, badge_number, active, created_at)
            VALUES (?, ?, ?, ?, TRUE, ?)
            "#,
        )
        .bind(mapping.personnel_id)
        .bind(&mapping.external_user_id)
        .bind(mapping.device_id)
        .bind(&mapping.badge_number)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            conflict_on_duplicate(e, || {
                format!("External user id {} is already mapped", mapping.external_user_id)
            })
        })?;
        Ok(result.last_insert_id())
    }

    async fn update_mapping(&self, id: u64, mapping: &NewDeviceMapping, at: NaiveDateTime) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE device_mappings
            SET external_user_id = ?, device_id = ?, badge_number = ?, modified_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&mapping.external_user_id)
        .bind(mapping.device_id)
        .bind(&mapping.badge_number)
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            conflict_on_duplicate(e, || {
                format!("External user id {} is already mapped", mapping.external_user_id)
            })
        })?;
        Ok(())
    }

    async fn deactivate_mapping(&self, personnel_id: u64, at: NaiveDateTime) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE device_mappings SET active = FALSE, modified_at = ? WHERE personnel_id = ? AND active = TRUE",
        )
        .bind(at)
        .bind(personnel_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn insert_raw_event(&self, event: &NewRawClockEvent) -> StoreResult<InsertOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO raw_clock_events
                (device_id, external_user_id, resolved_personnel_id, occurred_at, event_type, raw_payload)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.device_id)
        .bind(&event.external_user_id)
        .bind(event.resolved_personnel_id)
        .bind(event.occurred_at)
        .bind(event.event_type.as_ref())
        .bind(&event.raw_payload)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(InsertOutcome::Inserted(done.last_insert_id())),
            Err(e) if is_duplicate_key(&e) => Ok(InsertOutcome::Duplicate),
            Err(e) => Err(e.into()),
        }
    }

    async fn events_for_day(&self, personnel_id: u64, date: NaiveDate) -> StoreResult<Vec<RawClockEvent>> {
        let start = date.and_time(NaiveTime::MIN);
        let end = date
            .succ_opt()
            .map(|d| d.and_time(NaiveTime::MIN))
            .unwrap_or(NaiveDateTime::MAX);
        let sql = format!(
            "{EVENT_COLUMNS} WHERE resolved_personnel_id = ? AND occurred_at >= ? AND occurred_at < ? ORDER BY occurred_at, id"
        );
        Ok(sqlx::query_as::<_, RawClockEvent>(&sql)
            .bind(personnel_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn orphan_events(&self, filter: &OrphanFilter) -> StoreResult<Vec<RawClockEvent>> {
        let filters = FilterSet::new()
            .is_null("resolved_personnel_id")
            .eq("device_id", filter.device_id)
            .eq("external_user_id", filter.external_user_id.clone());

        let mut qb = QueryBuilder::<MySql>::new(EVENT_COLUMNS);
        filters.push_where(&mut qb);
        qb.push(" ORDER BY occurred_at DESC LIMIT ")
            .push_bind(filter.limit.unwrap_or(200).clamp(1, LIST_LIMIT));

        Ok(qb.build_query_as::<RawClockEvent>().fetch_all(&self.pool).await?)
    }

    async fn attach_orphans(
        &self,
        external_user_id: &str,
        device_id: Option<u64>,
        personnel_id: u64,
    ) -> StoreResult<Vec<NaiveDate>> {
        let mut tx = self.pool.begin().await?;

        let mut days = sqlx::query_scalar::<_, NaiveDateTime>(
            r#"
            SELECT occurred_at FROM raw_clock_events
            WHERE resolved_personnel_id IS NULL
              AND external_user_id = ?
              AND (? IS NULL OR device_id = ?)
            FOR UPDATE
            "#,
        )
        .bind(external_user_id)
        .bind(device_id)
        .bind(device_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|at| at.date())
        .collect::<Vec<_>>();
        days.sort_unstable();
        days.dedup();

        sqlx::query(
            r#"
            UPDATE raw_clock_events SET resolved_personnel_id = ?
            WHERE resolved_personnel_id IS NULL
              AND external_user_id = ?
              AND (? IS NULL OR device_id = ?)
            "#,
        )
        .bind(personnel_id)
        .bind(external_user_id)
        .bind(device_id)
        .bind(device_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(days)
    }

    async fn scheduled_start_override(&self, personnel_id: u64, date: NaiveDate) -> StoreResult<Option<NaiveTime>> {
        Ok(sqlx::query_scalar::<_, NaiveTime>(
            "SELECT start_time FROM work_schedules WHERE personnel_id = ? AND work_date = ?",
        )
        .bind(personnel_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_presence(&self, personnel_id: u64, date: NaiveDate) -> StoreResult<Option<DailyPresence>> {
        let sql = format!("{PRESENCE_COLUMNS} WHERE personnel_id = ? AND work_date = ?");
        Ok(sqlx::query_as::<_, DailyPresence>(&sql)
            .bind(personnel_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_presence_by_id(&self, id: u64) -> StoreResult<Option<DailyPresence>> {
        let sql = format!("{PRESENCE_COLUMNS} WHERE id = ?");
        Ok(sqlx::query_as::<_, DailyPresence>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn upsert_presence(&self, personnel_id: u64, date: NaiveDate, figures: &PresenceFigures) -> StoreResult<u64> {
        // Validated rows keep every stored value.
        let result = sqlx::query(
            r#"
            INSERT INTO daily_presence
                (personnel_id, work_date, arrival_time, departure_time, status,
                 lateness_minutes, worked_minutes, overtime_minutes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                id               = LAST_INSERT_ID(id),
                arrival_time     = IF(validated, arrival_time, VALUES(arrival_time)),
                departure_time   = IF(validated, departure_time, VALUES(departure_time)),
                status           = IF(validated, status, VALUES(status)),
                lateness_minutes = IF(validated, lateness_minutes, VALUES(lateness_minutes)),
                worked_minutes   = IF(validated, worked_minutes, VALUES(worked_minutes)),
                overtime_minutes = IF(validated, overtime_minutes, VALUES(overtime_minutes))
            "#,
        )
        .bind(personnel_id)
        .bind(date)
        .bind(figures.arrival_time)
        .bind(figures.departure_time)
        .bind(figures.status.as_ref())
        .bind(figures.lateness_minutes)
        .bind(figures.worked_minutes)
        .bind(figures.overtime_minutes)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_id())
    }

    async fn validate_presence(&self, id: u64, validator_id: u64, at: NaiveDateTime) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE daily_presence SET validated = TRUE, validator_id = ?, validated_at = ? WHERE id = ? AND validated = FALSE",
        )
        .bind(validator_id)
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn presence_between(&self, filter: &PresenceFilter) -> StoreResult<Vec<DailyPresence>> {
        let filters = FilterSet::new()
            .gte("work_date", Some(filter.from))
            .lte("work_date", Some(filter.to))
            .eq("personnel_id", filter.personnel_id);

        let mut qb = QueryBuilder::<MySql>::new(PRESENCE_COLUMNS);
        filters.push_where(&mut qb);
        qb.push(" ORDER BY work_date, personnel_id");

        Ok(qb.build_query_as::<DailyPresence>().fetch_all(&self.pool).await?)
    }

    /// The presence row is locked first, so concurrent recomputations of one day queue
    /// here; the unique key on open rows backs this up.
    async fn queue_discrepancy(
        &self,
        presence: &DailyPresence,
        figures: &PresenceFigures,
        at: NaiveDateTime,
    ) -> StoreResult<Option<u64>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_scalar::<_, u64>("SELECT id FROM daily_presence WHERE id = ? FOR UPDATE")
            .bind(presence.id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("Presence {}", presence.id)))?;

        let sql = format!("{DISCREPANCY_COLUMNS} WHERE presence_id = ? ORDER BY id DESC LIMIT 1");
        let latest = sqlx::query_as::<_, PresenceDiscrepancy>(&sql)
            .bind(presence.id)
            .fetch_optional(&mut *tx)
            .await?;
        if latest.is_some_and(|d| d.figures() == *figures) {
            return Ok(None);
        }

        sqlx::query(
            r#"
            UPDATE presence_discrepancies
            SET resolved = TRUE, resolution = ?, resolved_at = ?
            WHERE presence_id = ? AND resolved = FALSE
            "#,
        )
        .bind(DiscrepancyResolution::Superseded.as_ref())
        .bind(at)
        .bind(presence.id)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            r#"
            INSERT INTO presence_discrepancies
                (presence_id, personnel_id, work_date, arrival_time, departure_time, status,
                 lateness_minutes, worked_minutes, overtime_minutes, detected_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(presence.id)
        .bind(presence.personnel_id)
        .bind(presence.work_date)
        .bind(figures.arrival_time)
        .bind(figures.departure_time)
        .bind(figures.status.as_ref())
        .bind(figures.lateness_minutes)
        .bind(figures.worked_minutes)
        .bind(figures.overtime_minutes)
        .bind(at)
        .execute(&mut *tx)
        .await;

        let id = match result {
            Ok(done) => done.last_insert_id(),
            Err(e) if is_duplicate_key(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        tx.commit().await?;
        Ok(Some(id))
    }

    async fn resolve_discrepancy(
        &self,
        id: u64,
        accept: bool,
        resolved_by: u64,
        at: NaiveDateTime,
    ) -> StoreResult<PresenceDiscrepancy> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("{DISCREPANCY_COLUMNS} WHERE id = ? FOR UPDATE");
        let mut discrepancy = sqlx::query_as::<_, PresenceDiscrepancy>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("Discrepancy {id}")))?;
        if discrepancy.resolved {
            return Err(LedgerError::conflict(format!("Discrepancy {id} is already resolved")));
        }

        if accept {
            sqlx::query(
                r#"
                UPDATE daily_presence
                SET arrival_time = ?, departure_time = ?, status = ?,
                    lateness_minutes = ?, worked_minutes = ?, overtime_minutes = ?,
                    validator_id = ?, validated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(discrepancy.arrival_time)
            .bind(discrepancy.departure_time)
            .bind(discrepancy.status.as_ref())
            .bind(discrepancy.lateness_minutes)
            .bind(discrepancy.worked_minutes)
            .bind(discrepancy.overtime_minutes)
            .bind(resolved_by)
            .bind(at)
            .bind(discrepancy.presence_id)
            .execute(&mut *tx)
            .await?;
        }

        discrepancy.resolved = true;
        discrepancy.resolution = if accept {
            DiscrepancyResolution::Accepted
        } else {
            DiscrepancyResolution::Dismissed
        };
        discrepancy.resolved_by = Some(resolved_by);
        discrepancy.resolved_at = Some(at);

        sqlx::query(
            "UPDATE presence_discrepancies SET resolved = TRUE, resolution = ?, resolved_by = ?, resolved_at = ? WHERE id = ?",
        )
        .bind(discrepancy.resolution.as_ref())
        .bind(resolved_by)
        .bind(at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(discrepancy)
    }

    async fn list_open_discrepancies(&self) -> StoreResult<Vec<PresenceDiscrepancy>> {
        let sql = format!("{DISCREPANCY_COLUMNS} WHERE resolved = FALSE ORDER BY work_date, personnel_id LIMIT ?");
        Ok(sqlx::query_as::<_, PresenceDiscrepancy>(&sql)
            .bind(LIST_LIMIT)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn insert_anomaly(&self, anomaly: &NewAnomaly, at: NaiveDateTime) -> StoreResult<InsertOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO anomalies (personnel_id, anomaly_date, kind, severity, description, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(anomaly.personnel_id)
        .bind(anomaly.anomaly_date)
        .bind(anomaly.kind.as_ref())
        .bind(anomaly.severity.as_ref())
        .bind(&anomaly.description)
        .bind(at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(InsertOutcome::Inserted(done.last_insert_id())),
            Err(e) if is_duplicate_key(&e) => Ok(InsertOutcome::Duplicate),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_anomaly(&self, id: u64) -> StoreResult<Option<Anomaly>> {
        let sql = format!("{ANOMALY_COLUMNS} WHERE id = ?");
        Ok(sqlx::query_as::<_, Anomaly>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn resolve_anomaly(&self, resolution: &AnomalyResolution) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE anomalies
            SET resolved = TRUE, resolved_by = ?, resolution_text = ?, resolved_at = ?
            WHERE id = ? AND resolved = FALSE
            "#,
        )
        .bind(resolution.resolved_by)
        .bind(&resolution.resolution_text)
        .bind(resolution.resolved_at)
        .bind(resolution.anomaly_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn list_anomalies(&self, filter: &AnomalyFilter) -> StoreResult<Vec<Anomaly>> {
        let filters = FilterSet::new()
            .gte("anomaly_date", filter.from)
            .lte("anomaly_date", filter.to)
            .eq("resolved", filter.resolved)
            .eq("kind", filter.kind.map(|k| k.as_ref().to_string()))
            .eq("personnel_id", filter.personnel_id);

        let mut qb = QueryBuilder::<MySql>::new(ANOMALY_COLUMNS);
        filters.push_where(&mut qb);
        qb.push(" ORDER BY anomaly_date DESC, id DESC LIMIT ")
            .push_bind(LIST_LIMIT);

        Ok(qb.build_query_as::<Anomaly>().fetch_all(&self.pool).await?)
    }

    async fn record_sync_log(&self, log: &NewDeviceSyncLog) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO device_sync_logs
                (device_id, status, imported, duplicates, errored, duration_ms, errors, synced_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(log.device_id)
        .bind(log.status.as_ref())
        .bind(log.imported)
        .bind(log.duplicates)
        .bind(log.errored)
        .bind(log.duration_ms)
        .bind(&log.errors)
        .bind(log.synced_at)
        .execute(&mut *tx)
        .await?;

        if log.status != SyncStatus::Failed {
            sqlx::query("UPDATE devices SET last_synced_at = ? WHERE id = ?")
                .bind(log.synced_at)
                .bind(log.device_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(result.last_insert_id())
    }

    async fn sync_logs(&self, device_id: u64, limit: u32) -> StoreResult<Vec<DeviceSyncLog>> {
        Ok(sqlx::query_as::<_, DeviceSyncLog>(
            r#"
            SELECT id, device_id, status, imported, duplicates, errored, duration_ms, errors, synced_at
            FROM device_sync_logs
            WHERE device_id = ?
            ORDER BY synced_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(device_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }
}

impl LeaveStore for MySqlStore {
    async fn list_leave_types(&self) -> StoreResult<Vec<LeaveType>> {
        Ok(sqlx::query_as::<_, LeaveType>(
            "SELECT id, label, category, annual_allotment, active FROM leave_types ORDER BY label",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_leave_type(&self, id: u64) -> StoreResult<Option<LeaveType>> {
        Ok(sqlx::query_as::<_, LeaveType>(
            "SELECT id, label, category, annual_allotment, active FROM leave_types WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_leave_request(&self, request: &NewLeaveRequest, at: NaiveDateTime) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO leave_requests
                (reference, personnel_id, leave_type_id, date_start, date_end, day_count,
                 reason, status, requester_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 'Pending', ?, ?)
            "#,
        )
        .bind(&request.reference)
        .bind(request.personnel_id)
        .bind(request.leave_type_id)
        .bind(request.date_start)
        .bind(request.date_end)
        .bind(request.day_count)
        .bind(&request.reason)
        .bind(request.requester_id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_duplicate(e, || format!("Reference {} already exists", request.reference)))?;
        Ok(result.last_insert_id())
    }

    async fn find_leave_request(&self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        let sql = format!("{LEAVE_COLUMNS} WHERE id = ?");
        Ok(sqlx::query_as::<_, LeaveRequest>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_leave_requests(&self, filter: &LeaveFilter) -> StoreResult<(Vec<LeaveRequest>, i64)> {
        let window = filter.month_window();
        let filters = FilterSet::new()
            .eq("personnel_id", filter.personnel_id)
            .eq("status", filter.status.map(|s| s.as_ref().to_string()))
            .gte("date_start", window.map(|(first, _)| first))
            .lte("date_start", window.map(|(_, last)| last));
        let (_, per_page, offset) = page_bounds(filter.page, filter.per_page);

        // -------------------------
        // COUNT query
        // -------------------------
        let mut count_qb = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM leave_requests");
        filters.push_where(&mut count_qb);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        // -------------------------
        // DATA query
        // -------------------------
        let mut data_qb = QueryBuilder::<MySql>::new(LEAVE_COLUMNS);
        filters.push_where(&mut data_qb);
        data_qb
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(per_page)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = data_qb
            .build_query_as::<LeaveRequest>()
            .fetch_all(&self.pool)
            .await?;

        Ok((rows, total))
    }

    async fn revise_pending_leave(&self, id: u64, revision: &LeaveRevision) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE leave_requests
            SET leave_type_id = ?, date_start = ?, date_end = ?, day_count = ?, reason = ?
            WHERE id = ? AND status = 'Pending'
            "#,
        )
        .bind(revision.leave_type_id)
        .bind(revision.date_start)
        .bind(revision.date_end)
        .bind(revision.day_count)
        .bind(&revision.reason)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn validation_history(&self, leave_request_id: u64) -> StoreResult<Vec<ValidationHistory>> {
        Ok(sqlx::query_as::<_, ValidationHistory>(
            r#"
            SELECT id, leave_request_id, validator_id, action, comment, acted_at
            FROM leave_validation_history
            WHERE leave_request_id = ?
            ORDER BY acted_at, id
            "#,
        )
        .bind(leave_request_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn leave_balance(&self, personnel_id: u64, year: i32) -> StoreResult<Option<LeaveBalance>> {
        let sql = format!("{BALANCE_COLUMNS} WHERE personnel_id = ? AND year = ?");
        Ok(sqlx::query_as::<_, LeaveBalance>(&sql)
            .bind(personnel_id)
            .bind(year)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// The request row and the (personnel, year) balance row are locked for the whole
    /// transaction, so concurrent decisions queue on the row locks and the balance is
    /// computed by [`apply_effect`] from the latest committed value. Dropping `tx` on
    /// any error rolls everything back.
    async fn apply_leave_decision(
        &self,
        decision: &LeaveDecision,
        policy: &LeavePolicy,
    ) -> StoreResult<LeaveDecisionOutcome> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("{LEAVE_COLUMNS} WHERE id = ? FOR UPDATE");
        let request = sqlx::query_as::<_, LeaveRequest>(&sql)
            .bind(decision.request_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("Leave request {}", decision.request_id)))?;
        let leave_type = sqlx::query_as::<_, LeaveType>(
            "SELECT id, label, category, annual_allotment, active FROM leave_types WHERE id = ?",
        )
        .bind(request.leave_type_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Leave type {}", request.leave_type_id)))?;

        let effect = plan_decision(&request, &leave_type, decision.target)?;

        sqlx::query(
            r#"
            UPDATE leave_requests
            SET status = ?, validator_id = ?, validation_date = ?, validation_comment = ?
            WHERE id = ?
            "#,
        )
        .bind(decision.target.as_ref())
        .bind(decision.validator_id)
        .bind(decision.decided_at)
        .bind(&decision.comment)
        .bind(request.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO leave_validation_history (leave_request_id, validator_id, action, comment, acted_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(request.id)
        .bind(decision.validator_id)
        .bind(decision.target.as_ref())
        .bind(&decision.comment)
        .bind(decision.decided_at)
        .execute(&mut *tx)
        .await?;

        let year = request.balance_year();
        let allotment = allotment_for(&leave_type, policy);
        if let BalanceEffect::Deduct(_) = effect {
            // Opening row first, so the lock below always lands on an existing row.
            sqlx::query(
                r#"
                INSERT INTO leave_balances (personnel_id, year, acquired_days, taken_days, remaining_days)
                VALUES (?, ?, ?, 0, ?)
                ON DUPLICATE KEY UPDATE personnel_id = personnel_id
                "#,
            )
            .bind(request.personnel_id)
            .bind(year)
            .bind(allotment)
            .bind(allotment)
            .execute(&mut *tx)
            .await?;
        }

        let sql = format!("{BALANCE_COLUMNS} WHERE personnel_id = ? AND year = ? FOR UPDATE");
        let current = sqlx::query_as::<_, LeaveBalance>(&sql)
            .bind(request.personnel_id)
            .bind(year)
            .fetch_optional(&mut *tx)
            .await?;
        let balance = apply_effect(current, effect, request.personnel_id, year, allotment)?;

        if effect != BalanceEffect::Unchanged {
            if let Some(balance) = balance {
                sqlx::query(
                    "UPDATE leave_balances SET taken_days = ?, remaining_days = ? WHERE personnel_id = ? AND year = ?",
                )
                .bind(balance.taken_days)
                .bind(balance.remaining_days)
                .bind(balance.personnel_id)
                .bind(balance.year)
                .execute(&mut *tx)
                .await?;
            }
        }

        let updated = sqlx::query_as::<_, LeaveRequest>(&format!("{LEAVE_COLUMNS} WHERE id = ?"))
            .bind(request.id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

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
        let filters = FilterSet::new()
            .eq("status", Some("Approved"))
            .lte("date_start", Some(to))
            .gte("date_end", Some(from))
            .eq("personnel_id", personnel_id);

        let mut qb = QueryBuilder::<MySql>::new(LEAVE_COLUMNS);
        filters.push_where(&mut qb);
        qb.push(" ORDER BY date_start, id");

        Ok(qb.build_query_as::<LeaveRequest>().fetch_all(&self.pool).await?)
    }
}
