use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::LedgerError;
use crate::ledger::aggregator;
use crate::ledger::mapping;
use crate::ledger::policy::AttendancePolicy;
use crate::ledger::terminal::{TerminalDriver, VendorClockEvent};
use crate::model::InsertOutcome;
use crate::model::clock_event::{ClockEventType, NewRawClockEvent};
use crate::model::device::{Device, DeviceSyncLog, NewDeviceSyncLog, SyncStatus};
use crate::store::{AttendanceStore, LeaveStore};

/// Error lines kept in a sync log.
const MAX_LOGGED_ERRORS: usize = 20;

pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, LedgerError> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|t| t.with_timezone(&Local).naive_local()))
        .map_err(|_| LedgerError::validation(format!("malformed timestamp {raw:?}")))
}

fn to_raw_event(device_id: u64, event: &VendorClockEvent) -> Result<NewRawClockEvent, LedgerError> {
    let external_user_id = event.emp_code.trim();
    if external_user_id.is_empty() {
        return Err(LedgerError::validation("emp_code is required"));
    }
    let occurred_at = parse_timestamp(&event.punch_time)?;
    let state = event
        .punch_state
        .as_deref()
        .ok_or_else(|| LedgerError::validation("punch_state is required"))?;
    let event_type = ClockEventType::from_vendor(state)
        .ok_or_else(|| LedgerError::validation(format!("unknown punch_state {state:?}")))?;

    Ok(NewRawClockEvent {
        device_id,
        external_user_id: external_user_id.to_string(),
        resolved_personnel_id: None,
        occurred_at,
        event_type,
        raw_payload: serde_json::to_string(event).ok(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ImportItemError {
    /// Position of the event in the submitted batch
    pub index: usize,
    pub external_user_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct ImportReport {
    pub device_id: u64,
    pub received: u32,
    pub imported: u32,
    pub duplicates: u32,
    pub errored: u32,
    /// Imported events no mapping could attribute
    pub unresolved: u32,
    pub errors: Vec<ImportItemError>,
    pub aggregated_days: u32,
    pub aggregation_errors: Vec<String>,
}

impl ImportReport {
    pub fn status(&self) -> SyncStatus {
        if self.errored == 0 {
            SyncStatus::Success
        } else if self.imported + self.duplicates > 0 {
            SyncStatus::Partial
        } else {
            SyncStatus::Failed
        }
    }
}

/// Stores a batch for one device, then aggregates each touched personnel day once.
///
/// Every event is inserted on its own; one bad event never aborts the batch.
pub async fn import_batch<S: AttendanceStore + LeaveStore>(
    store: &S,
    policy: &AttendancePolicy,
    device_id: u64,
    events: &[VendorClockEvent],
) -> Result<ImportReport, LedgerError> {
    let mut report = ImportReport {
        device_id,
        received: u32::try_from(events.len()).unwrap_or(u32::MAX),
        ..Default::default()
    };
    let mut touched: BTreeSet<(u64, NaiveDate)> = BTreeSet::new();

    for (index, event) in events.iter().enumerate() {
        match import_one(store, device_id, event).await {
            Ok(Some((personnel_id, date))) => {
                report.imported += 1;
                match personnel_id {
                    Some(personnel_id) => {
                        touched.insert((personnel_id, date));
                    }
                    None => report.unresolved += 1,
                }
            }
            Ok(None) => report.duplicates += 1,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    device_id,
                    index,
                    external_user_id = %event.emp_code,
                    "Clock event rejected"
                );
                report.errored += 1;
                report.errors.push(ImportItemError {
                    index,
                    external_user_id: event.emp_code.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    for (personnel_id, date) in touched {
        match aggregator::aggregate_day(store, policy, personnel_id, date).await {
            Ok(_) => report.aggregated_days += 1,
            Err(e) => report
                .aggregation_errors
                .push(format!("personnel {personnel_id} on {date}: {e}")),
        }
    }

    tracing::info!(
        device_id,
        received = report.received,
        imported = report.imported,
        duplicates = report.duplicates,
        errored = report.errored,
        unresolved = report.unresolved,
        "Clock event batch imported"
    );
    Ok(report)
}

/// `Some((personnel, date))` when stored, `None` for a duplicate.
async fn import_one<S: AttendanceStore>(
    store: &S,
    device_id: u64,
    event: &VendorClockEvent,
) -> Result<Option<(Option<u64>, NaiveDate)>, LedgerError> {
    let mut raw = to_raw_event(device_id, event)?;
    raw.resolved_personnel_id = mapping::resolve(store, device_id, &raw.external_user_id).await?;

    match store.insert_raw_event(&raw).await? {
        InsertOutcome::Inserted(_) => Ok(Some((raw.resolved_personnel_id, raw.occurred_at.date()))),
        InsertOutcome::Duplicate => Ok(None),
    }
}

async fn active_device<S: AttendanceStore>(store: &S, device_id: u64) -> Result<Device, LedgerError> {
    let device = store
        .find_device(device_id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Device {device_id}")))?;
    if !device.active {
        return Err(LedgerError::conflict(format!("Device {} is inactive", device.name)));
    }
    Ok(device)
}

async fn write_log<S: AttendanceStore>(
    store: &S,
    device_id: u64,
    status: SyncStatus,
    report: Option<&ImportReport>,
    errors: Vec<String>,
    started: Instant,
) {
    let log = NewDeviceSyncLog {
        device_id,
        status,
        imported: report.map_or(0, |r| i32::try_from(r.imported).unwrap_or(i32::MAX)),
        duplicates: report.map_or(0, |r| i32::try_from(r.duplicates).unwrap_or(i32::MAX)),
        errored: report.map_or(0, |r| i32::try_from(r.errored).unwrap_or(i32::MAX)),
        duration_ms: i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX),
        errors: (!errors.is_empty()).then(|| {
            errors
                .into_iter()
                .take(MAX_LOGGED_ERRORS)
                .collect::<Vec<_>>()
                .join("\n")
        }),
        synced_at: Local::now().naive_local(),
    };
    if let Err(e) = store.record_sync_log(&log).await {
        tracing::error!(error = %e, device_id, "Failed to write device sync log");
    }
}

fn report_errors(report: &ImportReport) -> Vec<String> {
    report
        .errors
        .iter()
        .map(|e| format!("#{} ({}): {}", e.index, e.external_user_id, e.message))
        .collect()
}

/// Batch pushed by a terminal bridge.
pub async fn receive_batch<S: AttendanceStore + LeaveStore>(
    store: &S,
    policy: &AttendancePolicy,
    device_id: u64,
    events: &[VendorClockEvent],
) -> Result<ImportReport, LedgerError> {
    let started = Instant::now();
    active_device(store, device_id).await?;

    let report = import_batch(store, policy, device_id, events).await?;
    write_log(store, device_id, report.status(), Some(&report), report_errors(&report), started).await;
    Ok(report)
}

/// Pulls and imports everything the terminal has, bounded by `timeout`.
///
/// An unreachable terminal aborts the run before anything is written and is logged as Failed.
pub async fn sync_device<S, D>(
    store: &S,
    driver: &D,
    policy: &AttendancePolicy,
    device_id: u64,
    timeout: Duration,
) -> Result<ImportReport, LedgerError>
where
    S: AttendanceStore + LeaveStore,
    D: TerminalDriver,
{
    let started = Instant::now();
    let device = active_device(store, device_id).await?;

    let fetched = match actix_web::rt::time::timeout(timeout, driver.fetch_events(&device)).await {
        Ok(fetched) => fetched,
        Err(_) => Err(LedgerError::DeviceUnreachable(format!(
            "device {} did not answer within {}s",
            device.id,
            timeout.as_secs()
        ))),
    };
    let events = match fetched {
        Ok(events) => events,
        Err(e) => {
            tracing::error!(error = %e, device_id, "Device sync aborted");
            write_log(store, device_id, SyncStatus::Failed, None, vec![e.to_string()], started).await;
            return Err(e);
        }
    };

    let report = import_batch(store, policy, device_id, &events).await?;
    write_log(store, device_id, report.status(), Some(&report), report_errors(&report), started).await;
    Ok(report)
}

pub async fn sync_history<S: AttendanceStore>(
    store: &S,
    device_id: u64,
    limit: Option<u32>,
) -> Result<Vec<DeviceSyncLog>, LedgerError> {
    store
        .find_device(device_id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Device {device_id}")))?;
    store
        .sync_logs(device_id, limit.unwrap_or(20).clamp(1, 200))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::device::DeviceMapping;
    use crate::model::personnel::{Personnel, PersonnelStatus};
    use crate::store::memory::MemoryStore;

    fn vendor(code: &str, at: &str, state: &str) -> VendorClockEvent {
        VendorClockEvent {
            emp_code: code.into(),
            punch_time: at.into(),
            punch_state: Some(state.into()),
            terminal_sn: None,
        }
    }

    fn store() -> MemoryStore {
        let store = MemoryStore::default();
        store.add_personnel(Personnel {
            id: 7,
            employee_code: "LAB-007".into(),
            first_name: "Amina".into(),
            last_name: "Benali".into(),
            email: None,
            phone: None,
            hire_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            status: PersonnelStatus::Active,
        });
        store.add_device(Device {
            id: 1,
            name: "Entrance".into(),
            model: None,
            ip_address: Some("10.0.0.20".into()),
            port: Some(80),
            active: true,
            last_synced_at: None,
        });
        store.add_mapping(DeviceMapping {
            id: 1,
            personnel_id: 7,
            external_user_id: "42".into(),
            device_id: None,
            badge_number: None,
            active: true,
            created_at: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
            modified_at: None,
        });
        store
    }

    fn batch() -> Vec<VendorClockEvent> {
        vec![
            vendor("42", "2024-03-04 08:15:00", "0"),
            vendor("42", "2024-03-04T17:00:00", "1"),
            vendor("77", "2024-03-04 09:00:00", "in"),
            vendor("42", "04/03/2024 18:00", "1"),
        ]
    }

    struct FixedDriver(Vec<VendorClockEvent>);

    impl TerminalDriver for FixedDriver {
        async fn fetch_events(&self, _device: &Device) -> Result<Vec<VendorClockEvent>, LedgerError> {
            Ok(self.0.clone())
        }
    }

    struct SilentDriver;

    impl TerminalDriver for SilentDriver {
        async fn fetch_events(&self, _device: &Device) -> Result<Vec<VendorClockEvent>, LedgerError> {
            actix_web::rt::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    #[test]
    fn timestamps_accept_the_usual_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap().and_hms_opt(8, 15, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-04 08:15:00").unwrap(), expected);
        assert_eq!(parse_timestamp(" 2024-03-04T08:15:00 ").unwrap(), expected);
        assert!(parse_timestamp("2024-03-04T08:15:00+01:00").is_ok());
        assert!(matches!(parse_timestamp("yesterday"), Err(LedgerError::Validation(_))));
    }

    #[test]
    fn unknown_punch_state_is_a_validation_error() {
        let err = to_raw_event(1, &vendor("42", "2024-03-04 08:15:00", "5")).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        let mut missing = vendor("42", "2024-03-04 08:15:00", "0");
        missing.punch_state = None;
        assert!(to_raw_event(1, &missing).is_err());
    }

    #[actix_web::test]
    async fn bad_events_are_counted_without_aborting_the_batch() {
        let store = store();
        let report = import_batch(&store, &AttendancePolicy::default(), 1, &batch()).await.unwrap();

        assert_eq!(report.received, 4);
        assert_eq!(report.imported, 3);
        assert_eq!(report.unresolved, 1);
        assert_eq!(report.errored, 1);
        assert_eq!(report.errors[0].index, 3);
        assert_eq!(report.aggregated_days, 1);
        assert_eq!(report.status(), SyncStatus::Partial);

        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let presence = store.find_presence(7, day).await.unwrap().unwrap();
        assert_eq!((presence.lateness_minutes, presence.worked_minutes), (15, 525));
    }

    #[actix_web::test]
    async fn importing_twice_changes_nothing() {
        let store = store();
        let policy = AttendancePolicy::default();
        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();

        import_batch(&store, &policy, 1, &batch()).await.unwrap();
        let events_after_first = store.raw_event_count();
        let presence_after_first = store.find_presence(7, day).await.unwrap();

        let second = import_batch(&store, &policy, 1, &batch()).await.unwrap();
        assert_eq!(second.imported, 0);
        assert_eq!(second.duplicates, 3);
        assert_eq!(store.raw_event_count(), events_after_first);
        assert_eq!(store.find_presence(7, day).await.unwrap(), presence_after_first);
    }

    #[actix_web::test]
    async fn pull_sync_imports_and_logs() {
        let store = store();
        let driver = FixedDriver(batch()[..2].to_vec());

        let report = sync_device(&store, &driver, &AttendancePolicy::default(), 1, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(report.imported, 2);
        let logs = sync_history(&store, 1, None).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, SyncStatus::Success);
        assert_eq!(logs[0].imported, 2);
    }

    #[actix_web::test]
    async fn silent_terminal_times_out() {
        let store = store();

        let err = sync_device(&store, &SilentDriver, &AttendancePolicy::default(), 1, Duration::from_millis(20))
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::DeviceUnreachable(_)));
        assert_eq!(store.raw_event_count(), 0);
        let logs = sync_history(&store, 1, None).await.unwrap();
        assert_eq!(logs[0].status, SyncStatus::Failed);
    }

    #[actix_web::test]
    async fn unknown_device_is_refused() {
        let store = store();
        let err = receive_batch(&store, &AttendancePolicy::default(), 9, &batch()).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }
}
