use std::collections::{BTreeMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::LedgerError;
use crate::ledger::aggregator::{check_window, month_start};
use crate::ledger::policy::AttendancePolicy;
use crate::model::InsertOutcome;
use crate::model::anomaly::{Anomaly, AnomalyKind, AnomalyResolution, NewAnomaly};
use crate::model::leave_request::LeaveRequest;
use crate::model::personnel::Personnel;
use crate::model::presence::{DailyPresence, PresenceStatus};
use crate::store::{AnomalyFilter, AttendanceStore, LeaveStore, PresenceFilter};

pub const IGNORED_RESOLUTION: &str = "Ignored by user";

fn candidate(personnel_id: u64, anomaly_date: NaiveDate, kind: AnomalyKind, description: String) -> NewAnomaly {
    NewAnomaly {
        personnel_id,
        anomaly_date,
        kind,
        severity: kind.severity(),
        description,
    }
}

/// Applies the attendance rules to the window `[from, to]`.
///
/// `presences` must also hold the rows from the start of `from`'s month so lateness
/// can be counted per month. Days from `today` on are never judged. Repeated
/// lateness is dated on the first day of its month.
pub fn evaluate_rules(
    presences: &[DailyPresence],
    expected: &[Personnel],
    approved_leaves: &[LeaveRequest],
    from: NaiveDate,
    to: NaiveDate,
    today: NaiveDate,
    policy: &AttendancePolicy,
) -> Vec<NewAnomaly> {
    let mut found = Vec::new();
    let last = match today.pred_opt() {
        Some(yesterday) => to.min(yesterday),
        None => return found,
    };
    let covered = |personnel_id: u64, date: NaiveDate| {
        approved_leaves
            .iter()
            .any(|l| l.personnel_id == personnel_id && l.covers(date))
    };

    let in_window = |date: NaiveDate| from <= date && date <= last;
    let mut recorded: HashSet<(u64, NaiveDate)> = HashSet::new();
    let mut late_days: BTreeMap<(u64, NaiveDate), u32> = BTreeMap::new();

    for row in presences {
        recorded.insert((row.personnel_id, row.work_date));

        if row.work_date <= last && row.status == PresenceStatus::Present && policy.is_late(row.lateness_minutes) {
            *late_days
                .entry((row.personnel_id, month_start(row.work_date)))
                .or_default() += 1;
        }
        if !in_window(row.work_date) {
            continue;
        }

        match row.status {
            PresenceStatus::Present if row.departure_time.is_none() => {
                let arrival = row
                    .arrival_time
                    .map(|t| t.format("%H:%M").to_string())
                    .unwrap_or_else(|| "unknown time".to_string());
                found.push(candidate(
                    row.personnel_id,
                    row.work_date,
                    AnomalyKind::MissingCheckout,
                    format!("Check-in at {arrival} without check-out"),
                ));
            }
            PresenceStatus::Absent
                if policy.is_working_day(row.work_date) && !covered(row.personnel_id, row.work_date) =>
            {
                found.push(candidate(
                    row.personnel_id,
                    row.work_date,
                    AnomalyKind::UnjustifiedAbsence,
                    "Absent without approved leave".to_string(),
                ));
            }
            _ => {}
        }
    }

    // Expected working days with no presence row at all.
    for person in expected {
        let mut day = from.max(person.hire_date);
        while day <= last {
            if person.is_expected_on(day)
                && policy.is_working_day(day)
                && !recorded.contains(&(person.id, day))
                && !covered(person.id, day)
            {
                found.push(candidate(
                    person.id,
                    day,
                    AnomalyKind::UnjustifiedAbsence,
                    "No attendance recorded and no approved leave".to_string(),
                ));
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
    }

    for ((personnel_id, month), count) in late_days {
        if count >= policy.repeated_lateness_threshold {
            found.push(candidate(
                personnel_id,
                month,
                AnomalyKind::RepeatedLateness,
                format!("{count} late arrivals in {}", month.format("%Y-%m")),
            ));
        }
    }

    found
}

#[derive(Debug, Clone, Deserialize, ToSchema, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ScanWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ScanReport {
    pub evaluated: u32,
    pub created: Vec<Anomaly>,
    pub already_recorded: u32,
    pub errors: Vec<String>,
}

/// Scans the window and stores anomalies not already recorded for their key.
pub async fn scan<S: AttendanceStore + LeaveStore>(
    store: &S,
    policy: &AttendancePolicy,
    window: &ScanWindow,
    today: NaiveDate,
    now: NaiveDateTime,
) -> Result<ScanReport, LedgerError> {
    check_window(window.from, window.to)?;

    let presences = store
        .presence_between(&PresenceFilter {
            from: month_start(window.from),
            to: window.to,
            personnel_id: None,
        })
        .await?;
    let expected = store.active_personnel().await?;
    let leaves = store
        .approved_leaves_between(window.from, window.to, None)
        .await?;

    let candidates = evaluate_rules(&presences, &expected, &leaves, window.from, window.to, today, policy);

    let mut report = ScanReport {
        evaluated: u32::try_from(candidates.len()).unwrap_or(u32::MAX),
        ..Default::default()
    };
    for new_anomaly in candidates {
        match record(store, &new_anomaly, now).await {
            Ok(Some(anomaly)) => report.created.push(anomaly),
            Ok(None) => report.already_recorded += 1,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    personnel_id = new_anomaly.personnel_id,
                    date = %new_anomaly.anomaly_date,
                    kind = %new_anomaly.kind,
                    "Failed to record anomaly"
                );
                report.errors.push(format!(
                    "{} for personnel {} on {}: {e}",
                    new_anomaly.kind, new_anomaly.personnel_id, new_anomaly.anomaly_date
                ));
            }
        }
    }

    tracing::info!(
        from = %window.from,
        to = %window.to,
        created = report.created.len(),
        already_recorded = report.already_recorded,
        "Anomaly scan finished"
    );
    Ok(report)
}

async fn record<S: AttendanceStore>(
    store: &S,
    new_anomaly: &NewAnomaly,
    now: NaiveDateTime,
) -> Result<Option<Anomaly>, LedgerError> {
    match store.insert_anomaly(new_anomaly, now).await? {
        InsertOutcome::Inserted(id) => store.find_anomaly(id).await,
        InsertOutcome::Duplicate => Ok(None),
    }
}

pub async fn list<S: AttendanceStore>(store: &S, filter: &AnomalyFilter) -> Result<Vec<Anomaly>, LedgerError> {
    if let (Some(from), Some(to)) = (filter.from, filter.to) {
        check_window(from, to)?;
    }
    store.list_anomalies(filter).await
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({ "action": "Justified", "comment": "Medical certificate received" }))]
pub struct ResolveAnomaly {
    pub action: String,
    pub comment: Option<String>,
}

pub fn resolution_text(action: &str, comment: Option<&str>) -> Result<String, LedgerError> {
    let action = action.trim();
    if action.is_empty() {
        return Err(LedgerError::validation("action is required"));
    }
    Ok(match comment.map(str::trim).filter(|c| !c.is_empty()) {
        Some(comment) => format!("{action}: {comment}"),
        None => action.to_string(),
    })
}

pub async fn resolve<S: AttendanceStore>(
    store: &S,
    anomaly_id: u64,
    resolved_by: u64,
    input: &ResolveAnomaly,
    at: NaiveDateTime,
) -> Result<Anomaly, LedgerError> {
    let text = resolution_text(&input.action, input.comment.as_deref())?;
    close(store, anomaly_id, resolved_by, text, at).await
}

pub async fn ignore<S: AttendanceStore>(
    store: &S,
    anomaly_id: u64,
    resolved_by: u64,
    at: NaiveDateTime,
) -> Result<Anomaly, LedgerError> {
    close(store, anomaly_id, resolved_by, IGNORED_RESOLUTION.to_string(), at).await
}

async fn close<S: AttendanceStore>(
    store: &S,
    anomaly_id: u64,
    resolved_by: u64,
    resolution_text: String,
    at: NaiveDateTime,
) -> Result<Anomaly, LedgerError> {
    let anomaly = store
        .find_anomaly(anomaly_id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Anomaly {anomaly_id}")))?;
    let resolution = AnomalyResolution {
        anomaly_id,
        resolved_by,
        resolution_text,
        resolved_at: at,
    };
    if anomaly.resolved || store.resolve_anomaly(&resolution).await? == 0 {
        return Err(LedgerError::conflict(format!("Anomaly {anomaly_id} is already resolved")));
    }

    tracing::info!(anomaly_id, resolved_by, kind = %anomaly.kind, "Anomaly resolved");
    store
        .find_anomaly(anomaly_id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Anomaly {anomaly_id}")))
}
