use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::LedgerError;
use crate::ledger::policy::AttendancePolicy;
use crate::model::clock_event::{ClockEventType, RawClockEvent};
use crate::model::presence::{
    DailyPresence, PresenceDiscrepancy, PresenceFigures, PresenceStats, PresenceStatus,
};
use crate::store::{AttendanceStore, LeaveStore, PresenceFilter};

/// Longest window accepted by a single recompute call.
const MAX_RECOMPUTE_DAYS: i64 = 366;

/// Folds one day of events into presence figures.
///
/// Arrival is the earliest check-in, departure the latest check-out at or after it.
/// A check-in without check-out leaves the day open as Present with no departure.
pub fn compute_presence(
    events: &[RawClockEvent],
    scheduled_start: NaiveTime,
    on_leave: bool,
    policy: &AttendancePolicy,
) -> PresenceFigures {
    if on_leave {
        return PresenceFigures {
            arrival_time: None,
            departure_time: None,
            status: PresenceStatus::OnLeave,
            lateness_minutes: 0,
            worked_minutes: 0,
            overtime_minutes: 0,
        };
    }

    let arrival = events
        .iter()
        .filter(|e| e.event_type == ClockEventType::CheckIn)
        .map(|e| e.occurred_at)
        .min();
    let departure = arrival.and_then(|arrival| {
        events
            .iter()
            .filter(|e| e.event_type == ClockEventType::CheckOut && e.occurred_at >= arrival)
            .map(|e| e.occurred_at)
            .max()
    });

    let Some(arrival) = arrival else {
        return PresenceFigures {
            arrival_time: None,
            departure_time: None,
            status: PresenceStatus::Absent,
            lateness_minutes: 0,
            worked_minutes: 0,
            overtime_minutes: 0,
        };
    };

    let lateness = minutes_between(arrival.date().and_time(scheduled_start), arrival).max(0);
    let worked = departure.map_or(0, |d| minutes_between(arrival, d).max(0));
    let overtime = if departure.is_some() {
        (worked - policy.standard_workday_minutes).max(0)
    } else {
        0
    };

    PresenceFigures {
        arrival_time: Some(arrival.time()),
        departure_time: departure.map(|d| d.time()),
        status: PresenceStatus::Present,
        lateness_minutes: lateness,
        worked_minutes: worked,
        overtime_minutes: overtime,
    }
}

fn minutes_between(from: NaiveDateTime, to: NaiveDateTime) -> i32 {
    i32::try_from((to - from).num_minutes()).unwrap_or(i32::MAX)
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub enum AggregationOutcome {
    /// The row was written with the recomputed figures.
    Applied(DailyPresence),
    /// The row is validated and kept; a differing recomputation is queued as a discrepancy.
    Frozen {
        presence: DailyPresence,
        discrepancy_id: Option<u64>,
    },
}

impl AggregationOutcome {
    #[cfg(test)]
    pub fn presence(&self) -> &DailyPresence {
        match self {
            AggregationOutcome::Applied(presence) => presence,
            AggregationOutcome::Frozen { presence, .. } => presence,
        }
    }
}

/// (Re)computes the presence row of one personnel for one date.
pub async fn aggregate_day<S: AttendanceStore + LeaveStore>(
    store: &S,
    policy: &AttendancePolicy,
    personnel_id: u64,
    date: NaiveDate,
) -> Result<AggregationOutcome, LedgerError> {
    let existing = store.find_presence(personnel_id, date).await?;
    let events = store.events_for_day(personnel_id, date).await?;
    let on_leave = !store
        .approved_leaves_between(date, date, Some(personnel_id))
        .await?
        .is_empty();
    let scheduled_start = store
        .scheduled_start_override(personnel_id, date)
        .await?
        .unwrap_or(policy.scheduled_start);

    let figures = compute_presence(&events, scheduled_start, on_leave, policy);

    if let Some(existing) = existing.filter(|p| p.validated) {
        let discrepancy_id = queue_discrepancy(store, &existing, &figures).await?;
        return Ok(AggregationOutcome::Frozen {
            presence: existing,
            discrepancy_id,
        });
    }

    store.upsert_presence(personnel_id, date, &figures).await?;
    let presence = store
        .find_presence(personnel_id, date)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Presence of {personnel_id} on {date}")))?;

    tracing::debug!(
        personnel_id,
        date = %date,
        status = %presence.status,
        lateness = presence.lateness_minutes,
        worked = presence.worked_minutes,
        "Presence aggregated"
    );
    Ok(AggregationOutcome::Applied(presence))
}

async fn queue_discrepancy<S: AttendanceStore>(
    store: &S,
    validated: &DailyPresence,
    figures: &PresenceFigures,
) -> Result<Option<u64>, LedgerError> {
    if validated.figures() == *figures {
        return Ok(None);
    }

    let detected_at = chrono::Local::now().naive_local();
    let Some(id) = store.queue_discrepancy(validated, figures, detected_at).await? else {
        return Ok(None);
    };
    tracing::warn!(
        presence_id = validated.id,
        personnel_id = validated.personnel_id,
        date = %validated.work_date,
        discrepancy_id = id,
        "Validated presence differs from recomputation; discrepancy queued"
    );
    Ok(Some(id))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct RecomputeReport {
    pub applied: u32,
    pub frozen: u32,
    pub discrepancies: u32,
    pub errors: Vec<String>,
}

/// Recomputes every expected day in the window, up to `today`.
///
/// Non-working days are only recomputed when events exist for them.
pub async fn recompute_range<S: AttendanceStore + LeaveStore>(
    store: &S,
    policy: &AttendancePolicy,
    filter: &PresenceFilter,
    today: NaiveDate,
) -> Result<RecomputeReport, LedgerError> {
    check_window(filter.from, filter.to)?;
    if (filter.to - filter.from).num_days() >= MAX_RECOMPUTE_DAYS {
        return Err(LedgerError::validation(format!(
            "recompute window is limited to {MAX_RECOMPUTE_DAYS} days"
        )));
    }

    let personnel = match filter.personnel_id {
        Some(id) => vec![
            store
                .find_personnel(id)
                .await?
                .ok_or_else(|| LedgerError::not_found(format!("Personnel {id}")))?,
        ],
        None => store.active_personnel().await?,
    };

    let mut report = RecomputeReport::default();
    let last = filter.to.min(today);
    for person in &personnel {
        let mut day = filter.from.max(person.hire_date);
        while day <= last {
            let wanted = policy.is_working_day(day)
                || !store.events_for_day(person.id, day).await?.is_empty();
            if wanted {
                match aggregate_day(store, policy, person.id, day).await {
                    Ok(AggregationOutcome::Applied(_)) => report.applied += 1,
                    Ok(AggregationOutcome::Frozen { discrepancy_id, .. }) => {
                        report.frozen += 1;
                        if discrepancy_id.is_some() {
                            report.discrepancies += 1;
                        }
                    }
                    Err(e) => report.errors.push(format!("personnel {} on {day}: {e}", person.id)),
                }
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
    }

    tracing::info!(
        from = %filter.from,
        to = %last,
        applied = report.applied,
        frozen = report.frozen,
        errors = report.errors.len(),
        "Presence recompute finished"
    );
    Ok(report)
}

pub fn check_window(from: NaiveDate, to: NaiveDate) -> Result<(), LedgerError> {
    if from > to {
        return Err(LedgerError::validation("from cannot be after to"));
    }
    Ok(())
}

pub async fn list<S: AttendanceStore>(
    store: &S,
    filter: &PresenceFilter,
) -> Result<Vec<DailyPresence>, LedgerError> {
    check_window(filter.from, filter.to)?;
    store.presence_between(filter).await
}

pub async fn open_discrepancies<S: AttendanceStore>(
    store: &S,
) -> Result<Vec<PresenceDiscrepancy>, LedgerError> {
    store.list_open_discrepancies().await
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({ "accept": true }))]
pub struct DiscrepancyDecision {
    /// `true` copies the recomputed figures onto the validated row, `false` keeps the row as is
    pub accept: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DiscrepancyOutcome {
    pub discrepancy: PresenceDiscrepancy,
    /// The presence row after the decision
    pub presence: DailyPresence,
}

/// Supervisor decision on a queued discrepancy.
pub async fn resolve_discrepancy<S: AttendanceStore>(
    store: &S,
    discrepancy_id: u64,
    decision: &DiscrepancyDecision,
    resolved_by: u64,
    at: NaiveDateTime,
) -> Result<DiscrepancyOutcome, LedgerError> {
    let discrepancy = store
        .resolve_discrepancy(discrepancy_id, decision.accept, resolved_by, at)
        .await?;
    let presence = store
        .find_presence_by_id(discrepancy.presence_id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Presence {}", discrepancy.presence_id)))?;

    tracing::info!(
        discrepancy_id,
        presence_id = presence.id,
        resolved_by,
        resolution = %discrepancy.resolution,
        "Presence discrepancy resolved"
    );
    Ok(DiscrepancyOutcome { discrepancy, presence })
}

/// Supervisor sign-off; a validated row is no longer overwritten by aggregation.
pub async fn validate<S: AttendanceStore>(
    store: &S,
    presence_id: u64,
    validator_id: u64,
    at: NaiveDateTime,
) -> Result<DailyPresence, LedgerError> {
    let presence = store
        .find_presence_by_id(presence_id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Presence {presence_id}")))?;
    if presence.validated || store.validate_presence(presence_id, validator_id, at).await? == 0 {
        return Err(LedgerError::conflict(format!(
            "Presence {presence_id} is already validated"
        )));
    }

    tracing::info!(presence_id, validator_id, "Presence validated");
    store
        .find_presence_by_id(presence_id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Presence {presence_id}")))
}

#[derive(Debug, Clone, Deserialize, ToSchema, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatsQuery {
    pub personnel_id: u64,
    pub year: i32,
    /// 1-12
    pub month: u32,
}

pub fn summarize(rows: &[DailyPresence], policy: &AttendancePolicy) -> PresenceStats {
    let mut stats = PresenceStats::default();
    for row in rows {
        stats.days_recorded += 1;
        match row.status {
            PresenceStatus::Present => stats.days_present += 1,
            PresenceStatus::Absent => stats.days_absent += 1,
            PresenceStatus::OnLeave => stats.days_on_leave += 1,
        }
        if row.status == PresenceStatus::Present && policy.is_late(row.lateness_minutes) {
            stats.late_days += 1;
        }
        stats.total_lateness_minutes += i64::from(row.lateness_minutes);
        stats.total_worked_minutes += i64::from(row.worked_minutes);
        stats.total_overtime_minutes += i64::from(row.overtime_minutes);
    }
    if stats.days_present > 0 {
        stats.average_worked_minutes =
            stats.total_worked_minutes as f64 / f64::from(stats.days_present);
    }
    if stats.days_recorded > 0 {
        stats.presence_rate =
            f64::from(stats.days_present) * 100.0 / f64::from(stats.days_recorded);
    }
    stats
}

pub async fn monthly_stats<S: AttendanceStore>(
    store: &S,
    policy: &AttendancePolicy,
    query: &StatsQuery,
) -> Result<PresenceStats, LedgerError> {
    let (from, to) = month_bounds(query.year, query.month)
        .ok_or_else(|| LedgerError::validation("month must be between 1 and 12"))?;
    let rows = store
        .presence_between(&PresenceFilter {
            from,
            to,
            personnel_id: Some(query.personnel_id),
        })
        .await?;
    Ok(summarize(&rows, policy))
}

pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}
