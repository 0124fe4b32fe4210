use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::ledger::aggregator;
use crate::ledger::policy::{AttendancePolicy, LeavePolicy};
use crate::model::leave_request::{
    LeaveBalance, LeaveRequest, LeaveStatus, LeaveType, NewLeaveRequest, ValidationHistory,
};
use crate::store::{AttendanceStore, LeaveFilter, LeaveStore};

/* =========================
Decision planning
========================= */

/// A requested status transition on a leave request.
#[derive(Debug, Clone)]
pub struct LeaveDecision {
    pub request_id: u64,
    pub target: LeaveStatus,
    pub validator_id: u64,
    pub comment: Option<String>,
    pub decided_at: NaiveDateTime,
}

/// What a transition does to the yearly balance of the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub enum BalanceEffect {
    Unchanged,
    Deduct(i32),
    Restore(i32),
}

/// Checks a transition against the state machine and derives its balance effect.
pub fn plan_decision(
    request: &LeaveRequest,
    leave_type: &LeaveType,
    target: LeaveStatus,
) -> Result<BalanceEffect, LedgerError> {
    if !request.status.can_transition_to(target) {
        return Err(LedgerError::conflict(format!(
            "Leave request {} is {} and cannot become {}",
            request.reference, request.status, target
        )));
    }
    if request.day_count <= 0 {
        return Err(LedgerError::validation("day_count must be a positive integer"));
    }
    if !leave_type.deducts_balance() {
        return Ok(BalanceEffect::Unchanged);
    }

    Ok(match (request.status, target) {
        (LeaveStatus::Pending, LeaveStatus::Approved) => BalanceEffect::Deduct(request.day_count),
        (LeaveStatus::Approved, LeaveStatus::Rejected) => BalanceEffect::Restore(request.day_count),
        _ => BalanceEffect::Unchanged,
    })
}

/// Acquired days for a balance row opened by the first approval of the year.
pub fn allotment_for(leave_type: &LeaveType, policy: &LeavePolicy) -> i32 {
    leave_type
        .annual_allotment
        .unwrap_or(policy.default_allotment)
}

/// Applies `effect` to an existing balance, or opens one for a deduction.
///
/// A restore without a balance row means the ledger is inconsistent and is refused.
pub fn apply_effect(
    current: Option<LeaveBalance>,
    effect: BalanceEffect,
    personnel_id: u64,
    year: i32,
    allotment: i32,
) -> Result<Option<LeaveBalance>, LedgerError> {
    match (effect, current) {
        (BalanceEffect::Unchanged, current) => Ok(current),
        (BalanceEffect::Deduct(days), current) => {
            let mut balance =
                current.unwrap_or_else(|| LeaveBalance::opening(personnel_id, year, allotment));
            balance.deduct(days);
            Ok(Some(balance))
        }
        (BalanceEffect::Restore(days), Some(mut balance)) => {
            balance.restore(days);
            Ok(Some(balance))
        }
        (BalanceEffect::Restore(_), None) => Err(LedgerError::conflict(format!(
            "No leave balance for personnel {personnel_id} in {year} to restore"
        ))),
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaveDecisionOutcome {
    pub request: LeaveRequest,
    pub previous_status: LeaveStatus,
    pub effect: BalanceEffect,
    /// Balance of the request year after the transition, when one exists.
    pub balance: Option<LeaveBalance>,
}

/* =========================
Submission and revision
========================= */

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({
    "personnel_id": 7,
    "leave_type_id": 1,
    "date_start": "2024-03-10",
    "date_end": "2024-03-12",
    "day_count": 3,
    "reason": "Family visit"
}))]
pub struct LeaveSubmission {
    pub personnel_id: u64,
    pub leave_type_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date_start: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub date_end: NaiveDate,
    pub day_count: i32,
    pub reason: Option<String>,
}

/// New values for a request that has not been decided yet.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LeaveRevision {
    pub leave_type_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date_start: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub date_end: NaiveDate,
    pub day_count: i32,
    pub reason: Option<String>,
}

fn check_period(date_start: NaiveDate, date_end: NaiveDate, day_count: i32) -> Result<(), LedgerError> {
    if date_start > date_end {
        return Err(LedgerError::validation("date_start cannot be after date_end"));
    }
    if day_count <= 0 {
        return Err(LedgerError::validation("day_count must be a positive integer"));
    }
    let span = (date_end - date_start).num_days() + 1;
    if i64::from(day_count) > span {
        return Err(LedgerError::validation(format!(
            "day_count {day_count} exceeds the {span} calendar days requested"
        )));
    }
    Ok(())
}

fn clean_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

async fn active_leave_type<S: LeaveStore>(store: &S, id: u64) -> Result<LeaveType, LedgerError> {
    let leave_type = store
        .find_leave_type(id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Leave type {id}")))?;
    if !leave_type.active {
        return Err(LedgerError::validation(format!(
            "Leave type {} is no longer offered",
            leave_type.label
        )));
    }
    Ok(leave_type)
}

/// `ABS-<yyyymmddHHMMSS>-<8 hex>`
pub fn new_reference(at: NaiveDateTime) -> String {
    let suffix: String = Uuid::new_v4()
        .to_string()
        .chars()
        .filter(|c| *c != '-')
        .take(8)
        .collect();
    format!("ABS-{}-{}", at.format("%Y%m%d%H%M%S"), suffix)
}

pub async fn submit<S: AttendanceStore + LeaveStore>(
    store: &S,
    submission: &LeaveSubmission,
    requester_id: u64,
    now: NaiveDateTime,
) -> Result<LeaveRequest, LedgerError> {
    check_period(submission.date_start, submission.date_end, submission.day_count)?;

    store
        .find_personnel(submission.personnel_id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Personnel {}", submission.personnel_id)))?;
    active_leave_type(store, submission.leave_type_id).await?;

    let new_request = NewLeaveRequest {
        reference: new_reference(now),
        personnel_id: submission.personnel_id,
        leave_type_id: submission.leave_type_id,
        date_start: submission.date_start,
        date_end: submission.date_end,
        day_count: submission.day_count,
        reason: clean_text(submission.reason.as_deref()),
        requester_id,
    };
    let id = store.insert_leave_request(&new_request, now).await?;

    tracing::info!(
        leave_request_id = id,
        reference = %new_request.reference,
        personnel_id = new_request.personnel_id,
        "Leave request submitted"
    );

    store
        .find_leave_request(id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Leave request {id}")))
}

pub async fn revise<S: LeaveStore>(
    store: &S,
    id: u64,
    revision: &LeaveRevision,
) -> Result<LeaveRequest, LedgerError> {
    check_period(revision.date_start, revision.date_end, revision.day_count)?;

    let current = store
        .find_leave_request(id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Leave request {id}")))?;
    if current.status != LeaveStatus::Pending {
        return Err(LedgerError::conflict(format!(
            "Leave request {} is {} and can no longer be modified",
            current.reference, current.status
        )));
    }
    active_leave_type(store, revision.leave_type_id).await?;

    let revision = LeaveRevision {
        reason: clean_text(revision.reason.as_deref()),
        ..revision.clone()
    };
    if store.revise_pending_leave(id, &revision).await? == 0 {
        // decided between the read and the write
        return Err(LedgerError::conflict(format!(
            "Leave request {} was decided while being modified",
            current.reference
        )));
    }

    store
        .find_leave_request(id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Leave request {id}")))
}

/* =========================
Decisions
========================= */

/// Runs a transition through the store's transaction, then refreshes presence for
/// the covered days that already happened.
pub async fn decide<S: AttendanceStore + LeaveStore>(
    store: &S,
    attendance: &AttendancePolicy,
    leave: &LeavePolicy,
    decision: &LeaveDecision,
    today: NaiveDate,
) -> Result<LeaveDecisionOutcome, LedgerError> {
    if decision.target == LeaveStatus::Pending {
        return Err(LedgerError::validation("A decision cannot move a request back to Pending"));
    }

    let outcome = store.apply_leave_decision(decision, leave).await?;

    tracing::info!(
        leave_request_id = decision.request_id,
        from = %outcome.previous_status,
        to = %outcome.request.status,
        validator_id = decision.validator_id,
        effect = ?outcome.effect,
        "Leave request decided"
    );
    if let Some(balance) = outcome.balance {
        if balance.remaining_days < 0 {
            tracing::warn!(
                personnel_id = balance.personnel_id,
                year = balance.year,
                remaining_days = balance.remaining_days,
                "Leave balance overdrawn"
            );
        }
    }

    if matches!(
        (outcome.previous_status, outcome.request.status),
        (LeaveStatus::Pending, LeaveStatus::Approved) | (LeaveStatus::Approved, LeaveStatus::Rejected)
    ) {
        refresh_covered_days(store, attendance, &outcome.request, today).await;
    }

    Ok(outcome)
}

pub async fn cancel<S: AttendanceStore + LeaveStore>(
    store: &S,
    attendance: &AttendancePolicy,
    leave: &LeavePolicy,
    request_id: u64,
    actor_id: u64,
    comment: Option<String>,
    now: NaiveDateTime,
) -> Result<LeaveDecisionOutcome, LedgerError> {
    let decision = LeaveDecision {
        request_id,
        target: LeaveStatus::Cancelled,
        validator_id: actor_id,
        comment: clean_text(comment.as_deref()),
        decided_at: now,
    };
    decide(store, attendance, leave, &decision, now.date()).await
}

/// Failures are logged only; the decision itself is already committed.
async fn refresh_covered_days<S: AttendanceStore + LeaveStore>(
    store: &S,
    policy: &AttendancePolicy,
    request: &LeaveRequest,
    today: NaiveDate,
) {
    let last = request.date_end.min(today);
    let mut day = request.date_start;
    while day <= last {
        if let Err(e) = aggregator::aggregate_day(store, policy, request.personnel_id, day).await {
            tracing::warn!(
                error = %e,
                personnel_id = request.personnel_id,
                date = %day,
                "Presence refresh after leave decision failed"
            );
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
}

/* =========================
Reads
========================= */

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaveDetail {
    pub request: LeaveRequest,
    pub leave_type: LeaveType,
    pub history: Vec<ValidationHistory>,
    pub balance: LeaveBalance,
}

/// A request with its type, history and balance.
///
/// With `visible_to` set, requests of any other personnel are reported exactly like
/// missing ones, before anything else is loaded.
pub async fn detail<S: LeaveStore>(
    store: &S,
    policy: &LeavePolicy,
    id: u64,
    visible_to: Option<u64>,
) -> Result<LeaveDetail, LedgerError> {
    let request = store
        .find_leave_request(id)
        .await?
        .filter(|r| visible_to.is_none_or(|personnel_id| r.personnel_id == personnel_id))
        .ok_or_else(|| LedgerError::not_found(format!("Leave request {id}")))?;
    let leave_type = store
        .find_leave_type(request.leave_type_id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Leave type {}", request.leave_type_id)))?;
    let history = store.validation_history(id).await?;
    let balance = balance(store, policy, request.personnel_id, request.balance_year()).await?;

    Ok(LeaveDetail {
        request,
        leave_type,
        history,
        balance,
    })
}

/// Stored balance, or the opening balance a first approval would create.
pub async fn balance<S: LeaveStore>(
    store: &S,
    policy: &LeavePolicy,
    personnel_id: u64,
    year: i32,
) -> Result<LeaveBalance, LedgerError> {
    Ok(store
        .leave_balance(personnel_id, year)
        .await?
        .unwrap_or_else(|| LeaveBalance::opening(personnel_id, year, policy.default_allotment)))
}

pub async fn list<S: LeaveStore>(
    store: &S,
    filter: &LeaveFilter,
) -> Result<(Vec<LeaveRequest>, i64), LedgerError> {
    if filter.month.is_some() != filter.year.is_some() {
        return Err(LedgerError::validation("month and year must be given together"));
    }
    if filter.month.is_some() && filter.month_window().is_none() {
        return Err(LedgerError::validation("month must be between 1 and 12"));
    }
    store.list_leave_requests(filter).await
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CalendarEntry {
    pub leave_request_id: u64,
    pub reference: String,
    pub personnel_id: u64,
    pub leave_type_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CalendarDay {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub absences: Vec<CalendarEntry>,
}

/// Days of the month with at least one approved leave, in date order.
pub fn build_calendar(first: NaiveDate, last: NaiveDate, approved: &[LeaveRequest]) -> Vec<CalendarDay> {
    let mut days = Vec::new();
    let mut day = first;
    while day <= last {
        let absences: Vec<CalendarEntry> = approved
            .iter()
            .filter(|r| r.status == LeaveStatus::Approved && r.covers(day))
            .map(|r| CalendarEntry {
                leave_request_id: r.id,
                reference: r.reference.clone(),
                personnel_id: r.personnel_id,
                leave_type_id: r.leave_type_id,
            })
            .collect();
        if !absences.is_empty() {
            days.push(CalendarDay { date: day, absences });
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    days
}

pub async fn calendar<S: LeaveStore>(
    store: &S,
    year: i32,
    month: u32,
    personnel_id: Option<u64>,
) -> Result<Vec<CalendarDay>, LedgerError> {
    let (first, last) = aggregator::month_bounds(year, month)
        .ok_or_else(|| LedgerError::validation("month must be between 1 and 12"))?;
    let approved = store.approved_leaves_between(first, last, personnel_id).await?;
    Ok(build_calendar(first, last, &approved))
}
