use crate::api::now;
use crate::auth::auth::AuthUser;
use crate::error::LedgerError;
use crate::ledger::leave::{self, LeaveDecision, LeaveDecisionOutcome, LeaveRevision, LeaveSubmission};
use crate::ledger::policy::{AttendancePolicy, LeavePolicy};
use crate::model::leave_request::{LeaveRequest, LeaveStatus};
use crate::store::mysql::MySqlStore;
use crate::store::{LeaveFilter, LeaveStore};
use crate::utils::db_utils::page_bounds;
use actix_web::{HttpResponse, Responder, web};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveRequest>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(Deserialize, ToSchema)]
#[schema(example = json!({ "comment": "Covered by the team planning" }))]
pub struct DecisionComment {
    pub comment: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BalanceQuery {
    pub personnel_id: u64,
    /// Defaults to the current year
    pub year: Option<i32>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct CalendarQuery {
    pub year: i32,
    /// 1-12
    pub month: u32,
    pub personnel_id: Option<u64>,
}

/// Loads a request and checks the caller may act on it.
async fn owned_request(auth: &AuthUser, store: &MySqlStore, id: u64) -> actix_web::Result<LeaveRequest> {
    let request = store
        .find_leave_request(id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Leave request {id}")))?;
    auth.require_self_or_supervisor(request.personnel_id)?;
    Ok(request)
}

async fn decide(
    auth: &AuthUser,
    store: &MySqlStore,
    attendance: &AttendancePolicy,
    leave_policy: &LeavePolicy,
    request_id: u64,
    target: LeaveStatus,
    comment: Option<String>,
) -> actix_web::Result<LeaveDecisionOutcome> {
    auth.require_hr_or_admin()?;
    let at = now();
    let decision = LeaveDecision {
        request_id,
        target,
        validator_id: auth.user_id,
        comment: comment.filter(|c| !c.trim().is_empty()),
        decided_at: at,
    };
    let outcome = leave::decide(store, attendance, leave_policy, &decision, at.date())
        .await
        .inspect_err(|e| tracing::warn!(error = %e, leave_id = request_id, %target, "Leave decision refused"))?;
    Ok(outcome)
}

/* =========================
Submit leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(
        content = LeaveSubmission,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Leave request submitted", body = LeaveRequest),
        (status = 400, description = "Bad request", body = Object, example = json!({
            "message": "date_start cannot be after date_end"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Personnel or leave type not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn submit_leave(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    payload: web::Json<LeaveSubmission>,
) -> actix_web::Result<impl Responder> {
    auth.require_self_or_supervisor(payload.personnel_id)?;
    let request = leave::submit(store.get_ref(), &payload, auth.user_id, now()).await?;
    Ok(HttpResponse::Ok().json(request))
}

/* =========================
Revise a pending request
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the pending leave request")
    ),
    request_body(
        content = LeaveRevision,
        description = "Replacement type, period and reason",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Leave request updated", body = LeaveRequest),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Request already decided")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn revise_leave(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    path: web::Path<u64>,
    payload: web::Json<LeaveRevision>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();
    owned_request(&auth, &store, leave_id).await?;
    let request = leave::revise(store.get_ref(), leave_id, &payload).await?;
    Ok(HttpResponse::Ok().json(request))
}

/* =========================
Approve leave (HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to approve")
    ),
    request_body(content = DecisionComment, content_type = "application/json"),
    responses(
        (status = 200, description = "Leave approved; balance deducted for balance-bearing types", body = LeaveDecisionOutcome),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Transition not allowed from the current status", body = Object, example = json!({
            "message": "Leave request ABS-20240301090000-1a2b3c4d is Rejected and cannot become Approved"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    attendance: web::Data<AttendancePolicy>,
    leave_policy: web::Data<LeavePolicy>,
    path: web::Path<u64>,
    payload: Option<web::Json<DecisionComment>>,
) -> actix_web::Result<impl Responder> {
    let comment = payload.and_then(|p| p.into_inner().comment);
    let outcome = decide(&auth, &store, &attendance, &leave_policy, path.into_inner(), LeaveStatus::Approved, comment).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave approved",
        "data": outcome
    })))
}

/* =========================
Reject leave (HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to reject")
    ),
    request_body(content = DecisionComment, content_type = "application/json"),
    responses(
        (status = 200, description = "Leave rejected; an approved request gets its days restored", body = LeaveDecisionOutcome),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Transition not allowed from the current status")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    attendance: web::Data<AttendancePolicy>,
    leave_policy: web::Data<LeavePolicy>,
    path: web::Path<u64>,
    payload: Option<web::Json<DecisionComment>>,
) -> actix_web::Result<impl Responder> {
    let comment = payload.and_then(|p| p.into_inner().comment);
    let outcome = decide(&auth, &store, &attendance, &leave_policy, path.into_inner(), LeaveStatus::Rejected, comment).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave rejected",
        "data": outcome
    })))
}

#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/cancel",
    params(
        ("leave_id" = u64, Path, description = "ID of the pending leave request to cancel")
    ),
    request_body(content = DecisionComment, content_type = "application/json"),
    responses(
        (status = 200, description = "Leave cancelled", body = LeaveDecisionOutcome),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Only pending requests can be cancelled")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn cancel_leave(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    attendance: web::Data<AttendancePolicy>,
    leave_policy: web::Data<LeavePolicy>,
    path: web::Path<u64>,
    payload: Option<web::Json<DecisionComment>>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();
    owned_request(&auth, &store, leave_id).await?;
    let comment = payload.and_then(|p| p.into_inner().comment);

    let outcome = leave::cancel(
        store.get_ref(),
        &attendance,
        &leave_policy,
        leave_id,
        auth.user_id,
        comment,
        now(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave cancelled",
        "data": outcome
    })))
}

/// for getting a leave application with its history and balance
#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to fetch")
    ),
    responses(
        (status = 200, description = "Leave request found", body = crate::ledger::leave::LeaveDetail),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No personnel profile"),
        (status = 404, description = "Leave request not found, or not visible to the caller", body = Object, example = json!({
            "message": "Leave request 12 not found"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    leave_policy: web::Data<LeavePolicy>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let visible_to = if auth.role.is_supervisor() {
        None
    } else {
        Some(auth.require_personnel()?)
    };
    let detail = leave::detail(store.get_ref(), &leave_policy, path.into_inner(), visible_to).await?;
    Ok(HttpResponse::Ok().json(detail))
}

/// for getting leave applications endpoint
#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse),
        (status = 400, description = "month and year must be given together"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    query: web::Query<LeaveFilter>,
) -> actix_web::Result<impl Responder> {
    let mut filter = query.into_inner();
    if !auth.role.is_supervisor() {
        filter.personnel_id = Some(auth.require_personnel()?);
    }

    let (data, total) = leave::list(store.get_ref(), &filter).await?;
    let (page, per_page, _) = page_bounds(filter.page, filter.per_page);

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/leave/types",
    responses(
        (status = 200, description = "Leave type catalog", body = Vec<crate::model::leave_request::LeaveType>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_types(
    _auth: AuthUser,
    store: web::Data<MySqlStore>,
) -> actix_web::Result<impl Responder> {
    Ok(HttpResponse::Ok().json(store.list_leave_types().await?))
}

#[utoipa::path(
    get,
    path = "/api/leave/balance",
    params(BalanceQuery),
    responses(
        (status = 200, description = "Yearly balance; the opening balance when none was recorded yet", body = crate::model::leave_request::LeaveBalance),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_balance(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    leave_policy: web::Data<LeavePolicy>,
    query: web::Query<BalanceQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_self_or_supervisor(query.personnel_id)?;
    let year = query.year.unwrap_or_else(|| now().year());
    Ok(HttpResponse::Ok().json(leave::balance(store.get_ref(), &leave_policy, query.personnel_id, year).await?))
}

#[utoipa::path(
    get,
    path = "/api/leave/calendar",
    params(CalendarQuery),
    responses(
        (status = 200, description = "Days of the month with approved absences", body = Vec<crate::ledger::leave::CalendarDay>),
        (status = 400, description = "Invalid month"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_calendar(
    _auth: AuthUser,
    store: web::Data<MySqlStore>,
    query: web::Query<CalendarQuery>,
) -> actix_web::Result<impl Responder> {
    let days = leave::calendar(store.get_ref(), query.year, query.month, query.personnel_id).await?;
    Ok(HttpResponse::Ok().json(days))
}
