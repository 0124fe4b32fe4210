use crate::api::now;
use crate::auth::auth::AuthUser;
use crate::ledger::aggregator::{self, DiscrepancyDecision, StatsQuery};
use crate::ledger::policy::AttendancePolicy;
use crate::store::mysql::MySqlStore;
use crate::store::PresenceFilter;
use actix_web::{HttpResponse, Responder, web};
use serde_json::json;

/// for listing daily presence rows of a period
#[utoipa::path(
    get,
    path = "/api/presence",
    params(PresenceFilter),
    responses(
        (status = 200, description = "Presence rows ordered by date", body = Vec<crate::model::presence::DailyPresence>),
        (status = 400, description = "Invalid period"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No personnel profile")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Presence"
)]
pub async fn list_presence(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    query: web::Query<PresenceFilter>,
) -> actix_web::Result<impl Responder> {
    let mut filter = query.into_inner();
    // Employees only see their own days.
    if !auth.role.is_supervisor() {
        filter.personnel_id = Some(auth.require_personnel()?);
    }
    Ok(HttpResponse::Ok().json(aggregator::list(store.get_ref(), &filter).await?))
}

/* =========================
Recompute a period (HR/Admin)
========================= */
#[utoipa::path(
    post,
    path = "/api/presence/recompute",
    request_body(
        content = PresenceFilter,
        description = "Period to rebuild, optionally for one personnel",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Rows rebuilt; validated rows are reported as frozen", body = crate::ledger::aggregator::RecomputeReport),
        (status = 400, description = "Invalid period"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Presence"
)]
pub async fn recompute(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    policy: web::Data<AttendancePolicy>,
    payload: web::Json<PresenceFilter>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let report = aggregator::recompute_range(store.get_ref(), &policy, &payload, now().date()).await?;
    tracing::info!(
        from = %payload.from,
        to = %payload.to,
        applied = report.applied,
        frozen = report.frozen,
        "Presence recomputed"
    );
    Ok(HttpResponse::Ok().json(report))
}

/* =========================
Validate a day (HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/presence/{presence_id}/validate",
    params(
        ("presence_id" = u64, Path, description = "Presence row to freeze")
    ),
    responses(
        (status = 200, description = "Row validated", body = Object, example = json!({
            "message": "Presence validated",
            "data": { "id": 12, "validated": true }
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Presence not found"),
        (status = 409, description = "Already validated")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Presence"
)]
pub async fn validate_presence(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let presence = aggregator::validate(store.get_ref(), path.into_inner(), auth.user_id, now()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Presence validated",
        "data": presence
    })))
}

#[utoipa::path(
    get,
    path = "/api/presence/discrepancies",
    responses(
        (status = 200, description = "Recomputed values that differ from validated rows", body = Vec<crate::model::presence::PresenceDiscrepancy>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Presence"
)]
pub async fn discrepancies(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    Ok(HttpResponse::Ok().json(aggregator::open_discrepancies(store.get_ref()).await?))
}

/* =========================
Decide a discrepancy (HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/presence/discrepancies/{discrepancy_id}",
    params(
        ("discrepancy_id" = u64, Path, description = "Open discrepancy to close")
    ),
    request_body(
        content = DiscrepancyDecision,
        description = "Accept the recomputed figures or keep the validated row",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Discrepancy closed", body = crate::ledger::aggregator::DiscrepancyOutcome),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Discrepancy not found"),
        (status = 409, description = "Already resolved")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Presence"
)]
pub async fn resolve_discrepancy(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    path: web::Path<u64>,
    payload: web::Json<DiscrepancyDecision>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let outcome =
        aggregator::resolve_discrepancy(store.get_ref(), path.into_inner(), &payload, auth.user_id, now()).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[utoipa::path(
    get,
    path = "/api/presence/stats",
    params(StatsQuery),
    responses(
        (status = 200, description = "Monthly figures for one personnel", body = crate::model::presence::PresenceStats),
        (status = 400, description = "Invalid month"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Presence"
)]
pub async fn monthly_stats(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    policy: web::Data<AttendancePolicy>,
    query: web::Query<StatsQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_self_or_supervisor(query.personnel_id)?;
    Ok(HttpResponse::Ok().json(aggregator::monthly_stats(store.get_ref(), &policy, &query).await?))
}
