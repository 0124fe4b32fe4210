use crate::api::now;
use crate::auth::auth::AuthUser;
use crate::ledger::clock::{self, ManualClockOutcome};
use crate::ledger::policy::AttendancePolicy;
use crate::model::clock_event::ClockEventType;
use crate::store::mysql::MySqlStore;
use actix_web::{HttpResponse, Responder, web};

async fn record(
    auth: &AuthUser,
    store: &MySqlStore,
    policy: &AttendancePolicy,
    event_type: ClockEventType,
) -> actix_web::Result<ManualClockOutcome> {
    let personnel_id = auth.require_personnel()?;
    let outcome = clock::punch(store, policy, personnel_id, event_type, now())
        .await
        .inspect_err(|e| tracing::warn!(error = %e, personnel_id, %event_type, "Manual punch refused"))?;
    Ok(outcome)
}

/* =========================
Check-in
========================= */
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    responses(
        (status = 200, description = "Check-in recorded and the day re-aggregated", body = ManualClockOutcome),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No personnel profile"),
        (status = 409, description = "A check-in is already open", body = Object, example = json!({
            "message": "Already checked in; check out first"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    policy: web::Data<AttendancePolicy>,
) -> actix_web::Result<impl Responder> {
    let outcome = record(&auth, &store, &policy, ClockEventType::CheckIn).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/* =========================
Check-out
========================= */
#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    responses(
        (status = 200, description = "Check-out recorded and the day re-aggregated", body = ManualClockOutcome),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No personnel profile"),
        (status = 409, description = "No open check-in", body = Object, example = json!({
            "message": "No open check-in to close"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    policy: web::Data<AttendancePolicy>,
) -> actix_web::Result<impl Responder> {
    let outcome = record(&auth, &store, &policy, ClockEventType::CheckOut).await?;
    Ok(HttpResponse::Ok().json(outcome))
}
