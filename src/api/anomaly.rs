use crate::api::now;
use crate::auth::auth::AuthUser;
use crate::ledger::anomaly::{self, ResolveAnomaly, ScanWindow};
use crate::ledger::policy::AttendancePolicy;
use crate::model::anomaly::Anomaly;
use crate::store::AnomalyFilter;
use crate::store::mysql::MySqlStore;
use actix_web::{HttpResponse, Responder, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/api/anomalies",
    params(AnomalyFilter),
    responses(
        (status = 200, description = "Anomalies, most recent first", body = Vec<Anomaly>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No personnel profile")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Anomalies"
)]
pub async fn list_anomalies(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    query: web::Query<AnomalyFilter>,
) -> actix_web::Result<impl Responder> {
    let mut filter = query.into_inner();
    if !auth.role.is_supervisor() {
        filter.personnel_id = Some(auth.require_personnel()?);
    }
    Ok(HttpResponse::Ok().json(anomaly::list(store.get_ref(), &filter).await?))
}

/* =========================
Scan a period (HR/Admin)
========================= */
#[utoipa::path(
    post,
    path = "/api/anomalies/scan",
    request_body(
        content = ScanWindow,
        description = "Inclusive period; only days before today are judged",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "New anomalies and per-item errors", body = crate::ledger::anomaly::ScanReport),
        (status = 400, description = "Invalid period"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Anomalies"
)]
pub async fn scan(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    policy: web::Data<AttendancePolicy>,
    payload: web::Json<ScanWindow>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let at = now();
    let report = anomaly::scan(store.get_ref(), &policy, &payload, at.date(), at).await?;
    Ok(HttpResponse::Ok().json(report))
}

#[utoipa::path(
    put,
    path = "/api/anomalies/{anomaly_id}/resolve",
    params(
        ("anomaly_id" = u64, Path, description = "Anomaly to close")
    ),
    request_body(
        content = ResolveAnomaly,
        description = "Action taken and optional comment",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Anomaly resolved", body = Object, example = json!({
            "message": "Anomaly resolved"
        })),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Anomaly not found"),
        (status = 409, description = "Already resolved")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Anomalies"
)]
pub async fn resolve(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    path: web::Path<u64>,
    payload: web::Json<ResolveAnomaly>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let anomaly = anomaly::resolve(store.get_ref(), path.into_inner(), auth.user_id, &payload, now()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Anomaly resolved",
        "data": anomaly
    })))
}

#[utoipa::path(
    put,
    path = "/api/anomalies/{anomaly_id}/ignore",
    params(
        ("anomaly_id" = u64, Path, description = "Anomaly to dismiss")
    ),
    responses(
        (status = 200, description = "Anomaly ignored", body = Object, example = json!({
            "message": "Anomaly ignored"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Anomaly not found"),
        (status = 409, description = "Already resolved")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Anomalies"
)]
pub async fn ignore(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let anomaly = anomaly::ignore(store.get_ref(), path.into_inner(), auth.user_id, now()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Anomaly ignored",
        "data": anomaly
    })))
}
