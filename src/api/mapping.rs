use crate::api::now;
use crate::auth::auth::AuthUser;
use crate::ledger::mapping::{self, MappingInput};
use crate::ledger::policy::AttendancePolicy;
use crate::store::OrphanFilter;
use crate::store::mysql::MySqlStore;
use actix_web::{HttpResponse, Responder, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/api/mappings",
    responses(
        (status = 200, description = "Active device mappings", body = Vec<crate::model::device::DeviceMapping>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Mappings"
)]
pub async fn list_mappings(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    Ok(HttpResponse::Ok().json(mapping::list(store.get_ref()).await?))
}

/* =========================
Bind an external user id
========================= */
#[utoipa::path(
    put,
    path = "/api/mappings/{personnel_id}",
    params(
        ("personnel_id" = u64, Path, description = "Personnel to bind")
    ),
    request_body(
        content = MappingInput,
        description = "Terminal user id, optional device scope and badge",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Mapping stored; orphan events attached and their days re-aggregated", body = crate::ledger::mapping::MappingOutcome),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Personnel or device not found"),
        (status = 409, description = "External user id is bound to another personnel", body = Object, example = json!({
            "message": "External user id 42 is already mapped to personnel 9"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Mappings"
)]
pub async fn upsert_mapping(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    policy: web::Data<AttendancePolicy>,
    path: web::Path<u64>,
    payload: web::Json<MappingInput>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let personnel_id = path.into_inner();

    let outcome = mapping::upsert(store.get_ref(), &policy, personnel_id, &payload, now()).await?;
    tracing::info!(
        personnel_id,
        user_id = auth.user_id,
        reaggregated = outcome.reaggregated_days.len(),
        "Device mapping saved"
    );
    Ok(HttpResponse::Ok().json(outcome))
}

#[utoipa::path(
    delete,
    path = "/api/mappings/{personnel_id}",
    params(
        ("personnel_id" = u64, Path, description = "Personnel whose active mapping is retired")
    ),
    responses(
        (status = 200, description = "Mapping deactivated", body = Object, example = json!({
            "message": "Mapping deactivated"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "No active mapping")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Mappings"
)]
pub async fn deactivate_mapping(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    mapping::deactivate(store.get_ref(), path.into_inner(), now()).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Mapping deactivated" })))
}

#[utoipa::path(
    get,
    path = "/api/mappings/orphans",
    params(OrphanFilter),
    responses(
        (status = 200, description = "Raw events no mapping could attribute, newest first", body = Vec<crate::model::clock_event::RawClockEvent>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Mappings"
)]
pub async fn orphan_events(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    query: web::Query<OrphanFilter>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    Ok(HttpResponse::Ok().json(mapping::orphans(store.get_ref(), &query).await?))
}
