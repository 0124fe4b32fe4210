use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::ledger::device::{self, DeviceRegistration};
use crate::ledger::importer;
use crate::ledger::policy::AttendancePolicy;
use crate::ledger::terminal::{HttpBridgeDriver, VendorClockEvent};
use crate::store::mysql::MySqlStore;
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct SyncLogQuery {
    /// Number of most recent runs (default 20, max 200)
    pub limit: Option<u32>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct DeviceListQuery {
    /// Only active terminals (default true)
    pub active_only: Option<bool>,
}

/* =========================
Device catalog
========================= */
#[utoipa::path(
    get,
    path = "/api/devices",
    params(DeviceListQuery),
    responses(
        (status = 200, description = "Terminals with their last successful sync", body = Vec<crate::model::device::Device>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Devices"
)]
pub async fn list_devices(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    query: web::Query<DeviceListQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let devices = device::list(store.get_ref(), query.active_only.unwrap_or(true)).await?;
    Ok(HttpResponse::Ok().json(devices))
}

#[utoipa::path(
    post,
    path = "/api/devices",
    request_body(
        content = DeviceRegistration,
        description = "Terminal to add to the catalog",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Device registered", body = crate::model::device::Device),
        (status = 400, description = "Invalid name or port"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Devices"
)]
pub async fn register_device(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    payload: web::Json<DeviceRegistration>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let device = device::register(store.get_ref(), &payload).await?;
    Ok(HttpResponse::Created().json(device))
}

/* =========================
Push import (terminal bridge)
========================= */
#[utoipa::path(
    post,
    path = "/api/devices/{device_id}/events",
    params(
        ("device_id" = u64, Path, description = "Device the batch was read from")
    ),
    request_body(
        content = Vec<VendorClockEvent>,
        description = "Raw punches in vendor format",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Batch processed; per-event errors are listed in the report", body = crate::ledger::importer::ImportReport),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Device not found"),
        (status = 409, description = "Device is inactive")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Devices"
)]
pub async fn push_events(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    policy: web::Data<AttendancePolicy>,
    path: web::Path<u64>,
    payload: web::Json<Vec<VendorClockEvent>>,
) -> actix_web::Result<impl Responder> {
    auth.require_event_pusher()?;
    let device_id = path.into_inner();

    let report = importer::receive_batch(store.get_ref(), &policy, device_id, &payload)
        .await
        .inspect_err(|e| tracing::error!(error = %e, device_id, "Push import failed"))?;

    Ok(HttpResponse::Ok().json(report))
}

/* =========================
Pull sync
========================= */
#[utoipa::path(
    post,
    path = "/api/devices/{device_id}/sync",
    params(
        ("device_id" = u64, Path, description = "Device to read from")
    ),
    responses(
        (status = 200, description = "Events fetched and imported", body = crate::ledger::importer::ImportReport),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Device not found"),
        (status = 503, description = "Device did not answer in time", body = Object, example = json!({
            "message": "device unreachable: device 3 did not answer within 5s"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Devices"
)]
pub async fn sync_device(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    driver: web::Data<HttpBridgeDriver>,
    policy: web::Data<AttendancePolicy>,
    config: web::Data<Config>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_event_pusher()?;
    let device_id = path.into_inner();

    let report = importer::sync_device(
        store.get_ref(),
        driver.get_ref(),
        &policy,
        device_id,
        config.device_timeout,
    )
    .await?;

    Ok(HttpResponse::Ok().json(report))
}

/* =========================
Sync history
========================= */
#[utoipa::path(
    get,
    path = "/api/devices/{device_id}/sync-logs",
    params(
        ("device_id" = u64, Path, description = "Device id"),
        SyncLogQuery
    ),
    responses(
        (status = 200, description = "Most recent runs first", body = Vec<crate::model::device::DeviceSyncLog>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Device not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Devices"
)]
pub async fn sync_logs(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    path: web::Path<u64>,
    query: web::Query<SyncLogQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let logs = importer::sync_history(store.get_ref(), path.into_inner(), query.limit).await?;
    Ok(HttpResponse::Ok().json(logs))
}
