use crate::{
    api::{anomaly, clock, devices, leave, mapping, presence},
    auth::middleware::auth_middleware,
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Per-route limiter
fn build_limiter(requests_per_min: u32) -> Option<Governor<PeerIpKeyExtractor, NoOpMiddleware>> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()?;
    Some(Governor::new(&cfg))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let Some(protected_limiter) = build_limiter(config.rate_protected_per_min) else {
        tracing::error!(rate = config.rate_protected_per_min, "Invalid protected rate limit");
        return;
    };
    let Some(device_limiter) = build_limiter(config.rate_device_per_min) else {
        tracing::error!(rate = config.rate_device_per_min, "Invalid device rate limit");
        return;
    };
    let device_limiter = Arc::new(device_limiter);

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/attendance")
                    .service(web::resource("/check-in").route(web::post().to(clock::check_in)))
                    .service(web::resource("/check-out").route(web::post().to(clock::check_out))),
            )
            .service(
                web::scope("/devices")
                    .service(
                        web::resource("")
                            .route(web::get().to(devices::list_devices))
                            .route(web::post().to(devices::register_device)),
                    )
                    // /devices/{id}/events
                    .service(
                        web::resource("/{device_id}/events")
                            .wrap(device_limiter.clone())
                            .route(web::post().to(devices::push_events)),
                    )
                    // /devices/{id}/sync
                    .service(
                        web::resource("/{device_id}/sync")
                            .wrap(device_limiter.clone())
                            .route(web::post().to(devices::sync_device)),
                    )
                    .service(
                        web::resource("/{device_id}/sync-logs")
                            .route(web::get().to(devices::sync_logs)),
                    ),
            )
            .service(
                web::scope("/mappings")
                    .service(web::resource("").route(web::get().to(mapping::list_mappings)))
                    // registered before /{personnel_id}
                    .service(web::resource("/orphans").route(web::get().to(mapping::orphan_events)))
                    .service(
                        web::resource("/{personnel_id}")
                            .route(web::put().to(mapping::upsert_mapping))
                            .route(web::delete().to(mapping::deactivate_mapping)),
                    ),
            )
            .service(
                web::scope("/presence")
                    .service(web::resource("").route(web::get().to(presence::list_presence)))
                    .service(web::resource("/recompute").route(web::post().to(presence::recompute)))
                    .service(
                        web::resource("/discrepancies").route(web::get().to(presence::discrepancies)),
                    )
                    .service(
                        web::resource("/discrepancies/{discrepancy_id}")
                            .route(web::put().to(presence::resolve_discrepancy)),
                    )
                    .service(web::resource("/stats").route(web::get().to(presence::monthly_stats)))
                    .service(
                        web::resource("/{presence_id}/validate")
                            .route(web::put().to(presence::validate_presence)),
                    ),
            )
            .service(
                web::scope("/anomalies")
                    .service(web::resource("").route(web::get().to(anomaly::list_anomalies)))
                    .service(web::resource("/scan").route(web::post().to(anomaly::scan)))
                    .service(web::resource("/{anomaly_id}/resolve").route(web::put().to(anomaly::resolve)))
                    .service(web::resource("/{anomaly_id}/ignore").route(web::put().to(anomaly::ignore))),
            )
            .service(
                web::scope("/leave")
                    // /leave
                    .service(
                        web::resource("")
                            .route(web::get().to(leave::leave_list))
                            .route(web::post().to(leave::submit_leave)),
                    )
                    // fixed segments before /{leave_id}
                    .service(web::resource("/types").route(web::get().to(leave::leave_types)))
                    .service(web::resource("/balance").route(web::get().to(leave::leave_balance)))
                    .service(web::resource("/calendar").route(web::get().to(leave::leave_calendar)))
                    // /leave/{id}
                    .service(
                        web::resource("/{leave_id}")
                            .route(web::get().to(leave::get_leave))
                            .route(web::put().to(leave::revise_leave)),
                    )
                    .service(
                        web::resource("/{leave_id}/approve").route(web::put().to(leave::approve_leave)),
                    )
                    .service(
                        web::resource("/{leave_id}/reject").route(web::put().to(leave::reject_leave)),
                    )
                    .service(
                        web::resource("/{leave_id}/cancel").route(web::put().to(leave::cancel_leave)),
                    ),
            ),
    );
}
