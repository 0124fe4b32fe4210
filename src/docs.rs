use crate::api::devices::{DeviceListQuery, SyncLogQuery};
use crate::api::leave::{BalanceQuery, CalendarQuery, DecisionComment, LeaveListResponse};
use crate::ledger::aggregator::{
    AggregationOutcome, DiscrepancyDecision, DiscrepancyOutcome, RecomputeReport, StatsQuery,
};
use crate::ledger::anomaly::{ResolveAnomaly, ScanReport, ScanWindow};
use crate::ledger::clock::ManualClockOutcome;
use crate::ledger::device::DeviceRegistration;
use crate::ledger::importer::{ImportItemError, ImportReport};
use crate::ledger::leave::{
    BalanceEffect, CalendarDay, CalendarEntry, LeaveDecisionOutcome, LeaveDetail, LeaveRevision,
    LeaveSubmission,
};
use crate::ledger::mapping::{MappingInput, MappingOutcome};
use crate::ledger::terminal::VendorClockEvent;
use crate::model::anomaly::{Anomaly, AnomalyKind, Severity};
use crate::model::clock_event::{ClockEventType, RawClockEvent};
use crate::model::device::{Device, DeviceMapping, DeviceSyncLog, SyncStatus};
use crate::model::leave_request::{LeaveBalance, LeaveRequest, LeaveStatus, LeaveType, ValidationHistory};
use crate::model::presence::{
    DailyPresence, DiscrepancyResolution, PresenceDiscrepancy, PresenceStats, PresenceStatus,
};
use crate::store::{AnomalyFilter, LeaveFilter, OrphanFilter, PresenceFilter};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance & Leave Ledger API",
        version = "1.0.0",
        description = r#"
## Attendance & Leave Ledger

Turns raw punches from time-clock terminals into daily presence, flags attendance
anomalies and keeps the yearly leave balance consistent with leave decisions.

### Key Features
- **Devices**: terminal catalog, batches pushed by a bridge or pulled on demand, with a sync log
- **Mappings**: terminal user ids bound to personnel; orphan punches re-attributed on binding
- **Presence**: arrival, departure, lateness, worked time and overtime per personnel and day
- **Anomalies**: missing check-outs, unjustified absences and repeated lateness
- **Leave**: requests, approval/rejection/cancellation and the yearly balance

### Security
Every endpoint expects a **JWT Bearer** access token issued by the identity service.
HR and Admin roles decide leave, validate presence, manage mappings and resolve anomalies.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::clock::check_in,
        crate::api::clock::check_out,

        crate::api::devices::list_devices,
        crate::api::devices::register_device,
        crate::api::devices::push_events,
        crate::api::devices::sync_device,
        crate::api::devices::sync_logs,

        crate::api::mapping::list_mappings,
        crate::api::mapping::upsert_mapping,
        crate::api::mapping::deactivate_mapping,
        crate::api::mapping::orphan_events,

        crate::api::presence::list_presence,
        crate::api::presence::recompute,
        crate::api::presence::validate_presence,
        crate::api::presence::discrepancies,
        crate::api::presence::resolve_discrepancy,
        crate::api::presence::monthly_stats,

        crate::api::anomaly::list_anomalies,
        crate::api::anomaly::scan,
        crate::api::anomaly::resolve,
        crate::api::anomaly::ignore,

        crate::api::leave::submit_leave,
        crate::api::leave::revise_leave,
        crate::api::leave::approve_leave,
        crate::api::leave::reject_leave,
        crate::api::leave::cancel_leave,
        crate::api::leave::get_leave,
        crate::api::leave::leave_list,
        crate::api::leave::leave_types,
        crate::api::leave::leave_balance,
        crate::api::leave::leave_calendar
    ),
    components(
        schemas(
            ManualClockOutcome,
            AggregationOutcome,
            ClockEventType,
            RawClockEvent,
            VendorClockEvent,
            ImportReport,
            ImportItemError,
            Device,
            DeviceListQuery,
            DeviceRegistration,
            SyncLogQuery,
            DeviceSyncLog,
            SyncStatus,
            DeviceMapping,
            MappingInput,
            MappingOutcome,
            OrphanFilter,
            PresenceFilter,
            DailyPresence,
            PresenceStatus,
            PresenceDiscrepancy,
            DiscrepancyResolution,
            DiscrepancyDecision,
            DiscrepancyOutcome,
            PresenceStats,
            RecomputeReport,
            StatsQuery,
            Anomaly,
            AnomalyKind,
            Severity,
            AnomalyFilter,
            ScanWindow,
            ScanReport,
            ResolveAnomaly,
            LeaveFilter,
            LeaveListResponse,
            LeaveSubmission,
            LeaveRevision,
            LeaveRequest,
            LeaveStatus,
            LeaveType,
            LeaveBalance,
            ValidationHistory,
            LeaveDetail,
            LeaveDecisionOutcome,
            BalanceEffect,
            DecisionComment,
            BalanceQuery,
            CalendarQuery,
            CalendarDay,
            CalendarEntry
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Manual check-in and check-out"),
        (name = "Devices", description = "Terminal catalog, imports and sync history"),
        (name = "Mappings", description = "Terminal user id to personnel bindings"),
        (name = "Presence", description = "Daily presence aggregation and validation"),
        (name = "Anomalies", description = "Attendance anomaly detection and follow-up"),
        (name = "Leave", description = "Leave requests and the yearly leave ledger"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_group_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/attendance/check-in",
            "/api/devices/{device_id}/events",
            "/api/mappings/{personnel_id}",
            "/api/devices",
            "/api/presence/recompute",
            "/api/presence/discrepancies/{discrepancy_id}",
            "/api/anomalies/{anomaly_id}/resolve",
            "/api/leave/{leave_id}/approve",
            "/api/leave/calendar",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing from the OpenAPI document");
        }
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
