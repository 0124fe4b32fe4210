use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::LedgerError;
use crate::ledger::aggregator;
use crate::ledger::policy::AttendancePolicy;
use crate::model::clock_event::RawClockEvent;
use crate::model::device::{DeviceMapping, MANUAL_DEVICE_ID, NewDeviceMapping};
use crate::store::{AttendanceStore, LeaveStore, OrphanFilter};

/// Picks the mapping for an event: device-specific first, then device-agnostic.
pub fn pick_mapping(candidates: &[DeviceMapping], device_id: u64) -> Option<&DeviceMapping> {
    let active = || candidates.iter().filter(|m| m.active);
    active()
        .find(|m| m.device_id == Some(device_id))
        .or_else(|| active().find(|m| m.device_id.is_none()))
}

/// Personnel behind `(device_id, external_user_id)`, or `None` when unmapped.
pub async fn resolve<S: AttendanceStore>(
    store: &S,
    device_id: u64,
    external_user_id: &str,
) -> Result<Option<u64>, LedgerError> {
    let candidates = store.mapping_candidates(external_user_id).await?;
    Ok(pick_mapping(&candidates, device_id).map(|m| m.personnel_id))
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({ "external_user_id": "42", "device_id": 1, "badge_number": "B-0042" }))]
pub struct MappingInput {
    pub external_user_id: String,
    /// Omit to accept the user id from any terminal
    pub device_id: Option<u64>,
    pub badge_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MappingOutcome {
    pub mapping: DeviceMapping,
    /// Days whose presence was recomputed after orphan events were attached.
    #[schema(value_type = Vec<String>)]
    pub reaggregated_days: Vec<NaiveDate>,
}

/// Creates or updates the active mapping of a personnel, then attaches the orphan
/// events it now explains and recomputes their days.
pub async fn upsert<S: AttendanceStore + LeaveStore>(
    store: &S,
    policy: &AttendancePolicy,
    personnel_id: u64,
    input: &MappingInput,
    now: NaiveDateTime,
) -> Result<MappingOutcome, LedgerError> {
    let external_user_id = input.external_user_id.trim();
    if external_user_id.is_empty() {
        return Err(LedgerError::validation("external_user_id is required"));
    }

    store
        .find_personnel(personnel_id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Personnel {personnel_id}")))?;
    if let Some(device_id) = input.device_id.filter(|id| *id != MANUAL_DEVICE_ID) {
        store
            .find_device(device_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("Device {device_id}")))?;
    }

    let bound_elsewhere = store
        .mapping_candidates(external_user_id)
        .await?
        .into_iter()
        .find(|m| m.active && m.personnel_id != personnel_id);
    if let Some(other) = bound_elsewhere {
        return Err(LedgerError::conflict(format!(
            "External user id {external_user_id} is already mapped to personnel {}",
            other.personnel_id
        )));
    }

    let mapping = NewDeviceMapping {
        personnel_id,
        external_user_id: external_user_id.to_string(),
        device_id: input.device_id,
        badge_number: input
            .badge_number
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string),
    };
    match store.active_mapping_for(personnel_id).await? {
        Some(current) => store.update_mapping(current.id, &mapping, now).await?,
        None => {
            store.insert_mapping(&mapping, now).await?;
        }
    }

    let days = store
        .attach_orphans(external_user_id, input.device_id, personnel_id)
        .await?;
    for day in &days {
        if let Err(e) = aggregator::aggregate_day(store, policy, personnel_id, *day).await {
            tracing::warn!(error = %e, personnel_id, date = %day, "Re-aggregation after mapping failed");
        }
    }

    tracing::info!(
        personnel_id,
        external_user_id,
        device_id = ?input.device_id,
        reattached_days = days.len(),
        "Device mapping saved"
    );

    let mapping = store
        .active_mapping_for(personnel_id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Mapping for personnel {personnel_id}")))?;
    Ok(MappingOutcome {
        mapping,
        reaggregated_days: days,
    })
}

/// Soft delete: the row stays for the audit trail of past events.
pub async fn deactivate<S: AttendanceStore>(
    store: &S,
    personnel_id: u64,
    now: NaiveDateTime,
) -> Result<(), LedgerError> {
    if store.deactivate_mapping(personnel_id, now).await? == 0 {
        return Err(LedgerError::not_found(format!(
            "Active mapping for personnel {personnel_id}"
        )));
    }
    tracing::info!(personnel_id, "Device mapping deactivated");
    Ok(())
}

pub async fn list<S: AttendanceStore>(store: &S) -> Result<Vec<DeviceMapping>, LedgerError> {
    store.list_active_mappings().await
}

pub async fn orphans<S: AttendanceStore>(
    store: &S,
    filter: &OrphanFilter,
) -> Result<Vec<RawClockEvent>, LedgerError> {
    store.orphan_events(filter).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::clock_event::{ClockEventType, NewRawClockEvent};
    use crate::model::device::Device;
    use crate::model::personnel::{Personnel, PersonnelStatus};
    use crate::model::presence::PresenceStatus;
    use crate::store::memory::MemoryStore;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn mapping(id: u64, personnel_id: u64, device_id: Option<u64>) -> DeviceMapping {
        DeviceMapping {
            id,
            personnel_id,
            external_user_id: "42".into(),
            device_id,
            badge_number: None,
            active: true,
            created_at: now(),
            modified_at: None,
        }
    }

    fn store() -> MemoryStore {
        let store = MemoryStore::default();
        for id in [7, 8] {
            store.add_personnel(Personnel {
                id,
                employee_code: format!("LAB-{id:03}"),
                first_name: "Nadia".into(),
                last_name: "Saidi".into(),
                email: None,
                phone: None,
                hire_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                status: PersonnelStatus::Active,
            });
        }
        store.add_device(Device {
            id: 1,
            name: "Entrance".into(),
            model: Some("ZK-K40".into()),
            ip_address: Some("10.0.0.20".into()),
            port: Some(4370),
            active: true,
            last_synced_at: None,
        });
        store
    }

    fn input(external_user_id: &str, device_id: Option<u64>) -> MappingInput {
        MappingInput {
            external_user_id: external_user_id.into(),
            device_id,
            badge_number: Some(" ".into()),
        }
    }

    #[test]
    fn exact_device_match_beats_the_generic_mapping() {
        let candidates = vec![mapping(1, 7, None), mapping(2, 8, Some(3))];
        assert_eq!(pick_mapping(&candidates, 3).map(|m| m.personnel_id), Some(8));
        assert_eq!(pick_mapping(&candidates, 5).map(|m| m.personnel_id), Some(7));

        let mut inactive = mapping(3, 9, Some(5));
        inactive.active = false;
        let candidates = vec![inactive];
        assert_eq!(pick_mapping(&candidates, 5), None);
    }

    #[actix_web::test]
    async fn upsert_updates_the_existing_mapping() {
        let store = store();
        let policy = AttendancePolicy::default();

        let created = upsert(&store, &policy, 7, &input("42", Some(1)), now()).await.unwrap();
        let updated = upsert(&store, &policy, 7, &input(" 43 ", None), now()).await.unwrap();

        assert_eq!(created.mapping.id, updated.mapping.id);
        assert_eq!(updated.mapping.external_user_id, "43");
        assert_eq!(updated.mapping.device_id, None);
        assert_eq!(updated.mapping.badge_number, None);
        assert_eq!(updated.mapping.modified_at, Some(now()));
        assert_eq!(store.list_active_mappings().await.unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn external_id_cannot_serve_two_people() {
        let store = store();
        let policy = AttendancePolicy::default();
        upsert(&store, &policy, 7, &input("42", None), now()).await.unwrap();

        let err = upsert(&store, &policy, 8, &input("42", Some(1)), now()).await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));

        deactivate(&store, 7, now()).await.unwrap();
        upsert(&store, &policy, 8, &input("42", Some(1)), now()).await.unwrap();
        assert_eq!(resolve(&store, 1, "42").await.unwrap(), Some(8));
    }

    #[actix_web::test]
    async fn mapping_attaches_orphans_and_aggregates_them() {
        let store = store();
        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        store
            .insert_raw_event(&NewRawClockEvent {
                device_id: 1,
                external_user_id: "42".into(),
                resolved_personnel_id: None,
                occurred_at: day.and_hms_opt(8, 5, 0).unwrap(),
                event_type: ClockEventType::CheckIn,
                raw_payload: None,
            })
            .await
            .unwrap();
        assert_eq!(orphans(&store, &OrphanFilter::default()).await.unwrap().len(), 1);

        let outcome = upsert(&store, &AttendancePolicy::default(), 7, &input("42", Some(1)), now())
            .await
            .unwrap();

        assert_eq!(outcome.reaggregated_days, vec![day]);
        assert!(orphans(&store, &OrphanFilter::default()).await.unwrap().is_empty());
        let presence = store.find_presence(7, day).await.unwrap().unwrap();
        assert_eq!(presence.status, PresenceStatus::Present);
        assert_eq!(presence.lateness_minutes, 5);
    }

    #[actix_web::test]
    async fn invalid_inputs_are_rejected() {
        let store = store();
        let policy = AttendancePolicy::default();

        let empty = upsert(&store, &policy, 7, &input("  ", None), now()).await;
        assert!(matches!(empty, Err(LedgerError::Validation(_))));
        let unknown = upsert(&store, &policy, 99, &input("42", None), now()).await;
        assert!(matches!(unknown, Err(LedgerError::NotFound(_))));
        let no_device = upsert(&store, &policy, 7, &input("42", Some(9)), now()).await;
        assert!(matches!(no_device, Err(LedgerError::NotFound(_))));
        assert!(matches!(deactivate(&store, 7, now()).await, Err(LedgerError::NotFound(_))));
    }
}
