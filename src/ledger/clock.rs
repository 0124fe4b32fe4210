use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::LedgerError;
use crate::ledger::aggregator::{self, AggregationOutcome};
use crate::ledger::policy::AttendancePolicy;
use crate::model::InsertOutcome;
use crate::model::clock_event::{ClockEventType, NewRawClockEvent};
use crate::model::device::MANUAL_DEVICE_ID;
use crate::store::{AttendanceStore, LeaveStore};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ManualClockOutcome {
    pub event_id: u64,
    pub event_type: ClockEventType,
    pub aggregation: AggregationOutcome,
}

/// Records a check-in or check-out made from the application.
///
/// A day alternates strictly: no second check-in while one is open, no check-out
/// without an open check-in.
pub async fn punch<S: AttendanceStore + LeaveStore>(
    store: &S,
    policy: &AttendancePolicy,
    personnel_id: u64,
    event_type: ClockEventType,
    at: NaiveDateTime,
) -> Result<ManualClockOutcome, LedgerError> {
    let personnel = store
        .find_personnel(personnel_id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Personnel {personnel_id}")))?;
    if !personnel.is_active() {
        return Err(LedgerError::validation(format!(
            "Personnel {} is not active",
            personnel.employee_code
        )));
    }

    let date = at.date();
    let day = store.events_for_day(personnel_id, date).await?;
    let open = day
        .iter()
        .filter(|e| e.occurred_at <= at)
        .max_by_key(|e| e.occurred_at)
        .is_some_and(|e| e.event_type == ClockEventType::CheckIn);

    match (event_type, open) {
        (ClockEventType::CheckIn, true) => {
            return Err(LedgerError::conflict("Already checked in; check out first"));
        }
        (ClockEventType::CheckOut, false) => {
            return Err(LedgerError::conflict("No open check-in to close"));
        }
        _ => {}
    }

    let event = NewRawClockEvent {
        device_id: MANUAL_DEVICE_ID,
        external_user_id: personnel.employee_code.clone(),
        resolved_personnel_id: Some(personnel_id),
        occurred_at: at,
        event_type,
        raw_payload: None,
    };
    let event_id = match store.insert_raw_event(&event).await? {
        InsertOutcome::Inserted(id) => id,
        InsertOutcome::Duplicate => {
            return Err(LedgerError::conflict(format!("A punch already exists at {at}")));
        }
    };

    tracing::info!(personnel_id, event_id, event_type = %event_type, "Manual punch recorded");

    let aggregation = aggregator::aggregate_day(store, policy, personnel_id, date).await?;
    Ok(ManualClockOutcome {
        event_id,
        event_type,
        aggregation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::personnel::{Personnel, PersonnelStatus};
    use crate::model::presence::PresenceStatus;
    use crate::store::memory::MemoryStore;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn store(status: PersonnelStatus) -> MemoryStore {
        let store = MemoryStore::default();
        store.add_personnel(Personnel {
            id: 7,
            employee_code: "LAB-007".into(),
            first_name: "Amina".into(),
            last_name: "Benali".into(),
            email: None,
            phone: None,
            hire_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            status,
        });
        store
    }

    #[actix_web::test]
    async fn a_day_alternates_between_in_and_out() {
        let store = store(PersonnelStatus::Active);
        let policy = AttendancePolicy::default();

        let early_out = punch(&store, &policy, 7, ClockEventType::CheckOut, at(7, 0)).await;
        assert!(matches!(early_out, Err(LedgerError::Conflict(_))));

        let checked_in = punch(&store, &policy, 7, ClockEventType::CheckIn, at(8, 10)).await.unwrap();
        assert!(checked_in.aggregation.presence().is_open());

        let twice = punch(&store, &policy, 7, ClockEventType::CheckIn, at(8, 20)).await;
        assert!(matches!(twice, Err(LedgerError::Conflict(_))));

        let checked_out = punch(&store, &policy, 7, ClockEventType::CheckOut, at(16, 10)).await.unwrap();
        let presence = checked_out.aggregation.presence();
        assert_eq!(presence.status, PresenceStatus::Present);
        assert_eq!((presence.lateness_minutes, presence.worked_minutes), (10, 480));
    }

    #[actix_web::test]
    async fn inactive_personnel_cannot_punch() {
        let store = store(PersonnelStatus::Inactive);
        let err = punch(&store, &AttendancePolicy::default(), 7, ClockEventType::CheckIn, at(8, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }
}
