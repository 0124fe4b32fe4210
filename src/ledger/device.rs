use serde::Deserialize;
use utoipa::ToSchema;

use crate::error::LedgerError;
use crate::model::device::{Device, NewDevice};
use crate::store::AttendanceStore;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({ "name": "Entrance", "model": "ZKTeco K40", "ip_address": "10.0.0.20", "port": 80 }))]
pub struct DeviceRegistration {
    pub name: String,
    pub model: Option<String>,
    /// Address of the terminal bridge; omit for push-only terminals
    pub ip_address: Option<String>,
    pub port: Option<i32>,
}

fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Adds a terminal to the catalog, active and never synced.
pub async fn register<S: AttendanceStore>(
    store: &S,
    input: &DeviceRegistration,
) -> Result<Device, LedgerError> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(LedgerError::validation("name is required"));
    }
    if let Some(port) = input.port {
        if !(1..=65535).contains(&port) {
            return Err(LedgerError::validation(format!("port {port} is out of range")));
        }
    }

    let id = store
        .insert_device(&NewDevice {
            name: name.to_string(),
            model: clean(input.model.as_deref()),
            ip_address: clean(input.ip_address.as_deref()),
            port: input.port,
        })
        .await?;
    let device = store
        .find_device(id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Device {id}")))?;

    tracing::info!(device_id = id, name = %device.name, "Device registered");
    Ok(device)
}

pub async fn list<S: AttendanceStore>(store: &S, active_only: bool) -> Result<Vec<Device>, LedgerError> {
    store.list_devices(active_only).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use chrono::NaiveDate;

    fn registration(name: &str, port: Option<i32>) -> DeviceRegistration {
        DeviceRegistration {
            name: name.into(),
            model: Some("  ".into()),
            ip_address: Some(" 10.0.0.21 ".into()),
            port,
        }
    }

    #[actix_web::test]
    async fn registered_devices_are_listed_with_their_sync_time() {
        let store = MemoryStore::default();
        let synced = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap().and_hms_opt(7, 0, 0).unwrap();
        store.add_device(Device {
            id: 1,
            name: "Entrance".into(),
            model: None,
            ip_address: None,
            port: None,
            active: true,
            last_synced_at: Some(synced),
        });
        store.add_device(Device {
            id: 2,
            name: "Old warehouse".into(),
            model: None,
            ip_address: None,
            port: None,
            active: false,
            last_synced_at: None,
        });

        let added = register(&store, &registration(" Workshop ", Some(4370))).await.unwrap();
        assert_eq!(added.id, 3);
        assert_eq!(added.name, "Workshop");
        assert_eq!(added.model, None);
        assert_eq!(added.ip_address.as_deref(), Some("10.0.0.21"));
        assert!(added.active);
        assert_eq!(added.last_synced_at, None);

        let active = list(&store, true).await.unwrap();
        assert_eq!(active.iter().map(|d| d.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(active[0].last_synced_at, Some(synced));
        assert_eq!(list(&store, false).await.unwrap().len(), 3);
    }

    #[actix_web::test]
    async fn registration_checks_name_and_port() {
        let store = MemoryStore::default();
        let nameless = register(&store, &registration("  ", None)).await.unwrap_err();
        let bad_port = register(&store, &registration("Gate", Some(70000))).await.unwrap_err();

        assert!(matches!(nameless, LedgerError::Validation(_)));
        assert!(matches!(bad_port, LedgerError::Validation(_)));
        assert!(list(&store, false).await.unwrap().is_empty());
    }
}
