use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::LedgerError;
use crate::model::device::Device;

/// One punch as reported by a terminal or its bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "emp_code": "42",
    "punch_time": "2024-03-04 08:15:00",
    "punch_state": "0",
    "terminal_sn": "CQZ7224460212"
}))]
pub struct VendorClockEvent {
    /// User id enrolled on the terminal
    pub emp_code: String,
    /// `YYYY-MM-DD HH:MM:SS`, ISO 8601 or RFC 3339
    pub punch_time: String,
    /// `0`/`in` for check-in, `1`/`out` for check-out
    pub punch_state: Option<String>,
    #[serde(default)]
    pub terminal_sn: Option<String>,
}

/// Fetches pending punches from a physical terminal.
pub trait TerminalDriver: Send + Sync {
    fn fetch_events(
        &self,
        device: &Device,
    ) -> impl Future<Output = Result<Vec<VendorClockEvent>, LedgerError>> + Send;
}

#[derive(Debug, Deserialize)]
struct TransactionPage {
    #[serde(default)]
    next: Option<String>,
    data: Vec<VendorClockEvent>,
}

const MAX_PAGES: usize = 50;

/// Reads the iclock transaction API exposed by a terminal bridge at the device address.
#[derive(Debug, Clone)]
pub struct HttpBridgeDriver {
    client: reqwest::Client,
}

impl HttpBridgeDriver {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn first_page_url(device: &Device) -> Result<String, LedgerError> {
        let host = device
            .ip_address
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| LedgerError::validation(format!("Device {} has no address", device.id)))?;
        let port = device.port.unwrap_or(80);
        let mut url = format!("http://{host}:{port}/iclock/api/transactions/?page_size=500");
        if let Some(since) = device.last_synced_at {
            url.push_str(&format!("&start_time={}", since.format("%Y-%m-%d%%20%H:%M:%S")));
        }
        Ok(url)
    }
}

fn unreachable(device: &Device, e: reqwest::Error) -> LedgerError {
    LedgerError::DeviceUnreachable(format!("device {}: {e}", device.id))
}

impl TerminalDriver for HttpBridgeDriver {
    async fn fetch_events(&self, device: &Device) -> Result<Vec<VendorClockEvent>, LedgerError> {
        let mut url = Some(Self::first_page_url(device)?);
        let mut events = Vec::new();

        for _ in 0..MAX_PAGES {
            let Some(current) = url.take() else { break };
            let page: TransactionPage = self
                .client
                .get(&current)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| unreachable(device, e))?
                .json()
                .await
                .map_err(|e| unreachable(device, e))?;

            tracing::debug!(device_id = device.id, fetched = page.data.len(), "Bridge page read");
            events.extend(page.data);
            url = page.next;
        }
        if url.is_some() {
            tracing::warn!(device_id = device.id, "Bridge still has pages; the rest is left for the next run");
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn device() -> Device {
        Device {
            id: 3,
            name: "Lab B".into(),
            model: None,
            ip_address: Some("10.0.0.21".into()),
            port: Some(8081),
            active: true,
            last_synced_at: None,
        }
    }

    #[test]
    fn bridge_url_includes_the_last_sync() {
        let mut device = device();
        assert_eq!(
            HttpBridgeDriver::first_page_url(&device).unwrap(),
            "http://10.0.0.21:8081/iclock/api/transactions/?page_size=500"
        );

        device.last_synced_at = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap().and_hms_opt(6, 30, 0);
        assert!(
            HttpBridgeDriver::first_page_url(&device)
                .unwrap()
                .ends_with("&start_time=2024-03-04%2006:30:00")
        );
    }

    #[test]
    fn device_without_address_is_rejected() {
        let mut device = device();
        device.ip_address = Some("  ".into());
        assert!(matches!(
            HttpBridgeDriver::first_page_url(&device),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn bridge_pages_ignore_unknown_fields() {
        let page: TransactionPage = serde_json::from_value(serde_json::json!({
            "count": 1,
            "next": null,
            "msg": "",
            "code": 0,
            "data": [{
                "id": 1,
                "emp_code": "42",
                "punch_time": "2024-03-04 08:15:00",
                "punch_state": "0",
                "verify_type": 1,
                "terminal_sn": "CQZ7224460212"
            }]
        }))
        .unwrap();

        assert_eq!(page.next, None);
        assert_eq!(page.data[0].emp_code, "42");
        assert_eq!(page.data[0].punch_state.as_deref(), Some("0"));
    }
}
