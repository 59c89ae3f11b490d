//! Bulk fetch of the fleet inventory from the remote record store.

use std::sync::Arc;
use std::time::Duration;

use fd_protocol::FleetRecord;
use log::{info, warn};
use reqwest::Client;
use serde_json::Value;

use crate::credential::CredentialProvider;
use crate::error::GatewayError;
use crate::transport::{bounded, with_reauth};

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(30);

/// Object keys that may hold the record array in a store response.
const LIST_KEYS: &[&str] = &["vehicles", "records", "Items"];

/// Reads every record from the store in one request.
///
/// Failures use the same classification as the agent gateway.
pub struct RecordStore {
    http: Client,
    endpoint: String,
    timeout: Duration,
    credentials: Arc<CredentialProvider>,
}

impl RecordStore {
    pub fn new(
        http: Client,
        endpoint: impl Into<String>,
        credentials: Arc<CredentialProvider>,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            timeout: DEFAULT_STORE_TIMEOUT,
            credentials,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn fetch_all(&self) -> Result<Vec<FleetRecord>, GatewayError> {
        let body = with_reauth(&self.credentials, self.timeout, |credential| {
            let request = self
                .http
                .get(&self.endpoint)
                .header("authorization", credential.authorization_header())
                .header("accept", "application/json");
            bounded(request, self.timeout)
        })
        .await?;

        let records = parse_listing(&body)?;
        info!(
            "fetched fleet records (endpoint={}, count={})",
            self.endpoint,
            records.len()
        );
        Ok(records)
    }
}

/// Accepts a bare array or an object carrying the array under a known key.
fn parse_listing(body: &str) -> Result<Vec<FleetRecord>, GatewayError> {
    let value: Value = serde_json::from_str(body).map_err(|e| GatewayError::Parse {
        message: format!("record listing is not JSON: {e}"),
        source: None,
    })?;

    let items = match &value {
        Value::Array(items) => items,
        Value::Object(object) => LIST_KEYS
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_array))
            .ok_or_else(|| GatewayError::Parse {
                message: "record listing has no record array".to_string(),
                source: None,
            })?,
        _ => {
            return Err(GatewayError::Parse {
                message: "record listing is neither an array nor an object".to_string(),
                source: None,
            })
        }
    };

    let mut records = Vec::with_capacity(items.len());
    let mut skipped = 0usize;
    for item in items {
        match serde_json::from_value::<FleetRecord>(item.clone()) {
            Ok(record) => records.push(record),
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!("skipped unreadable records in listing (count={skipped})");
    }
    Ok(records)
}
