//! Polling of the smart gateway JSON endpoint.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::DeviceConfig;

/// Errors raised while reading a snapshot from the gateway.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed calling device: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Failed decoding device response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One status reading as returned by the gateway.
///
/// The gateway reports every value as a string. Keys missing from the
/// response stay empty and unknown keys are ignored. A `null` or a value of
/// another JSON type leaves only that field empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    #[serde(deserialize_with = "string_or_empty")]
    pub heat_energy: String,
    #[serde(deserialize_with = "string_or_empty")]
    pub temp1: String,
    #[serde(deserialize_with = "string_or_empty")]
    pub temp2: String,
    #[serde(deserialize_with = "string_or_empty")]
    pub tempdiff: String,
    #[serde(deserialize_with = "string_or_empty")]
    pub flow: String,
    #[serde(deserialize_with = "string_or_empty")]
    pub volume: String,
}

fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        _ => Ok(String::new()),
    }
}

impl Snapshot {
    /// Decode a snapshot from a raw response body.
    ///
    /// The body must be a JSON object.
    pub fn from_slice(body: &[u8]) -> Result<Self, FetchError> {
        let object: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(body)?;
        Ok(Self::deserialize(serde_json::Value::Object(object))?)
    }
}

/// Something that can produce a fresh [`Snapshot`] on demand.
///
/// Implementations must never fail: errors are logged and an empty
/// snapshot is returned instead.
pub trait SnapshotSource: Send + Sync + 'static {
    fn fetch(&self) -> impl Future<Output = Snapshot> + Send;
}

/// Fetches snapshots over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    url: String,
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher for the given device settings.
    pub fn new(config: &DeviceConfig) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout_ms) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }

        Ok(Self {
            url: config.url.clone(),
            client: builder.build()?,
        })
    }

    /// Perform one GET and decode the body.
    ///
    /// The status code is not inspected; a non-JSON error page is reported
    /// as [`FetchError::Decode`].
    pub async fn try_fetch(&self) -> Result<Snapshot, FetchError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        debug!(
            url = %self.url,
            status = status.as_u16(),
            bytes = body.len(),
            "Device responded"
        );

        Snapshot::from_slice(&body)
    }
}

impl SnapshotSource for HttpFetcher {
    async fn fetch(&self) -> Snapshot {
        match self.try_fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(url = %self.url, error = %e, "Device poll failed, reporting zeros");
                Snapshot::default()
            }
        }
    }
}
