//! HTTP client for a miner's status endpoint.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::telemetry::Telemetry;
use crate::Error;
use crate::utils::http_client::build_client;

/// Upper bound on a single device request.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Path of the status document on the device.
pub const SYSTEM_INFO_PATH: &str = "/api/system/info";

/// Result of one fetch. Failures are values, never panics or propagated errors.
pub type FetchOutcome = std::result::Result<Telemetry, DeviceFailure>;

/// Why a fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Connect,
    Status(u16),
    Malformed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("timeout"),
            Self::Connect => f.write_str("connect"),
            Self::Status(code) => write!(f, "status {code}"),
            Self::Malformed => f.write_str("malformed"),
        }
    }
}

/// A failed fetch, carrying the endpoint and a human-readable cause.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{endpoint} ({kind}): {cause}")]
pub struct DeviceFailure {
    pub endpoint: String,
    pub kind: FailureKind,
    pub cause: String,
}

impl DeviceFailure {
    pub fn new(endpoint: impl Into<String>, kind: FailureKind, cause: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            kind,
            cause: cause.into(),
        }
    }

    /// Whether the device could not be reached at all (as opposed to answering badly).
    pub fn is_unreachable(&self) -> bool {
        !matches!(self.kind, FailureKind::Malformed)
    }
}

impl From<DeviceFailure> for Error {
    fn from(failure: DeviceFailure) -> Self {
        let reason = format!("{}: {}", failure.kind, failure.cause);
        if failure.is_unreachable() {
            Error::DeviceUnreachable {
                endpoint: failure.endpoint,
                reason,
            }
        } else {
            Error::DeviceMalformed {
                endpoint: failure.endpoint,
                reason,
            }
        }
    }
}

/// Fetches the current telemetry of one miner.
#[async_trait]
pub trait DeviceClient: Send + Sync {
    async fn fetch(&self, endpoint: &str) -> FetchOutcome;
}

/// [`DeviceClient`] speaking the device's JSON-over-HTTP status API.
#[derive(Clone)]
pub struct HttpDeviceClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpDeviceClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            timeout,
        }
    }

    /// Reuse an existing client; `timeout` still bounds each request.
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    fn classify(endpoint: &str, err: &reqwest::Error) -> DeviceFailure {
        let kind = if err.is_timeout() {
            FailureKind::Timeout
        } else if err.is_decode() || err.is_body() {
            FailureKind::Malformed
        } else {
            FailureKind::Connect
        };
        DeviceFailure::new(endpoint, kind, err.to_string())
    }
}

impl Default for HttpDeviceClient {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_TIMEOUT)
    }
}

#[async_trait]
impl DeviceClient for HttpDeviceClient {
    async fn fetch(&self, endpoint: &str) -> FetchOutcome {
        let url = format!("{}{}", endpoint.trim_end_matches('/'), SYSTEM_INFO_PATH);

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Self::classify(endpoint, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeviceFailure::new(
                endpoint,
                FailureKind::Status(status.as_u16()),
                format!("GET {url} returned {status}"),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Self::classify(endpoint, &e))?;

        Telemetry::from_system_info(&body)
            .map_err(|cause| DeviceFailure::new(endpoint, FailureKind::Malformed, cause))
    }
}
