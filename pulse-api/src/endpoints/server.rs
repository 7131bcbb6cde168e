//! Server status endpoints.

use serde::{Deserialize, Serialize};

use pulse_core::error::PulseResult;

use crate::client::ApiClient;
use crate::response::ApiResponse;

/// Health snapshot returned by `/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthInfo {
    pub status: Option<String>,
    pub version: Option<String>,
    pub uptime_secs: Option<u64>,
}

impl ApiClient {
    /// Ping the server. Returns true if the server answers the health route.
    pub async fn ping(&self) -> PulseResult<bool> {
        let resp: ApiResponse = self.get_json("/health").await?;
        Ok(resp.is_success())
    }

    /// Get the server health snapshot (status, version, uptime).
    pub async fn health(&self) -> PulseResult<HealthInfo> {
        let resp: ApiResponse<HealthInfo> = self.get_json("/health").await?;
        resp.data
            .ok_or_else(|| pulse_core::error::PulseError::Http("missing health data".into()))
    }
}
