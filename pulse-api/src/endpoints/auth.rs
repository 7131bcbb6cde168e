//! Authentication endpoints.
//!
//! The login flow supplies the bearer token that the real-time socket
//! handshake reuses; this crate does not refresh tokens on its own.

use serde::{Deserialize, Serialize};

use pulse_core::error::{PulseError, PulseResult};

use crate::client::ApiClient;
use crate::response::ApiResponse;

/// Payload returned by `/auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginData {
    /// JWT bearer token for subsequent requests and the socket handshake.
    pub token: String,
    /// Display name of the logged-in user.
    #[serde(default)]
    pub username: Option<String>,
}

/// Current-user info returned by `/auth/me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub username: String,
    #[serde(default)]
    pub role: Option<String>,
}

impl ApiClient {
    /// Log in with username/password and store the returned bearer token
    /// on this client. Returns the token for use in the socket handshake.
    pub async fn login(&self, username: &str, password: &str) -> PulseResult<String> {
        let body = serde_json::json!({
            "username": username,
            "password": password,
        });
        let resp: ApiResponse<LoginData> = self.post_json("/auth/login", &body).await?;

        if resp.is_error() {
            return Err(PulseError::AuthFailed(
                resp.error_message().unwrap_or_else(|| "login failed".into()),
            ));
        }

        let data = resp
            .data
            .ok_or_else(|| PulseError::Http("missing login data".into()))?;
        self.set_token(Some(data.token.clone())).await;
        Ok(data.token)
    }

    /// Log out and clear the stored bearer token.
    pub async fn logout(&self) -> PulseResult<()> {
        self.post("/auth/logout", &serde_json::json!({})).await?;
        self.set_token(None).await;
        Ok(())
    }

    /// Get info about the currently authenticated user.
    pub async fn me(&self) -> PulseResult<UserInfo> {
        let resp: ApiResponse<UserInfo> = self.get_json("/auth/me").await?;
        resp.data
            .ok_or_else(|| PulseError::Http("missing user info data".into()))
    }
}
