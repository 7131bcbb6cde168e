//! Server response types.
//!
//! All Pulse server REST responses follow a common envelope format
//! with an application-level code, a message, and optional data.

use serde::{Deserialize, Serialize};

/// Standard server response envelope.
///
/// All REST API responses from the Pulse server follow this format:
/// ```json
/// { "code": 200, "msg": "ok", "data": { ... } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T = serde_json::Value> {
    /// Application-level status code (200 = success).
    pub code: u16,
    /// Human-readable message.
    #[serde(default)]
    pub msg: String,
    /// Response payload data (type varies by endpoint).
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Whether the response indicates success (code 200).
    pub fn is_success(&self) -> bool {
        self.code == 200
    }

    /// Whether the response indicates an error.
    pub fn is_error(&self) -> bool {
        self.code != 200
    }

    /// Get the error message if this is an error response.
    pub fn error_message(&self) -> Option<String> {
        if self.is_error() {
            Some(self.msg.clone())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_success() {
        let json = r#"{"code":200,"msg":"ok","data":{"token":"abc"}}"#;
        let resp: ApiResponse = serde_json::from_str(json).unwrap();
        assert!(resp.is_success());
        assert!(resp.error_message().is_none());
    }

    #[test]
    fn test_response_error() {
        let json = r#"{"code":401,"msg":"invalid credentials"}"#;
        let resp: ApiResponse = serde_json::from_str(json).unwrap();
        assert!(resp.is_error());
        assert_eq!(resp.error_message().unwrap(), "invalid credentials");
    }

    #[test]
    fn test_response_missing_msg() {
        let json = r#"{"code":200,"data":[1,2,3]}"#;
        let resp: ApiResponse = serde_json::from_str(json).unwrap();
        assert!(resp.is_success());
        assert_eq!(resp.msg, "");
    }
}
