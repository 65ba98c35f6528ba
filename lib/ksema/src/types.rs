//! Wire types for the appliance's JSON API

use std::fmt;

use serde::{Deserialize, Serialize};

/// Operation names accepted by `/api/hsm/request`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Ping,
    Encrypt,
    Decrypt,
    Sign,
    Verify,
    #[serde(rename = "RNG")]
    Random,
    Backup,
    Restore,
    Delete,
    #[serde(rename = "GENKEYSYM")]
    GenKeySym,
    #[serde(rename = "GENKEYASYM")]
    GenKeyAsym,
    #[serde(rename = "SETIV")]
    SetIv,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ping => "PING",
            Self::Encrypt => "ENCRYPT",
            Self::Decrypt => "DECRYPT",
            Self::Sign => "SIGN",
            Self::Verify => "VERIFY",
            Self::Random => "RNG",
            Self::Backup => "BACKUP",
            Self::Restore => "RESTORE",
            Self::Delete => "DELETE",
            Self::GenKeySym => "GENKEYSYM",
            Self::GenKeyAsym => "GENKEYASYM",
            Self::SetIv => "SETIV",
        }
    }

    /// Operations whose result `message` is base64-encoded binary.
    pub fn returns_binary(&self) -> bool {
        matches!(
            self,
            Self::Encrypt | Self::Decrypt | Self::Sign | Self::Random | Self::Backup
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==================== Handshake ====================

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    pub pass_key: String,
    pub api_key: String,
    pub pin: String,
}

impl fmt::Debug for AuthRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthRequest").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthData {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub user_type: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    #[serde(default)]
    pub data: AuthData,
    #[serde(default)]
    pub error: String,
}

// ==================== Operation envelope ====================

/// Request envelope. `data` travels as a JSON array of byte values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub session_id: String,
    pub operation: Operation,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub data: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseData {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub ret_code: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResponse {
    pub success: bool,
    #[serde(default)]
    pub data: ResponseData,
    #[serde(default)]
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_wire_names() {
        let ops = [
            Operation::Ping,
            Operation::Encrypt,
            Operation::Decrypt,
            Operation::Sign,
            Operation::Verify,
            Operation::Random,
            Operation::Backup,
            Operation::Restore,
            Operation::Delete,
            Operation::GenKeySym,
            Operation::GenKeyAsym,
            Operation::SetIv,
        ];
        for op in ops {
            let json = serde_json::to_string(&op).unwrap();
            assert_eq!(json, format!("\"{}\"", op.as_str()));
            let parsed: Operation = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, op);
        }
    }

    #[test]
    fn test_request_data_is_byte_array() {
        let request = ServiceRequest {
            session_id: "sess".to_string(),
            operation: Operation::Encrypt,
            label: String::new(),
            data: Some(b"hi".to_vec()),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "sessionId": "sess",
                "operation": "ENCRYPT",
                "label": "",
                "data": [104, 105]
            })
        );
    }

    #[test]
    fn test_request_without_data_sends_null() {
        let request = ServiceRequest {
            session_id: "sess".to_string(),
            operation: Operation::Ping,
            label: String::new(),
            data: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json["data"].is_null());
    }

    #[test]
    fn test_response_tolerates_missing_fields() {
        let response: ServiceResponse = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert!(!response.success);
        assert!(response.error.is_empty());
        assert_eq!(response.data.ret_code, 0);
    }

    #[test]
    fn test_auth_response_parsing() {
        let response: AuthResponse = serde_json::from_str(
            r#"{"success": true, "data": {"sessionId": "abc", "userType": 3}, "error": ""}"#,
        )
        .unwrap();
        assert!(response.success);
        assert_eq!(response.data.session_id, "abc");
        assert_eq!(response.data.user_type, 3);
    }

    #[test]
    fn test_auth_request_debug_hides_secrets() {
        let request = AuthRequest {
            pass_key: "secret-pass".to_string(),
            api_key: "secret-api".to_string(),
            pin: "1234".to_string(),
        };
        let debug = format!("{:?}", request);
        assert!(!debug.contains("secret"));
        assert!(!debug.contains("1234"));
    }
}
