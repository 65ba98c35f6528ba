//! KSEMA Error Types

use thiserror::Error;

use crate::return_code::ReturnCode;

/// Closed classification of every failure the client can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connectivity, TLS or timeout failure.
    Transport,
    /// Malformed JSON, base64, backup container or backup file.
    Codec,
    /// The handshake reached the server but the credentials were declined.
    AuthRejected,
    /// The envelope came back with `success == false`.
    OperationRejected,
    /// The envelope succeeded but `retCode` was not Success.
    SemanticFailure,
    /// Rejected client-side before any network call.
    Precondition,
}

#[derive(Error, Debug)]
pub enum KsemaError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Backup container overrun reading {field}: need {needed} bytes, {remaining} remaining")]
    ContainerOverrun {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    #[error("Backup container has {0} trailing bytes")]
    TrailingBytes(usize),

    #[error("Invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    #[error("Invalid backup file format")]
    InvalidBackupFile,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Authentication rejected: {0}")]
    AuthRejected(String),

    #[error("Operation rejected: {0}")]
    OperationRejected(String),

    #[error("Operation failed: {0}")]
    SemanticFailure(ReturnCode),

    #[error("No key label specified")]
    LabelRequired,

    #[error("IV must be 16 bytes, got {0}")]
    InvalidIvLength(usize),

    #[error("{field} is {len} bytes, exceeds the 65535 byte limit")]
    FieldTooLong { field: &'static str, len: usize },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl KsemaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http(_) | Self::Tls(_) => ErrorKind::Transport,
            Self::Json(_)
            | Self::Base64(_)
            | Self::ContainerOverrun { .. }
            | Self::TrailingBytes(_)
            | Self::InvalidUtf8(_)
            | Self::InvalidBackupFile
            | Self::Io(_) => ErrorKind::Codec,
            Self::AuthRejected(_) => ErrorKind::AuthRejected,
            Self::OperationRejected(_) => ErrorKind::OperationRejected,
            Self::SemanticFailure(_) => ErrorKind::SemanticFailure,
            Self::LabelRequired
            | Self::InvalidIvLength(_)
            | Self::FieldTooLong { .. }
            | Self::Config(_) => ErrorKind::Precondition,
        }
    }

    /// The return code behind a semantic failure, if any.
    pub fn return_code(&self) -> Option<ReturnCode> {
        match self {
            Self::SemanticFailure(code) => Some(*code),
            _ => None,
        }
    }

    /// Advisory: the server no longer recognises the session and a new handshake is needed.
    pub fn should_rehandshake(&self) -> bool {
        matches!(self, Self::SemanticFailure(ReturnCode::SessionInvalid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KsemaError::SemanticFailure(ReturnCode::PinLocked);
        assert!(err.to_string().contains("PIN Locked"));

        let err = KsemaError::InvalidIvLength(15);
        assert!(err.to_string().contains("15"));

        let err = KsemaError::ContainerOverrun {
            field: "header",
            needed: 10,
            remaining: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("header"));
        assert!(msg.contains("10"));
        assert!(msg.contains("4"));

        assert_eq!(
            KsemaError::InvalidBackupFile.to_string(),
            "Invalid backup file format"
        );
    }

    #[test]
    fn test_error_kinds() {
        let cases = vec![
            (KsemaError::Tls("bad".to_string()), ErrorKind::Transport),
            (KsemaError::TrailingBytes(3), ErrorKind::Codec),
            (KsemaError::InvalidUtf8("header"), ErrorKind::Codec),
            (KsemaError::InvalidBackupFile, ErrorKind::Codec),
            (
                KsemaError::AuthRejected("no".to_string()),
                ErrorKind::AuthRejected,
            ),
            (
                KsemaError::OperationRejected("no".to_string()),
                ErrorKind::OperationRejected,
            ),
            (
                KsemaError::SemanticFailure(ReturnCode::Failed),
                ErrorKind::SemanticFailure,
            ),
            (KsemaError::LabelRequired, ErrorKind::Precondition),
            (KsemaError::InvalidIvLength(17), ErrorKind::Precondition),
            (
                KsemaError::FieldTooLong {
                    field: "data",
                    len: 70000,
                },
                ErrorKind::Precondition,
            ),
            (KsemaError::Config("x".to_string()), ErrorKind::Precondition),
        ];

        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "{}", err);
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: KsemaError = io_err.into();
        assert!(matches!(err, KsemaError::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Codec);
    }

    #[test]
    fn test_from_json_error() {
        let json_result: Result<String, serde_json::Error> = serde_json::from_str("invalid json");
        let err: KsemaError = json_result.unwrap_err().into();
        assert!(matches!(err, KsemaError::Json(_)));
        assert_eq!(err.kind(), ErrorKind::Codec);
    }

    #[test]
    fn test_should_rehandshake() {
        assert!(KsemaError::SemanticFailure(ReturnCode::SessionInvalid).should_rehandshake());
        assert!(!KsemaError::SemanticFailure(ReturnCode::PinIncorrect).should_rehandshake());
        assert!(!KsemaError::LabelRequired.should_rehandshake());
    }

    #[test]
    fn test_return_code_accessor() {
        let err = KsemaError::SemanticFailure(ReturnCode::Unknown(77));
        assert_eq!(err.return_code(), Some(ReturnCode::Unknown(77)));
        assert_eq!(KsemaError::InvalidBackupFile.return_code(), None);
    }
}
