//! Return codes carried inside successful response envelopes

use std::fmt;

/// Semantic outcome of an operation, as reported by the appliance in `retCode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnCode {
    Failed,
    Success,
    NoLabelFound,
    MaxUsageExceeded,
    UnauthorizedFunction,
    InvalidPacket,
    KeyAlreadyExists,
    PinIncorrect,
    PinLocked,
    SessionInvalid,
    InvalidEncryptedData,
    /// Code outside the known table, kept for diagnostics.
    Unknown(i64),
}

const RETURN_CODES: [(i64, ReturnCode); 11] = [
    (0, ReturnCode::Failed),
    (1, ReturnCode::Success),
    (2, ReturnCode::NoLabelFound),
    (3, ReturnCode::MaxUsageExceeded),
    (4, ReturnCode::UnauthorizedFunction),
    (5, ReturnCode::InvalidPacket),
    (6, ReturnCode::KeyAlreadyExists),
    (7, ReturnCode::PinIncorrect),
    (8, ReturnCode::PinLocked),
    (9, ReturnCode::SessionInvalid),
    (10, ReturnCode::InvalidEncryptedData),
];

impl ReturnCode {
    /// Map a raw `retCode` to its kind. Never fails.
    pub fn resolve(code: i64) -> Self {
        RETURN_CODES
            .iter()
            .find(|(raw, _)| *raw == code)
            .map(|(_, kind)| *kind)
            .unwrap_or(Self::Unknown(code))
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Unknown(code) => *code,
            known => RETURN_CODES
                .iter()
                .find(|(_, kind)| kind == known)
                .map(|(raw, _)| *raw)
                .unwrap_or_default(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Failed => "Failure",
            Self::Success => "Success",
            Self::NoLabelFound => "No Label Found",
            Self::MaxUsageExceeded => "Max Usage",
            Self::UnauthorizedFunction => "Unauthorized Function",
            Self::InvalidPacket => "Invalid Packet",
            Self::KeyAlreadyExists => "Key Already Existed",
            Self::PinIncorrect => "PIN Incorrect",
            Self::PinLocked => "PIN Locked",
            Self::SessionInvalid => "Session Invalid",
            Self::InvalidEncryptedData => "Invalid Encrypted Data",
            Self::Unknown(_) => "Unknown return",
        }
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "{} ({})", self.message(), code),
            _ => write!(f, "{}", self.message()),
        }
    }
}
