//! Session handshake and privilege gating

use std::fmt;

use crate::config::Credentials;
use crate::error::KsemaError;
use crate::transport::{AUTH_PATH, Transport};
use crate::types::{AuthRequest, AuthResponse};

/// Privilege level reported by the handshake (`userType`).
///
/// Levels are ordered. The user-object level is the threshold: identities above it
/// must name a key explicitly, and identities at it export key pairs on backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PrivilegeLevel(i64);

impl PrivilegeLevel {
    pub const USER_OBJECT: PrivilegeLevel = PrivilegeLevel(2);

    pub fn new(level: i64) -> Self {
        Self(level)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn requires_label(&self) -> bool {
        *self > Self::USER_OBJECT
    }

    /// Backups carry a secondary export block at this level.
    pub fn exports_key_pair(&self) -> bool {
        *self == Self::USER_OBJECT
    }
}

impl fmt::Display for PrivilegeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity bound to one successful handshake. Immutable; expiry requires a new handshake.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    id: String,
    privilege: PrivilegeLevel,
}

impl Session {
    pub fn new(id: impl Into<String>, privilege: PrivilegeLevel) -> Self {
        Self {
            id: id.into(),
            privilege,
        }
    }

    /// Perform the handshake. No retry is attempted.
    pub async fn establish<T: Transport + ?Sized>(
        transport: &T,
        credentials: &Credentials,
    ) -> Result<Self, KsemaError> {
        let request = AuthRequest {
            pass_key: credentials.pass_key.clone(),
            api_key: credentials.api_key.clone(),
            pin: credentials.pin.clone(),
        };
        let body = serde_json::to_vec(&request)?;

        let response = transport.post(AUTH_PATH, body).await?;
        let response: AuthResponse = serde_json::from_slice(&response)?;

        if !response.success {
            let message = if response.error.is_empty() {
                "authentication request was declined".to_string()
            } else {
                response.error
            };
            tracing::warn!("Handshake rejected: {}", message);
            return Err(KsemaError::AuthRejected(message));
        }

        let session = Self::new(
            response.data.session_id,
            PrivilegeLevel::new(response.data.user_type),
        );
        tracing::info!(
            "Session {} established at privilege level {}",
            session.short_id(),
            session.privilege
        );

        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn privilege(&self) -> PrivilegeLevel {
        self.privilege
    }

    /// Fails before any network call when this identity must name a key and did not.
    pub fn require_label(&self, label: &str) -> Result<(), KsemaError> {
        if self.privilege.requires_label() && label.is_empty() {
            return Err(KsemaError::LabelRequired);
        }
        Ok(())
    }

    /// Loggable prefix of the session id.
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &format!("{}...", self.short_id()))
            .field("privilege", &self.privilege)
            .finish()
    }
}
