//! Client configuration

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::KsemaError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Handshake credentials. Never printed.
#[derive(Clone)]
pub struct Credentials {
    pub pass_key: String,
    pub api_key: String,
    pub pin: String,
}

impl Credentials {
    pub fn new(
        pass_key: impl Into<String>,
        api_key: impl Into<String>,
        pin: impl Into<String>,
    ) -> Self {
        Self {
            pass_key: pass_key.into(),
            api_key: api_key.into(),
            pin: pin.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("pass_key", &"<redacted>")
            .field("api_key", &"<redacted>")
            .field("pin", &"<redacted>")
            .finish()
    }
}

/// How the server certificate is checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Bundled Mozilla root store.
    #[default]
    WebPki,
    /// PEM bundle of trusted CA certificates.
    CustomCa(PathBuf),
    /// No certificate verification. Appliances commonly ship self-signed certificates.
    AcceptInvalid,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    server_address: String,
    credentials: Credentials,
    timeout: Duration,
    trust_policy: TrustPolicy,
}

impl ClientConfig {
    /// `server_address` is `host[:port]`; `https://` is assumed when no scheme is given.
    pub fn new(server_address: &str, credentials: Credentials) -> Self {
        Self {
            server_address: server_address.trim_end_matches('/').to_string(),
            credentials,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            trust_policy: TrustPolicy::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_trust_policy(mut self, trust_policy: TrustPolicy) -> Self {
        self.trust_policy = trust_policy;
        self
    }

    /// Load configuration from `KSEMA_*` environment variables.
    pub fn from_env() -> Result<Self, KsemaError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, KsemaError> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| KsemaError::Config(format!("{} is required", key)))
        };

        let server_address = required("KSEMA_SERVER")?;
        let credentials = Credentials::new(
            required("KSEMA_PASSKEY")?,
            required("KSEMA_API_KEY")?,
            required("KSEMA_PIN")?,
        );

        let timeout_secs = lookup("KSEMA_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let insecure = lookup("KSEMA_INSECURE")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let trust_policy = if insecure {
            TrustPolicy::AcceptInvalid
        } else if let Some(path) = lookup("KSEMA_CA_CERT").filter(|v| !v.is_empty()) {
            TrustPolicy::CustomCa(PathBuf::from(path))
        } else {
            TrustPolicy::WebPki
        };

        Ok(Self::new(&server_address, credentials)
            .with_timeout(Duration::from_secs(timeout_secs))
            .with_trust_policy(trust_policy))
    }

    pub fn server_address(&self) -> &str {
        &self.server_address
    }

    pub fn base_url(&self) -> String {
        if self.server_address.starts_with("https://") || self.server_address.starts_with("http://")
        {
            self.server_address.clone()
        } else {
            format!("https://{}", self.server_address)
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn trust_policy(&self) -> &TrustPolicy {
        &self.trust_policy
    }
}
