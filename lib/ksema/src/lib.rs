//! KSEMA key-management appliance client library
//!
//! Session handshake, the shared operation envelope, and the backup container codec.

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

pub mod backup;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod return_code;
pub mod session;
pub mod transport;
pub mod types;

pub use backup::{BackupContainer, BackupFile};
pub use client::KsemaClient;
pub use config::{ClientConfig, Credentials, TrustPolicy};
pub use error::{ErrorKind, KsemaError};
pub use return_code::ReturnCode;
pub use session::{PrivilegeLevel, Session};
pub use transport::{HttpsTransport, Transport};
pub use types::{Operation, ServiceRequest, ServiceResponse};
