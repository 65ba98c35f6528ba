//! KSEMA API Client

use std::path::{Path, PathBuf};

use crate::backup::{BackupContainer, BackupFile};
use crate::config::{ClientConfig, Credentials};
use crate::envelope::{self, perform, perform_binary};
use crate::error::KsemaError;
use crate::session::Session;
use crate::transport::{HttpsTransport, Transport};
use crate::types::Operation;

/// Authenticated client. Holds one immutable session for its lifetime.
///
/// Operations that name a key (encrypt, decrypt, sign, verify, backup, delete) may omit
/// the label at or below the user-object privilege level; the server then picks the
/// identity's default key. Above that level an empty label fails before any request.
pub struct KsemaClient<T: Transport = HttpsTransport> {
    transport: T,
    session: Session,
}

impl KsemaClient<HttpsTransport> {
    /// Build the HTTPS transport and perform the handshake.
    pub async fn connect(config: &ClientConfig) -> Result<Self, KsemaError> {
        let transport = HttpsTransport::new(config)?;
        Self::with_transport(transport, config.credentials()).await
    }
}

impl<T: Transport> KsemaClient<T> {
    /// Perform the handshake over a caller-supplied transport.
    pub async fn with_transport(transport: T, credentials: &Credentials) -> Result<Self, KsemaError> {
        let session = Session::establish(&transport, credentials).await?;
        Ok(Self { transport, session })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn ping(&self) -> Result<(), KsemaError> {
        perform(&self.transport, &self.session, Operation::Ping, "", None).await?;
        Ok(())
    }

    pub async fn encrypt(&self, plaintext: &[u8], label: &str) -> Result<Vec<u8>, KsemaError> {
        self.session.require_label(label)?;
        perform_binary(
            &self.transport,
            &self.session,
            Operation::Encrypt,
            label,
            Some(plaintext.to_vec()),
        )
        .await
    }

    pub async fn decrypt(&self, ciphertext: &[u8], label: &str) -> Result<Vec<u8>, KsemaError> {
        self.session.require_label(label)?;
        perform_binary(
            &self.transport,
            &self.session,
            Operation::Decrypt,
            label,
            Some(ciphertext.to_vec()),
        )
        .await
    }

    pub async fn sign(&self, data: &[u8], label: &str) -> Result<Vec<u8>, KsemaError> {
        self.session.require_label(label)?;
        perform_binary(
            &self.transport,
            &self.session,
            Operation::Sign,
            label,
            Some(data.to_vec()),
        )
        .await
    }

    /// A signature mismatch surfaces as a semantic failure from the server.
    pub async fn verify(&self, data: &[u8], signature: &[u8], label: &str) -> Result<(), KsemaError> {
        self.session.require_label(label)?;
        let payload = envelope::frame_verify_payload(data, signature)?;
        perform(
            &self.transport,
            &self.session,
            Operation::Verify,
            label,
            Some(payload),
        )
        .await?;
        Ok(())
    }

    /// Random bytes. `None` or `Some(0)` lets the server pick its default length.
    pub async fn random(&self, length: Option<u16>) -> Result<Vec<u8>, KsemaError> {
        perform_binary(
            &self.transport,
            &self.session,
            Operation::Random,
            "",
            envelope::random_payload(length),
        )
        .await
    }

    /// Export a key to `path`. Key-pair exporting sessions also get a `priv`-prefixed file.
    /// Returns the files written.
    pub async fn backup(&self, path: &Path, label: &str) -> Result<Vec<PathBuf>, KsemaError> {
        self.session.require_label(label)?;
        let container =
            perform_binary(&self.transport, &self.session, Operation::Backup, label, None).await?;

        let container =
            BackupContainer::parse(&container, self.session.privilege().exports_key_pair())?;
        let written = container.write_files(path)?;
        tracing::info!("Backup written to {} file(s)", written.len());

        Ok(written)
    }

    /// Send the exported material of a backup file back to the appliance.
    pub async fn restore(&self, path: &Path) -> Result<(), KsemaError> {
        let file = BackupFile::read(path)?;
        perform(
            &self.transport,
            &self.session,
            Operation::Restore,
            "",
            Some(file.restore_payload()),
        )
        .await?;
        Ok(())
    }

    pub async fn delete(&self, label: &str) -> Result<(), KsemaError> {
        self.session.require_label(label)?;
        perform(&self.transport, &self.session, Operation::Delete, label, None).await?;
        Ok(())
    }

    /// One label generates a symmetric key; a private label as well generates a key pair.
    pub async fn gen_key(&self, label: &str, private_label: Option<&str>) -> Result<(), KsemaError> {
        let (operation, label) = envelope::gen_key_request(label, private_label);
        perform(&self.transport, &self.session, operation, &label, None).await?;
        Ok(())
    }

    /// Override the IV for the remainder of this session. Must be exactly 16 bytes.
    pub async fn set_iv(&self, iv: &[u8]) -> Result<(), KsemaError> {
        envelope::validate_iv(iv)?;
        perform(
            &self.transport,
            &self.session,
            Operation::SetIv,
            "",
            Some(iv.to_vec()),
        )
        .await?;
        Ok(())
    }
}

impl<T: Transport> std::fmt::Debug for KsemaClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KsemaClient")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrustPolicy;

    #[tokio::test]
    async fn test_connect_fails_without_server() {
        let config = ClientConfig::new("127.0.0.1:1", Credentials::new("a", "b", "c"))
            .with_trust_policy(TrustPolicy::AcceptInvalid)
            .with_timeout(std::time::Duration::from_secs(2));

        let err = KsemaClient::connect(&config).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Transport);
    }
}
