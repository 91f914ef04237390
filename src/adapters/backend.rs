//! Signing backend abstraction.
//!
//! The command layer talks to a `SigningBackend` to turn validated options
//! into a concrete identity and, when asked, a timestamp authority. The Key
//! Vault backend is the production implementation; tests substitute their
//! own.

use std::sync::Arc;

use async_trait::async_trait;

use crate::adapters::timestamp_http_client::{TimestampHttpClient, TimestampHttpConfig};
use crate::adapters::vault::{KeyVaultClient, KeyVaultConfig};
use crate::domain::crypto::HashAlgorithm;
use crate::domain::types::{KeyName, TimestampUrl, VaultCredentials};
use crate::infra::config::SignerConfiguration;
use crate::infra::error::SigningResult;
use crate::services::signing_context::{RemoteKey, SigningIdentity};
use crate::services::timestamp::TimestampAuthority;

/// Everything needed to reach one key in one vault.
#[derive(Debug, Clone)]
pub struct VaultAccess {
    pub vault_url: String,
    pub credentials: VaultCredentials,
    pub key_name: KeyName,
}

/// Source of signing identities and timestamp authorities.
#[async_trait]
pub trait SigningBackend: Send + Sync {
    /// Resolve the certificate and remote key for `access`.
    ///
    /// # Errors
    ///
    /// Returns error if the vault is unreachable, refuses the credentials or
    /// has no such certificate.
    async fn materialize(
        &self,
        access: &VaultAccess,
        file_digest: HashAlgorithm,
        pkcs_digest: HashAlgorithm,
    ) -> SigningResult<SigningIdentity>;

    /// Timestamp authority reachable at `url`.
    ///
    /// # Errors
    ///
    /// Returns error if no client can be built for the URL.
    fn timestamp_authority(&self, url: &TimestampUrl)
        -> SigningResult<Arc<dyn TimestampAuthority>>;
}

/// Backend using Azure Key Vault and RFC 3161 over HTTP.
#[derive(Debug, Clone, Default)]
pub struct AzureKeyVaultBackend {
    settings: SignerConfiguration,
}

impl AzureKeyVaultBackend {
    #[must_use]
    pub fn new(settings: SignerConfiguration) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &SignerConfiguration {
        &self.settings
    }
}

#[async_trait]
impl SigningBackend for AzureKeyVaultBackend {
    async fn materialize(
        &self,
        access: &VaultAccess,
        file_digest: HashAlgorithm,
        pkcs_digest: HashAlgorithm,
    ) -> SigningResult<SigningIdentity> {
        let config = KeyVaultConfig::new(&access.vault_url, &self.settings)?;
        let client = Arc::new(KeyVaultClient::new(config, access.credentials.clone())?);

        log::info!("Fetching certificate '{}' from Key Vault", access.key_name);
        let (certificate, handle) = client.get_certificate(&access.key_name).await?;
        log::info!(
            "Using certificate {} (thumbprint {})",
            certificate.subject(),
            certificate.thumbprint()
        );

        let key = RemoteKey::new(handle, client);
        Ok(SigningIdentity::new(certificate, key, file_digest).with_pkcs_digest(pkcs_digest))
    }

    fn timestamp_authority(
        &self,
        url: &TimestampUrl,
    ) -> SigningResult<Arc<dyn TimestampAuthority>> {
        let client = TimestampHttpClient::new(TimestampHttpConfig::new(url.clone(), &self.settings))?;
        Ok(Arc::new(client))
    }
}
