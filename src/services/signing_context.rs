//! Remote-backed signing context.
//!
//! A `SigningContext` wraps one materialised identity: the public certificate,
//! a handle to the private key held by the remote authority, and the digest
//! algorithms in effect. It signs digests by asking the authority and
//! verifies signatures locally against the certificate.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;

use crate::domain::constants::SHA1_DIGEST_INFO_PREFIX;
use crate::domain::crypto::{HashAlgorithm, SigningCertificate};
use crate::domain::types::KeyHandle;
use crate::infra::error::{SigningError, SigningResult};
use crate::services::algorithm::{translate, SignatureAlgorithm, WireAlgorithmId};

/// Client for the remote signing authority.
///
/// Implementations own transport and authentication. They must not retry a
/// sign request on timeout.
#[async_trait]
pub trait RemoteSigningClient: Send + Sync {
    /// Ask the authority to sign `digest` with the key behind `key`.
    async fn sign(
        &self,
        key: &KeyHandle,
        algorithm: WireAlgorithmId,
        digest: &[u8],
    ) -> SigningResult<Vec<u8>>;

    /// Release transport resources. Called at most once per context.
    fn close(&self) {}
}

/// Weak reference to a remote key: an identifier plus the client able to use it.
#[derive(Clone)]
pub struct RemoteKey {
    handle: KeyHandle,
    client: Arc<dyn RemoteSigningClient>,
}

impl RemoteKey {
    #[must_use]
    pub fn new(handle: KeyHandle, client: Arc<dyn RemoteSigningClient>) -> Self {
        Self { handle, client }
    }

    #[must_use]
    pub fn handle(&self) -> &KeyHandle {
        &self.handle
    }
}

impl fmt::Debug for RemoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteKey")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Immutable identity used for one signing operation.
///
/// The caller guarantees that `certificate` and `key` belong to the same key
/// pair; nothing here checks it beyond the post-signing verification done by
/// the workflow.
#[derive(Debug, Clone)]
pub struct SigningIdentity {
    pub certificate: SigningCertificate,
    pub key: RemoteKey,
    pub file_digest_algorithm: HashAlgorithm,
    pub pkcs_digest_algorithm: HashAlgorithm,
}

impl SigningIdentity {
    /// Identity using the same digest for file content and PKCS#1 padding.
    #[must_use]
    pub fn new(certificate: SigningCertificate, key: RemoteKey, digest: HashAlgorithm) -> Self {
        Self {
            certificate,
            key,
            file_digest_algorithm: digest,
            pkcs_digest_algorithm: digest,
        }
    }

    #[must_use]
    pub fn with_pkcs_digest(mut self, digest: HashAlgorithm) -> Self {
        self.pkcs_digest_algorithm = digest;
        self
    }
}

/// Signing context over one identity.
pub struct SigningContext {
    identity: SigningIdentity,
    signature_algorithm: SignatureAlgorithm,
    created_at: SystemTime,
    closed: AtomicBool,
}

impl SigningContext {
    #[must_use]
    pub fn new(identity: SigningIdentity) -> Self {
        log::debug!(
            "Opening signing context for key {} ({} / {})",
            identity.key.handle(),
            identity.file_digest_algorithm,
            identity.pkcs_digest_algorithm
        );
        Self {
            identity,
            signature_algorithm: SignatureAlgorithm::Rsa,
            created_at: SystemTime::now(),
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn file_digest_algorithm(&self) -> HashAlgorithm {
        self.identity.file_digest_algorithm
    }

    #[must_use]
    pub fn pkcs_digest_algorithm(&self) -> HashAlgorithm {
        self.identity.pkcs_digest_algorithm
    }

    #[must_use]
    pub fn certificate(&self) -> &SigningCertificate {
        &self.identity.certificate
    }

    #[must_use]
    pub fn key_handle(&self) -> &KeyHandle {
        self.identity.key.handle()
    }

    #[must_use]
    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        self.signature_algorithm
    }

    /// Creation time, diagnostic only.
    #[must_use]
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Sign a precomputed digest with the remote key.
    ///
    /// The digest must have been produced with the PKCS digest algorithm of
    /// the identity. Any failure of the remote call, including a signature of
    /// the wrong size, surfaces as `RemoteSigningError`; no partial result is
    /// returned.
    pub async fn sign_digest(&self, digest: &[u8]) -> SigningResult<Vec<u8>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SigningError::RemoteSigningError(
                "Signing context has already been disposed".to_string(),
            ));
        }

        let pkcs_digest = self.pkcs_digest_algorithm();
        if digest.len() != pkcs_digest.digest_size() {
            return Err(SigningError::CryptographicError(format!(
                "Digest is {} bytes, {} requires {}",
                digest.len(),
                pkcs_digest,
                pkcs_digest.digest_size()
            )));
        }

        let algorithm = translate(self.signature_algorithm, pkcs_digest)?;
        let payload = if algorithm.requires_digest_info() {
            [SHA1_DIGEST_INFO_PREFIX, digest].concat()
        } else {
            digest.to_vec()
        };

        log::debug!(
            "Requesting {} signature from key {}",
            algorithm,
            self.key_handle()
        );
        let signature = self
            .identity
            .key
            .client
            .sign(self.key_handle(), algorithm, &payload)
            .await
            .map_err(|e| match e {
                SigningError::RemoteSigningError(_) => e,
                other => SigningError::RemoteSigningError(other.to_string()),
            })?;

        let expected = self.certificate().signature_size()?;
        if signature.len() != expected {
            return Err(SigningError::RemoteSigningError(format!(
                "Remote authority returned a {} byte signature, expected {expected}",
                signature.len()
            )));
        }

        Ok(signature)
    }

    /// Verify a signature locally with the certificate's public key.
    ///
    /// Never contacts the remote authority. A wrong signature yields
    /// `Ok(false)`.
    pub fn verify_digest(&self, digest: &[u8], signature: &[u8]) -> SigningResult<bool> {
        self.identity
            .certificate
            .verify_digest(self.pkcs_digest_algorithm(), digest, signature)
    }

    /// Release transport handles. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            log::debug!("Closing signing context for key {}", self.key_handle());
            self.identity.key.client.close();
        }
    }
}

impl Drop for SigningContext {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for SigningContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningContext")
            .field("key", self.key_handle())
            .field("signature_algorithm", &self.signature_algorithm)
            .field("file_digest", &self.identity.file_digest_algorithm)
            .field("pkcs_digest", &self.identity.pkcs_digest_algorithm)
            .finish()
    }
}
