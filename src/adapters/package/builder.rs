//! Signature and timestamp builders over an open script package.

use crate::domain::crypto::{DigestBytes, HashAlgorithm};
use crate::domain::outcome::TimestampOutcome;
use crate::infra::error::{SigningError, SigningResult};
use crate::services::signing_context::SigningContext;
use crate::services::timestamp::TimestampAuthority;

use super::envelope::{signed_info, SignatureEnvelope};
use super::script::ScriptPackage;
use super::ContentPreset;

/// Produces one signature over the enqueued content preset.
pub struct SignatureBuilder<'a> {
    package: &'a mut ScriptPackage,
    preset: Option<ContentPreset>,
}

impl<'a> SignatureBuilder<'a> {
    pub(crate) fn new(package: &'a mut ScriptPackage) -> Self {
        Self {
            package,
            preset: None,
        }
    }

    /// Select the content the signature covers.
    #[must_use]
    pub fn enqueue_preset(mut self, preset: ContentPreset) -> Self {
        self.preset = Some(preset);
        self
    }

    /// Sign and commit.
    ///
    /// The new signature replaces every existing block; callers decide
    /// beforehand whether replacing is allowed. The returned signature is
    /// verified against the certificate before anything is written, so a
    /// failure leaves the file untouched.
    pub async fn sign(self, context: &SigningContext) -> SigningResult<SignedScript<'a>> {
        let preset = self.preset.ok_or_else(|| {
            SigningError::PackageError("No content preset enqueued for signing".to_string())
        })?;

        let content_digest =
            DigestBytes::compute(context.file_digest_algorithm(), &preset.select(self.package));
        let pkcs_digest = context.pkcs_digest_algorithm();
        let digest = pkcs_digest.digest(&signed_info(preset, &content_digest));
        log::debug!(
            "Signing {} content digest {:?}",
            self.package.path().display(),
            content_digest
        );

        let signature = context.sign_digest(&digest).await?;
        if !context.verify_digest(&digest, &signature)? {
            return Err(SigningError::CryptographicError(
                "Signature returned by the remote authority does not match the certificate"
                    .to_string(),
            ));
        }

        let envelope = SignatureEnvelope::new(
            preset,
            &content_digest,
            pkcs_digest,
            &context.signature_algorithm().to_string(),
            &signature,
            context.certificate(),
            context.key_handle().as_str(),
        );
        self.package.commit(vec![envelope])?;

        Ok(SignedScript {
            package: self.package,
        })
    }
}

/// A package whose newest signature was just written.
pub struct SignedScript<'a> {
    package: &'a mut ScriptPackage,
}

impl<'a> SignedScript<'a> {
    pub fn envelope(&self) -> SigningResult<&SignatureEnvelope> {
        self.package.newest_signature().ok_or_else(|| {
            SigningError::PackageError("Package carries no signature".to_string())
        })
    }

    #[must_use]
    pub fn timestamp_builder(self) -> TimestampBuilder<'a> {
        TimestampBuilder {
            package: self.package,
        }
    }
}

/// Adds an RFC 3161 timestamp to the newest signature.
pub struct TimestampBuilder<'a> {
    package: &'a mut ScriptPackage,
}

impl TimestampBuilder<'_> {
    /// Request a timestamp and commit it.
    ///
    /// Every failure is reported as `TimestampOutcome::Failed`; the existing
    /// signature stays in place either way.
    pub async fn sign(
        self,
        authority: &dyn TimestampAuthority,
        digest_algorithm: HashAlgorithm,
    ) -> TimestampOutcome {
        match self.apply(authority, digest_algorithm).await {
            Ok(()) => TimestampOutcome::Success,
            Err(e) => {
                log::error!("Timestamping via {} failed: {e}", authority.authority());
                TimestampOutcome::Failed
            }
        }
    }

    async fn apply(
        self,
        authority: &dyn TimestampAuthority,
        digest_algorithm: HashAlgorithm,
    ) -> SigningResult<()> {
        let mut signatures = self.package.signatures().to_vec();
        let newest = signatures.last_mut().ok_or_else(|| {
            SigningError::PackageError("Package carries no signature to timestamp".to_string())
        })?;

        let token = authority
            .timestamp(&newest.signature_bytes()?, digest_algorithm)
            .await?;
        newest.attach_timestamp(&token);
        self.package.commit(signatures)
    }
}
