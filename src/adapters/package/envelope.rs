//! Signature envelope carried inside a script's signature block.
//!
//! The envelope is JSON, base64 encoded and wrapped into comment lines:
//!
//! ```text
//! # SIG # Begin signature block
//! # eyJ2ZXJzaW9uIjoxLCJwcmVzZXQiOiJQb3dlclNoZWxsU2NyaXB0IiwiZmlsZV9k
//! # ...
//! # SIG # End signature block
//! ```
//!
//! The signature covers the canonical signed-info bytes, not the script body
//! directly; the body is bound through `content_digest`.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::domain::constants::{
    SIG_BLOCK_BEGIN, SIG_BLOCK_END, SIG_BLOCK_LINE_PREFIX, SIG_BLOCK_LINE_WIDTH,
};
use crate::domain::crypto::{DigestBytes, HashAlgorithm, SigningCertificate};
use crate::infra::error::{SigningError, SigningResult};
use crate::services::timestamp::TimestampToken;

use super::ContentPreset;

/// Current envelope format version.
pub const ENVELOPE_VERSION: u32 = 1;

const SIGNED_INFO_TAG: &str = "keyvault-signer/1";

/// Timestamp attached to a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeTimestamp {
    pub authority: String,
    pub digest_algorithm: String,
    /// Base64 DER `TimeStampToken`.
    pub token: String,
}

/// One embedded signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEnvelope {
    pub version: u32,
    pub preset: String,
    pub file_digest_algorithm: String,
    pub pkcs_digest_algorithm: String,
    pub signature_algorithm: String,
    /// Hex digest of the selected content.
    pub content_digest: String,
    /// Base64 PKCS#1 v1.5 signature over the signed-info digest.
    pub signature: String,
    /// Base64 DER signing certificate.
    pub certificate: String,
    pub key_id: String,
    /// Seconds since the Unix epoch.
    pub signed_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<EnvelopeTimestamp>,
}

/// Canonical bytes the PKCS digest is computed over.
#[must_use]
pub fn signed_info(preset: ContentPreset, content_digest: &DigestBytes) -> Vec<u8> {
    format!(
        "{SIGNED_INFO_TAG}\n{}\n{}\n{}\n",
        preset.name(),
        content_digest.algorithm(),
        content_digest.to_hex()
    )
    .into_bytes()
}

impl SignatureEnvelope {
    /// Assemble an envelope for a freshly produced signature.
    #[must_use]
    pub fn new(
        preset: ContentPreset,
        content_digest: &DigestBytes,
        pkcs_digest: HashAlgorithm,
        signature_algorithm: &str,
        signature: &[u8],
        certificate: &SigningCertificate,
        key_id: &str,
    ) -> Self {
        let signed_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        Self {
            version: ENVELOPE_VERSION,
            preset: preset.name().to_string(),
            file_digest_algorithm: content_digest.algorithm().as_str().to_string(),
            pkcs_digest_algorithm: pkcs_digest.as_str().to_string(),
            signature_algorithm: signature_algorithm.to_string(),
            content_digest: content_digest.to_hex(),
            signature: STANDARD.encode(signature),
            certificate: STANDARD.encode(certificate.as_der()),
            key_id: key_id.to_string(),
            signed_at,
            timestamp: None,
        }
    }

    pub fn preset(&self) -> SigningResult<ContentPreset> {
        self.preset.parse()
    }

    pub fn file_digest_algorithm(&self) -> SigningResult<HashAlgorithm> {
        self.file_digest_algorithm.parse()
    }

    pub fn pkcs_digest_algorithm(&self) -> SigningResult<HashAlgorithm> {
        self.pkcs_digest_algorithm.parse()
    }

    pub fn signature_bytes(&self) -> SigningResult<Vec<u8>> {
        decode_field("signature", &self.signature)
    }

    pub fn certificate(&self) -> SigningResult<SigningCertificate> {
        SigningCertificate::from_der(decode_field("certificate", &self.certificate)?)
    }

    /// Content digest as recorded at signing time.
    pub fn recorded_content_digest(&self) -> SigningResult<DigestBytes> {
        let bytes = hex::decode(&self.content_digest).map_err(|e| {
            SigningError::PackageError(format!("Content digest is not valid hex: {e}"))
        })?;
        Ok(DigestBytes::new(self.file_digest_algorithm()?, bytes)?)
    }

    #[must_use]
    pub fn is_timestamped(&self) -> bool {
        self.timestamp.is_some()
    }

    pub fn attach_timestamp(&mut self, token: &TimestampToken) {
        self.timestamp = Some(EnvelopeTimestamp {
            authority: token.authority.clone(),
            digest_algorithm: token.digest_algorithm.as_str().to_string(),
            token: STANDARD.encode(&token.token),
        });
    }

    /// Render as a complete signature block using `line_ending`.
    pub fn to_block(&self, line_ending: &str) -> SigningResult<String> {
        let encoded = STANDARD.encode(serde_json::to_vec(self)?);

        let mut block = String::with_capacity(encoded.len() * 2);
        block.push_str(SIG_BLOCK_BEGIN);
        block.push_str(line_ending);
        // base64 output is ASCII, byte chunks are char boundaries
        for chunk in encoded.as_bytes().chunks(SIG_BLOCK_LINE_WIDTH) {
            block.push_str(SIG_BLOCK_LINE_PREFIX);
            block.push_str(&String::from_utf8_lossy(chunk));
            block.push_str(line_ending);
        }
        block.push_str(SIG_BLOCK_END);
        block.push_str(line_ending);
        Ok(block)
    }

    /// Decode the body lines of one block (without the begin and end markers).
    pub fn from_block_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> SigningResult<Self> {
        let mut encoded = String::new();
        for line in lines {
            let chunk = line.strip_prefix(SIG_BLOCK_LINE_PREFIX).ok_or_else(|| {
                SigningError::PackageError(format!("Unexpected line in signature block: '{line}'"))
            })?;
            encoded.push_str(chunk.trim());
        }

        let json = decode_field("signature block", &encoded)?;
        let envelope: SignatureEnvelope = serde_json::from_slice(&json)?;
        if envelope.version != ENVELOPE_VERSION {
            return Err(SigningError::PackageError(format!(
                "Unsupported signature envelope version {}",
                envelope.version
            )));
        }
        Ok(envelope)
    }
}

fn decode_field(what: &str, value: &str) -> SigningResult<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| SigningError::PackageError(format!("Malformed base64 in {what}: {e}")))
}
