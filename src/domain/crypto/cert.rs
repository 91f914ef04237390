use std::fmt;

use openssl::nid::Nid;
use openssl::pkey::{Id, PKey, Public};
use openssl::pkey_ctx::PkeyCtx;
use openssl::rsa::Padding;
use openssl::x509::X509;

use super::HashAlgorithm;
use crate::infra::error::{SigningError, SigningResult};

/// Public signing certificate of the remote key.
///
/// Holds the DER bytes that get embedded in signed artifacts together with
/// the parsed form used for local verification.
#[derive(Clone)]
pub struct SigningCertificate {
    der: Box<[u8]>,
    x509: X509,
}

impl SigningCertificate {
    pub fn from_der(der: Vec<u8>) -> SigningResult<Self> {
        let x509 = X509::from_der(&der).map_err(|e| {
            SigningError::CertificateError(format!("Failed to parse certificate: {e}"))
        })?;
        Ok(Self {
            der: der.into_boxed_slice(),
            x509,
        })
    }

    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// Subject common name, or the full one-line subject when no CN exists.
    #[must_use]
    pub fn subject(&self) -> String {
        let name = self.x509.subject_name();
        if let Some(cn) = name
            .entries_by_nid(Nid::COMMONNAME)
            .next()
            .and_then(|entry| entry.data().as_utf8().ok())
        {
            return cn.to_string();
        }
        name.entries()
            .filter_map(|entry| {
                let key = entry.object().nid().short_name().ok()?;
                let value = entry.data().as_utf8().ok()?;
                Some(format!("{key}={value}"))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// SHA-1 thumbprint in upper-case hex, the form Windows tooling displays.
    #[must_use]
    pub fn thumbprint(&self) -> String {
        hex::encode_upper(HashAlgorithm::Sha1.digest(&self.der))
    }

    /// RSA public key of the certificate.
    ///
    /// # Errors
    /// Fails when the certificate carries no usable RSA public key.
    pub fn rsa_public_key(&self) -> SigningResult<PKey<Public>> {
        let key = self.x509.public_key().map_err(|e| {
            SigningError::CertificateError(format!("Certificate has no usable public key: {e}"))
        })?;
        if key.id() != Id::RSA {
            return Err(SigningError::CertificateError(format!(
                "Certificate public key is {:?}, only RSA keys are supported",
                key.id()
            )));
        }
        Ok(key)
    }

    /// Size in bytes of signatures produced by the matching private key.
    pub fn signature_size(&self) -> SigningResult<usize> {
        Ok(self.rsa_public_key()?.size())
    }

    /// Verify a PKCS#1 v1.5 signature over a precomputed digest.
    ///
    /// A well-formed but wrong signature yields `Ok(false)`; only a
    /// certificate without a usable RSA key is an error.
    pub fn verify_digest(
        &self,
        algorithm: HashAlgorithm,
        digest: &[u8],
        signature: &[u8],
    ) -> SigningResult<bool> {
        let key = self.rsa_public_key()?;
        let mut ctx = PkeyCtx::new(&key)?;
        ctx.verify_init()?;
        ctx.set_rsa_padding(Padding::PKCS1)?;
        ctx.set_signature_md(algorithm.openssl_md())?;

        match ctx.verify(digest, signature) {
            Ok(valid) => Ok(valid),
            Err(e) => {
                log::debug!("Signature rejected during verification: {e}");
                Ok(false)
            }
        }
    }
}

impl fmt::Debug for SigningCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SigningCertificate(subject={}, len={})",
            self.subject(),
            self.der.len()
        )
    }
}
