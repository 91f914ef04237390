//! Signature algorithm translation.
//!
//! Maps an abstract (signature algorithm, digest algorithm) pair onto the JWS
//! style identifier Key Vault expects in a `sign` request. Pure lookup, no
//! I/O.

use std::fmt;

use crate::domain::crypto::HashAlgorithm;
use crate::infra::error::{SigningError, SigningResult};

/// Asymmetric algorithm family of the signing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    Rsa,
    Ecdsa,
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureAlgorithm::Rsa => f.write_str("RSA"),
            SignatureAlgorithm::Ecdsa => f.write_str("ECDSA"),
        }
    }
}

/// Algorithm identifier understood by the remote signing authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WireAlgorithmId(&'static str);

impl WireAlgorithmId {
    pub const RS256: WireAlgorithmId = WireAlgorithmId("RS256");
    pub const RS384: WireAlgorithmId = WireAlgorithmId("RS384");
    pub const RS512: WireAlgorithmId = WireAlgorithmId("RS512");
    /// Raw PKCS#1 v1.5 over caller supplied `DigestInfo` bytes.
    pub const RSNULL: WireAlgorithmId = WireAlgorithmId("RSNULL");

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        self.0
    }

    /// Whether the digest must be wrapped in a `DigestInfo` before sending.
    #[must_use]
    pub fn requires_digest_info(&self) -> bool {
        *self == WireAlgorithmId::RSNULL
    }
}

impl fmt::Display for WireAlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

const WIRE_ALGORITHMS: [((SignatureAlgorithm, HashAlgorithm), WireAlgorithmId); 4] = [
    ((SignatureAlgorithm::Rsa, HashAlgorithm::Sha1), WireAlgorithmId::RSNULL),
    ((SignatureAlgorithm::Rsa, HashAlgorithm::Sha256), WireAlgorithmId::RS256),
    ((SignatureAlgorithm::Rsa, HashAlgorithm::Sha384), WireAlgorithmId::RS384),
    ((SignatureAlgorithm::Rsa, HashAlgorithm::Sha512), WireAlgorithmId::RS512),
];

/// Translate a signature/digest pair to its wire identifier.
///
/// # Errors
/// `UnsupportedAlgorithm` for any pair outside the table (every non-RSA
/// family).
pub fn translate(
    signature_algorithm: SignatureAlgorithm,
    digest_algorithm: HashAlgorithm,
) -> SigningResult<WireAlgorithmId> {
    WIRE_ALGORITHMS
        .iter()
        .find(|((sig, digest), _)| *sig == signature_algorithm && *digest == digest_algorithm)
        .map(|(_, wire)| *wire)
        .ok_or_else(|| {
            SigningError::UnsupportedAlgorithm(format!(
                "{signature_algorithm} with {digest_algorithm} is not supported by the remote signing authority"
            ))
        })
}

/// Resolve an optional user supplied digest name; see [`HashAlgorithm::from_input`].
pub fn resolve_digest_algorithm(name: Option<&str>) -> SigningResult<HashAlgorithm> {
    HashAlgorithm::from_input(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsa_table() {
        assert_eq!(
            translate(SignatureAlgorithm::Rsa, HashAlgorithm::Sha256).unwrap(),
            WireAlgorithmId::RS256
        );
        assert_eq!(
            translate(SignatureAlgorithm::Rsa, HashAlgorithm::Sha384).unwrap().as_str(),
            "RS384"
        );
        assert_eq!(
            translate(SignatureAlgorithm::Rsa, HashAlgorithm::Sha512).unwrap().as_str(),
            "RS512"
        );
        let sha1 = translate(SignatureAlgorithm::Rsa, HashAlgorithm::Sha1).unwrap();
        assert_eq!(sha1, WireAlgorithmId::RSNULL);
        assert!(sha1.requires_digest_info());
        assert!(!WireAlgorithmId::RS256.requires_digest_info());
    }

    #[test]
    fn non_rsa_is_rejected_not_downgraded() {
        for digest in HashAlgorithm::ALL {
            assert!(matches!(
                translate(SignatureAlgorithm::Ecdsa, digest),
                Err(SigningError::UnsupportedAlgorithm(_))
            ));
        }
    }

    #[test]
    fn digest_names_resolve_case_insensitively() {
        let cases = [
            (Some("sha1"), HashAlgorithm::Sha1),
            (Some("SHA1"), HashAlgorithm::Sha1),
            (Some("sha256"), HashAlgorithm::Sha256),
            (Some("Sha256"), HashAlgorithm::Sha256),
            (Some("SHA384"), HashAlgorithm::Sha384),
            (Some("sHa512"), HashAlgorithm::Sha512),
            (Some(""), HashAlgorithm::Sha256),
            (None, HashAlgorithm::Sha256),
        ];
        for (input, expected) in cases {
            assert_eq!(resolve_digest_algorithm(input).unwrap(), expected, "{input:?}");
        }
        assert!(resolve_digest_algorithm(Some("md5")).is_err());
    }
}
