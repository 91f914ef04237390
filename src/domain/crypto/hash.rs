//! Hash algorithm domain type.
//!
//! `HashAlgorithm` covers the four digests a signature may use. Name
//! resolution is case-insensitive and never falls back to a default for an
//! unknown name.

use std::fmt;
use std::str::FromStr;

use openssl::md::{Md, MdRef};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::domain::constants::{
    SHA1_ALGORITHM_OID, SHA256_ALGORITHM_OID, SHA384_ALGORITHM_OID, SHA512_ALGORITHM_OID,
};
use crate::infra::error::SigningError;

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// All supported algorithms, weakest first.
    pub const ALL: [HashAlgorithm; 4] = [
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    #[must_use]
    pub fn digest_size(&self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    /// Resolve a user supplied algorithm name.
    ///
    /// `None` and the empty string mean "not specified" and resolve to
    /// SHA-256. Anything else must name one of the supported algorithms.
    pub fn from_input(value: Option<&str>) -> Result<Self, SigningError> {
        match value {
            None => Ok(HashAlgorithm::Sha256),
            Some(name) if name.is_empty() => Ok(HashAlgorithm::Sha256),
            Some(name) => name.parse(),
        }
    }

    /// Hash `data` with this algorithm.
    #[must_use]
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    /// DER content bytes of the algorithm OID (no tag or length).
    #[must_use]
    pub fn oid_der(&self) -> &'static [u8] {
        match self {
            HashAlgorithm::Sha1 => SHA1_ALGORITHM_OID,
            HashAlgorithm::Sha256 => SHA256_ALGORITHM_OID,
            HashAlgorithm::Sha384 => SHA384_ALGORITHM_OID,
            HashAlgorithm::Sha512 => SHA512_ALGORITHM_OID,
        }
    }

    /// OpenSSL message digest handle for PKCS#1 operations.
    #[must_use]
    pub fn openssl_md(&self) -> &'static MdRef {
        match self {
            HashAlgorithm::Sha1 => Md::sha1(),
            HashAlgorithm::Sha256 => Md::sha256(),
            HashAlgorithm::Sha384 => Md::sha384(),
            HashAlgorithm::Sha512 => Md::sha512(),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" => Ok(HashAlgorithm::Sha1),
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha384" => Ok(HashAlgorithm::Sha384),
            "sha512" => Ok(HashAlgorithm::Sha512),
            _ => Err(SigningError::UnsupportedAlgorithm(format!(
                "'{s}' is not a supported digest algorithm (expected sha1, sha256, sha384 or sha512)"
            ))),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
