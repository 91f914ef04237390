use std::fmt;

use super::HashAlgorithm;

/// Strongly typed digest bytes paired with the algorithm that produced them.
///
/// Invariant: `bytes.len() == algo.digest_size()`.
#[derive(Clone, Eq, PartialEq)]
pub struct DigestBytes {
    algo: HashAlgorithm,
    bytes: Box<[u8]>,
}

impl DigestBytes {
    pub fn new(algo: HashAlgorithm, bytes: Vec<u8>) -> Result<Self, DigestBytesError> {
        if bytes.len() != algo.digest_size() {
            return Err(DigestBytesError::LengthMismatch {
                algorithm: algo,
                expected: algo.digest_size(),
                actual: bytes.len(),
            });
        }
        Ok(Self {
            algo,
            bytes: bytes.into_boxed_slice(),
        })
    }

    /// Hash `data` and wrap the result.
    #[must_use]
    pub fn compute(algo: HashAlgorithm, data: &[u8]) -> Self {
        Self {
            algo,
            bytes: algo.digest(data).into_boxed_slice(),
        }
    }

    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algo
    }
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Debug for DigestBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DigestBytes({}:{})", self.algo, self.to_hex())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DigestBytesError {
    #[error("{algorithm} digest length mismatch (expected {expected}, actual {actual})")]
    LengthMismatch {
        algorithm: HashAlgorithm,
        expected: usize,
        actual: usize,
    },
}

impl From<DigestBytesError> for crate::infra::error::SigningError {
    fn from(error: DigestBytesError) -> Self {
        crate::infra::error::SigningError::CryptographicError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length() {
        let err = DigestBytes::new(HashAlgorithm::Sha384, vec![0u8; 32]).unwrap_err();
        assert_eq!(
            err,
            DigestBytesError::LengthMismatch {
                algorithm: HashAlgorithm::Sha384,
                expected: 48,
                actual: 32
            }
        );
    }

    #[test]
    fn compute_matches_new() {
        let computed = DigestBytes::compute(HashAlgorithm::Sha1, b"content");
        let wrapped =
            DigestBytes::new(HashAlgorithm::Sha1, HashAlgorithm::Sha1.digest(b"content")).unwrap();
        assert_eq!(computed, wrapped);
        assert_eq!(computed.to_hex().len(), 40);
    }
}
