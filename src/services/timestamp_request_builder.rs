//! Timestamp request builder service.
//!
//! Service for building RFC3161 timestamp requests from signature bytes.

use crate::domain::constants::{
    ASN1_INTEGER_TAG, ASN1_NULL, ASN1_OCTET_STRING_TAG, ASN1_OID_TAG, ASN1_SEQUENCE_TAG,
    CERT_REQ_TRUE, DER_SHORT_FORM_MAX, TS_REQ_NONCE_LENGTH, TS_REQ_VERSION_1,
};
use crate::domain::crypto::HashAlgorithm;
use crate::SigningError;

/// Encoded request plus the imprint the response must echo.
#[derive(Debug, Clone)]
pub struct TimestampRequest {
    pub der: Vec<u8>,
    pub message_imprint: Vec<u8>,
}

/// Service for building RFC3161 timestamp requests.
#[derive(Default)]
pub struct TimestampRequestBuilder;

impl TimestampRequestBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Build an RFC3161 timestamp request for the given signature bytes.
    ///
    /// ```text
    /// TimeStampReq ::= SEQUENCE {
    ///     version         INTEGER { v1(1) },
    ///     messageImprint  MessageImprint,
    ///     nonce           INTEGER OPTIONAL,
    ///     certReq         BOOLEAN DEFAULT FALSE }
    /// ```
    pub fn build_request(
        &self,
        signature_bytes: &[u8],
        hash_algorithm: HashAlgorithm,
    ) -> Result<TimestampRequest, SigningError> {
        if signature_bytes.is_empty() {
            return Err(SigningError::TimestampError(
                "Cannot create timestamp request for empty signature".into(),
            ));
        }

        let message_imprint = hash_algorithm.digest(signature_bytes);
        let mut nonce = [0u8; 8];
        rand::fill(&mut nonce);

        let der = Self::encode(&message_imprint, hash_algorithm, &nonce)?;
        log::debug!(
            "Built RFC3161 timestamp request: {} bytes for signature: {} bytes",
            der.len(),
            signature_bytes.len()
        );

        Ok(TimestampRequest {
            der,
            message_imprint,
        })
    }

    fn encode(
        hashed_message: &[u8],
        algorithm: HashAlgorithm,
        nonce: &[u8; 8],
    ) -> Result<Vec<u8>, SigningError> {
        let oid = algorithm.oid_der();

        // hashAlgorithm: SEQUENCE { OID, NULL }
        let mut algorithm_identifier = vec![ASN1_OID_TAG, short_len(oid.len())?];
        algorithm_identifier.extend_from_slice(oid);
        algorithm_identifier.extend_from_slice(ASN1_NULL);
        let algorithm_identifier = wrap(ASN1_SEQUENCE_TAG, &algorithm_identifier)?;

        // messageImprint: SEQUENCE { hashAlgorithm, hashedMessage OCTET STRING }
        let mut imprint = algorithm_identifier;
        imprint.extend(wrap(ASN1_OCTET_STRING_TAG, hashed_message)?);
        let imprint = wrap(ASN1_SEQUENCE_TAG, &imprint)?;

        // nonce INTEGER, leading zero keeps it positive
        let mut nonce_der = vec![ASN1_INTEGER_TAG, TS_REQ_NONCE_LENGTH, 0x00];
        nonce_der.extend_from_slice(nonce);

        let mut body = TS_REQ_VERSION_1.to_vec();
        body.extend(imprint);
        body.extend(nonce_der);
        body.extend_from_slice(&CERT_REQ_TRUE);
        wrap(ASN1_SEQUENCE_TAG, &body)
    }
}

fn short_len(len: usize) -> Result<u8, SigningError> {
    if len > DER_SHORT_FORM_MAX {
        return Err(SigningError::TimestampError(format!(
            "DER element too large for timestamp request ({len} bytes)"
        )));
    }
    Ok(len as u8)
}

fn wrap(tag: u8, content: &[u8]) -> Result<Vec<u8>, SigningError> {
    let mut out = vec![tag, short_len(content.len())?];
    out.extend_from_slice(content);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_request_rejects_empty_signature() {
        let builder = TimestampRequestBuilder::new();
        let result = builder.build_request(&[], HashAlgorithm::Sha256);

        assert!(result.is_err());
        assert!(format!("{}", result.unwrap_err()).contains("empty signature"));
    }

    #[test]
    fn build_request_produces_der_structure() {
        let builder = TimestampRequestBuilder::new();
        let dummy_signature = vec![0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xEF];

        let request = builder
            .build_request(&dummy_signature, HashAlgorithm::Sha256)
            .expect("should build request");
        let der = &request.der;

        assert_eq!(der[0], 0x30);
        assert_eq!(der[1] as usize, der.len() - 2);
        // version INTEGER 1
        assert_eq!(&der[2..5], &[0x02, 0x01, 0x01]);
        // imprint bytes present verbatim
        assert!(der
            .windows(request.message_imprint.len())
            .any(|w| w == request.message_imprint.as_slice()));
        // certReq TRUE closes the request
        assert_eq!(&der[der.len() - 3..], &[0x01, 0x01, 0xFF]);
        // nonce INTEGER with leading zero
        assert!(der.windows(3).any(|w| w == [0x02, 0x09, 0x00]));
    }

    #[test]
    fn build_request_for_every_algorithm() {
        let builder = TimestampRequestBuilder::new();
        for algo in HashAlgorithm::ALL {
            let request = builder.build_request(b"signature", algo).unwrap();
            assert_eq!(request.message_imprint.len(), algo.digest_size());
            assert!(request.der.windows(algo.oid_der().len()).any(|w| w == algo.oid_der()));
        }
    }

    #[test]
    fn nonces_differ_between_requests() {
        let builder = TimestampRequestBuilder::new();
        let first = builder.build_request(b"sig", HashAlgorithm::Sha256).unwrap();
        let second = builder.build_request(b"sig", HashAlgorithm::Sha256).unwrap();
        assert_eq!(first.message_imprint, second.message_imprint);
        assert_ne!(first.der, second.der);
    }
}
