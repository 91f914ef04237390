//! Timestamp authority abstraction.
//!
//! The workflow asks a `TimestampAuthority` for an RFC 3161 token over the
//! signature bytes. The HTTP implementation lives in
//! [`crate::adapters::timestamp_http_client`].

use async_trait::async_trait;

use crate::domain::crypto::HashAlgorithm;
use crate::infra::error::SigningResult;

/// RFC 3161 `TimeStampToken` as returned by an authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampToken {
    /// DER `ContentInfo` bytes of the token
    pub token: Vec<u8>,
    /// Host name of the issuing authority
    pub authority: String,
    /// Digest used for the message imprint
    pub digest_algorithm: HashAlgorithm,
}

/// Source of timestamp tokens.
#[async_trait]
pub trait TimestampAuthority: Send + Sync {
    /// Request a token whose message imprint covers `signature`.
    async fn timestamp(
        &self,
        signature: &[u8],
        digest_algorithm: HashAlgorithm,
    ) -> SigningResult<TimestampToken>;

    /// Human readable name of the authority.
    fn authority(&self) -> &str;
}
