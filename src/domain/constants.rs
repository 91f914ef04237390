//! Domain constants for DER encodings, RFC 3161 requests and script signature blocks.
//! Keep this intentionally small; only broadly reused literals should live here.

// === ASN.1 DER Constants ===

/// ASN.1 NULL value (tag + length + null)
pub const ASN1_NULL: &[u8] = &[0x05, 0x00];

/// ASN.1 SEQUENCE tag
pub const ASN1_SEQUENCE_TAG: u8 = 0x30;

/// ASN.1 INTEGER tag
pub const ASN1_INTEGER_TAG: u8 = 0x02;

/// ASN.1 OBJECT IDENTIFIER tag
pub const ASN1_OID_TAG: u8 = 0x06;

/// ASN.1 OCTET STRING tag
pub const ASN1_OCTET_STRING_TAG: u8 = 0x04;

/// Largest content length encodable in DER short form
pub const DER_SHORT_FORM_MAX: usize = 0x7f;

// === Hash Algorithm OIDs ===

/// SHA-1 algorithm OID (1.3.14.3.2.26) DER encoding
pub const SHA1_ALGORITHM_OID: &[u8] = &[0x2b, 0x0e, 0x03, 0x02, 0x1a];

/// SHA-256 algorithm OID (2.16.840.1.101.3.4.2.1) DER encoding
pub const SHA256_ALGORITHM_OID: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01];

/// SHA-384 algorithm OID (2.16.840.1.101.3.4.2.2) DER encoding
pub const SHA384_ALGORITHM_OID: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x02];

/// SHA-512 algorithm OID (2.16.840.1.101.3.4.2.3) DER encoding
pub const SHA512_ALGORITHM_OID: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x03];

/// PKCS#1 v1.5 `DigestInfo` prefix for SHA-1 (followed by the 20 digest bytes).
///
/// Key Vault has no SHA-1 RSA algorithm; `RSNULL` signs the bytes as given,
/// so the caller supplies the full `DigestInfo`.
pub const SHA1_DIGEST_INFO_PREFIX: &[u8] = &[
    0x30, 0x21, 0x30, 0x09, 0x06, 0x05, 0x2b, 0x0e, 0x03, 0x02, 0x1a, 0x05, 0x00, 0x04, 0x14,
];

// === RFC3161 Timestamp Constants ===

/// Version 1 for RFC3161 timestamp requests
pub const TS_REQ_VERSION_1: [u8; 3] = [0x02, 0x01, 0x01];

/// BOOLEAN TRUE value for certReq field
pub const CERT_REQ_TRUE: [u8; 3] = [0x01, 0x01, 0xFF];

/// Nonce length for RFC3161 requests (8 random bytes + leading zero)
pub const TS_REQ_NONCE_LENGTH: u8 = 9;

/// `PKIStatus` granted
pub const PKI_STATUS_GRANTED: u8 = 0;

/// `PKIStatus` grantedWithMods
pub const PKI_STATUS_GRANTED_WITH_MODS: u8 = 1;

// === Script Signature Block ===

/// First line of an embedded script signature block
pub const SIG_BLOCK_BEGIN: &str = "# SIG # Begin signature block";

/// Last line of an embedded script signature block
pub const SIG_BLOCK_END: &str = "# SIG # End signature block";

/// Comment prefix of each base64 line inside the block
pub const SIG_BLOCK_LINE_PREFIX: &str = "# ";

/// Base64 characters per block line
pub const SIG_BLOCK_LINE_WIDTH: usize = 64;
