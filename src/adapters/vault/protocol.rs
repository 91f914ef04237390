//! Wire types for the Key Vault REST API.
//!
//! Only the handful of fields the signer reads are modelled; everything else
//! in the vault's responses is ignored by serde.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Scope requested when exchanging client credentials for a token.
pub const VAULT_SCOPE_SUFFIX: &str = "/.default";

/// Response of `GET {vault}/certificates/{name}`.
#[derive(Debug, Clone, Deserialize)]
pub struct CertificateBundle {
    /// Key identifier (`https://{vault}/keys/{name}/{version}`).
    pub kid: String,
    /// Base64 (standard alphabet) DER certificate.
    pub cer: String,
}

impl CertificateBundle {
    /// Decode the DER certificate bytes.
    pub fn decode_certificate(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.cer)
    }
}

/// Body of `POST {kid}/sign`.
#[derive(Debug, Clone, Serialize)]
pub struct KeySignRequest {
    /// Algorithm identifier, e.g. `RS256`.
    pub alg: String,
    /// Base64url digest without padding.
    pub value: String,
}

impl KeySignRequest {
    #[must_use]
    pub fn new(alg: &str, digest: &[u8]) -> Self {
        Self {
            alg: alg.to_string(),
            value: URL_SAFE_NO_PAD.encode(digest),
        }
    }
}

/// Response of `POST {kid}/sign`.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyOperationResult {
    pub kid: Option<String>,
    /// Base64url signature.
    pub value: String,
}

impl KeyOperationResult {
    /// Decode the signature, tolerating padded input.
    pub fn decode_signature(&self) -> Result<Vec<u8>, base64::DecodeError> {
        URL_SAFE_NO_PAD.decode(self.value.trim_end_matches('='))
    }
}

/// OAuth2 token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Error body returned by the vault.
#[derive(Debug, Clone, Deserialize)]
pub struct VaultErrorResponse {
    pub error: VaultError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VaultError {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Known error codes returned by the vault.
pub mod error_codes {
    /// Token missing, expired or for the wrong resource.
    pub const UNAUTHORIZED: &str = "Unauthorized";
    /// Principal lacks the `sign` or `get` permission.
    pub const FORBIDDEN: &str = "Forbidden";
    /// Certificate or key name unknown.
    pub const NOT_FOUND: &str = "CertificateNotFound";
    /// Key exists but is disabled.
    pub const KEY_DISABLED: &str = "KeyDisabled";
    /// Malformed parameters (wrong algorithm for key, bad digest length).
    pub const BAD_PARAMETER: &str = "BadParameter";
    /// Throttled.
    pub const THROTTLED: &str = "Throttled";
}

/// Parameters of a `WWW-Authenticate: Bearer ...` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerChallenge {
    /// Authority URL including the tenant.
    pub authorization: String,
    /// Resource (or scope) the token must be issued for.
    pub resource: String,
}

impl BearerChallenge {
    /// Token endpoint for the client credentials grant.
    #[must_use]
    pub fn token_endpoint(&self) -> String {
        format!("{}/oauth2/v2.0/token", self.authorization.trim_end_matches('/'))
    }

    /// OAuth2 scope derived from the resource.
    #[must_use]
    pub fn scope(&self) -> String {
        format!("{}{VAULT_SCOPE_SUFFIX}", self.resource.trim_end_matches('/'))
    }
}

/// Parse a bearer challenge header.
///
/// Accepts `authorization` or `authorization_uri` for the authority and
/// `resource` or `scope` for the audience. Returns `None` for any other
/// scheme or when either value is missing.
#[must_use]
pub fn parse_bearer_challenge(header: &str) -> Option<BearerChallenge> {
    let header = header.trim();
    let (scheme, params) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let mut authorization = None;
    let mut resource = None;
    for part in params.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').to_string();
        match key.trim().to_ascii_lowercase().as_str() {
            "authorization" | "authorization_uri" => authorization = Some(value),
            "resource" => resource = Some(value),
            "scope" if resource.is_none() => {
                resource = Some(value.trim_end_matches(VAULT_SCOPE_SUFFIX).to_string());
            }
            _ => {}
        }
    }

    Some(BearerChallenge {
        authorization: authorization.filter(|a| !a.is_empty())?,
        resource: resource.filter(|r| !r.is_empty())?,
    })
}
