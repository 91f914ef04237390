//! Type-safe wrappers using new-type pattern
//!
//! Validated inputs for a signing invocation. Secrets are wrapped so they
//! never reach logs through `Debug` or `Display`.

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::infra::error::{SigningError, SigningResult};

/// Type-safe wrapper for timestamp authority URLs (absolute, http or https).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampUrl(Url);

impl TimestampUrl {
    /// Create a new `TimestampUrl` after validation
    pub fn new(url: impl AsRef<str>) -> SigningResult<Self> {
        let raw = url.as_ref();
        let parsed = Url::parse(raw).map_err(|e| {
            SigningError::ValidationError(format!("Invalid timestamp URL '{raw}': {e}"))
        })?;

        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(SigningError::ValidationError(format!(
                    "Timestamp URL must use http or https, got '{other}'"
                )))
            }
        }

        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(SigningError::ValidationError(format!(
                "Timestamp URL has no host: {raw}"
            )));
        }

        Ok(TimestampUrl(parsed))
    }

    /// Get the URL as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    #[must_use]
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Host name, used to label the issuing authority.
    #[must_use]
    pub fn authority(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }
}

impl FromStr for TimestampUrl {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for TimestampUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of the certificate (and its key) inside the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyName(String);

impl KeyName {
    pub fn new(name: impl AsRef<str>) -> SigningResult<Self> {
        let name = name.as_ref().trim();
        if name.is_empty() {
            return Err(SigningError::ValidationError(
                "Key Vault certificate name must not be empty".to_string(),
            ));
        }
        if name.contains('/') || name.contains('?') || name.contains('#') {
            return Err(SigningError::ValidationError(format!(
                "Key Vault certificate name contains invalid characters: {name}"
            )));
        }
        Ok(KeyName(name.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of a key held by the remote authority.
///
/// This is a reference by name only; no key material is ever behind it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyHandle(String);

impl KeyHandle {
    #[must_use]
    pub fn new(identifier: impl Into<String>) -> Self {
        KeyHandle(identifier.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// String that must not be logged.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// How the client authenticates to the vault. Exactly one path is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultCredentials {
    AccessToken(Secret),
    ClientCredentials { client_id: String, client_secret: Secret },
}

/// Reason credential resolution failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingCredential {
    ClientId,
    ClientSecret,
}

impl VaultCredentials {
    /// Pick the credential path from the raw options.
    ///
    /// An access token wins outright; the client id/secret pair is only
    /// consulted when no token is present, and then both halves are needed.
    pub fn resolve(
        access_token: Option<&str>,
        client_id: Option<&str>,
        client_secret: Option<&str>,
    ) -> Result<Self, MissingCredential> {
        if let Some(token) = non_empty(access_token) {
            return Ok(VaultCredentials::AccessToken(Secret::new(token)));
        }
        let client_id = non_empty(client_id).ok_or(MissingCredential::ClientId)?;
        let client_secret = non_empty(client_secret).ok_or(MissingCredential::ClientSecret)?;
        Ok(VaultCredentials::ClientCredentials {
            client_id: client_id.to_string(),
            client_secret: Secret::new(client_secret),
        })
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            VaultCredentials::AccessToken(_) => "access token",
            VaultCredentials::ClientCredentials { .. } => "client credentials",
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
