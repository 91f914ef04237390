//! Key Vault REST client.
//!
//! Resolves certificates to key handles and performs `sign` operations with
//! the key behind a handle. Authentication uses either a caller supplied
//! access token or the client credentials grant against the authority named
//! in the vault's bearer challenge.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use tokio::sync::OnceCell;
use url::Url;

use super::protocol::{
    error_codes, parse_bearer_challenge, BearerChallenge, CertificateBundle, KeyOperationResult,
    KeySignRequest, TokenResponse, VaultErrorResponse,
};
use crate::domain::crypto::SigningCertificate;
use crate::domain::types::{KeyHandle, KeyName, Secret, VaultCredentials};
use crate::infra::config::SignerConfiguration;
use crate::infra::error::{SigningError, SigningResult};
use crate::services::algorithm::WireAlgorithmId;
use crate::services::signing_context::RemoteSigningClient;

/// Connection settings for one vault.
#[derive(Debug, Clone)]
pub struct KeyVaultConfig {
    /// Vault base URL, e.g. `https://contoso.vault.azure.net`.
    pub vault_url: Url,
    pub api_version: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl KeyVaultConfig {
    /// Build from a raw vault URL and the application configuration.
    ///
    /// # Errors
    /// `NetworkError` if the URL is not an absolute http(s) URL.
    pub fn new(vault_url: &str, settings: &SignerConfiguration) -> SigningResult<Self> {
        let vault_url = Url::parse(vault_url).map_err(|e| {
            SigningError::NetworkError(format!("Invalid Key Vault URL '{vault_url}': {e}"))
        })?;
        if !matches!(vault_url.scheme(), "https" | "http") || vault_url.host_str().is_none() {
            return Err(SigningError::NetworkError(format!(
                "Key Vault URL must be an absolute http(s) URL: {vault_url}"
            )));
        }

        Ok(Self {
            vault_url,
            api_version: settings.key_vault_api_version.clone(),
            timeout: settings.network_timeout(),
            user_agent: settings.user_agent.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.vault_url.as_str().trim_end_matches('/'))
    }
}

/// Which call a response belongs to; selects the error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VaultOperation {
    GetCertificate,
    Sign,
    Token,
}

impl VaultOperation {
    fn failure(self, message: String) -> SigningError {
        match self {
            VaultOperation::GetCertificate => SigningError::CertificateError(message),
            VaultOperation::Sign => SigningError::RemoteSigningError(message),
            VaultOperation::Token => SigningError::AuthenticationError(message),
        }
    }
}

/// Key Vault signing client.
pub struct KeyVaultClient {
    config: KeyVaultConfig,
    credentials: VaultCredentials,
    http: reqwest::Client,
    token: OnceCell<Secret>,
}

impl KeyVaultClient {
    /// Create a new client.
    ///
    /// # Errors
    /// Returns error if HTTP client creation fails.
    pub fn new(config: KeyVaultConfig, credentials: VaultCredentials) -> SigningResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| {
                SigningError::NetworkError(format!("Failed to create HTTP client: {e}"))
            })?;

        log::debug!(
            "Key Vault client for {} using {}",
            config.vault_url,
            credentials.kind()
        );

        Ok(Self {
            config,
            credentials,
            http,
            token: OnceCell::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &KeyVaultConfig {
        &self.config
    }

    /// Look up a certificate and the identifier of its key.
    ///
    /// # Errors
    /// `CertificateError` if the vault has no such certificate or returns a
    /// body that does not decode, `AuthenticationError` if the credentials
    /// are refused.
    pub async fn get_certificate(
        &self,
        name: &KeyName,
    ) -> SigningResult<(SigningCertificate, KeyHandle)> {
        let url = self.config.endpoint(&format!("certificates/{name}"));
        let token = self.bearer_token().await?;

        let response = self
            .http
            .get(&url)
            .query(&[("api-version", self.config.api_version.as_str())])
            .bearer_auth(token.expose())
            .send()
            .await
            .map_err(|e| transport_error(VaultOperation::GetCertificate, &e))?;

        let bundle: CertificateBundle =
            handle_response(VaultOperation::GetCertificate, response).await?;
        let der = bundle.decode_certificate().map_err(|e| {
            SigningError::CertificateError(format!("Failed to decode certificate: {e}"))
        })?;
        let certificate = SigningCertificate::from_der(der)?;

        log::info!(
            "Resolved certificate '{}' ({}) to key {}",
            name,
            certificate.subject(),
            bundle.kid
        );
        Ok((certificate, KeyHandle::new(bundle.kid)))
    }

    /// Bearer token for vault requests, acquiring it on first use.
    async fn bearer_token(&self) -> SigningResult<Secret> {
        match &self.credentials {
            VaultCredentials::AccessToken(token) => Ok(token.clone()),
            VaultCredentials::ClientCredentials {
                client_id,
                client_secret,
            } => self
                .token
                .get_or_try_init(|| self.acquire_token(client_id, client_secret))
                .await
                .cloned(),
        }
    }

    async fn acquire_token(&self, client_id: &str, client_secret: &Secret) -> SigningResult<Secret> {
        let challenge = self.discover_authority().await?;
        log::debug!(
            "Requesting token from {} for {}",
            challenge.authorization,
            challenge.resource
        );

        let scope = challenge.scope();
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret.expose()),
            ("scope", scope.as_str()),
        ];
        let response = self
            .http
            .post(challenge.token_endpoint())
            .form(&form)
            .send()
            .await
            .map_err(|e| transport_error(VaultOperation::Token, &e))?;

        let token: TokenResponse = handle_response(VaultOperation::Token, response).await?;
        log::debug!(
            "Acquired {} token (expires in {:?}s)",
            token.token_type.as_deref().unwrap_or("bearer"),
            token.expires_in
        );
        Ok(Secret::new(token.access_token))
    }

    /// Unauthenticated probe whose 401 names the token authority.
    async fn discover_authority(&self) -> SigningResult<BearerChallenge> {
        let response = self
            .http
            .get(self.config.endpoint("certificates"))
            .query(&[("api-version", self.config.api_version.as_str())])
            .send()
            .await
            .map_err(|e| transport_error(VaultOperation::Token, &e))?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Err(SigningError::AuthenticationError(format!(
                "Expected an authentication challenge from {}, got HTTP {}",
                self.config.vault_url,
                response.status()
            )));
        }

        response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_bearer_challenge)
            .ok_or_else(|| {
                SigningError::AuthenticationError(
                    "Key Vault did not return a usable bearer challenge".to_string(),
                )
            })
    }
}

#[async_trait]
impl RemoteSigningClient for KeyVaultClient {
    async fn sign(
        &self,
        key: &KeyHandle,
        algorithm: WireAlgorithmId,
        digest: &[u8],
    ) -> SigningResult<Vec<u8>> {
        let url = format!("{}/sign", key.as_str().trim_end_matches('/'));
        let request = KeySignRequest::new(algorithm.as_str(), digest);
        let token = self.bearer_token().await?;

        let response = self
            .http
            .post(&url)
            .query(&[("api-version", self.config.api_version.as_str())])
            .bearer_auth(token.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(VaultOperation::Sign, &e))?;

        let result: KeyOperationResult = handle_response(VaultOperation::Sign, response).await?;
        result.decode_signature().map_err(|e| {
            SigningError::RemoteSigningError(format!("Failed to decode signature: {e}"))
        })
    }

    fn close(&self) {
        log::debug!("Releasing Key Vault client for {}", self.config.vault_url);
    }
}

fn transport_error(operation: VaultOperation, error: &reqwest::Error) -> SigningError {
    let message = if error.is_timeout() {
        format!("Request timed out: {error}")
    } else {
        format!("Failed to reach Key Vault: {error}")
    };
    match operation {
        VaultOperation::GetCertificate => SigningError::NetworkError(message),
        other => other.failure(message),
    }
}

/// Handle HTTP response and parse JSON body.
async fn handle_response<T: serde::de::DeserializeOwned>(
    operation: VaultOperation,
    response: reqwest::Response,
) -> SigningResult<T> {
    let status = response.status();

    if status.is_success() {
        return response.json().await.map_err(|e| {
            operation.failure(format!("Failed to parse Key Vault response: {e}"))
        });
    }

    let error_text = response.text().await.unwrap_or_default();
    let error = serde_json::from_str::<VaultErrorResponse>(&error_text).ok();
    let (code, message) = error
        .map(|e| (e.error.code, e.error.message))
        .unwrap_or_else(|| (String::new(), error_text));

    Err(map_error(operation, status, &code, &message))
}

/// Map a failed response to the matching `SigningError` variant.
fn map_error(operation: VaultOperation, status: StatusCode, code: &str, message: &str) -> SigningError {
    match (status, code) {
        (StatusCode::UNAUTHORIZED, _) | (_, error_codes::UNAUTHORIZED) => {
            SigningError::AuthenticationError(format!("Key Vault rejected the credentials: {message}"))
        }
        (StatusCode::FORBIDDEN, _) | (_, error_codes::FORBIDDEN) => SigningError::AuthenticationError(
            format!("Access denied by Key Vault: {message}"),
        ),
        (_, error_codes::THROTTLED) | (StatusCode::TOO_MANY_REQUESTS, _) => {
            operation.failure(format!("Throttled by Key Vault: {message}"))
        }
        (_, error_codes::NOT_FOUND) => {
            operation.failure(format!("Certificate not found in Key Vault: {message}"))
        }
        (_, error_codes::KEY_DISABLED) => {
            operation.failure(format!("Key Vault key is disabled: {message}"))
        }
        (_, error_codes::BAD_PARAMETER) => {
            operation.failure(format!("Key Vault rejected the request parameters: {message}"))
        }
        (_, "") => operation.failure(format!("HTTP {status}: {message}")),
        _ => operation.failure(format!("[{code}] {message}")),
    }
}
