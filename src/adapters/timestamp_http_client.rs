//! Timestamp HTTP client adapter.
//! HTTP client adapter for RFC3161 timestamp authority requests.
//! Retries connection failures and server errors; a timeout ends the attempt.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::crypto::HashAlgorithm;
use crate::domain::types::TimestampUrl;
use crate::infra::config::SignerConfiguration;
use crate::infra::error::{SigningError, SigningResult};
use crate::services::timestamp::{TimestampAuthority, TimestampToken};
use crate::services::timestamp_parser::parse_timestamp_response;
use crate::services::timestamp_request_builder::TimestampRequestBuilder;

/// Configuration for timestamp HTTP operations.
#[derive(Debug, Clone)]
pub struct TimestampHttpConfig {
    pub server: TimestampUrl,
    pub timeout: Duration,
    pub attempts: usize,
    pub retry_delay: Duration,
    pub user_agent: String,
}

impl TimestampHttpConfig {
    #[must_use]
    pub fn new(server: TimestampUrl, settings: &SignerConfiguration) -> Self {
        Self {
            server,
            timeout: settings.network_timeout(),
            attempts: settings.timestamp_retry_attempts.max(1),
            retry_delay: settings.timestamp_retry_delay(),
            user_agent: settings.user_agent.clone(),
        }
    }
}

/// Failure of a single POST, classified for the retry loop.
#[derive(Debug)]
enum AttemptError {
    Retryable(SigningError),
    Fatal(SigningError),
}

/// HTTP adapter performing RFC3161 POST exchanges.
pub struct TimestampHttpClient {
    cfg: TimestampHttpConfig,
    http: reqwest::Client,
    requests: TimestampRequestBuilder,
}

impl TimestampHttpClient {
    /// Create a new client from config.
    ///
    /// # Errors
    /// `NetworkError` if the HTTP client cannot be built.
    pub fn new(cfg: TimestampHttpConfig) -> SigningResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .user_agent(cfg.user_agent.clone())
            .build()
            .map_err(|e| {
                SigningError::NetworkError(format!("Failed to create HTTP client: {e}"))
            })?;
        Ok(Self {
            cfg,
            http,
            requests: TimestampRequestBuilder::new(),
        })
    }

    /// Post a request DER and return the response body.
    pub async fn post_request(&self, ts_request_der: &[u8]) -> SigningResult<Vec<u8>> {
        let mut attempt = 1;
        loop {
            log::debug!(
                "timestamp http attempt {} of {} -> {}",
                attempt,
                self.cfg.attempts,
                self.cfg.server
            );
            match self.single_post(ts_request_der).await {
                Ok(bytes) => return Ok(bytes),
                Err(AttemptError::Fatal(e)) => return Err(e),
                Err(AttemptError::Retryable(e)) if attempt >= self.cfg.attempts => return Err(e),
                Err(AttemptError::Retryable(e)) => {
                    log::warn!("timestamp server {} failed: {}", self.cfg.server, e);
                    tokio::time::sleep(self.cfg.retry_delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn single_post(&self, body: &[u8]) -> Result<Vec<u8>, AttemptError> {
        let server = self.cfg.server.as_str();
        let resp = self
            .http
            .post(server)
            .header("Content-Type", "application/timestamp-query")
            .header("Accept", "application/timestamp-reply")
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AttemptError::Fatal(SigningError::TimestampError(format!(
                        "Request to {server} timed out"
                    )))
                } else {
                    AttemptError::Retryable(SigningError::TimestampError(format!(
                        "HTTP error: {e}"
                    )))
                }
            })?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(AttemptError::Retryable(SigningError::TimestampError(
                format!("HTTP {status} from {server}"),
            )));
        }
        if !status.is_success() {
            return Err(AttemptError::Fatal(SigningError::TimestampError(format!(
                "HTTP {status} from {server}"
            ))));
        }

        let bytes = resp.bytes().await.map_err(|e| {
            AttemptError::Fatal(SigningError::TimestampError(format!(
                "Read body failed: {e}"
            )))
        })?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl TimestampAuthority for TimestampHttpClient {
    async fn timestamp(
        &self,
        signature: &[u8],
        digest_algorithm: HashAlgorithm,
    ) -> SigningResult<TimestampToken> {
        let request = self.requests.build_request(signature, digest_algorithm)?;
        let response = self.post_request(&request.der).await?;
        let token = parse_timestamp_response(&response, &request.message_imprint)?;

        log::info!(
            "Received {} byte timestamp token from {}",
            token.len(),
            self.authority()
        );
        Ok(TimestampToken {
            token,
            authority: self.authority().to_string(),
            digest_algorithm,
        })
    }

    fn authority(&self) -> &str {
        self.cfg.server.authority()
    }
}
