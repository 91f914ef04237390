//! `sign` command orchestration.
//!
//! Validates raw options in a fixed order, stopping at the first problem,
//! then resolves them through a `SigningBackend` into a signing context and
//! runs the workflow. Every result, success or failure, comes back as an
//! exit code plus a one-line message; nothing escapes as an error.

use std::path::PathBuf;
use std::sync::Arc;

use crate::adapters::backend::{SigningBackend, VaultAccess};
use crate::domain::crypto::HashAlgorithm;
use crate::domain::outcome::ExitCode;
use crate::domain::types::{KeyName, MissingCredential, TimestampUrl, VaultCredentials};
use crate::infra::error::SigningError;
use crate::pipelines::sign::{SignOutcome, SignWorkflow};
use crate::services::signing_context::SigningContext;

/// Raw `sign` options as the user supplied them.
#[derive(Debug, Clone, Default)]
pub struct SignCommandArgs {
    pub file: PathBuf,
    pub timestamp_url: Option<String>,
    pub timestamp_algorithm: Option<String>,
    pub file_digest: Option<String>,
    pub force: bool,
    pub vault_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub certificate: Option<String>,
    pub access_token: Option<String>,
}

/// Options after validation; every field is known good.
#[derive(Debug, Clone)]
pub struct ValidatedSignRequest {
    pub access: VaultAccess,
    pub file: PathBuf,
    pub timestamp_url: Option<TimestampUrl>,
    pub file_digest: HashAlgorithm,
    pub timestamp_digest: HashAlgorithm,
    pub force: bool,
}

/// First validation failure found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub exit_code: ExitCode,
    pub message: String,
}

impl Rejection {
    fn invalid_options(message: impl Into<String>) -> Self {
        Self {
            exit_code: ExitCode::InvalidOptions,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            exit_code: ExitCode::Failed,
            message: message.into(),
        }
    }
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.trim().is_empty())
}

impl SignCommandArgs {
    /// Check the options in order and return the first violation.
    pub fn validate(&self) -> Result<ValidatedSignRequest, Rejection> {
        let vault_url = present(self.vault_url.as_ref()).ok_or_else(|| {
            Rejection::invalid_options(
                "The Azure Key Vault URL must be specified for Azure signing.",
            )
        })?;

        let credentials = VaultCredentials::resolve(
            self.access_token.as_deref(),
            self.client_id.as_deref(),
            self.client_secret.as_deref(),
        )
        .map_err(|missing| match missing {
            MissingCredential::ClientId => Rejection::invalid_options(
                "The Azure Key Vault Client ID or Access Token must be specified for Azure signing.",
            ),
            MissingCredential::ClientSecret => Rejection::invalid_options(
                "The Azure Key Vault Client Secret or Access Token must be specified for Azure signing.",
            ),
        })?;

        let certificate = present(self.certificate.as_ref()).ok_or_else(|| {
            Rejection::invalid_options(
                "The Azure Key Vault Client Certificate Name must be specified for Azure signing.",
            )
        })?;
        let key_name =
            KeyName::new(certificate).map_err(|e| Rejection::invalid_options(e.to_string()))?;

        let timestamp_url = self
            .timestamp_url
            .as_deref()
            .map(TimestampUrl::new)
            .transpose()
            .map_err(|e| {
                log::debug!("{e}");
                Rejection::failed("Specified timestamp URL is invalid.")
            })?;

        if !self.file.is_file() {
            return Err(Rejection::failed("Specified file does not exist."));
        }

        let file_digest = HashAlgorithm::from_input(self.file_digest.as_deref()).map_err(|_| {
            Rejection::invalid_options("Specified file digest algorithm is not supported.")
        })?;
        let timestamp_digest = HashAlgorithm::from_input(self.timestamp_algorithm.as_deref())
            .map_err(|_| {
                Rejection::invalid_options("Specified timestamp digest algorithm is not supported.")
            })?;

        Ok(ValidatedSignRequest {
            access: VaultAccess {
                vault_url: vault_url.to_string(),
                credentials,
                key_name,
            },
            file: self.file.clone(),
            timestamp_url,
            file_digest,
            timestamp_digest,
            force: self.force,
        })
    }
}

/// What the command tells the process boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReport {
    pub exit_code: ExitCode,
    pub message: String,
    /// Workflow outcome, when the workflow ran to a terminal state.
    pub outcome: Option<SignOutcome>,
}

impl CommandReport {
    fn from_rejection(rejection: Rejection) -> Self {
        Self {
            exit_code: rejection.exit_code,
            message: rejection.message,
            outcome: None,
        }
    }

    fn from_error(error: &SigningError) -> Self {
        Self {
            exit_code: error.exit_code(),
            message: error.to_string(),
            outcome: None,
        }
    }

    fn from_outcome(outcome: SignOutcome) -> Self {
        Self {
            exit_code: outcome.exit_code(),
            message: outcome.message().to_string(),
            outcome: Some(outcome),
        }
    }
}

/// The `sign` command.
pub struct SignCommand {
    backend: Arc<dyn SigningBackend>,
}

impl SignCommand {
    #[must_use]
    pub fn new(backend: Arc<dyn SigningBackend>) -> Self {
        Self { backend }
    }

    /// Validate, sign and map the result to an exit code.
    pub async fn execute(&self, args: &SignCommandArgs) -> CommandReport {
        let request = match args.validate() {
            Ok(request) => request,
            Err(rejection) => {
                log::error!("{}", rejection.message);
                return CommandReport::from_rejection(rejection);
            }
        };

        let report = match self.sign(&request).await {
            Ok(outcome) => CommandReport::from_outcome(outcome),
            Err(e) => CommandReport::from_error(&e),
        };
        match report.exit_code {
            ExitCode::Success => log::info!("{}", report.message),
            _ => log::error!("{}", report.message),
        }
        report
    }

    async fn sign(&self, request: &ValidatedSignRequest) -> Result<SignOutcome, SigningError> {
        let identity = self
            .backend
            .materialize(&request.access, request.file_digest, request.file_digest)
            .await?;

        let mut workflow = SignWorkflow::new(request.force);
        if let Some(url) = &request.timestamp_url {
            let authority = self.backend.timestamp_authority(url)?;
            workflow = workflow.with_timestamp(authority, request.timestamp_digest);
        }

        let context = SigningContext::new(identity);
        let result = workflow.run(&request.file, &context).await;
        context.close();

        Ok(result?.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn args(file: PathBuf) -> SignCommandArgs {
        SignCommandArgs {
            file,
            vault_url: Some("https://contoso.vault.azure.net".to_string()),
            access_token: Some("token".to_string()),
            certificate: Some("release".to_string()),
            ..SignCommandArgs::default()
        }
    }

    #[test]
    fn checks_run_in_order() {
        // no file, no url, no credentials: the url is reported first
        let err = SignCommandArgs::default().validate().unwrap_err();
        assert_eq!(err.exit_code, ExitCode::InvalidOptions);
        assert!(err.message.contains("URL must be specified"));

        let mut a = args(PathBuf::from("/definitely/missing.ps1"));
        a.access_token = None;
        a.client_id = Some("id".to_string());
        let err = a.validate().unwrap_err();
        assert!(err.message.contains("Client Secret"));

        let mut a = args(PathBuf::from("/definitely/missing.ps1"));
        a.certificate = Some(" ".to_string());
        let err = a.validate().unwrap_err();
        assert!(err.message.contains("Certificate Name"));
    }

    #[test]
    fn bad_timestamp_url_is_an_operational_failure() {
        let file = NamedTempFile::new().unwrap();
        for url in ["ftp://ts.example.com", "definitely not a url"] {
            let mut a = args(file.path().to_path_buf());
            a.timestamp_url = Some(url.to_string());
            let err = a.validate().unwrap_err();
            assert_eq!(err.exit_code, ExitCode::Failed);
            assert_eq!(err.message, "Specified timestamp URL is invalid.");
        }
    }

    #[test]
    fn timestamp_url_is_checked_before_file_existence() {
        let mut a = args(PathBuf::from("/definitely/missing.ps1"));
        a.timestamp_url = Some("ftp://ts.example.com".to_string());
        assert_eq!(
            a.validate().unwrap_err().message,
            "Specified timestamp URL is invalid."
        );

        a.timestamp_url = None;
        let err = a.validate().unwrap_err();
        assert_eq!(err.exit_code, ExitCode::Failed);
        assert_eq!(err.message, "Specified file does not exist.");
    }

    #[test]
    fn digest_names_are_resolved_last() {
        let file = NamedTempFile::new().unwrap();
        let mut a = args(file.path().to_path_buf());
        a.file_digest = Some("md5".to_string());
        a.timestamp_algorithm = Some("md5".to_string());
        let err = a.validate().unwrap_err();
        assert_eq!(err.exit_code, ExitCode::InvalidOptions);
        assert!(err.message.contains("file digest"));

        a.file_digest = Some("SHA384".to_string());
        let err = a.validate().unwrap_err();
        assert!(err.message.contains("timestamp digest"));

        a.timestamp_algorithm = None;
        let request = a.validate().unwrap();
        assert_eq!(request.file_digest, HashAlgorithm::Sha384);
        assert_eq!(request.timestamp_digest, HashAlgorithm::Sha256);
    }

    #[test]
    fn access_token_wins_over_client_credentials() {
        let file = NamedTempFile::new().unwrap();
        let mut a = args(file.path().to_path_buf());
        a.client_id = Some("id".to_string());
        let request = a.validate().unwrap();
        assert!(matches!(
            request.access.credentials,
            VaultCredentials::AccessToken(_)
        ));
    }
}
