//! Key Vault Signer Library
//!
//! Signs PowerShell scripts and modules with a certificate whose private key
//! never leaves Azure Key Vault. The library turns "sign this digest" into a
//! request against the vault, verifies the result locally against the
//! certificate, embeds it in the script and optionally adds an RFC 3161
//! timestamp.
//!
//! Layering follows the usual direction of dependencies:
//! - [`domain`]: algorithms, certificates, validated input types, outcomes
//! - [`services`]: algorithm translation, signing context, timestamp protocol
//! - [`adapters`]: Key Vault REST client, timestamp HTTP client, script package
//! - [`pipelines`]: signature workflow and command orchestration
//! - [`infra`]: errors and configuration

pub mod adapters;
pub mod domain;
pub mod infra;
pub mod pipelines;
pub mod services;


pub use adapters::backend::{AzureKeyVaultBackend, SigningBackend, VaultAccess};
pub use adapters::package::{ContentPreset, PackageFileMode, ScriptPackage};
pub use domain::crypto::{DigestBytes, HashAlgorithm, SigningCertificate};
pub use domain::outcome::{ExitCode, TimestampOutcome};
pub use domain::types::{KeyHandle, KeyName, TimestampUrl, VaultCredentials};
pub use infra::config::{ConfigManager, SignerConfiguration};
pub use infra::error::{SigningError, SigningResult};
pub use pipelines::command::{CommandReport, SignCommand, SignCommandArgs};
pub use pipelines::sign::{SignOutcome, SignReport, SignWorkflow, WorkflowState};
pub use services::algorithm::{SignatureAlgorithm, WireAlgorithmId};
pub use services::signing_context::{RemoteSigningClient, SigningContext, SigningIdentity};
pub use services::timestamp::{TimestampAuthority, TimestampToken};
