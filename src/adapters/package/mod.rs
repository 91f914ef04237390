//! Script package adapter.
//!
//! Treats a PowerShell script (or module, or manifest) as a signable package:
//! opening it exclusively, listing embedded signatures, and rewriting the
//! signature block atomically.

pub mod builder;
pub mod envelope;
pub mod script;

use std::fmt;
use std::str::FromStr;

use crate::infra::error::{SigningError, SigningResult};

pub use builder::{SignatureBuilder, SignedScript, TimestampBuilder};
pub use envelope::{SignatureEnvelope, ENVELOPE_VERSION};
pub use script::{ScriptPackage, SignatureVerification};

/// Named selection of package content covered by a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentPreset {
    /// The script text preceding the signature block.
    PowerShellScript,
}

impl ContentPreset {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ContentPreset::PowerShellScript => "PowerShellScript",
        }
    }

    /// Bytes of `package` this preset selects.
    #[must_use]
    pub fn select(&self, package: &ScriptPackage) -> Vec<u8> {
        match self {
            ContentPreset::PowerShellScript => package.normalized_body().into_bytes(),
        }
    }
}

impl FromStr for ContentPreset {
    type Err = SigningError;

    fn from_str(s: &str) -> SigningResult<Self> {
        match s {
            "PowerShellScript" => Ok(ContentPreset::PowerShellScript),
            other => Err(SigningError::PackageError(format!(
                "Unknown content preset '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ContentPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a package file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageFileMode {
    /// Shared read access, no lock, no commits.
    Read,
    /// Exclusive lock held until the package is dropped.
    ReadWrite,
}
