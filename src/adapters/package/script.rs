//! PowerShell script file handling.

use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::domain::constants::{SIG_BLOCK_BEGIN, SIG_BLOCK_END};
use crate::domain::crypto::DigestBytes;
use crate::infra::error::{SigningError, SigningResult};

use super::builder::SignatureBuilder;
use super::envelope::{signed_info, SignatureEnvelope};
use super::PackageFileMode;

/// Result of checking one embedded signature.
#[derive(Debug, Clone)]
pub struct SignatureVerification {
    pub subject: String,
    pub thumbprint: String,
    pub signed_at: u64,
    pub timestamped: bool,
    pub valid: bool,
    /// Why the signature is not valid.
    pub reason: Option<String>,
}

/// An open script file and its parsed signature blocks.
#[derive(Debug)]
pub struct ScriptPackage {
    path: PathBuf,
    file: File,
    mode: PackageFileMode,
    body: String,
    line_ending: &'static str,
    signatures: Vec<SignatureEnvelope>,
}

impl ScriptPackage {
    /// Open a script. `ReadWrite` takes an exclusive lock on the file.
    ///
    /// # Errors
    /// `IoError` if the file cannot be opened or is locked by someone else,
    /// `PackageError` if it is not UTF-8 or carries a malformed signature
    /// block.
    pub fn open(path: impl AsRef<Path>, mode: PackageFileMode) -> SigningResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(mode == PackageFileMode::ReadWrite)
            .open(&path)
            .map_err(|e| SigningError::IoError(format!("Failed to open {}: {e}", path.display())))?;

        if mode == PackageFileMode::ReadWrite {
            lock_exclusive(&file, &path)?;
        }

        let text = read_text(&mut file, &path)?;
        let (body, signatures, line_ending) = parse(&text)?;
        log::debug!(
            "Opened {} ({} bytes of script, {} signature(s))",
            path.display(),
            body.len(),
            signatures.len()
        );

        Ok(Self {
            path,
            file,
            mode,
            body,
            line_ending,
            signatures,
        })
    }

    pub fn open_read_write(path: impl AsRef<Path>) -> SigningResult<Self> {
        Self::open(path, PackageFileMode::ReadWrite)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn mode(&self) -> PackageFileMode {
        self.mode
    }

    /// Embedded signatures, oldest first.
    #[must_use]
    pub fn signatures(&self) -> &[SignatureEnvelope] {
        &self.signatures
    }

    #[must_use]
    pub fn line_ending(&self) -> &'static str {
        self.line_ending
    }

    /// Script text the signature covers: the body, ending in a line break.
    #[must_use]
    pub fn normalized_body(&self) -> String {
        if self.body.is_empty() || self.body.ends_with('\n') {
            self.body.clone()
        } else {
            format!("{}{}", self.body, self.line_ending)
        }
    }

    /// Start building a signature for this package.
    pub fn signature_builder(&mut self) -> SignatureBuilder<'_> {
        SignatureBuilder::new(self)
    }

    /// Check every embedded signature against the current content.
    pub fn verify_signatures(&self) -> Vec<SignatureVerification> {
        self.signatures
            .iter()
            .map(|envelope| self.verify_one(envelope))
            .collect()
    }

    fn verify_one(&self, envelope: &SignatureEnvelope) -> SignatureVerification {
        let mut report = SignatureVerification {
            subject: String::new(),
            thumbprint: String::new(),
            signed_at: envelope.signed_at,
            timestamped: envelope.is_timestamped(),
            valid: false,
            reason: None,
        };

        match self.check(envelope, &mut report) {
            Ok(None) => report.valid = true,
            Ok(Some(reason)) => report.reason = Some(reason),
            Err(e) => report.reason = Some(e.to_string()),
        }
        report
    }

    /// `Ok(None)` when the envelope verifies, otherwise the reason it does not.
    fn check(
        &self,
        envelope: &SignatureEnvelope,
        report: &mut SignatureVerification,
    ) -> SigningResult<Option<String>> {
        let certificate = envelope.certificate()?;
        report.subject = certificate.subject();
        report.thumbprint = certificate.thumbprint();

        let preset = envelope.preset()?;
        let recorded = envelope.recorded_content_digest()?;
        let actual = DigestBytes::compute(recorded.algorithm(), &preset.select(self));
        if actual != recorded {
            return Ok(Some("script content has changed since signing".to_string()));
        }

        let pkcs_digest = envelope.pkcs_digest_algorithm()?;
        let digest = pkcs_digest.digest(&signed_info(preset, &recorded));
        if certificate.verify_digest(pkcs_digest, &digest, &envelope.signature_bytes()?)? {
            Ok(None)
        } else {
            Ok(Some("signature does not match the certificate".to_string()))
        }
    }

    /// Replace every signature block with `signatures` and write the file
    /// atomically.
    pub(crate) fn commit(&mut self, signatures: Vec<SignatureEnvelope>) -> SigningResult<()> {
        if self.mode != PackageFileMode::ReadWrite {
            return Err(SigningError::PackageError(format!(
                "{} was opened read-only",
                self.path.display()
            )));
        }

        let mut text = self.normalized_body();
        for envelope in &signatures {
            text.push_str(&envelope.to_block(self.line_ending)?);
        }

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(text.as_bytes())?;
        staged.as_file().sync_all()?;
        let permissions = self.file.metadata()?.permissions();
        fs::set_permissions(staged.path(), permissions)?;
        // lock the replacement before it becomes visible at the path
        lock_exclusive(staged.as_file(), staged.path())?;
        self.file = staged.persist(&self.path).map_err(|e| {
            SigningError::IoError(format!("Failed to replace {}: {}", self.path.display(), e.error))
        })?;
        self.body = self.normalized_body();
        self.signatures = signatures;

        log::info!(
            "Wrote {} with {} signature block(s)",
            self.path.display(),
            self.signatures.len()
        );
        Ok(())
    }

    /// Most recently written envelope.
    pub(crate) fn newest_signature(&self) -> Option<&SignatureEnvelope> {
        self.signatures.last()
    }
}

fn lock_exclusive(file: &File, path: &Path) -> SigningResult<()> {
    file.try_lock().map_err(|e| match e {
        TryLockError::WouldBlock => SigningError::IoError(format!(
            "{} is in use by another signing operation",
            path.display()
        )),
        TryLockError::Error(e) => {
            SigningError::IoError(format!("Failed to lock {}: {e}", path.display()))
        }
    })
}

fn read_text(file: &mut File, path: &Path) -> SigningResult<String> {
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    String::from_utf8(bytes).map_err(|_| {
        SigningError::PackageError(format!("{} is not a UTF-8 text file", path.display()))
    })
}

fn detect_line_ending(text: &str) -> &'static str {
    if text.contains("\r\n") {
        "\r\n"
    } else if text.contains('\n') {
        "\n"
    } else {
        "\r\n"
    }
}

/// Split a script into body, signature envelopes and line ending.
fn parse(text: &str) -> SigningResult<(String, Vec<SignatureEnvelope>, &'static str)> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == SIG_BLOCK_BEGIN {
            break;
        }
        offset += line.len();
    }
    let (body, tail) = text.split_at(offset);

    let line_ending = if body.contains('\n') {
        detect_line_ending(body)
    } else {
        detect_line_ending(text)
    };

    let mut signatures = Vec::new();
    let mut block: Option<Vec<&str>> = None;
    for (index, raw) in tail.split('\n').enumerate() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        let Some(lines) = block.as_mut() else {
            if line == SIG_BLOCK_BEGIN {
                block = Some(Vec::new());
            } else if !line.trim().is_empty() {
                return Err(SigningError::PackageError(format!(
                    "Unexpected content after signature block (line {}): '{line}'",
                    index + 1
                )));
            }
            continue;
        };
        if line == SIG_BLOCK_END {
            signatures.push(SignatureEnvelope::from_block_lines(lines.iter().copied())?);
            block = None;
        } else {
            lines.push(line);
        }
    }
    if block.is_some() {
        return Err(SigningError::PackageError(
            "Signature block is not terminated".to_string(),
        ));
    }

    Ok((body.to_string(), signatures, line_ending))
}
