//! `SignWorkflow` drives one sign operation over one script.
//!
//! ```text
//! Start -> AlreadySignedCheck -> Blocked
//!                             -> Signing -> Signed -> TimestampingSkipped -> Complete
//!                                                  -> Timestamping -> Complete
//!                                                                  -> TimestampFailed
//! ```
//!
//! The already-signed guard is a plain function of the existing signature
//! count and the force flag, so the policy is testable without any signing.
//! A failure while signing is returned as an error and leaves the script
//! untouched; a failed timestamp leaves the committed signature in place.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::adapters::package::{ContentPreset, ScriptPackage};
use crate::domain::crypto::HashAlgorithm;
use crate::domain::outcome::{ExitCode, TimestampOutcome};
use crate::infra::error::SigningResult;
use crate::services::signing_context::SigningContext;
use crate::services::timestamp::TimestampAuthority;

/// States of one workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Start,
    AlreadySignedCheck,
    Blocked,
    Signing,
    Signed,
    TimestampingSkipped,
    Timestamping,
    Complete,
    TimestampFailed,
}

impl WorkflowState {
    /// Whether `next` directly follows `self`.
    #[must_use]
    pub fn can_advance_to(self, next: WorkflowState) -> bool {
        use WorkflowState::*;
        matches!(
            (self, next),
            (Start, AlreadySignedCheck)
                | (AlreadySignedCheck, Blocked | Signing)
                | (Signing, Signed)
                | (Signed, TimestampingSkipped | Timestamping)
                | (TimestampingSkipped, Complete)
                | (Timestamping, Complete | TimestampFailed)
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowState::Blocked | WorkflowState::Complete | WorkflowState::TimestampFailed
        )
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Decision of the already-signed guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Sign, discarding `replaces` existing signatures.
    Proceed { replaces: usize },
    /// Refuse: the script is signed and overwriting was not requested.
    Block,
}

/// Signing is not additive: an existing signature blocks unless forced.
#[must_use]
pub fn existing_signature_guard(existing: usize, force: bool) -> GuardDecision {
    match (existing, force) {
        (0, _) => GuardDecision::Proceed { replaces: 0 },
        (n, true) => GuardDecision::Proceed { replaces: n },
        (_, false) => GuardDecision::Block,
    }
}

/// Terminal result of a run that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutcome {
    Complete,
    Blocked,
    TimestampFailed,
}

impl SignOutcome {
    #[must_use]
    pub fn exit_code(self) -> ExitCode {
        match self {
            SignOutcome::Complete => ExitCode::Success,
            SignOutcome::Blocked | SignOutcome::TimestampFailed => ExitCode::Failed,
        }
    }

    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            SignOutcome::Complete => "The signing operation is complete.",
            SignOutcome::Blocked => "The file is already signed.",
            SignOutcome::TimestampFailed => {
                "The file was signed, but timestamping the signature failed."
            }
        }
    }
}

/// What a run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignReport {
    pub outcome: SignOutcome,
    /// Every state entered, in order.
    pub states: Vec<WorkflowState>,
    /// Signatures discarded by a forced run.
    pub replaced_signatures: usize,
}

/// Authority and digest used for the optional timestamp step.
#[derive(Clone)]
pub struct TimestampPlan {
    pub authority: Arc<dyn TimestampAuthority>,
    pub digest_algorithm: HashAlgorithm,
}

impl fmt::Debug for TimestampPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimestampPlan")
            .field("authority", &self.authority.authority())
            .field("digest_algorithm", &self.digest_algorithm)
            .finish()
    }
}

struct Trail {
    states: Vec<WorkflowState>,
}

impl Trail {
    fn new() -> Self {
        Self {
            states: vec![WorkflowState::Start],
        }
    }

    fn current(&self) -> WorkflowState {
        self.states.last().copied().unwrap_or(WorkflowState::Start)
    }

    fn advance(&mut self, next: WorkflowState) {
        debug_assert!(
            self.current().can_advance_to(next),
            "invalid transition {} -> {next}",
            self.current()
        );
        log::debug!("workflow: {} -> {next}", self.current());
        self.states.push(next);
    }
}

#[derive(Debug, Clone)]
pub struct SignWorkflow {
    force: bool,
    preset: ContentPreset,
    timestamp: Option<TimestampPlan>,
}

impl SignWorkflow {
    #[must_use]
    pub fn new(force: bool) -> Self {
        Self {
            force,
            preset: ContentPreset::PowerShellScript,
            timestamp: None,
        }
    }

    #[must_use]
    pub fn with_timestamp(
        mut self,
        authority: Arc<dyn TimestampAuthority>,
        digest_algorithm: HashAlgorithm,
    ) -> Self {
        self.timestamp = Some(TimestampPlan {
            authority,
            digest_algorithm,
        });
        self
    }

    #[must_use]
    pub fn with_preset(mut self, preset: ContentPreset) -> Self {
        self.preset = preset;
        self
    }

    #[must_use]
    pub fn force(&self) -> bool {
        self.force
    }

    /// Run the workflow on the script at `path`.
    ///
    /// The script stays exclusively locked until the run ends.
    ///
    /// # Errors
    /// Opening the script, computing its digest, remote signing and
    /// committing the signature fail the run with the underlying error.
    pub async fn run(
        &self,
        path: impl AsRef<Path>,
        context: &SigningContext,
    ) -> SigningResult<SignReport> {
        let path = path.as_ref();
        let mut trail = Trail::new();
        let mut package = ScriptPackage::open_read_write(path)?;

        trail.advance(WorkflowState::AlreadySignedCheck);
        let existing = package.signatures().len();
        let replaced_signatures = match existing_signature_guard(existing, self.force) {
            GuardDecision::Block => {
                log::warn!(
                    "{} already carries {existing} signature(s) and --force was not given",
                    path.display()
                );
                trail.advance(WorkflowState::Blocked);
                return Ok(SignReport {
                    outcome: SignOutcome::Blocked,
                    states: trail.states,
                    replaced_signatures: 0,
                });
            }
            GuardDecision::Proceed { replaces } => replaces,
        };
        if replaced_signatures > 0 {
            log::info!("Replacing {replaced_signatures} existing signature(s)");
        }

        trail.advance(WorkflowState::Signing);
        log::info!(
            "Signing {} with {} ({})",
            path.display(),
            context.certificate().subject(),
            context.file_digest_algorithm()
        );
        let signed = package
            .signature_builder()
            .enqueue_preset(self.preset)
            .sign(context)
            .await?;
        trail.advance(WorkflowState::Signed);

        let outcome = match &self.timestamp {
            None => {
                trail.advance(WorkflowState::TimestampingSkipped);
                trail.advance(WorkflowState::Complete);
                SignOutcome::Complete
            }
            Some(plan) => {
                trail.advance(WorkflowState::Timestamping);
                log::info!(
                    "Timestamping with {} ({})",
                    plan.authority.authority(),
                    plan.digest_algorithm
                );
                match signed
                    .timestamp_builder()
                    .sign(plan.authority.as_ref(), plan.digest_algorithm)
                    .await
                {
                    TimestampOutcome::Success => {
                        trail.advance(WorkflowState::Complete);
                        SignOutcome::Complete
                    }
                    TimestampOutcome::Failed => {
                        trail.advance(WorkflowState::TimestampFailed);
                        SignOutcome::TimestampFailed
                    }
                }
            }
        };

        Ok(SignReport {
            outcome,
            states: trail.states,
            replaced_signatures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_blocks_only_unforced_resigning() {
        assert_eq!(
            existing_signature_guard(0, false),
            GuardDecision::Proceed { replaces: 0 }
        );
        assert_eq!(
            existing_signature_guard(0, true),
            GuardDecision::Proceed { replaces: 0 }
        );
        assert_eq!(existing_signature_guard(1, false), GuardDecision::Block);
        assert_eq!(existing_signature_guard(3, false), GuardDecision::Block);
        assert_eq!(
            existing_signature_guard(2, true),
            GuardDecision::Proceed { replaces: 2 }
        );
    }

    #[test]
    fn transitions_follow_the_state_machine() {
        use WorkflowState::*;
        assert!(Start.can_advance_to(AlreadySignedCheck));
        assert!(AlreadySignedCheck.can_advance_to(Blocked));
        assert!(Signed.can_advance_to(Timestamping));
        assert!(Timestamping.can_advance_to(TimestampFailed));

        assert!(!Start.can_advance_to(Signing));
        assert!(!Blocked.can_advance_to(Signing));
        assert!(!TimestampingSkipped.can_advance_to(TimestampFailed));
        assert!(!Signing.can_advance_to(Complete));
    }

    #[test]
    fn terminal_states() {
        use WorkflowState::*;
        for state in [Blocked, Complete, TimestampFailed] {
            assert!(state.is_terminal());
        }
        for state in [Start, AlreadySignedCheck, Signing, Signed, Timestamping] {
            assert!(!state.is_terminal());
        }
    }

    #[test]
    fn outcomes_map_to_exit_codes() {
        assert_eq!(SignOutcome::Complete.exit_code(), ExitCode::Success);
        assert_eq!(SignOutcome::Blocked.exit_code(), ExitCode::Failed);
        assert_eq!(SignOutcome::TimestampFailed.exit_code(), ExitCode::Failed);
        assert!(SignOutcome::Blocked.message().contains("already signed"));
    }
}
