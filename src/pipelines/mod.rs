//! Pipelines: the signature workflow and the command that drives it.

pub mod command;
pub mod sign;

pub use command::{CommandReport, Rejection, SignCommand, SignCommandArgs, ValidatedSignRequest};
pub use sign::{
    existing_signature_guard, GuardDecision, SignOutcome, SignReport, SignWorkflow, TimestampPlan,
    WorkflowState,
};
