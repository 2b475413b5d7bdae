//! Access gate — admission state machine and approval handshake.

pub mod action;
pub mod admission;
pub mod approval;
pub mod locks;
pub mod notify;
pub mod prompts;

#[cfg(test)]
pub(crate) mod testing;

pub use action::{ActionTag, Decision};
pub use admission::{Admission, AdmissionGate, AdmitReason, Termination, Verdict, decide};
pub use approval::{ApprovalProtocol, InitiateOutcome, InitiateSource, ResolveOutcome};
pub use locks::{SenderGuard, SenderLocks};
pub use notify::Notifier;
