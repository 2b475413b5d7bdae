//! User records — one persisted document per sender.

pub mod model;

pub use model::{SenderProfile, UserPatch, UserRecord, UserStatus};
