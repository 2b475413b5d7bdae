//! User record data model — status lifecycle, records, and patches.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::SenderId;

/// Access status of a sender.
///
/// `New` means a request is pending. `Registered` and `Rejected` are
/// terminal under normal flow; only an admin decision moves a record out
/// of `New`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    New,
    Registered,
    Rejected,
}

impl UserStatus {
    /// Check if a normal-flow transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: UserStatus) -> bool {
        use UserStatus::*;
        matches!((self, target), (New, Registered) | (New, Rejected))
    }

    /// Whether the handshake for this record has been resolved.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Registered | Self::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Registered => "registered",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "registered" => Ok(Self::Registered),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown user status: {other}")),
        }
    }
}

/// Identity details the transport reports for a sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderProfile {
    pub id: SenderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
}

impl SenderProfile {
    /// A profile carrying only an id.
    pub fn bare(id: impl Into<SenderId>) -> Self {
        Self {
            id: id.into(),
            username: None,
            first_name: None,
            last_name: None,
            language_code: None,
            is_bot: false,
        }
    }

    /// Builder: set username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Builder: set first and last name.
    pub fn with_name(mut self, first: impl Into<String>, last: Option<&str>) -> Self {
        self.first_name = Some(first.into());
        self.last_name = last.map(String::from);
        self
    }

    /// First and last name joined, or empty.
    pub fn display_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }

    /// Multi-line JSON view shown to the admin.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{{\"id\": \"{}\"}}", self.id))
    }
}

/// Persisted per-sender document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: SenderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub display_name: String,
    pub status: UserStatus,
    #[serde(default)]
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub status_set_at: DateTime<Utc>,
}

impl UserRecord {
    /// A fresh `new` record for a first-time sender.
    pub fn from_profile(profile: &SenderProfile) -> Self {
        let now = Utc::now();
        Self {
            id: profile.id.clone(),
            username: profile.username.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            display_name: profile.display_name(),
            status: UserStatus::New,
            is_admin: false,
            created_at: now,
            status_set_at: now,
        }
    }

    /// A record for the configured admin: registered from the start.
    pub fn admin_from_profile(profile: &SenderProfile) -> Self {
        Self {
            status: UserStatus::Registered,
            is_admin: true,
            ..Self::from_profile(profile)
        }
    }

    /// Whether this record already reflects a fully registered admin.
    pub fn is_registered_admin(&self) -> bool {
        self.is_admin && self.status == UserStatus::Registered
    }

    /// Apply a patch in place. A status change also stamps `status_set_at`.
    pub fn apply(&mut self, patch: &UserPatch, now: DateTime<Utc>) {
        if let Some(status) = patch.status {
            self.status = status;
            self.status_set_at = now;
        }
        if let Some(is_admin) = patch.is_admin {
            self.is_admin = is_admin;
        }
    }

    /// Multi-line JSON view echoed back to the admin.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{{\"id\": \"{}\"}}", self.id))
    }
}

/// Partial update applied by `UserStore::update`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub status: Option<UserStatus>,
    pub is_admin: Option<bool>,
}

impl UserPatch {
    pub fn status(status: UserStatus) -> Self {
        Self {
            status: Some(status),
            is_admin: None,
        }
    }

    /// Upgrade an existing record to a registered admin.
    pub fn promote_admin() -> Self {
        Self {
            status: Some(UserStatus::Registered),
            is_admin: Some(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        use UserStatus::*;
        assert!(New.can_transition_to(Registered));
        assert!(New.can_transition_to(Rejected));
    }

    #[test]
    fn invalid_transitions() {
        use UserStatus::*;
        assert!(!Registered.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Registered));
        assert!(!Registered.can_transition_to(New));
        assert!(!Rejected.can_transition_to(New));
        // Self-transition
        assert!(!New.can_transition_to(New));
    }

    #[test]
    fn is_terminal() {
        assert!(!UserStatus::New.is_terminal());
        assert!(UserStatus::Registered.is_terminal());
        assert!(UserStatus::Rejected.is_terminal());
    }

    #[test]
    fn display_matches_serde() {
        for status in [UserStatus::New, UserStatus::Registered, UserStatus::Rejected] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(format!("\"{status}\""), json);
            assert_eq!(status.to_string().parse::<UserStatus>().unwrap(), status);
        }
        assert!("pending".parse::<UserStatus>().is_err());
    }

    #[test]
    fn display_name_trims_missing_parts() {
        let profile = SenderProfile::bare(42).with_name("Ada", None);
        assert_eq!(profile.display_name(), "Ada");

        let profile = SenderProfile::bare(42).with_name("Ada", Some("Lovelace"));
        assert_eq!(profile.display_name(), "Ada Lovelace");

        assert_eq!(SenderProfile::bare(42).display_name(), "");
    }

    #[test]
    fn new_record_starts_pending() {
        let profile = SenderProfile::bare(42).with_username("ada");
        let record = UserRecord::from_profile(&profile);
        assert_eq!(record.id, SenderId::from(42));
        assert_eq!(record.status, UserStatus::New);
        assert!(!record.is_admin);
        assert_eq!(record.created_at, record.status_set_at);
        assert_eq!(record.username.as_deref(), Some("ada"));
    }

    #[test]
    fn admin_record_is_registered() {
        let record = UserRecord::admin_from_profile(&SenderProfile::bare(1));
        assert!(record.is_registered_admin());
    }

    #[test]
    fn apply_status_stamps_time() {
        let mut record = UserRecord::from_profile(&SenderProfile::bare(42));
        let later = record.status_set_at + chrono::Duration::seconds(10);
        record.apply(&UserPatch::status(UserStatus::Registered), later);
        assert_eq!(record.status, UserStatus::Registered);
        assert_eq!(record.status_set_at, later);
        assert!(!record.is_admin);
    }

    #[test]
    fn apply_without_status_keeps_timestamp() {
        let mut record = UserRecord::from_profile(&SenderProfile::bare(42));
        let before = record.status_set_at;
        let patch = UserPatch {
            status: None,
            is_admin: Some(true),
        };
        record.apply(&patch, before + chrono::Duration::seconds(10));
        assert_eq!(record.status_set_at, before);
        assert!(record.is_admin);
    }
}
