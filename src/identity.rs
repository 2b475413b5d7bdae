//! Sender identity — canonical ids and the admin classifier.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical sender identifier.
///
/// Telegram user ids arrive as JSON integers in updates and as strings in
/// callback payloads and environment variables; both normalize to the same
/// trimmed string so `42`, `"42"` and `" 42 "` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SenderId(String);

impl SenderId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<i64> for SenderId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for SenderId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The configured admin identity. Immutable for the lifetime of the process.
#[derive(Debug, Clone, Default)]
pub struct AdminIdentity {
    admin: Option<SenderId>,
}

impl AdminIdentity {
    /// Build from an optional raw id. Blank values mean "no admin configured".
    pub fn new(raw: Option<&str>) -> Self {
        let admin = raw.map(SenderId::new).filter(|id| !id.is_empty());
        Self { admin }
    }

    /// Classifier with no admin: every sender is a non-admin.
    pub fn none() -> Self {
        Self { admin: None }
    }

    pub fn admin_id(&self) -> Option<&SenderId> {
        self.admin.as_ref()
    }

    pub fn is_admin(&self, sender: &SenderId) -> bool {
        self.admin.as_ref().is_some_and(|admin| admin == sender)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_and_string_ids_normalize_equal() {
        assert_eq!(SenderId::from(42), SenderId::new("42"));
        assert_eq!(SenderId::new(" 42\n"), SenderId::new("42"));
    }

    #[test]
    fn admin_matches_configured_id_only() {
        let admin = AdminIdentity::new(Some("1"));
        assert!(admin.is_admin(&SenderId::from(1)));
        assert!(!admin.is_admin(&SenderId::from(11)));
        assert!(!admin.is_admin(&SenderId::new("")));
    }

    #[test]
    fn missing_admin_is_never_admin() {
        let admin = AdminIdentity::none();
        assert!(!admin.is_admin(&SenderId::from(1)));

        let blank = AdminIdentity::new(Some("   "));
        assert!(blank.admin_id().is_none());
        assert!(!blank.is_admin(&SenderId::new("")));
    }

    #[test]
    fn sender_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&SenderId::from(42)).unwrap();
        assert_eq!(json, "\"42\"");
    }
}
