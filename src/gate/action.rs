//! Inline action tags — the `verb|sender_id` strings bound to buttons.

use std::fmt;
use std::str::FromStr;

use crate::error::ActionError;
use crate::identity::SenderId;

/// Admin decision on an access request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Reject => "reject",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed action payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionTag {
    /// `requestAccess|<id>`: a user asks for access.
    RequestAccess(SenderId),
    /// `allow|<id>` / `reject|<id>`: the admin decides.
    Resolve(Decision, SenderId),
}

impl ActionTag {
    pub fn allow(id: &SenderId) -> Self {
        Self::Resolve(Decision::Allow, id.clone())
    }

    pub fn reject(id: &SenderId) -> Self {
        Self::Resolve(Decision::Reject, id.clone())
    }

    pub fn request_access(id: &SenderId) -> Self {
        Self::RequestAccess(id.clone())
    }
}

impl fmt::Display for ActionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestAccess(id) => write!(f, "requestAccess|{id}"),
            Self::Resolve(decision, id) => write!(f, "{decision}|{id}"),
        }
    }
}

impl FromStr for ActionTag {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ActionError::Malformed(s.to_string());

        let (verb, rest) = s.split_once('|').ok_or_else(malformed)?;
        let id = SenderId::new(rest);
        if id.is_empty() {
            return Err(malformed());
        }

        match verb {
            "requestAccess" => Ok(Self::RequestAccess(id)),
            "allow" => Ok(Self::Resolve(Decision::Allow, id)),
            "reject" => Ok(Self::Resolve(Decision::Reject, id)),
            _ => Err(malformed()),
        }
    }
}
