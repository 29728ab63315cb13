use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable catalog identifier of a movie or show
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Identifier issued by the identity provider for a signed-in user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Current session identity: a signed-in user or anonymous (guest).
///
/// Serialized as an optional user id so a guest session is `null`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<UserId>", into = "Option<UserId>")]
pub enum Identity {
    #[default]
    Anonymous,
    User(UserId),
}

impl Identity {
    pub fn user(id: impl Into<String>) -> Self {
        Identity::User(UserId::new(id))
    }

    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Identity::Anonymous => None,
            Identity::User(id) => Some(id),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }
}

impl From<Option<UserId>> for Identity {
    fn from(id: Option<UserId>) -> Self {
        match id {
            Some(id) => Identity::User(id),
            None => Identity::Anonymous,
        }
    }
}

impl From<Identity> for Option<UserId> {
    fn from(identity: Identity) -> Self {
        match identity {
            Identity::Anonymous => None,
            Identity::User(id) => Some(id),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Anonymous => f.write_str("none"),
            Identity::User(id) => write!(f, "{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_serializes_as_optional_user() {
        let json = serde_json::to_string(&Identity::user("u1")).unwrap();
        assert_eq!(json, "\"u1\"");
        let json = serde_json::to_string(&Identity::Anonymous).unwrap();
        assert_eq!(json, "null");

        let parsed: Identity = serde_json::from_str("null").unwrap();
        assert!(parsed.is_anonymous());
    }

    #[test]
    fn test_identity_display() {
        assert_eq!(Identity::Anonymous.to_string(), "none");
        assert_eq!(Identity::user("abc").to_string(), "abc");
    }
}
