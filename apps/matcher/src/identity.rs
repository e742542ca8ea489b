use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque role tag handed over by the session/identity component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleTag(String);

impl RoleTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Admins and the backend team curate the JD catalogue; recruiters only use it.
    pub fn manages_documents(&self) -> bool {
        matches!(self.0.as_str(), "admin" | "backend_team")
    }
}

impl fmt::Display for RoleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who is driving the session, as read from the external session store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    #[serde(default)]
    pub username: Option<String>,
    pub role: RoleTag,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: None,
            role: RoleTag::new(role),
        }
    }
}
