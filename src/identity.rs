// Authenticated caller identity
//
// Produced by the upstream identity layer; the pipeline never verifies
// credentials itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Counselor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Counselor => "counselor",
            Role::Admin => "admin",
        }
    }

    /// Counselors and admins act on crisis alerts
    pub fn is_responder(&self) -> bool {
        matches!(self, Role::Counselor | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "counselor" | "counsellor" => Ok(Role::Counselor),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Identity of the message author as handed over by the auth layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentIdentity {
    pub id: String,
    /// Anonymous display alias; the only identifier shown on monitoring feeds
    pub alias: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub role: Role,
    /// Assigned responder, overrides the configured default
    #[serde(default)]
    pub responder_email: Option<String>,
    #[serde(default)]
    pub guardian_email: Option<String>,
}

impl StudentIdentity {
    pub fn student(id: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            alias: alias.into(),
            display_name: None,
            role: Role::Student,
            responder_email: None,
            guardian_email: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_guardian_email(mut self, email: impl Into<String>) -> Self {
        self.guardian_email = Some(email.into());
        self
    }

    pub fn with_responder_email(mut self, email: impl Into<String>) -> Self {
        self.responder_email = Some(email.into());
        self
    }
}
