//! Practitioner directory models.

use serde::{Deserialize, Serialize};

/// Access tier of a practitioner account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular practitioner; reach is membership-based
    Practitioner,
    /// Organization administrator; reaches active cases touching their organization
    OrgAdmin,
    /// Unrestricted administrator
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Practitioner => "practitioner",
            Role::OrgAdmin => "org_admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "practitioner" => Some(Role::Practitioner),
            "org_admin" => Some(Role::OrgAdmin),
            "super_admin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }
}

/// Authorization scope derived from role plus affiliation.
///
/// An org admin without an organization on file degrades to plain
/// practitioner scope; membership rules still apply to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessScope {
    SuperAdmin,
    OrgAdmin { organization: String },
    Practitioner,
}

/// A practitioner account as seen by the case engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Practitioner {
    /// Opaque UUID
    pub id: String,
    /// Unique login email
    pub email: String,
    /// Display name; may be empty
    pub full_name: String,
    /// Access tier
    pub role: Role,
    /// Organization identifier, if affiliated
    pub organization: Option<String>,
    /// Medical specialty (e.g. "Cardiology")
    pub specialty: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl Practitioner {
    /// Create a new practitioner with required fields.
    pub fn new(email: String, role: Role) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            full_name: String::new(),
            role,
            organization: None,
            specialty: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Name shown in threads and summaries: the full name when present,
    /// otherwise the email.
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            &self.email
        } else {
            &self.full_name
        }
    }

    /// Derive the scope the access policy dispatches on.
    pub fn scope(&self) -> AccessScope {
        match (self.role, &self.organization) {
            (Role::SuperAdmin, _) => AccessScope::SuperAdmin,
            (Role::OrgAdmin, Some(org)) => AccessScope::OrgAdmin {
                organization: org.clone(),
            },
            _ => AccessScope::Practitioner,
        }
    }
}
