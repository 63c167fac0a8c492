//! Consultation case models.

use serde::{Deserialize, Serialize};

/// Case triage status.
///
/// `Urgent` and `Monitoring` are the active statuses; `Stable` is terminal.
/// A completed case never returns to an active status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Urgent,
    Monitoring,
    Stable,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Urgent => "urgent",
            CaseStatus::Monitoring => "monitoring",
            CaseStatus::Stable => "stable",
        }
    }

    pub fn parse(s: &str) -> Option<CaseStatus> {
        match s {
            "urgent" => Some(CaseStatus::Urgent),
            "monitoring" => Some(CaseStatus::Monitoring),
            "stable" => Some(CaseStatus::Stable),
            _ => None,
        }
    }

    /// Completed cases are terminal and knowledge-base eligible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaseStatus::Stable)
    }
}

/// A consultation case: one patient, one diagnosis under discussion, and the
/// circle of practitioners treating it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Case {
    /// Opaque UUID
    pub id: String,
    pub patient_id: String,
    /// Creating practitioner; None once that account is removed
    pub created_by: Option<String>,
    /// Primary diagnosis (ICD-style free text)
    pub diagnosis: String,
    /// Clinical summary the discussion starts from
    pub description: String,
    pub status: CaseStatus,
    /// Admission date (YYYY-MM-DD)
    pub admission_date: String,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl Case {
    /// Create a new case in an active status.
    pub fn new(
        patient_id: String,
        created_by: String,
        diagnosis: String,
        description: String,
        status: CaseStatus,
        admission_date: String,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            created_by: Some(created_by),
            diagnosis,
            description,
            status,
            admission_date,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Input for opening a case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseDraft {
    pub patient_id: String,
    /// The opening practitioner; always merged into the participant set
    pub created_by: String,
    pub diagnosis: String,
    pub description: String,
    /// Initial status; must be an active one
    pub status: CaseStatus,
    /// Admission date (YYYY-MM-DD)
    pub admission_date: String,
    /// Invited practitioners; duplicates and the creator are deduplicated
    pub participant_ids: Vec<String>,
}

/// A participant as projected for access decisions and detail views.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseParticipant {
    pub practitioner_id: String,
    /// Full name, or email when no name is on file
    pub display_name: String,
    pub organization: Option<String>,
    pub specialty: Option<String>,
}

/// Everything the access policy needs to know about one case.
///
/// Assembled by the store (`Database::case_access_view`); the policy itself
/// never touches storage.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseAccessView {
    pub case_id: String,
    pub status: CaseStatus,
    pub created_by: Option<String>,
    pub creator_organization: Option<String>,
    pub patient_organization: Option<String>,
    pub participants: Vec<CaseParticipant>,
}

impl CaseAccessView {
    pub fn is_participant(&self, practitioner_id: &str) -> bool {
        self.participants
            .iter()
            .any(|p| p.practitioner_id == practitioner_id)
    }

    /// True when the creator reference is set but absent from the
    /// participant set. Creation always merges the creator in, so a hit here
    /// is a data-integrity defect to report on read paths, not repair.
    pub fn creator_missing(&self) -> bool {
        match &self.created_by {
            Some(creator) => !self.is_participant(creator),
            None => false,
        }
    }
}
