//! Knowledge base: the read-only projection over completed cases.
//!
//! Once a case turns `stable` it becomes searchable reference material for
//! every practitioner. Entries anonymize the treating circle down to its
//! specialty list and reduce the patient to age and gender; the patient's
//! name is searchable but never projected into an entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::{CaseError, CaseResult};
use crate::models::{Case, CaseMessage, CaseParticipant, Patient};

/// Result cap per query.
pub const MAX_RESULTS: usize = 50;

/// Decision text shown for completed cases with an empty thread.
pub const NO_DECISION_PLACEHOLDER: &str = "No discussion recorded";

/// Characters of the most recent message kept as the decision summary.
const DECISION_CHARS: usize = 100;

/// Maximum comorbidities surfaced per entry.
const COMORBIDITY_CAP: usize = 3;

/// One completed case as projected into the knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeEntry {
    pub case_id: String,
    pub diagnosis: String,
    pub description: String,
    pub admission_date: String,
    /// Minutes between the first and last message; 0 for empty threads
    pub duration_minutes: i64,
    /// Most recent message, truncated; placeholder when the thread is empty
    pub decision: String,
    /// Up to three entries from the latest medical record's chronic diseases
    pub comorbidities: Vec<String>,
    /// Deduplicated participant specialties, in participant order
    pub specialties: Vec<String>,
    pub patient_age: Option<i32>,
    pub patient_gender: String,
}

/// A query result ready to hand to the web layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeExport {
    pub generated_at: String,
    pub entries: Vec<KnowledgeEntry>,
}

impl KnowledgeExport {
    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Read-only search over completed cases.
///
/// No authorization gate: completed cases are globally readable, so the
/// index inherits that.
pub struct KnowledgeBase<'a> {
    db: &'a Database,
}

impl<'a> KnowledgeBase<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Free-text search over diagnosis, description, and patient name, with
    /// an optional participant-specialty filter.
    ///
    /// Matching is case-insensitive substring; the specialty filter is exact
    /// equality against any participant. Blank parameters mean "no filter".
    /// Results keep the store's ordering (most recent admissions first) and
    /// are capped at [`MAX_RESULTS`].
    pub fn search(
        &self,
        query: Option<&str>,
        specialty: Option<&str>,
    ) -> CaseResult<Vec<KnowledgeEntry>> {
        let needle = query
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());
        let specialty = specialty.map(str::trim).filter(|s| !s.is_empty());

        let mut entries = Vec::new();
        for case in self.db.list_stable_cases()? {
            if entries.len() >= MAX_RESULTS {
                break;
            }

            let patient = self
                .db
                .get_patient(&case.patient_id)?
                .ok_or_else(|| CaseError::NotFound(format!("Patient: {}", case.patient_id)))?;
            let participants = self.db.case_participants(&case.id)?;

            if let Some(wanted) = specialty {
                let held = participants
                    .iter()
                    .any(|p| p.specialty.as_deref() == Some(wanted));
                if !held {
                    continue;
                }
            }

            if let Some(needle) = &needle {
                let haystack = format!(
                    "{} {} {}",
                    case.diagnosis,
                    case.description,
                    patient.full_name()
                )
                .to_lowercase();
                if !haystack.contains(needle.as_str()) {
                    continue;
                }
            }

            entries.push(self.project(&case, &patient, &participants)?);
        }
        Ok(entries)
    }

    /// Search and wrap the result for export.
    pub fn export(
        &self,
        query: Option<&str>,
        specialty: Option<&str>,
    ) -> CaseResult<KnowledgeExport> {
        Ok(KnowledgeExport {
            generated_at: Utc::now().to_rfc3339(),
            entries: self.search(query, specialty)?,
        })
    }

    fn project(
        &self,
        case: &Case,
        patient: &Patient,
        participants: &[CaseParticipant],
    ) -> CaseResult<KnowledgeEntry> {
        let messages = self.db.list_case_messages(&case.id)?;

        let decision = match messages.last() {
            Some(last) => truncate_decision(&last.content),
            None => NO_DECISION_PLACEHOLDER.to_string(),
        };

        let comorbidities = match self.db.latest_medical_record(&patient.id)? {
            Some(record) => record.comorbidities(COMORBIDITY_CAP),
            None => Vec::new(),
        };

        let mut specialties: Vec<String> = Vec::new();
        for participant in participants {
            if let Some(specialty) = &participant.specialty {
                if !specialties.contains(specialty) {
                    specialties.push(specialty.clone());
                }
            }
        }

        Ok(KnowledgeEntry {
            case_id: case.id.clone(),
            diagnosis: case.diagnosis.clone(),
            description: case.description.clone(),
            admission_date: case.admission_date.clone(),
            duration_minutes: discussion_minutes(&messages),
            decision,
            comorbidities,
            specialties,
            patient_age: patient.age_years(Utc::now().date_naive()),
            patient_gender: patient.gender.clone(),
        })
    }
}

/// Minutes between the first and last message; zero for empty threads and
/// for timestamps that fail to parse.
fn discussion_minutes(messages: &[CaseMessage]) -> i64 {
    let (first, last) = match (messages.first(), messages.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return 0,
    };
    match (
        DateTime::parse_from_rfc3339(&first.created_at),
        DateTime::parse_from_rfc3339(&last.created_at),
    ) {
        (Ok(first), Ok(last)) => (last - first).num_minutes().max(0),
        _ => 0,
    }
}

/// First [`DECISION_CHARS`] characters of the decision text, with a marker
/// when anything was cut.
fn truncate_decision(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(DECISION_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
