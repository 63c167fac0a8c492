//! Consilium Core Library
//!
//! Consultation case engine for multi-practitioner clinical discussions.
//!
//! # Architecture
//!
//! ```text
//! Practitioner request
//!         │
//!         ▼
//!   CaseAccessPolicy ──── role / affiliation / membership matrix
//!         │
//!    [authorized]
//!         │
//!    ┌────┴─────────────┬──────────────────┐
//!    ▼                  ▼                  ▼
//! CaseStore      MessagingEngine     CaseLifecycle
//! (SQLite)       + UnreadTracker    urgent ⇄ monitoring
//!                append-only log           │
//!                case-wide reads           ▼ (one-way)
//!                👍/👎 toggles          stable
//!                                          │
//!                                          ▼
//!                                    KnowledgeBase
//!                           (anonymized, globally readable)
//! ```
//!
//! # Core Principle
//!
//! **Active discussion belongs to the treating circle and its
//! administration; completed discussion is shared institutional knowledge.**
//! The one-way `stable` transition is the boundary between the two.
//!
//! # Modules
//!
//! - [`db`]: SQLite storage layer (directory, cases, messages, reactions)
//! - [`models`]: Domain types (Practitioner, Patient, Case, CaseMessage, etc.)
//! - [`policy`]: Pure authorization matrix (view / complete)
//! - [`messaging`]: Append-only threads, reactions, unread derivation
//! - [`lifecycle`]: Status state machine and the completion transition
//! - [`knowledge`]: Search projection over completed cases

pub mod db;
pub mod error;
pub mod knowledge;
pub mod lifecycle;
pub mod messaging;
pub mod models;
pub mod policy;

// Re-export commonly used types
pub use db::Database;
pub use error::{CaseError, CaseResult};
pub use knowledge::{KnowledgeBase, KnowledgeEntry, KnowledgeExport};
pub use lifecycle::{transition_allowed, CaseLifecycle, CompletionOutcome};
pub use messaging::{MessagingEngine, UnreadTracker};
pub use models::{
    AccessScope, Case, CaseAccessView, CaseDraft, CaseMessage, CaseParticipant, CaseStatus,
    MedicalRecord, MessageReaction, Patient, Practitioner, ReactionKind, ReactionSummary,
    ReactionToggle, Role,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use tracing::warn;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ConsiliumError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<CaseError> for ConsiliumError {
    fn from(e: CaseError) -> Self {
        match e {
            CaseError::Validation(msg) => ConsiliumError::ValidationError(msg),
            CaseError::NotFound(msg) => ConsiliumError::NotFound(msg),
            CaseError::Forbidden(msg) => ConsiliumError::Forbidden(msg),
            CaseError::Storage(err) => ConsiliumError::DatabaseError(err.to_string()),
        }
    }
}

impl From<db::DbError> for ConsiliumError {
    fn from(e: db::DbError) -> Self {
        CaseError::from(e).into()
    }
}

impl From<serde_json::Error> for ConsiliumError {
    fn from(e: serde_json::Error) -> Self {
        ConsiliumError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for ConsiliumError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ConsiliumError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<ConsiliumCore>, ConsiliumError> {
    let db = Database::open(&path)?;
    Ok(Arc::new(ConsiliumCore {
        db: Arc::new(Mutex::new(db)),
    }))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<ConsiliumCore>, ConsiliumError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(ConsiliumCore {
        db: Arc::new(Mutex::new(db)),
    }))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
#[derive(uniffi::Object)]
pub struct ConsiliumCore {
    db: Arc<Mutex<Database>>,
}

#[uniffi::export]
impl ConsiliumCore {
    // =========================================================================
    // Directory Operations
    // =========================================================================

    /// Register a practitioner account.
    pub fn create_practitioner(
        &self,
        email: String,
        full_name: String,
        role: String,
        organization: Option<String>,
        specialty: Option<String>,
    ) -> Result<FfiPractitioner, ConsiliumError> {
        let role = Role::parse(&role)
            .ok_or_else(|| ConsiliumError::ValidationError(format!("Unknown role: {}", role)))?;

        let db = self.db.lock()?;
        let mut practitioner = Practitioner::new(email, role);
        practitioner.full_name = full_name;
        practitioner.organization = organization;
        practitioner.specialty = specialty;
        db.insert_practitioner(&practitioner)?;
        Ok(practitioner.into())
    }

    /// Get a practitioner by ID.
    pub fn get_practitioner(
        &self,
        practitioner_id: String,
    ) -> Result<Option<FfiPractitioner>, ConsiliumError> {
        let db = self.db.lock()?;
        let practitioner = db.get_practitioner(&practitioner_id)?;
        Ok(practitioner.map(|p| p.into()))
    }

    /// Register a patient.
    pub fn create_patient(
        &self,
        first_name: String,
        last_name: String,
        date_of_birth: String,
        gender: String,
        organization: Option<String>,
    ) -> Result<FfiPatient, ConsiliumError> {
        let db = self.db.lock()?;
        let mut patient = Patient::new(first_name, last_name, date_of_birth, gender);
        patient.organization = organization;
        db.insert_patient(&patient)?;
        Ok(patient.into())
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, patient_id: String) -> Result<Option<FfiPatient>, ConsiliumError> {
        let db = self.db.lock()?;
        let patient = db.get_patient(&patient_id)?;
        Ok(patient.map(|p| p.into()))
    }

    /// Record a medical visit. The knowledge base reads comorbidities from
    /// the patient's most recent record.
    pub fn add_medical_record(
        &self,
        patient_id: String,
        practitioner_id: Option<String>,
        diagnosis: Option<String>,
        chronic_diseases: Option<String>,
        visit_date: String,
    ) -> Result<FfiMedicalRecord, ConsiliumError> {
        let db = self.db.lock()?;
        let mut record = MedicalRecord::new(patient_id, visit_date);
        record.practitioner_id = practitioner_id;
        record.diagnosis = diagnosis;
        record.chronic_diseases = chronic_diseases;
        db.insert_medical_record(&record)?;
        Ok(record.into())
    }

    // =========================================================================
    // Case Operations
    // =========================================================================

    /// Open a consultation case. The actor becomes a participant whether or
    /// not they are in the invited list.
    pub fn create_case(
        &self,
        patient_id: String,
        actor_id: String,
        diagnosis: String,
        description: String,
        status: String,
        admission_date: String,
        participant_ids: Vec<String>,
    ) -> Result<FfiCase, ConsiliumError> {
        let status = CaseStatus::parse(&status)
            .ok_or_else(|| ConsiliumError::ValidationError(format!("Unknown status: {}", status)))?;

        let mut db = self.db.lock()?;
        let case = db.create_case(&CaseDraft {
            patient_id,
            created_by: actor_id,
            diagnosis,
            description,
            status,
            admission_date,
            participant_ids,
        })?;
        Ok(case.into())
    }

    /// Cases the actor participates in, most recent admissions first, each
    /// with the actor's unread count.
    pub fn list_cases_for_actor(
        &self,
        actor_id: String,
    ) -> Result<Vec<FfiCaseSummary>, ConsiliumError> {
        let db = self.db.lock()?;
        let actor = require_practitioner(&db, &actor_id)?;

        let tracker = UnreadTracker::new(&db);
        let mut summaries = Vec::new();
        for case in db.list_cases_for_practitioner(&actor.id)? {
            let unread_count = tracker.count_for(&case.id, &actor.id)?;
            summaries.push(FfiCaseSummary {
                id: case.id,
                patient_id: case.patient_id,
                diagnosis: case.diagnosis,
                status: case.status.as_str().to_string(),
                admission_date: case.admission_date,
                unread_count,
            });
        }
        Ok(summaries)
    }

    /// Full case view: patient, participants, and the thread with reaction
    /// chips. Enforces the visibility matrix; a participant's view marks
    /// other-authored messages read for the whole case.
    pub fn get_case_detail(
        &self,
        case_id: String,
        actor_id: String,
    ) -> Result<FfiCaseDetail, ConsiliumError> {
        let db = self.db.lock()?;
        let actor = require_practitioner(&db, &actor_id)?;

        let view = db
            .case_access_view(&case_id)?
            .ok_or_else(|| ConsiliumError::NotFound(format!("Case: {}", case_id)))?;
        if !policy::can_view(&actor, &view) {
            return Err(ConsiliumError::Forbidden(format!(
                "No access to case {}",
                case_id
            )));
        }
        if view.creator_missing() {
            // Report the integrity defect; reads never repair data
            warn!(case_id = %view.case_id, "case creator missing from participant set");
        }

        let case = db
            .get_case(&case_id)?
            .ok_or_else(|| ConsiliumError::NotFound(format!("Case: {}", case_id)))?;
        let patient = db
            .get_patient(&case.patient_id)?
            .ok_or_else(|| ConsiliumError::NotFound(format!("Patient: {}", case.patient_id)))?;

        let engine = MessagingEngine::new(&db);
        let mut messages = Vec::new();
        for message in engine.list_messages(&case_id, &actor)? {
            let author_name = db
                .get_practitioner(&message.author_id)?
                .map(|p| p.display_name().to_string())
                .unwrap_or_else(|| message.author_id.clone());
            let summary = engine.summarize_reactions(&message.id, &actor)?;
            messages.push(FfiMessageView {
                message: message.into(),
                author_name,
                reactions: summary
                    .groups
                    .into_iter()
                    .map(|group| FfiReactionGroup {
                        kind: group.kind.as_str().to_string(),
                        reactors: group.reactors,
                    })
                    .collect(),
                viewer_reactions: summary
                    .viewer_kinds
                    .into_iter()
                    .map(|kind| kind.as_str().to_string())
                    .collect(),
            });
        }

        Ok(FfiCaseDetail {
            case: case.into(),
            patient: patient.into(),
            participants: view.participants.into_iter().map(|p| p.into()).collect(),
            messages,
        })
    }

    /// Post to a case thread. Participants only; no status restriction.
    pub fn post_message(
        &self,
        case_id: String,
        actor_id: String,
        content: String,
    ) -> Result<FfiCaseMessage, ConsiliumError> {
        let db = self.db.lock()?;
        let actor = require_practitioner(&db, &actor_id)?;
        let engine = MessagingEngine::new(&db);
        let message = engine.post_message(&case_id, &actor, &content)?;
        Ok(message.into())
    }

    /// Toggle a 👍/👎 reaction on a message.
    pub fn toggle_reaction(
        &self,
        message_id: String,
        actor_id: String,
        kind: String,
    ) -> Result<FfiReactionToggle, ConsiliumError> {
        let kind = ReactionKind::parse(&kind).ok_or_else(|| {
            ConsiliumError::ValidationError(format!("Unknown reaction kind: {}", kind))
        })?;

        let db = self.db.lock()?;
        let actor = require_practitioner(&db, &actor_id)?;
        let engine = MessagingEngine::new(&db);
        let toggle = engine.react(&message_id, &actor, kind)?;
        Ok(FfiReactionToggle {
            action: toggle.as_str().to_string(),
        })
    }

    /// Promote a case to the terminal stable status.
    pub fn complete_case(
        &self,
        case_id: String,
        actor_id: String,
    ) -> Result<FfiCompletion, ConsiliumError> {
        let db = self.db.lock()?;
        let actor = require_practitioner(&db, &actor_id)?;
        let lifecycle = CaseLifecycle::new(&db);
        let outcome = lifecycle.complete(&case_id, &actor)?;
        Ok(FfiCompletion {
            status: CaseStatus::Stable.as_str().to_string(),
            already_stable: outcome == CompletionOutcome::AlreadyStable,
        })
    }

    /// Move a case between the active statuses (urgent/monitoring).
    pub fn reclassify_case(
        &self,
        case_id: String,
        actor_id: String,
        status: String,
    ) -> Result<FfiCase, ConsiliumError> {
        let next = CaseStatus::parse(&status)
            .ok_or_else(|| ConsiliumError::ValidationError(format!("Unknown status: {}", status)))?;

        let db = self.db.lock()?;
        let actor = require_practitioner(&db, &actor_id)?;
        let lifecycle = CaseLifecycle::new(&db);
        let case = lifecycle.reclassify(&case_id, &actor, next)?;
        Ok(case.into())
    }

    // =========================================================================
    // Knowledge Base Operations
    // =========================================================================

    /// Search completed cases. No participation required.
    pub fn search_knowledge_base(
        &self,
        query: Option<String>,
        specialty: Option<String>,
    ) -> Result<Vec<FfiKnowledgeEntry>, ConsiliumError> {
        let db = self.db.lock()?;
        let kb = KnowledgeBase::new(&db);
        let entries = kb.search(query.as_deref(), specialty.as_deref())?;
        Ok(entries.into_iter().map(|e| e.into()).collect())
    }

    /// Search completed cases and serialize the result as JSON.
    pub fn export_knowledge_base_json(
        &self,
        query: Option<String>,
        specialty: Option<String>,
    ) -> Result<String, ConsiliumError> {
        let db = self.db.lock()?;
        let kb = KnowledgeBase::new(&db);
        let export = kb.export(query.as_deref(), specialty.as_deref())?;
        Ok(export.to_json()?)
    }
}

fn require_practitioner(db: &Database, id: &str) -> Result<Practitioner, ConsiliumError> {
    db.get_practitioner(id)?
        .ok_or_else(|| ConsiliumError::NotFound(format!("Practitioner: {}", id)))
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe practitioner.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPractitioner {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub display_name: String,
    pub role: String,
    pub organization: Option<String>,
    pub specialty: Option<String>,
}

impl From<Practitioner> for FfiPractitioner {
    fn from(practitioner: Practitioner) -> Self {
        Self {
            display_name: practitioner.display_name().to_string(),
            id: practitioner.id,
            email: practitioner.email,
            full_name: practitioner.full_name,
            role: practitioner.role.as_str().to_string(),
            organization: practitioner.organization,
            specialty: practitioner.specialty,
        }
    }
}

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub full_name: String,
    pub date_of_birth: String,
    pub gender: String,
    pub organization: Option<String>,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            full_name: patient.full_name(),
            id: patient.id,
            first_name: patient.first_name,
            last_name: patient.last_name,
            middle_name: patient.middle_name,
            date_of_birth: patient.date_of_birth,
            gender: patient.gender,
            organization: patient.organization,
        }
    }
}

/// FFI-safe medical record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedicalRecord {
    pub id: String,
    pub patient_id: String,
    pub practitioner_id: Option<String>,
    pub diagnosis: Option<String>,
    pub chronic_diseases: Option<String>,
    pub visit_date: String,
}

impl From<MedicalRecord> for FfiMedicalRecord {
    fn from(record: MedicalRecord) -> Self {
        Self {
            id: record.id,
            patient_id: record.patient_id,
            practitioner_id: record.practitioner_id,
            diagnosis: record.diagnosis,
            chronic_diseases: record.chronic_diseases,
            visit_date: record.visit_date,
        }
    }
}

/// FFI-safe case.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCase {
    pub id: String,
    pub patient_id: String,
    pub created_by: Option<String>,
    pub diagnosis: String,
    pub description: String,
    pub status: String,
    pub admission_date: String,
    pub created_at: String,
}

impl From<Case> for FfiCase {
    fn from(case: Case) -> Self {
        Self {
            id: case.id,
            patient_id: case.patient_id,
            created_by: case.created_by,
            diagnosis: case.diagnosis,
            description: case.description,
            status: case.status.as_str().to_string(),
            admission_date: case.admission_date,
            created_at: case.created_at,
        }
    }
}

/// Case summary for listings, with the viewer's unread count.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCaseSummary {
    pub id: String,
    pub patient_id: String,
    pub diagnosis: String,
    pub status: String,
    pub admission_date: String,
    pub unread_count: u32,
}

/// FFI-safe participant entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiParticipant {
    pub practitioner_id: String,
    pub display_name: String,
    pub organization: Option<String>,
    pub specialty: Option<String>,
}

impl From<CaseParticipant> for FfiParticipant {
    fn from(participant: CaseParticipant) -> Self {
        Self {
            practitioner_id: participant.practitioner_id,
            display_name: participant.display_name,
            organization: participant.organization,
            specialty: participant.specialty,
        }
    }
}

/// FFI-safe case message.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCaseMessage {
    pub id: String,
    pub case_id: String,
    pub author_id: String,
    pub content: String,
    pub is_read: bool,
    pub created_at: String,
}

impl From<CaseMessage> for FfiCaseMessage {
    fn from(message: CaseMessage) -> Self {
        Self {
            id: message.id,
            case_id: message.case_id,
            author_id: message.author_id,
            content: message.content,
            is_read: message.is_read,
            created_at: message.created_at,
        }
    }
}

/// A message with its author name and reaction chips.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMessageView {
    pub message: FfiCaseMessage,
    pub author_name: String,
    pub reactions: Vec<FfiReactionGroup>,
    pub viewer_reactions: Vec<String>,
}

/// Reactor display names for one reaction kind.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiReactionGroup {
    pub kind: String,
    pub reactors: Vec<String>,
}

/// Result of a reaction toggle: "added" or "removed".
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiReactionToggle {
    pub action: String,
}

/// Result of a completion request.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCompletion {
    pub status: String,
    pub already_stable: bool,
}

/// Full case view for the detail screen.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCaseDetail {
    pub case: FfiCase,
    pub patient: FfiPatient,
    pub participants: Vec<FfiParticipant>,
    pub messages: Vec<FfiMessageView>,
}

/// FFI-safe knowledge base entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiKnowledgeEntry {
    pub case_id: String,
    pub diagnosis: String,
    pub description: String,
    pub admission_date: String,
    pub duration_minutes: i64,
    pub decision: String,
    pub comorbidities: Vec<String>,
    pub specialties: Vec<String>,
    pub patient_age: Option<i32>,
    pub patient_gender: String,
}

impl From<KnowledgeEntry> for FfiKnowledgeEntry {
    fn from(entry: KnowledgeEntry) -> Self {
        Self {
            case_id: entry.case_id,
            diagnosis: entry.diagnosis,
            description: entry.description,
            admission_date: entry.admission_date,
            duration_minutes: entry.duration_minutes,
            decision: entry.decision,
            comorbidities: entry.comorbidities,
            specialties: entry.specialties,
            patient_age: entry.patient_age,
            patient_gender: entry.patient_gender,
        }
    }
}
