//! Case lifecycle: the `urgent ⇄ monitoring → stable` state machine.
//!
//! The two active statuses move freely between each other. `stable` is
//! entered only through [`CaseLifecycle::complete`] and never left; asking
//! to complete an already-stable case is an informational no-op rather than
//! an error, so concurrent completions both succeed.

use tracing::info;

use crate::db::Database;
use crate::error::{CaseError, CaseResult};
use crate::models::{Case, CaseStatus, Practitioner};
use crate::policy;

/// What a completion request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The case transitioned to `stable`
    Completed,
    /// The case was already `stable`; nothing changed
    AlreadyStable,
}

/// Whether the state machine permits `from → to`.
///
/// Self-transitions on `stable` are permitted so repeated completion calls
/// can no-op; everything else out of `stable` is refused.
pub fn transition_allowed(from: CaseStatus, to: CaseStatus) -> bool {
    match from {
        CaseStatus::Urgent | CaseStatus::Monitoring => true,
        CaseStatus::Stable => to == CaseStatus::Stable,
    }
}

/// Guarded status transitions over the store.
pub struct CaseLifecycle<'a> {
    db: &'a Database,
}

impl<'a> CaseLifecycle<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// One-way promotion to `stable`.
    ///
    /// Authorization uses the completion predicate and is checked before the
    /// current status, so an unauthorized caller sees `Forbidden` even when
    /// the case is already stable.
    pub fn complete(&self, case_id: &str, actor: &Practitioner) -> CaseResult<CompletionOutcome> {
        let view = self
            .db
            .case_access_view(case_id)?
            .ok_or_else(|| CaseError::NotFound(format!("Case: {}", case_id)))?;

        if !policy::can_complete(actor, &view) {
            return Err(CaseError::Forbidden(format!(
                "{} may not complete case {}",
                actor.display_name(),
                case_id
            )));
        }

        if view.status.is_terminal() {
            return Ok(CompletionOutcome::AlreadyStable);
        }

        self.db.set_case_status(case_id, CaseStatus::Stable)?;
        info!(case_id, completed_by = %actor.id, "case completed");
        Ok(CompletionOutcome::Completed)
    }

    /// Move a case between the active statuses.
    ///
    /// Completion has its own path, so `stable` is not a valid target here,
    /// and terminal cases cannot be reclassified at all. Reach is the same
    /// as for completion.
    pub fn reclassify(
        &self,
        case_id: &str,
        actor: &Practitioner,
        next: CaseStatus,
    ) -> CaseResult<Case> {
        if next.is_terminal() {
            return Err(CaseError::Validation(
                "Use completion to move a case to stable".into(),
            ));
        }

        let view = self
            .db
            .case_access_view(case_id)?
            .ok_or_else(|| CaseError::NotFound(format!("Case: {}", case_id)))?;

        if !policy::can_complete(actor, &view) {
            return Err(CaseError::Forbidden(format!(
                "{} may not reclassify case {}",
                actor.display_name(),
                case_id
            )));
        }

        if !transition_allowed(view.status, next) {
            return Err(CaseError::Validation(format!(
                "No transition from {} to {}",
                view.status.as_str(),
                next.as_str()
            )));
        }

        self.db.set_case_status(case_id, next)?;
        info!(case_id, status = next.as_str(), "case reclassified");

        self.db
            .get_case(case_id)?
            .ok_or_else(|| CaseError::NotFound(format!("Case: {}", case_id)))
    }
}
