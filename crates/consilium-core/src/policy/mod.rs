//! Case access policy: the role / affiliation / membership matrix.
//!
//! Pure functions over a practitioner and a case projection; storage never
//! enters here. The rules:
//!
//! - Completed (`stable`) cases are readable by any authenticated
//!   practitioner. Finished discussions are shared institutional knowledge.
//! - Active cases are visible to super admins; to org admins whose
//!   organization matches the patient, the creator, or any participant; and
//!   to the case's participants and creator.
//! - Completion rights use the active-case predicate regardless of current
//!   status. Whether completing is a no-op is the lifecycle's question, not
//!   a policy one.

use crate::models::{AccessScope, CaseAccessView, Practitioner};

/// Whether the actor may read the case in its current state.
pub fn can_view(actor: &Practitioner, case: &CaseAccessView) -> bool {
    if case.status.is_terminal() {
        return true;
    }
    can_reach_active(actor, case)
}

/// Whether the actor may trigger the completion transition.
pub fn can_complete(actor: &Practitioner, case: &CaseAccessView) -> bool {
    can_reach_active(actor, case)
}

/// The visibility predicate for active (urgent/monitoring) cases.
fn can_reach_active(actor: &Practitioner, case: &CaseAccessView) -> bool {
    match actor.scope() {
        AccessScope::SuperAdmin => true,
        AccessScope::OrgAdmin { organization } => {
            organization_touches_case(&organization, case) || is_member(actor, case)
        }
        AccessScope::Practitioner => is_member(actor, case),
    }
}

/// Org-admin reach: the patient, the creator, or any participant belongs to
/// the admin's organization. Affiliations can change after a case opens, so
/// any single match suffices.
fn organization_touches_case(organization: &str, case: &CaseAccessView) -> bool {
    case.patient_organization.as_deref() == Some(organization)
        || case.creator_organization.as_deref() == Some(organization)
        || case
            .participants
            .iter()
            .any(|p| p.organization.as_deref() == Some(organization))
}

/// Participant or creator of the case.
fn is_member(actor: &Practitioner, case: &CaseAccessView) -> bool {
    case.is_participant(&actor.id) || case.created_by.as_deref() == Some(actor.id.as_str())
}
