//! Messaging engine: append-only case threads with reactions.
//!
//! Posting and reacting require current participation in the case. Reading a
//! thread as a participant runs the case-wide read sweep first, so "unread"
//! reflects whether anyone has looked at the thread, not each viewer's own
//! history.

mod unread;
pub use unread::*;

use crate::db::Database;
use crate::error::{CaseError, CaseResult};
use crate::models::{
    CaseMessage, MessageReaction, Practitioner, ReactionGroup, ReactionKind, ReactionSummary,
    ReactionToggle,
};

/// Message and reaction operations over one store.
pub struct MessagingEngine<'a> {
    db: &'a Database,
}

impl<'a> MessagingEngine<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Append a message to a case thread.
    ///
    /// Only current participants may post. There is no status restriction:
    /// participants keep posting rights after a case completes, so follow-up
    /// notes can land on the record.
    pub fn post_message(
        &self,
        case_id: &str,
        author: &Practitioner,
        content: &str,
    ) -> CaseResult<CaseMessage> {
        let content = content.trim();
        if content.is_empty() {
            return Err(CaseError::Validation(
                "Message content must not be empty".into(),
            ));
        }

        let case = self
            .db
            .get_case(case_id)?
            .ok_or_else(|| CaseError::NotFound(format!("Case: {}", case_id)))?;

        if !self.db.is_case_participant(&case.id, &author.id)? {
            return Err(CaseError::Forbidden(format!(
                "{} is not a participant of case {}",
                author.display_name(),
                case.id
            )));
        }

        let message = CaseMessage::new(case.id, author.id.clone(), content.to_string());
        self.db.insert_message(&message)?;
        Ok(message)
    }

    /// The full thread in display order.
    ///
    /// When the viewer participates in the case, the read sweep runs first:
    /// every message authored by someone else becomes read, for all other
    /// viewers too. Non-participant viewers (admins) never sweep.
    pub fn list_messages(&self, case_id: &str, viewer: &Practitioner) -> CaseResult<Vec<CaseMessage>> {
        let case = self
            .db
            .get_case(case_id)?
            .ok_or_else(|| CaseError::NotFound(format!("Case: {}", case_id)))?;

        if self.db.is_case_participant(&case.id, &viewer.id)? {
            self.db.mark_case_messages_read(&case.id, &viewer.id)?;
        }

        Ok(self.db.list_case_messages(&case.id)?)
    }

    /// Toggle a reaction: remove the identical (message, user, kind) row when
    /// present, add it otherwise.
    pub fn react(
        &self,
        message_id: &str,
        user: &Practitioner,
        kind: ReactionKind,
    ) -> CaseResult<ReactionToggle> {
        let message = self
            .db
            .get_message(message_id)?
            .ok_or_else(|| CaseError::NotFound(format!("Message: {}", message_id)))?;

        if !self.db.is_case_participant(&message.case_id, &user.id)? {
            return Err(CaseError::Forbidden(format!(
                "{} is not a participant of case {}",
                user.display_name(),
                message.case_id
            )));
        }

        if self.db.delete_reaction(&message.id, &user.id, kind)? {
            return Ok(ReactionToggle::Removed);
        }

        let reaction = MessageReaction::new(message.id, user.id.clone(), kind);
        self.db.insert_reaction(&reaction)?;
        Ok(ReactionToggle::Added)
    }

    /// Reaction chips for one message: reactor display names per kind, plus
    /// the kinds the viewer currently holds.
    pub fn summarize_reactions(
        &self,
        message_id: &str,
        viewer: &Practitioner,
    ) -> CaseResult<ReactionSummary> {
        let message = self
            .db
            .get_message(message_id)?
            .ok_or_else(|| CaseError::NotFound(format!("Message: {}", message_id)))?;

        let reactions = self.db.list_message_reactions(&message.id)?;

        let mut groups = Vec::new();
        for kind in ReactionKind::ALL {
            let mut reactors = Vec::new();
            for reaction in reactions.iter().filter(|r| r.kind == kind) {
                let name = self
                    .db
                    .get_practitioner(&reaction.user_id)?
                    .map(|p| p.display_name().to_string())
                    .unwrap_or_else(|| reaction.user_id.clone());
                reactors.push(name);
            }
            if !reactors.is_empty() {
                groups.push(ReactionGroup { kind, reactors });
            }
        }

        let viewer_kinds = ReactionKind::ALL
            .into_iter()
            .filter(|kind| {
                reactions
                    .iter()
                    .any(|r| r.user_id == viewer.id && r.kind == *kind)
            })
            .collect();

        Ok(ReactionSummary {
            message_id: message.id,
            groups,
            viewer_kinds,
        })
    }
}
