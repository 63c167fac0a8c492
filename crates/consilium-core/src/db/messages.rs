//! Message and reaction row operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{CaseMessage, MessageReaction, ReactionKind};

impl Database {
    /// Append a message to a case thread.
    pub fn insert_message(&self, message: &CaseMessage) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO case_messages (
                id, case_id, author_id, content, is_read, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                message.id,
                message.case_id,
                message.author_id,
                message.content,
                message.is_read,
                message.created_at,
            ],
        )?;
        Ok(())
    }

    /// Get a message by ID.
    pub fn get_message(&self, message_id: &str) -> DbResult<Option<CaseMessage>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, case_id, author_id, content, is_read, created_at
                FROM case_messages
                WHERE id = ?
                "#,
                [message_id],
                message_row,
            )
            .optional()?)
    }

    /// Messages of a case in thread order (oldest first).
    pub fn list_case_messages(&self, case_id: &str) -> DbResult<Vec<CaseMessage>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, case_id, author_id, content, is_read, created_at
            FROM case_messages
            WHERE case_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )?;

        let rows = stmt.query_map([case_id], message_row)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Case-wide read sweep: every message not authored by the viewer becomes
    /// read, for all participants at once. Idempotent. Returns the number of
    /// messages flipped.
    pub fn mark_case_messages_read(&self, case_id: &str, viewer_id: &str) -> DbResult<usize> {
        let rows_affected = self.conn.execute(
            "UPDATE case_messages SET is_read = 1 \
             WHERE case_id = ?1 AND author_id != ?2 AND is_read = 0",
            params![case_id, viewer_id],
        )?;
        Ok(rows_affected)
    }

    /// Unread messages authored by someone other than the viewer. Recomputed
    /// from the log on every call; nothing is cached.
    pub fn count_unread_messages(&self, case_id: &str, viewer_id: &str) -> DbResult<u32> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM case_messages \
             WHERE case_id = ?1 AND author_id != ?2 AND is_read = 0",
            params![case_id, viewer_id],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }

    /// Insert a reaction row.
    pub fn insert_reaction(&self, reaction: &MessageReaction) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO message_reactions (
                id, message_id, user_id, kind, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                reaction.id,
                reaction.message_id,
                reaction.user_id,
                reaction.kind.as_str(),
                reaction.created_at,
            ],
        )?;
        Ok(())
    }

    /// Delete one (message, user, kind) reaction. Returns whether a row
    /// existed.
    pub fn delete_reaction(
        &self,
        message_id: &str,
        user_id: &str,
        kind: ReactionKind,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "DELETE FROM message_reactions \
             WHERE message_id = ?1 AND user_id = ?2 AND kind = ?3",
            params![message_id, user_id, kind.as_str()],
        )?;
        Ok(rows_affected > 0)
    }

    /// All reactions on a message, oldest first.
    pub fn list_message_reactions(&self, message_id: &str) -> DbResult<Vec<MessageReaction>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, message_id, user_id, kind, created_at
            FROM message_reactions
            WHERE message_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )?;

        let rows = stmt.query_map([message_id], |row| {
            Ok(ReactionRow {
                id: row.get(0)?,
                message_id: row.get(1)?,
                user_id: row.get(2)?,
                kind: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;

        let mut reactions = Vec::new();
        for row in rows {
            reactions.push(row?.try_into()?);
        }
        Ok(reactions)
    }
}

fn message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CaseMessage> {
    Ok(CaseMessage {
        id: row.get(0)?,
        case_id: row.get(1)?,
        author_id: row.get(2)?,
        content: row.get(3)?,
        is_read: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Intermediate row struct for database mapping.
struct ReactionRow {
    id: String,
    message_id: String,
    user_id: String,
    kind: String,
    created_at: String,
}

impl TryFrom<ReactionRow> for MessageReaction {
    type Error = DbError;

    fn try_from(row: ReactionRow) -> Result<Self, Self::Error> {
        let kind = ReactionKind::parse(&row.kind)
            .ok_or_else(|| DbError::Constraint(format!("Unknown reaction kind: {}", row.kind)))?;

        Ok(MessageReaction {
            id: row.id,
            message_id: row.message_id,
            user_id: row.user_id,
            kind,
            created_at: row.created_at,
        })
    }
}
