//! Unread-count derivation.

use crate::db::{Database, DbResult};

/// Derives unread counts straight from the message log; nothing is cached
/// or stored per viewer.
///
/// A message counts as unread for a viewer when someone else authored it and
/// its case-wide flag is still clear. Because the flag is case-wide, one
/// participant's read sweep zeroes the count for every viewer at once.
pub struct UnreadTracker<'a> {
    db: &'a Database,
}

impl<'a> UnreadTracker<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Unread count for one case and viewer.
    pub fn count_for(&self, case_id: &str, viewer_id: &str) -> DbResult<u32> {
        self.db.count_unread_messages(case_id, viewer_id)
    }
}
