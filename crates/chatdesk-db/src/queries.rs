use crate::Database;
use crate::models::{ConversationRow, MessageRow};
use anyhow::{Context, Result};
use chatdesk_types::time::{format_timestamp, parse_timestamp};
use chrono::TimeDelta;
use rusqlite::{Connection, Row};
use tracing::warn;

impl Database {
    // -- Conversations --

    pub fn insert_conversation(
        &self,
        id: &str,
        manager_id: Option<i64>,
        username: &str,
        last_edit: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversations (id, manager_id, username, last_edit) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, manager_id, username, last_edit],
            )?;
            Ok(())
        })
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| query_conversation(conn, id))
    }

    /// The only column the long-poll waiter needs.
    pub fn get_last_edit(&self, id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT last_edit FROM conversations WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .optional()
        })
    }

    /// Conversations edited at or after `since`, newest first.
    pub fn live_conversations(&self, since: &str) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, manager_id, username, last_edit
                 FROM conversations
                 WHERE last_edit >= ?1
                 ORDER BY last_edit DESC",
            )?;

            let rows = stmt
                .query_map([since], conversation_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Messages --

    /// Append a message and bump the parent's `last_edit` in one transaction,
    /// so a waiter never sees the message without the new timestamp.
    /// `last_edit` strictly advances on every append, even when `time_stamp`
    /// is not newer than the stored value. Returns `None` when the
    /// conversation does not exist; nothing is written in that case.
    pub fn append_message(
        &self,
        conversation_id: &str,
        user: char,
        message: &str,
        time_stamp: &str,
    ) -> Result<Option<i64>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let previous: Option<String> = tx
                .query_row(
                    "SELECT last_edit FROM conversations WHERE id = ?1",
                    [conversation_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(previous) = previous else {
                return Ok(None);
            };

            tx.execute(
                "UPDATE conversations SET last_edit = ?2 WHERE id = ?1",
                rusqlite::params![conversation_id, advance_last_edit(&previous, time_stamp)?],
            )?;

            tx.execute(
                "INSERT INTO messages (user, message, conversation_id, time_stamp) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![user.to_string(), message, conversation_id, time_stamp],
            )?;
            let id = tx.last_insert_rowid();

            tx.commit()?;
            Ok(Some(id))
        })
    }

    /// Messages newer than `after_id`, oldest first.
    pub fn messages_since(&self, conversation_id: &str, after_id: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user, message, conversation_id, time_stamp
                 FROM messages
                 WHERE conversation_id = ?1 AND id > ?2
                 ORDER BY id ASC",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![conversation_id, after_id], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        user: row.get(1)?,
                        message: row.get(2)?,
                        conversation_id: row.get(3)?,
                        time_stamp: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn count_messages(&self, conversation_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT count(*) FROM messages WHERE conversation_id = ?1",
                [conversation_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}

fn query_conversation(conn: &Connection, id: &str) -> Result<Option<ConversationRow>> {
    let mut stmt = conn
        .prepare("SELECT id, manager_id, username, last_edit FROM conversations WHERE id = ?1")?;

    let row = stmt.query_row([id], conversation_from_row).optional()?;

    Ok(row)
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(0)?,
        manager_id: row.get(1)?,
        username: row.get(2)?,
        last_edit: row.get(3)?,
    })
}

/// `time_stamp`, or one microsecond past `previous` when the stamp is not
/// strictly newer. Writers racing on the clock still each move `last_edit`.
fn advance_last_edit(previous: &str, time_stamp: &str) -> Result<String> {
    let stamp = parse_timestamp(time_stamp)
        .with_context(|| format!("invalid message timestamp '{}'", time_stamp))?;

    let Some(previous) = parse_timestamp(previous) else {
        warn!("Corrupt last_edit '{}', replacing with {}", previous, time_stamp);
        return Ok(format_timestamp(stamp));
    };

    Ok(format_timestamp(stamp.max(previous + TimeDelta::microseconds(1))))
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
