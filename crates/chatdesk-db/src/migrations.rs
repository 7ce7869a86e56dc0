use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (conversations, messages)");
        conn.execute_batch(
            "
            CREATE TABLE conversations (
                id          TEXT PRIMARY KEY,
                manager_id  INTEGER,
                username    TEXT NOT NULL,
                last_edit   TEXT NOT NULL
            );

            CREATE TABLE messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user            TEXT NOT NULL CHECK (length(user) = 1),
                message         TEXT NOT NULL CHECK (length(message) <= 4096),
                conversation_id TEXT NOT NULL REFERENCES conversations(id),
                time_stamp      TEXT NOT NULL
            );

            CREATE INDEX idx_messages_conversation
                ON messages(conversation_id, id);

            CREATE INDEX idx_conversations_last_edit
                ON conversations(last_edit);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
