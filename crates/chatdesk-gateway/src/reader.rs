use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::error;

use chatdesk_db::Database;
use chatdesk_types::time::parse_timestamp;

use crate::waiter::EditReader;

/// [`EditReader`] over the SQLite store. Queries run off the async runtime.
pub struct SqliteReader {
    db: Arc<Database>,
}

impl SqliteReader {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EditReader for SqliteReader {
    async fn last_edit(&self, conversation_id: &str) -> anyhow::Result<Option<DateTime<Utc>>> {
        let db = self.db.clone();
        let cid = conversation_id.to_string();
        let raw = tokio::task::spawn_blocking(move || db.get_last_edit(&cid))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                anyhow!("spawn_blocking join error: {}", e)
            })??;

        raw.map(|s| {
            parse_timestamp(&s).ok_or_else(|| anyhow!("Corrupt last_edit '{}' on conversation", s))
        })
        .transpose()
    }
}
