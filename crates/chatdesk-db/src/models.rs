/// Database row types. These map directly to SQLite rows.
/// Timestamps stay as stored text; callers parse them.

#[derive(Debug, Clone)]
pub struct ConversationRow {
    pub id: String,
    pub manager_id: Option<i64>,
    pub username: String,
    pub last_edit: String,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub user: String,
    pub message: String,
    pub conversation_id: String,
    pub time_stamp: String,
}
