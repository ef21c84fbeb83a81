use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OfflineEntryRow {
    pub dataid: i64,
    pub courseid: i64,
    pub groupid: Option<i64>,
    pub action: String,
    pub entryid: i64,
    pub fields: String,
    pub timemodified: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SyncTimeRow {
    pub component: String,
    pub item_id: i64,
    pub time: i64,
    pub warnings: Option<String>,
}
