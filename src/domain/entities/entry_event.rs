use crate::domain::value_objects::EntryId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryEvent {
    /// エントリーが追加・編集・削除・承認された
    EntryChanged {
        database_id: i64,
        entry_id: EntryId,
    },
    /// 自動同期でデータベースまたはエントリーが同期された
    AutoSynced(AutoSyncedEvent),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AutoSyncedEvent {
    pub database_id: i64,
    pub entry_id: Option<EntryId>,
    /// オフライン追加時の仮ID
    pub offline_entry_id: Option<EntryId>,
    pub warnings: Vec<String>,
    pub deleted: bool,
}
