use super::field::EntryContents;
use crate::domain::value_objects::EntryId;
use serde::{Deserialize, Serialize};

/// データベース活動のエントリー
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    pub id: i64,
    pub database_id: i64,
    pub user_id: i64,
    pub group_id: i64,
    pub time_created: i64,
    pub time_modified: i64,
    pub approved: bool,
    pub can_manage: bool,
    pub full_name: Option<String>,
    pub contents: EntryContents,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub has_offline: bool,
}

impl Entry {
    /// オフライン追加されたエントリーの雛形。時刻は保留中の add から埋める。
    pub fn provisional(database_id: i64, entry_id: EntryId) -> Self {
        Self {
            id: entry_id.value(),
            database_id,
            approved: false,
            can_manage: true,
            ..Self::default()
        }
    }

    pub fn entry_id(&self) -> EntryId {
        EntryId::new(self.id)
    }
}
