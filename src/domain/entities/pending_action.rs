use super::field::EntryFieldData;
use crate::domain::value_objects::{EntryAction, EntryId};
use serde::{Deserialize, Serialize};

/// ローカルに保存された未同期のエントリー操作
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingAction {
    pub database_id: i64,
    pub course_id: i64,
    pub group_id: Option<i64>,
    pub action: EntryAction,
    pub entry_id: EntryId,
    pub fields: Vec<EntryFieldData>,
    /// 操作時刻（秒）。競合検出のバージョンとして使う。
    pub time_modified: i64,
}

impl PendingAction {
    pub fn key(&self) -> (i64, EntryId, EntryAction) {
        (self.database_id, self.entry_id, self.action)
    }
}

/// 保存前の操作。entry_id と time_modified は省略可能。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingActionDraft {
    pub database_id: i64,
    pub course_id: i64,
    pub group_id: Option<i64>,
    pub action: EntryAction,
    pub entry_id: Option<EntryId>,
    pub fields: Vec<EntryFieldData>,
    pub time_modified: Option<i64>,
}

impl PendingActionDraft {
    pub fn new(database_id: i64, course_id: i64, action: EntryAction) -> Self {
        Self {
            database_id,
            course_id,
            group_id: None,
            action,
            entry_id: None,
            fields: Vec::new(),
            time_modified: None,
        }
    }

    pub fn with_entry(mut self, entry_id: EntryId) -> Self {
        self.entry_id = Some(entry_id);
        self
    }

    pub fn with_group(mut self, group_id: Option<i64>) -> Self {
        self.group_id = group_id;
        self
    }

    pub fn with_fields(mut self, fields: Vec<EntryFieldData>) -> Self {
        self.fields = fields;
        self
    }

    pub fn at(mut self, time_modified: i64) -> Self {
        self.time_modified = Some(time_modified);
        self
    }

    /// 既定値を補って保存形にする。時刻未指定なら now、ID未指定なら -time_modified。
    pub fn resolve(self, now: i64) -> PendingAction {
        let time_modified = self.time_modified.unwrap_or(now);
        let entry_id = self
            .entry_id
            .unwrap_or_else(|| EntryId::provisional(time_modified));
        PendingAction {
            database_id: self.database_id,
            course_id: self.course_id,
            group_id: self.group_id,
            action: self.action,
            entry_id,
            fields: self.fields,
            time_modified,
        }
    }
}
