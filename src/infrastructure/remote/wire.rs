use crate::domain::entities::{AttachedFile, Entry, EntryFieldData, FieldContent, RemoteFile};
use serde::{Deserialize, Serialize};

/// 送信するフィールド値
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WsEntryField {
    pub fieldid: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subfield: Option<String>,
    pub value: String,
}

impl From<&EntryFieldData> for WsEntryField {
    fn from(field: &EntryFieldData) -> Self {
        Self {
            fieldid: field.field_id,
            subfield: if field.subfield.is_empty() {
                None
            } else {
                Some(field.subfield.clone())
            },
            value: field.value.clone(),
        }
    }
}

pub fn ws_fields(fields: &[EntryFieldData]) -> Vec<WsEntryField> {
    fields.iter().map(WsEntryField::from).collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct WsEntryContent {
    #[serde(default)]
    pub id: i64,
    pub fieldid: i64,
    #[serde(default)]
    pub recordid: i64,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub content1: Option<String>,
    #[serde(default)]
    pub content2: Option<String>,
    #[serde(default)]
    pub content3: Option<String>,
    #[serde(default)]
    pub content4: Option<String>,
    #[serde(default)]
    pub files: Vec<RemoteFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WsEntry {
    pub id: i64,
    #[serde(default)]
    pub userid: i64,
    #[serde(default)]
    pub groupid: i64,
    pub dataid: i64,
    #[serde(default)]
    pub timecreated: i64,
    pub timemodified: i64,
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub canmanageentry: bool,
    #[serde(default)]
    pub fullname: Option<String>,
    #[serde(default)]
    pub contents: Vec<WsEntryContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WsGetEntryResponse {
    pub entry: WsEntry,
}

impl From<WsEntry> for Entry {
    fn from(ws: WsEntry) -> Self {
        let contents = ws
            .contents
            .into_iter()
            .map(|content| {
                let field_id = content.fieldid;
                let content = FieldContent {
                    id: content.id,
                    field_id,
                    record_id: content.recordid,
                    content: content.content.unwrap_or_default(),
                    content1: content.content1,
                    content2: content.content2,
                    content3: content.content3,
                    content4: content.content4,
                    files: content.files.into_iter().map(AttachedFile::Remote).collect(),
                };
                (field_id, content)
            })
            .collect();

        Entry {
            id: ws.id,
            database_id: ws.dataid,
            user_id: ws.userid,
            group_id: ws.groupid,
            time_created: ws.timecreated,
            time_modified: ws.timemodified,
            approved: ws.approved,
            can_manage: ws.canmanageentry,
            full_name: ws.fullname,
            contents,
            deleted: false,
            has_offline: false,
        }
    }
}
