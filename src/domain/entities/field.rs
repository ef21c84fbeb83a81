use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// フォームの入力値（入力名 → 値）
pub type FormInput = HashMap<String, Value>;

/// フィールドID毎のエントリー内容
pub type EntryContents = BTreeMap<i64, FieldContent>;

/// データベースに定義されたフィールド
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldDefinition {
    pub id: i64,
    #[serde(rename = "dataid")]
    pub database_id: i64,
    #[serde(rename = "type")]
    pub field_type: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

impl FieldDefinition {
    pub fn new(id: i64, database_id: i64, field_type: &str, name: &str) -> Self {
        Self {
            id,
            database_id,
            field_type: field_type.to_string(),
            name: name.to_string(),
            description: String::new(),
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// フォーム上の入力名（`f_<fieldid>`）
    pub fn input_name(&self) -> String {
        format!("f_{}", self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteFile {
    pub filename: String,
    #[serde(default)]
    pub filepath: String,
    #[serde(default)]
    pub filesize: u64,
    pub fileurl: String,
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub timemodified: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalFile {
    pub filename: String,
    pub path: PathBuf,
}

impl LocalFile {
    pub fn from_path(path: PathBuf) -> Self {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { filename, path }
    }
}

/// 添付ファイル。サーバー上のファイルか端末内のファイル。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttachedFile {
    Remote(RemoteFile),
    Local(LocalFile),
}

impl AttachedFile {
    pub fn filename(&self) -> &str {
        match self {
            AttachedFile::Remote(file) => &file.filename,
            AttachedFile::Local(file) => &file.filename,
        }
    }
}

/// オフライン保存されたファイル群の参照。フィールド値としてJSONで保持する。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredFiles {
    #[serde(default)]
    pub online: Vec<RemoteFile>,
    #[serde(default)]
    pub offline: usize,
}

impl StoredFiles {
    pub fn has_files(&self) -> bool {
        !self.online.is_empty() || self.offline > 0
    }

    /// JSONエンコードされたフィールド値からファイル参照を読み取る
    pub fn from_field_value(value: &str) -> Option<Self> {
        match serde_json::from_str::<Value>(value).ok()? {
            Value::Object(map) if map.contains_key("online") || map.contains_key("offline") => {
                serde_json::from_value(Value::Object(map)).ok()
            }
            _ => None,
        }
    }
}

/// エントリーのフィールド内容
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldContent {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "fieldid")]
    pub field_id: i64,
    #[serde(rename = "recordid", default)]
    pub record_id: i64,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub content1: Option<String>,
    #[serde(default)]
    pub content2: Option<String>,
    #[serde(default)]
    pub content3: Option<String>,
    #[serde(default)]
    pub content4: Option<String>,
    #[serde(default)]
    pub files: Vec<AttachedFile>,
}

impl FieldContent {
    pub fn empty(field_id: i64) -> Self {
        Self {
            field_id,
            ..Self::default()
        }
    }
}

/// 送信用のフィールドデータ。value は常にJSONエンコード済み文字列。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryFieldData {
    #[serde(rename = "fieldid")]
    pub field_id: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subfield: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<AttachedFile>,
}

impl EntryFieldData {
    pub fn new(field_id: i64, subfield: &str, value: String) -> Self {
        Self {
            field_id,
            subfield: subfield.to_string(),
            value,
            files: Vec::new(),
        }
    }
}

/// フィールドハンドラーが返す編集データ（エンコード前）
#[derive(Debug, Clone, PartialEq)]
pub struct SubfieldData {
    pub field_id: i64,
    pub subfield: Option<String>,
    pub value: Value,
    pub files: Option<Vec<AttachedFile>>,
}

impl SubfieldData {
    pub fn value(field_id: i64, value: Value) -> Self {
        Self {
            field_id,
            subfield: None,
            value,
            files: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchFieldData {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldNotification {
    #[serde(rename = "fieldname")]
    pub field_name: String,
    pub notification: String,
}

/// JSONエンコードされた値を復号する。不正なJSONは空文字列として扱う。
pub fn decode_field_value(value: &str) -> Value {
    serde_json::from_str(value).unwrap_or_else(|_| Value::String(String::new()))
}

/// 送信用に値をJSONエンコードする。null・空文字列・false は空文字列になる。
pub fn encode_field_value(value: &Value) -> String {
    match value {
        Value::Null | Value::Bool(false) => String::new(),
        Value::String(s) if s.is_empty() => String::new(),
        other => other.to_string(),
    }
}
