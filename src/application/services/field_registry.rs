use crate::application::ports::field_handler::FieldHandler;
use crate::domain::entities::{
    AttachedFile, EntryFieldData, FieldContent, FieldDefinition, FormInput, SearchFieldData,
    StoredFiles, SubfieldData,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

const MUST_SUPPLY_VALUE: &str = "You must supply a value here.";

/// フィールド種別 → ハンドラーの登録表。未登録の種別は既定ハンドラーで扱う。
#[derive(Clone)]
pub struct FieldHandlerRegistry {
    handlers: HashMap<String, Arc<dyn FieldHandler>>,
    fallback: Arc<dyn FieldHandler>,
}

impl FieldHandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: Arc::new(DefaultFieldHandler),
        }
    }

    /// 添付ファイル系の種別を登録済みのレジストリ
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let files: Arc<dyn FieldHandler> = Arc::new(FileFieldHandler);
        registry.register("file", files.clone());
        registry.register("picture", files);
        registry
    }

    pub fn register(&mut self, field_type: &str, handler: Arc<dyn FieldHandler>) {
        self.handlers.insert(field_type.to_string(), handler);
    }

    pub fn handler_for(&self, field: &FieldDefinition) -> Arc<dyn FieldHandler> {
        self.handlers
            .get(&field.field_type)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    pub fn has_files(&self, field: &FieldDefinition) -> bool {
        self.handler_for(field).has_files()
    }
}

impl Default for FieldHandlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn has_value(data: &EntryFieldData) -> bool {
    !data.value.is_empty() && data.value != "\"\""
}

fn required_notification(field: &FieldDefinition, data: &[EntryFieldData]) -> Option<String> {
    if !field.required {
        return None;
    }
    let supplied = data
        .iter()
        .any(|d| d.field_id == field.id && has_value(d));
    if supplied {
        None
    } else {
        Some(MUST_SUPPLY_VALUE.to_string())
    }
}

/// 単一値のテキスト系フィールド
pub struct DefaultFieldHandler;

impl FieldHandler for DefaultFieldHandler {
    fn edit_data(
        &self,
        field: &FieldDefinition,
        input: &FormInput,
        _original: Option<&FieldContent>,
    ) -> Vec<SubfieldData> {
        let value = input
            .get(&field.input_name())
            .cloned()
            .unwrap_or(Value::Null);
        vec![SubfieldData::value(field.id, value)]
    }

    fn search_data(&self, field: &FieldDefinition, input: &FormInput) -> Vec<SearchFieldData> {
        let name = field.input_name();
        match input.get(&name) {
            Some(value) if !value_as_text(value).is_empty() => vec![SearchFieldData {
                name,
                value: value.clone(),
            }],
            _ => Vec::new(),
        }
    }

    fn has_changed(
        &self,
        field: &FieldDefinition,
        input: &FormInput,
        original: Option<&FieldContent>,
    ) -> bool {
        let input = input
            .get(&field.input_name())
            .map(value_as_text)
            .unwrap_or_default();
        let original = original.map(|c| c.content.as_str()).unwrap_or("");
        input != original
    }

    fn override_data(
        &self,
        field: &FieldDefinition,
        original: Option<FieldContent>,
        offline: Option<&BTreeMap<String, Value>>,
        files: Vec<AttachedFile>,
    ) -> FieldContent {
        let mut content = original.unwrap_or_else(|| FieldContent::empty(field.id));
        if let Some(value) = offline.and_then(|values| values.get("")) {
            content.content = value_as_text(value);
        }
        if !files.is_empty() {
            content.files = files;
        }
        content
    }

    fn notifications(&self, field: &FieldDefinition, data: &[EntryFieldData]) -> Option<String> {
        required_notification(field, data)
    }
}

/// 添付ファイルを持つフィールド（file, picture）
///
/// 入力値は `AttachedFile` の配列。送信時はアップロード後のアイテムID、
/// オフライン時は `StoredFiles` が値になる。
pub struct FileFieldHandler;

impl FileFieldHandler {
    fn input_files(field: &FieldDefinition, input: &FormInput) -> Vec<AttachedFile> {
        input
            .get(&field.input_name())
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }
}

impl FieldHandler for FileFieldHandler {
    fn edit_data(
        &self,
        field: &FieldDefinition,
        input: &FormInput,
        _original: Option<&FieldContent>,
    ) -> Vec<SubfieldData> {
        vec![SubfieldData {
            field_id: field.id,
            subfield: Some("file".to_string()),
            value: Value::Null,
            files: Some(Self::input_files(field, input)),
        }]
    }

    fn search_data(&self, field: &FieldDefinition, input: &FormInput) -> Vec<SearchFieldData> {
        DefaultFieldHandler.search_data(field, input)
    }

    fn has_changed(
        &self,
        field: &FieldDefinition,
        input: &FormInput,
        original: Option<&FieldContent>,
    ) -> bool {
        let current: Vec<String> = Self::input_files(field, input)
            .iter()
            .map(|f| f.filename().to_string())
            .collect();
        let original: Vec<String> = original
            .map(|c| c.files.iter().map(|f| f.filename().to_string()).collect())
            .unwrap_or_default();
        current != original
    }

    fn override_data(
        &self,
        field: &FieldDefinition,
        original: Option<FieldContent>,
        offline: Option<&BTreeMap<String, Value>>,
        files: Vec<AttachedFile>,
    ) -> FieldContent {
        let mut content = original.unwrap_or_else(|| FieldContent::empty(field.id));
        let Some(values) = offline else {
            return content;
        };

        let stored = values
            .get("file")
            .or_else(|| values.get(""))
            .and_then(|value| serde_json::from_value::<StoredFiles>(value.clone()).ok())
            .unwrap_or_default();

        let mut merged: Vec<AttachedFile> =
            stored.online.into_iter().map(AttachedFile::Remote).collect();
        merged.extend(files);
        content.content = merged
            .first()
            .map(|f| f.filename().to_string())
            .unwrap_or_default();
        content.files = merged;
        content
    }

    fn notifications(&self, field: &FieldDefinition, data: &[EntryFieldData]) -> Option<String> {
        if !field.required {
            return None;
        }
        let supplied = data.iter().any(|d| {
            d.field_id == field.id
                && match StoredFiles::from_field_value(&d.value) {
                    Some(stored) => stored.has_files(),
                    None => has_value(d) && d.value != "0",
                }
        });
        if supplied {
            None
        } else {
            Some(MUST_SUPPLY_VALUE.to_string())
        }
    }

    fn has_files(&self) -> bool {
        true
    }
}
