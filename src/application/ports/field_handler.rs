use crate::domain::entities::{
    AttachedFile, EntryFieldData, FieldContent, FieldDefinition, FormInput, SearchFieldData,
    SubfieldData,
};
use serde_json::Value;
use std::collections::BTreeMap;

/// フィールド種別ごとの振る舞い
pub trait FieldHandler: Send + Sync {
    /// フォーム入力から送信データを作る
    fn edit_data(
        &self,
        field: &FieldDefinition,
        input: &FormInput,
        original: Option<&FieldContent>,
    ) -> Vec<SubfieldData>;

    /// 検索フォームの入力から検索条件を作る
    fn search_data(&self, field: &FieldDefinition, input: &FormInput) -> Vec<SearchFieldData>;

    /// 入力が元の内容から変わっているか
    fn has_changed(
        &self,
        field: &FieldDefinition,
        input: &FormInput,
        original: Option<&FieldContent>,
    ) -> bool;

    /// オフラインの値で内容を上書きする（subfield → 値、"" が主値）
    fn override_data(
        &self,
        field: &FieldDefinition,
        original: Option<FieldContent>,
        offline: Option<&BTreeMap<String, Value>>,
        files: Vec<AttachedFile>,
    ) -> FieldContent;

    /// 必須チェック等の通知。問題なければ None。
    fn notifications(&self, field: &FieldDefinition, data: &[EntryFieldData]) -> Option<String>;

    /// 添付ファイルを扱う種別か
    fn has_files(&self) -> bool {
        false
    }
}
