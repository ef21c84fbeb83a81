use crate::application::ports::cache::ReadCache;
use crate::application::ports::entry_gateway::{EntryGateway, FileUploader};
use crate::application::ports::file_store::{EntryFieldFolder, OfflineFileStore};
use crate::application::ports::offline_store::OfflineEntryStore;
use crate::application::services::field_registry::FieldHandlerRegistry;
use crate::domain::entities::field::{decode_field_value, encode_field_value};
use crate::domain::entities::{
    AttachedFile, DatabaseInfo, Entry, EntryContents, EntryFieldData, FieldDefinition, FormInput,
    LocalFile, PendingAction,
};
use crate::domain::value_objects::{EntryAction, EntryId};
use crate::shared::error::AppError;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// リモートのエントリーとローカルの保留操作を結びつけるヘルパー
#[derive(Clone)]
pub struct EntryMergeHelper {
    registry: FieldHandlerRegistry,
    files: Arc<dyn OfflineFileStore>,
    uploader: Arc<dyn FileUploader>,
    gateway: Arc<dyn EntryGateway>,
    store: Arc<dyn OfflineEntryStore>,
    cache: Arc<dyn ReadCache>,
}

impl EntryMergeHelper {
    pub fn new(
        registry: FieldHandlerRegistry,
        files: Arc<dyn OfflineFileStore>,
        uploader: Arc<dyn FileUploader>,
        gateway: Arc<dyn EntryGateway>,
        store: Arc<dyn OfflineEntryStore>,
        cache: Arc<dyn ReadCache>,
    ) -> Self {
        Self {
            registry,
            files,
            uploader,
            gateway,
            store,
            cache,
        }
    }

    pub fn registry(&self) -> &FieldHandlerRegistry {
        &self.registry
    }

    /// 保留操作を時刻順にエントリーへ重ねる
    pub async fn apply_pending_actions(
        &self,
        mut entry: Entry,
        actions: &[PendingAction],
        fields: &[FieldDefinition],
    ) -> Entry {
        let mut ordered: Vec<&PendingAction> = actions.iter().collect();
        ordered.sort_by_key(|action| action.time_modified);

        for action in ordered {
            entry.time_modified = action.time_modified;
            entry.has_offline = true;

            match action.action {
                EntryAction::Approve => entry.approved = true,
                EntryAction::Disapprove => entry.approved = false,
                EntryAction::Delete => entry.deleted = true,
                EntryAction::Add | EntryAction::Edit => {
                    if action.action == EntryAction::Add && entry.time_created == 0 {
                        entry.time_created = action.time_modified;
                    }
                    if let Some(group_id) = action.group_id {
                        entry.group_id = group_id;
                    }

                    // fieldid → subfield → 値（"" が主値）
                    let mut offline_contents: HashMap<i64, BTreeMap<String, Value>> =
                        HashMap::new();
                    for data in &action.fields {
                        offline_contents
                            .entry(data.field_id)
                            .or_default()
                            .insert(data.subfield.clone(), decode_field_value(&data.value));
                    }

                    for field in fields {
                        let handler = self.registry.handler_for(field);
                        let files = if handler.has_files() {
                            self.stored_files(entry.database_id, entry.entry_id(), field.id)
                                .await
                                .into_iter()
                                .map(AttachedFile::Local)
                                .collect()
                        } else {
                            Vec::new()
                        };

                        let original = entry.contents.remove(&field.id);
                        let mut content = handler.override_data(
                            field,
                            original,
                            offline_contents.get(&field.id),
                            files,
                        );
                        content.field_id = field.id;
                        entry.contents.insert(field.id, content);
                    }
                }
            }
        }

        entry
    }

    /// いずれかのフィールドが変更されていれば true
    pub fn has_changed(
        &self,
        input: &FormInput,
        fields: &[FieldDefinition],
        original: &EntryContents,
    ) -> bool {
        fields.iter().any(|field| {
            self.registry
                .handler_for(field)
                .has_changed(field, input, original.get(&field.id))
        })
    }

    /// フォーム入力から送信データを作る。添付ファイルはアップロードまたは保管する。
    pub async fn build_submission(
        &self,
        input: &FormInput,
        fields: &[FieldDefinition],
        database_id: i64,
        entry_id: EntryId,
        original: &EntryContents,
        offline: bool,
    ) -> Result<Vec<EntryFieldData>, AppError> {
        let mut submission = Vec::new();

        for field in fields {
            let handler = self.registry.handler_for(field);
            for sub in handler.edit_data(field, input, original.get(&field.id)) {
                let value = match &sub.files {
                    Some(files) => {
                        self.upload_or_store_files(database_id, entry_id, sub.field_id, files, offline)
                            .await?
                    }
                    None => sub.value.clone(),
                };

                submission.push(EntryFieldData::new(
                    sub.field_id,
                    sub.subfield.as_deref().unwrap_or(""),
                    encode_field_value(&value),
                ));
            }
        }

        Ok(submission)
    }

    /// 保管済みの添付ファイル。読めなければ空として扱う。
    pub async fn stored_files(
        &self,
        database_id: i64,
        entry_id: EntryId,
        field_id: i64,
    ) -> Vec<LocalFile> {
        let folder = EntryFieldFolder::new(database_id, entry_id, field_id);
        match self.files.stored_files(folder).await {
            Ok(files) => files,
            Err(e) => {
                debug!(database_id, %entry_id, field_id, "Ignoring unreadable offline files: {}", e);
                Vec::new()
            }
        }
    }

    /// オフラインなら保管して `StoredFiles` を、オンラインならアップロードしてアイテムIDを返す
    pub async fn upload_or_store_files(
        &self,
        database_id: i64,
        entry_id: EntryId,
        field_id: i64,
        files: &[AttachedFile],
        offline: bool,
    ) -> Result<Value, AppError> {
        if offline {
            let folder = EntryFieldFolder::new(database_id, entry_id, field_id);
            let stored = self.files.store_files(folder, files).await?;
            return serde_json::to_value(stored)
                .map_err(|e| AppError::SerializationError(e.to_string()));
        }

        if files.is_empty() {
            return Ok(json!(0));
        }

        let item_id = self.uploader.upload_files(files, None).await?;
        Ok(json!(item_id))
    }

    /// 保留操作を反映したエントリーを取得する。仮IDならローカルで組み立てる。
    /// リモートの内容はキャッシュし、保留操作は毎回重ね直す。
    pub async fn fetch_entry(
        &self,
        database: &DatabaseInfo,
        fields: &[FieldDefinition],
        entry_id: EntryId,
    ) -> Result<Entry, AppError> {
        let actions = self
            .store
            .list_entry_actions(database.id, entry_id)
            .await?;

        let entry = if entry_id.is_remote() {
            match self.cache.cached_entry(database.id, entry_id).await {
                Some(entry) => entry,
                None => {
                    let entry = self
                        .gateway
                        .fetch_entry(database.id, entry_id.value())
                        .await?;
                    self.cache.store_entry(entry.clone()).await;
                    entry
                }
            }
        } else {
            let mut entry = Entry::provisional(database.id, entry_id);
            entry.approved = !database.approval || database.manage_approved;
            entry
        };

        Ok(self.apply_pending_actions(entry, &actions, fields).await)
    }
}
