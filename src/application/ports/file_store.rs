use crate::domain::entities::{AttachedFile, LocalFile, StoredFiles};
use crate::domain::value_objects::EntryId;
use crate::shared::error::AppError;
use async_trait::async_trait;

/// オフライン添付ファイルの保存先（database, entry, field 単位）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryFieldFolder {
    pub database_id: i64,
    pub entry_id: EntryId,
    pub field_id: i64,
}

impl EntryFieldFolder {
    pub fn new(database_id: i64, entry_id: EntryId, field_id: i64) -> Self {
        Self {
            database_id,
            entry_id,
            field_id,
        }
    }
}

/// オフライン添付ファイルの保管
#[async_trait]
pub trait OfflineFileStore: Send + Sync {
    /// ファイルを保管する。サーバー上のファイルは online として参照のみ保持する。
    async fn store_files(
        &self,
        folder: EntryFieldFolder,
        files: &[AttachedFile],
    ) -> Result<StoredFiles, AppError>;

    /// 保管済みファイル一覧。フォルダが無ければ空。
    async fn stored_files(&self, folder: EntryFieldFolder) -> Result<Vec<LocalFile>, AppError>;

    /// フォルダを削除する。存在しなくてもエラーにしない。
    async fn remove_folder(&self, folder: EntryFieldFolder) -> Result<(), AppError>;
}
