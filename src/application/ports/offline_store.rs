use crate::domain::entities::{PendingAction, PendingActionDraft};
use crate::domain::value_objects::{EntryAction, EntryId};
use crate::shared::error::AppError;
use async_trait::async_trait;

/// 未同期のエントリー操作を保持するローカルストア
#[async_trait]
pub trait OfflineEntryStore: Send + Sync {
    /// 操作を保存する。同じ (database, entry, action) の既存行は置き換える。
    async fn save_action(&self, draft: PendingActionDraft) -> Result<PendingAction, AppError>;

    /// 単一の操作を取得
    async fn get_action(
        &self,
        database_id: i64,
        entry_id: EntryId,
        action: EntryAction,
    ) -> Result<Option<PendingAction>, AppError>;

    /// エントリーに対する全ての操作を取得
    async fn list_entry_actions(
        &self,
        database_id: i64,
        entry_id: EntryId,
    ) -> Result<Vec<PendingAction>, AppError>;

    /// データベースの全操作を操作時刻の昇順で取得
    async fn list_database_actions(&self, database_id: i64)
    -> Result<Vec<PendingAction>, AppError>;

    /// 全データベースの操作を取得
    async fn list_all_actions(&self) -> Result<Vec<PendingAction>, AppError>;

    /// 操作を削除（添付ファイルのフォルダも削除する）
    async fn delete_action(
        &self,
        database_id: i64,
        entry_id: EntryId,
        action: EntryAction,
    ) -> Result<(), AppError>;

    /// エントリーの全操作を削除（添付ファイルのフォルダも削除する）
    async fn delete_entry_actions(&self, database_id: i64, entry_id: EntryId)
    -> Result<(), AppError>;

    /// データベースに未同期の操作があるか
    async fn has_pending(&self, database_id: i64) -> Result<bool, AppError>;
}

/// 最終同期時刻の記録
#[async_trait]
pub trait SyncTimeStore: Send + Sync {
    /// 最終同期時刻（秒）。未同期なら 0。
    async fn sync_time(&self, database_id: i64) -> Result<i64, AppError>;

    async fn set_sync_time(&self, database_id: i64, time: i64) -> Result<(), AppError>;
}
