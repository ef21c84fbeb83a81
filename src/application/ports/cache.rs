use crate::domain::entities::Entry;
use crate::domain::value_objects::EntryId;
use async_trait::async_trait;

/// エントリー読み取りキャッシュ
#[async_trait]
pub trait ReadCache: Send + Sync {
    /// キャッシュ済みのリモートエントリー
    async fn cached_entry(&self, database_id: i64, entry_id: EntryId) -> Option<Entry>;

    /// 取得したリモートエントリーを保持する
    async fn store_entry(&self, entry: Entry);

    /// データベースのエントリー一覧キャッシュを無効化
    async fn invalidate_entries_data(&self, database_id: i64);

    /// データベースのフィールド定義キャッシュを無効化
    async fn invalidate_fields_data(&self, database_id: i64);

    /// 単一エントリーのキャッシュを無効化
    async fn invalidate_entry_data(&self, database_id: i64, entry_id: EntryId);
}
