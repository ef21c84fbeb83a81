use crate::application::ports::cache::ReadCache;
use crate::domain::entities::Entry;
use crate::domain::value_objects::EntryId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Clone)]
struct CacheEntry<T> {
    data: T,
    expires_at: Instant,
}

/// メモリキャッシュサービス
pub struct MemoryCacheService<T: Clone> {
    cache: Arc<RwLock<HashMap<String, CacheEntry<T>>>>,
    default_ttl: Duration,
}

impl<T> MemoryCacheService<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// 新しいキャッシュサービスを作成
    pub fn new(default_ttl_seconds: u64) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            default_ttl: Duration::from_secs(default_ttl_seconds),
        }
    }

    /// キャッシュにデータを保存
    pub async fn set(&self, key: String, value: T) {
        let entry = CacheEntry {
            data: value,
            expires_at: Instant::now() + self.default_ttl,
        };

        let mut cache = self.cache.write().await;
        cache.insert(key, entry);
    }

    /// キャッシュからデータを取得
    pub async fn get(&self, key: &str) -> Option<T> {
        let cache = self.cache.read().await;

        if let Some(entry) = cache.get(key) {
            if entry.expires_at > Instant::now() {
                return Some(entry.data.clone());
            }
        }

        None
    }

    /// キャッシュから削除
    pub async fn delete(&self, key: &str) {
        let mut cache = self.cache.write().await;
        cache.remove(key);
    }

    /// 前方一致するキーを削除
    pub async fn delete_prefix(&self, prefix: &str) {
        let mut cache = self.cache.write().await;
        cache.retain(|key, _| !key.starts_with(prefix));
    }
}

/// リモートエントリーのキャッシュ。キーは `entry:<database_id>:<entry_id>`。
pub struct EntryCacheService {
    entries: MemoryCacheService<Entry>,
}

impl EntryCacheService {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            entries: MemoryCacheService::new(ttl_seconds),
        }
    }

    fn entry_key(database_id: i64, entry_id: EntryId) -> String {
        format!("entry:{database_id}:{entry_id}")
    }
}

#[async_trait]
impl ReadCache for EntryCacheService {
    async fn cached_entry(&self, database_id: i64, entry_id: EntryId) -> Option<Entry> {
        self.entries.get(&Self::entry_key(database_id, entry_id)).await
    }

    async fn store_entry(&self, entry: Entry) {
        let key = Self::entry_key(entry.database_id, entry.entry_id());
        self.entries.set(key, entry).await;
    }

    async fn invalidate_entries_data(&self, database_id: i64) {
        debug!(database_id, "Invalidating entries cache");
        self.entries
            .delete_prefix(&format!("entry:{database_id}:"))
            .await;
    }

    async fn invalidate_fields_data(&self, database_id: i64) {
        // フィールド定義は保持していない
        debug!(database_id, "Invalidating fields cache");
    }

    async fn invalidate_entry_data(&self, database_id: i64, entry_id: EntryId) {
        self.entries
            .delete(&Self::entry_key(database_id, entry_id))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(database_id: i64, id: i64) -> Entry {
        Entry {
            id,
            database_id,
            ..Entry::default()
        }
    }

    #[tokio::test]
    async fn test_expired_values_are_not_returned() {
        let cache = MemoryCacheService::<String>::new(0);
        cache.set("k".to_string(), "v".to_string()).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn test_invalidate_entries_keeps_other_databases() {
        let cache = EntryCacheService::new(3600);
        cache.store_entry(entry(1, 5)).await;
        cache.store_entry(entry(1, 6)).await;
        cache.store_entry(entry(11, 7)).await;

        cache.invalidate_entries_data(1).await;

        assert!(cache.cached_entry(1, EntryId::new(5)).await.is_none());
        assert!(cache.cached_entry(1, EntryId::new(6)).await.is_none());
        assert!(cache.cached_entry(11, EntryId::new(7)).await.is_some());
    }

    #[tokio::test]
    async fn test_invalidate_single_entry() {
        let cache = EntryCacheService::new(3600);
        cache.store_entry(entry(1, 5)).await;
        cache.store_entry(entry(1, 6)).await;

        cache.invalidate_entry_data(1, EntryId::new(5)).await;
        cache.invalidate_fields_data(1).await;

        assert!(cache.cached_entry(1, EntryId::new(5)).await.is_none());
        assert_eq!(cache.cached_entry(1, EntryId::new(6)).await, Some(entry(1, 6)));
    }
}
