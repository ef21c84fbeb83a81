use super::mappers::{fields_to_column, pending_action_from_row};
use super::rows::{OfflineEntryRow, SyncTimeRow};
use crate::application::ports::file_store::{EntryFieldFolder, OfflineFileStore};
use crate::application::ports::offline_store::{OfflineEntryStore, SyncTimeStore};
use crate::domain::entities::{PendingAction, PendingActionDraft};
use crate::domain::value_objects::{EntryAction, EntryId};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, warn};

/// 同期時刻テーブルのコンポーネント名
pub const SYNC_COMPONENT: &str = "mod_data";

const SELECT_COLUMNS: &str =
    "SELECT dataid, courseid, groupid, action, entryid, fields, timemodified FROM offline_entries";

/// SQLite に保存するオフライン操作ストア
pub struct SqliteOfflineStore {
    pool: SqlitePool,
    files: Option<Arc<dyn OfflineFileStore>>,
}

impl SqliteOfflineStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool, files: None }
    }

    /// 操作削除時に添付ファイルのフォルダも削除する
    pub fn with_file_store(mut self, files: Arc<dyn OfflineFileStore>) -> Self {
        self.files = Some(files);
        self
    }

    fn map_rows(rows: Vec<OfflineEntryRow>) -> Result<Vec<PendingAction>, AppError> {
        rows.into_iter().map(pending_action_from_row).collect()
    }

    async fn remove_files(&self, actions: &[PendingAction]) {
        let Some(files) = &self.files else {
            return;
        };
        for action in actions {
            for field in &action.fields {
                let folder = EntryFieldFolder::new(action.database_id, action.entry_id, field.field_id);
                if let Err(e) = files.remove_folder(folder).await {
                    // 行は削除済みなので残骸のフォルダは失敗しても続行
                    warn!(
                        database_id = action.database_id,
                        entry_id = %action.entry_id,
                        field_id = field.field_id,
                        "Failed to remove offline files: {}",
                        e
                    );
                }
            }
        }
    }
}

#[async_trait]
impl OfflineEntryStore for SqliteOfflineStore {
    async fn save_action(&self, draft: PendingActionDraft) -> Result<PendingAction, AppError> {
        let action = draft.resolve(Utc::now().timestamp());
        let fields = fields_to_column(&action.fields)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM offline_entries WHERE dataid = ?1 AND entryid = ?2 AND action = ?3")
            .bind(action.database_id)
            .bind(action.entry_id.value())
            .bind(action.action.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO offline_entries (
                dataid, courseid, groupid, action, entryid, fields, timemodified
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(action.database_id)
        .bind(action.course_id)
        .bind(action.group_id)
        .bind(action.action.as_str())
        .bind(action.entry_id.value())
        .bind(&fields)
        .bind(action.time_modified)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(
            database_id = action.database_id,
            entry_id = %action.entry_id,
            action = %action.action,
            "Saved offline entry action"
        );
        Ok(action)
    }

    async fn get_action(
        &self,
        database_id: i64,
        entry_id: EntryId,
        action: EntryAction,
    ) -> Result<Option<PendingAction>, AppError> {
        let row = sqlx::query_as::<_, OfflineEntryRow>(&format!(
            "{SELECT_COLUMNS} WHERE dataid = ?1 AND entryid = ?2 AND action = ?3"
        ))
        .bind(database_id)
        .bind(entry_id.value())
        .bind(action.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(pending_action_from_row).transpose()
    }

    async fn list_entry_actions(
        &self,
        database_id: i64,
        entry_id: EntryId,
    ) -> Result<Vec<PendingAction>, AppError> {
        let rows = sqlx::query_as::<_, OfflineEntryRow>(&format!(
            "{SELECT_COLUMNS} WHERE dataid = ?1 AND entryid = ?2 ORDER BY timemodified ASC, rowid ASC"
        ))
        .bind(database_id)
        .bind(entry_id.value())
        .fetch_all(&self.pool)
        .await?;

        Self::map_rows(rows)
    }

    async fn list_database_actions(
        &self,
        database_id: i64,
    ) -> Result<Vec<PendingAction>, AppError> {
        let rows = sqlx::query_as::<_, OfflineEntryRow>(&format!(
            "{SELECT_COLUMNS} WHERE dataid = ?1 ORDER BY timemodified ASC, rowid ASC"
        ))
        .bind(database_id)
        .fetch_all(&self.pool)
        .await?;

        Self::map_rows(rows)
    }

    async fn list_all_actions(&self) -> Result<Vec<PendingAction>, AppError> {
        let rows = sqlx::query_as::<_, OfflineEntryRow>(&format!(
            "{SELECT_COLUMNS} ORDER BY dataid ASC, timemodified ASC, rowid ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Self::map_rows(rows)
    }

    async fn delete_action(
        &self,
        database_id: i64,
        entry_id: EntryId,
        action: EntryAction,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, OfflineEntryRow>(&format!(
            "{SELECT_COLUMNS} WHERE dataid = ?1 AND entryid = ?2 AND action = ?3"
        ))
        .bind(database_id)
        .bind(entry_id.value())
        .bind(action.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM offline_entries WHERE dataid = ?1 AND entryid = ?2 AND action = ?3")
            .bind(database_id)
            .bind(entry_id.value())
            .bind(action.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if let Some(removed) = row.map(pending_action_from_row).transpose()? {
            self.remove_files(std::slice::from_ref(&removed)).await;
        }
        Ok(())
    }

    async fn delete_entry_actions(
        &self,
        database_id: i64,
        entry_id: EntryId,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query_as::<_, OfflineEntryRow>(&format!(
            "{SELECT_COLUMNS} WHERE dataid = ?1 AND entryid = ?2 ORDER BY timemodified ASC, rowid ASC"
        ))
        .bind(database_id)
        .bind(entry_id.value())
        .fetch_all(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM offline_entries WHERE dataid = ?1 AND entryid = ?2")
            .bind(database_id)
            .bind(entry_id.value())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let removed = Self::map_rows(rows)?;
        self.remove_files(&removed).await;
        Ok(())
    }

    async fn has_pending(&self, database_id: i64) -> Result<bool, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM offline_entries WHERE dataid = ?1")
            .bind(database_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }
}

#[async_trait]
impl SyncTimeStore for SqliteOfflineStore {
    async fn sync_time(&self, database_id: i64) -> Result<i64, AppError> {
        let row = sqlx::query_as::<_, SyncTimeRow>(
            "SELECT component, item_id, time, warnings FROM sync_times WHERE component = ?1 AND item_id = ?2",
        )
        .bind(SYNC_COMPONENT)
        .bind(database_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| row.time).unwrap_or(0))
    }

    async fn set_sync_time(&self, database_id: i64, time: i64) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO sync_times (component, item_id, time)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(component, item_id) DO UPDATE SET time = excluded.time
            "#,
        )
        .bind(SYNC_COMPONENT)
        .bind(database_id)
        .bind(time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
