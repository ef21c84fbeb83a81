use super::metrics::{SyncMetrics, SyncMetricsSnapshot};
use crate::application::ports::cache::ReadCache;
use crate::application::ports::entry_gateway::{EntryGateway, GatewayError};
use crate::application::ports::network::NetworkStatus;
use crate::application::ports::offline_store::{OfflineEntryStore, SyncTimeStore};
use crate::application::services::entry_merge::EntryMergeHelper;
use crate::domain::entities::{
    AttachedFile, AutoSyncedEvent, DatabaseInfo, EntryEvent, PendingAction, StoredFiles,
    SyncResult,
};
use crate::domain::value_objects::{EntryAction, EntryId};
use crate::infrastructure::event::EntryEventBus;
use crate::shared::config::SyncConfig;
use crate::shared::error::AppError;
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared, join_all};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 競合で破棄したときの理由
pub const ENTRY_MODIFIED_MESSAGE: &str = "User submission was modified on the site.";
/// 追加が確定しなかったエントリーへの承認を破棄したときの理由
pub const ENTRY_NOT_CREATED_MESSAGE: &str = "The entry could not be created on the site.";

type SharedSync = Shared<BoxFuture<'static, Result<SyncResult, AppError>>>;

/// 同期エンジンが使うポート群
#[derive(Clone)]
pub struct SyncDependencies {
    pub store: Arc<dyn OfflineEntryStore>,
    pub sync_times: Arc<dyn SyncTimeStore>,
    pub gateway: Arc<dyn EntryGateway>,
    pub network: Arc<dyn NetworkStatus>,
    pub cache: Arc<dyn ReadCache>,
}

/// sync_all_databases の結果（データベース単位）
#[derive(Debug, Clone)]
pub struct DatabaseSyncReport {
    pub database_id: i64,
    /// 同期不要で飛ばした場合は Ok(None)
    pub result: Result<Option<SyncResult>, AppError>,
}

/// エントリー単位の同期結果
#[derive(Debug, Clone)]
struct EntrySyncOutcome {
    entry_id: EntryId,
    offline_entry_id: Option<EntryId>,
    deleted: bool,
    discard_errors: Vec<String>,
}

/// 1操作の再送失敗
enum ReplayError {
    /// サーバーが拒否した。操作は破棄して続行する。
    Discard(String),
    /// 接続できない等。同期全体を中断する。
    Abort(AppError),
}

impl From<GatewayError> for ReplayError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Service { message, .. } => ReplayError::Discard(message),
            other => ReplayError::Abort(other.into()),
        }
    }
}

impl From<AppError> for ReplayError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::WebService(message) => ReplayError::Discard(message),
            other => ReplayError::Abort(other),
        }
    }
}

/// データベース活動のオフライン操作を同期する
#[derive(Clone)]
pub struct DatabaseSyncService {
    store: Arc<dyn OfflineEntryStore>,
    sync_times: Arc<dyn SyncTimeStore>,
    gateway: Arc<dyn EntryGateway>,
    network: Arc<dyn NetworkStatus>,
    cache: Arc<dyn ReadCache>,
    helper: EntryMergeHelper,
    events: EntryEventBus,
    sync_interval: Duration,
    ongoing: Arc<Mutex<HashMap<i64, SharedSync>>>,
    blocked: Arc<RwLock<HashSet<i64>>>,
    metrics: Arc<SyncMetrics>,
}

impl DatabaseSyncService {
    pub fn new(
        deps: SyncDependencies,
        helper: EntryMergeHelper,
        events: EntryEventBus,
        config: &SyncConfig,
    ) -> Self {
        Self {
            store: deps.store,
            sync_times: deps.sync_times,
            gateway: deps.gateway,
            network: deps.network,
            cache: deps.cache,
            helper,
            events,
            sync_interval: Duration::from_secs(config.sync_interval),
            ongoing: Arc::new(Mutex::new(HashMap::new())),
            blocked: Arc::new(RwLock::new(HashSet::new())),
            metrics: Arc::new(SyncMetrics::new()),
        }
    }

    /// データベースを同期する。同じデータベースの同期が進行中ならその結果を待つ。
    pub async fn sync_database(&self, database_id: i64) -> Result<SyncResult, AppError> {
        let mut ongoing = self.ongoing.lock().await;
        if let Some(current) = ongoing.get(&database_id) {
            let current = current.clone();
            drop(ongoing);
            debug!(database_id, "Joining ongoing database sync");
            return current.await;
        }

        if self.is_blocked(database_id).await {
            debug!(database_id, "Cannot sync database because it is blocked");
            return Err(AppError::SyncBlocked(format!(
                "Database {database_id} is being edited"
            )));
        }

        debug!(database_id, "Try to sync database");
        let this = self.clone();
        let sync = async move {
            let result = this.perform_sync_database(database_id).await;
            this.ongoing.lock().await.remove(&database_id);
            result
        }
        .boxed()
        .shared();
        ongoing.insert(database_id, sync.clone());
        drop(ongoing);

        sync.await
    }

    /// 前回の同期から間隔が空いている場合のみ同期する
    pub async fn sync_database_if_needed(
        &self,
        database_id: i64,
    ) -> Result<Option<SyncResult>, AppError> {
        if self.is_sync_needed(database_id).await? {
            self.sync_database(database_id).await.map(Some)
        } else {
            debug!(database_id, "Database sync not needed yet");
            Ok(None)
        }
    }

    /// 保留操作を持つ全データベースを同期する。1つの失敗は他に影響しない。
    pub async fn sync_all_databases(
        &self,
        force: bool,
    ) -> Result<Vec<DatabaseSyncReport>, AppError> {
        let actions = self.store.list_all_actions().await?;

        let mut database_ids = Vec::new();
        for action in &actions {
            if !database_ids.contains(&action.database_id) {
                database_ids.push(action.database_id);
            }
        }
        info!(
            databases = database_ids.len(),
            force, "Syncing all databases with offline data"
        );

        let syncs = database_ids.into_iter().map(|database_id| async move {
            let result = if force {
                self.sync_database(database_id).await.map(Some)
            } else {
                self.sync_database_if_needed(database_id).await
            };

            match &result {
                Ok(Some(sync)) if sync.updated => {
                    self.events.emit(EntryEvent::AutoSynced(AutoSyncedEvent {
                        database_id,
                        warnings: sync.warnings.clone(),
                        ..AutoSyncedEvent::default()
                    }));
                }
                Err(e) => warn!(database_id, "Database sync failed: {}", e),
                _ => {}
            }

            DatabaseSyncReport {
                database_id,
                result,
            }
        });

        Ok(join_all(syncs).await)
    }

    /// データベースに未同期の操作があるか
    pub async fn has_data_to_sync(&self, database_id: i64) -> Result<bool, AppError> {
        self.store.has_pending(database_id).await
    }

    /// 編集中のデータベースを同期対象から外す
    pub async fn block_database(&self, database_id: i64) {
        self.blocked.write().await.insert(database_id);
    }

    pub async fn unblock_database(&self, database_id: i64) {
        self.blocked.write().await.remove(&database_id);
    }

    pub async fn is_blocked(&self, database_id: i64) -> bool {
        self.blocked.read().await.contains(&database_id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EntryEvent> {
        self.events.subscribe()
    }

    pub fn metrics(&self) -> SyncMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 定期的に sync_all_databases(false) を実行するタスクを起動
    pub fn spawn_periodic_sync(&self, interval: Duration) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);

            loop {
                ticker.tick().await;

                match service.sync_all_databases(false).await {
                    Ok(reports) => {
                        let failed = reports.iter().filter(|r| r.result.is_err()).count();
                        debug!(databases = reports.len(), failed, "Periodic sync finished");
                    }
                    Err(e) => error!("Periodic sync error: {}", e),
                }
            }
        })
    }

    async fn is_sync_needed(&self, database_id: i64) -> Result<bool, AppError> {
        let last = self.sync_times.sync_time(database_id).await?;
        let elapsed = Utc::now().timestamp().saturating_sub(last);
        Ok(elapsed >= self.sync_interval.as_secs() as i64)
    }

    async fn record_sync_time(&self, database_id: i64) {
        if let Err(e) = self
            .sync_times
            .set_sync_time(database_id, Utc::now().timestamp())
            .await
        {
            warn!(database_id, "Failed to store sync time: {}", e);
        }
    }

    async fn perform_sync_database(&self, database_id: i64) -> Result<SyncResult, AppError> {
        let started = Instant::now();
        self.metrics.record_started();

        let outcome = self.sync_pending_actions(database_id).await;

        let elapsed = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(result) => {
                self.metrics.record_success(elapsed);
                info!(
                    database_id,
                    updated = result.updated,
                    warnings = result.warnings.len(),
                    "Database sync finished"
                );
            }
            Err(e) => {
                self.metrics.record_failure(elapsed);
                warn!(database_id, "Database sync aborted: {}", e);
            }
        }
        outcome
    }

    async fn sync_pending_actions(&self, database_id: i64) -> Result<SyncResult, AppError> {
        let mut result = SyncResult::default();

        let actions = match self.store.list_database_actions(database_id).await {
            Ok(actions) => actions,
            Err(e) => {
                warn!(database_id, "Failed to read offline actions: {}", e);
                Vec::new()
            }
        };

        if actions.is_empty() {
            self.record_sync_time(database_id).await;
            return Ok(result);
        }

        if !self.network.is_online() {
            return Err(AppError::Network(
                "Cannot sync while the device is offline".to_string(),
            ));
        }

        let course_id = actions[0].course_id;
        let database = self.gateway.fetch_database(course_id, database_id).await?;

        let mut touched = Vec::new();
        let mut aborted = None;
        for entry_actions in group_by_entry(actions) {
            touched.push(entry_actions[0].entry_id);
            match self.sync_entry(&database, entry_actions, &mut result).await {
                Ok(outcome) => {
                    if !touched.contains(&outcome.entry_id) {
                        touched.push(outcome.entry_id);
                    }
                }
                Err(e) => {
                    aborted = Some(e);
                    break;
                }
            }
        }

        if result.updated {
            // 途中で中断しても送信済みの分はキャッシュに反映させる
            self.cache.invalidate_entries_data(database_id).await;
            self.cache.invalidate_fields_data(database_id).await;
            for entry_id in touched {
                self.cache.invalidate_entry_data(database_id, entry_id).await;
            }
        }

        if let Some(e) = aborted {
            return Err(e);
        }

        self.record_sync_time(database_id).await;
        Ok(result)
    }

    async fn sync_entry(
        &self,
        database: &DatabaseInfo,
        actions: Vec<PendingAction>,
        result: &mut SyncResult,
    ) -> Result<EntrySyncOutcome, AppError> {
        let outcome = self.perform_sync_entry(database, &actions, result).await?;

        for reason in &outcome.discard_errors {
            result.add_warning(format!(
                "Offline data from Database '{}' has been deleted. {}",
                database.name, reason
            ));
        }

        self.events.emit(EntryEvent::AutoSynced(AutoSyncedEvent {
            database_id: database.id,
            entry_id: Some(outcome.entry_id),
            offline_entry_id: outcome.offline_entry_id,
            warnings: result.warnings.clone(),
            deleted: outcome.deleted,
        }));

        Ok(outcome)
    }

    async fn perform_sync_entry(
        &self,
        database: &DatabaseInfo,
        actions: &[PendingAction],
        result: &mut SyncResult,
    ) -> Result<EntrySyncOutcome, AppError> {
        let original_id = actions[0].entry_id;
        let mut outcome = EntrySyncOutcome {
            entry_id: original_id,
            offline_entry_id: None,
            deleted: false,
            discard_errors: Vec::new(),
        };

        let content_action = actions.iter().find(|a| a.action.is_content_change());
        let approval_action = actions.iter().find(|a| a.action.is_approval());
        let delete_action = actions.iter().find(|a| a.action == EntryAction::Delete);
        let earliest = actions
            .iter()
            .map(|a| a.time_modified)
            .min()
            .unwrap_or_default();

        let remote_time = if original_id.is_remote() {
            match self
                .gateway
                .fetch_entry(database.id, original_id.value())
                .await
            {
                Ok(entry) => entry.time_modified,
                // サーバーが拒否した = エントリーは削除済み
                Err(e) if e.is_service_error() => -1,
                Err(e) => return Err(e.into()),
            }
        } else if content_action.is_some_and(|a| a.action == EntryAction::Add) {
            outcome.offline_entry_id = Some(original_id);
            0
        } else {
            -1
        };

        if remote_time < 0 || remote_time >= earliest {
            info!(
                database_id = database.id,
                entry_id = %original_id,
                remote_time,
                earliest,
                "Discarding offline actions: entry modified or missing on the site"
            );
            self.store
                .delete_entry_actions(database.id, original_id)
                .await?;
            self.metrics.record_conflict();
            self.metrics.record_discarded(actions.len() as u64);
            result.updated = true;
            outcome
                .discard_errors
                .push(ENTRY_MODIFIED_MESSAGE.to_string());
            return Ok(outcome);
        }

        if delete_action.is_some() {
            if original_id.is_remote() {
                match self.gateway.delete_entry(original_id.value()).await {
                    Ok(()) => {
                        outcome.deleted = true;
                        self.metrics.record_applied();
                    }
                    Err(e) if e.is_service_error() => {
                        self.metrics.record_discarded(1);
                        outcome.discard_errors.push(e.message().to_string());
                    }
                    Err(e) => return Err(e.into()),
                }
            } else {
                // サーバーに存在しないエントリーはローカルで消すだけ
                debug!(database_id = database.id, entry_id = %original_id, "Dropping offline-only entry");
                outcome.deleted = true;
            }

            result.updated = true;
            self.store
                .delete_entry_actions(database.id, original_id)
                .await?;
            return Ok(outcome);
        }

        let mut entry_id = original_id;

        if let Some(action) = content_action {
            match self.replay_content_action(action, entry_id).await {
                Ok(resolved) => {
                    if let Some(resolved) = resolved {
                        entry_id = resolved;
                        outcome.entry_id = resolved;
                    }
                    self.metrics.record_applied();
                }
                Err(ReplayError::Discard(reason)) => {
                    warn!(
                        database_id = database.id,
                        entry_id = %original_id,
                        action = %action.action,
                        "Offline action rejected by the site: {}",
                        reason
                    );
                    self.metrics.record_discarded(1);
                    outcome.discard_errors.push(reason);
                }
                Err(ReplayError::Abort(e)) => return Err(e),
            }

            result.updated = true;
            self.store
                .delete_action(action.database_id, action.entry_id, action.action)
                .await?;
        }

        if let Some(action) = approval_action {
            if entry_id.is_remote() {
                let approve = action.action == EntryAction::Approve;
                match self.gateway.approve_entry(entry_id.value(), approve).await {
                    Ok(()) => self.metrics.record_applied(),
                    Err(e) if e.is_service_error() => {
                        self.metrics.record_discarded(1);
                        outcome.discard_errors.push(e.message().to_string());
                    }
                    Err(e) => return Err(e.into()),
                }
            } else {
                // 仮IDのままサーバーを呼ばない
                self.metrics.record_discarded(1);
                outcome
                    .discard_errors
                    .push(ENTRY_NOT_CREATED_MESSAGE.to_string());
            }

            result.updated = true;
            self.store
                .delete_action(action.database_id, action.entry_id, action.action)
                .await?;
        }

        Ok(outcome)
    }

    /// add/edit を再送する。add で確定したサーバーIDを返す。
    async fn replay_content_action(
        &self,
        action: &PendingAction,
        entry_id: EntryId,
    ) -> Result<Option<EntryId>, ReplayError> {
        let mut fields = action.fields.clone();

        for field in fields.iter_mut() {
            let Some(stored) = StoredFiles::from_field_value(&field.value) else {
                continue;
            };

            let mut files: Vec<AttachedFile> = stored
                .online
                .into_iter()
                .map(AttachedFile::Remote)
                .collect();
            if stored.offline > 0 {
                files.extend(
                    self.helper
                        .stored_files(action.database_id, entry_id, field.field_id)
                        .await
                        .into_iter()
                        .map(AttachedFile::Local),
                );
            }

            let item_id = self
                .helper
                .upload_or_store_files(action.database_id, entry_id, field.field_id, &files, false)
                .await?;
            field.value = item_id.to_string();
        }

        match action.action {
            EntryAction::Add => {
                let response = self
                    .gateway
                    .add_entry(action.database_id, &fields, action.group_id)
                    .await?;
                if response.new_entry_id <= 0 {
                    return Err(ReplayError::Discard(rejection_message(response.notifications())));
                }
                debug!(
                    database_id = action.database_id,
                    offline_entry_id = %entry_id,
                    new_entry_id = response.new_entry_id,
                    "Offline entry created on the site"
                );
                Ok(Some(EntryId::new(response.new_entry_id)))
            }
            _ => {
                let response = self.gateway.edit_entry(entry_id.value(), &fields).await?;
                if !response.updated {
                    return Err(ReplayError::Discard(rejection_message(response.notifications())));
                }
                Ok(None)
            }
        }
    }
}

fn rejection_message(notifications: String) -> String {
    if notifications.is_empty() {
        "The entry could not be saved.".to_string()
    } else {
        notifications
    }
}

/// 時刻順の操作をエントリー単位にまとめる（初出順）
pub(super) fn group_by_entry(actions: Vec<PendingAction>) -> Vec<Vec<PendingAction>> {
    let mut groups: Vec<Vec<PendingAction>> = Vec::new();
    let mut index: HashMap<EntryId, usize> = HashMap::new();

    for action in actions {
        match index.get(&action.entry_id) {
            Some(&position) => groups[position].push(action),
            None => {
                index.insert(action.entry_id, groups.len());
                groups.push(vec![action]);
            }
        }
    }

    groups
}
