use crate::application::ports::cache::ReadCache;
use crate::application::ports::entry_gateway::EntryGateway;
use crate::application::ports::network::NetworkStatus;
use crate::application::ports::offline_store::OfflineEntryStore;
use crate::application::services::entry_merge::EntryMergeHelper;
use crate::domain::entities::{
    DatabaseInfo, EntryContents, EntryEvent, EntryFieldData, FieldDefinition, FieldNotification,
    FormInput, PendingActionDraft,
};
use crate::domain::value_objects::{EntryAction, EntryId};
use crate::infrastructure::event::EntryEventBus;
use crate::shared::error::AppError;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// add/edit の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySaveResult {
    pub entry_id: EntryId,
    /// サーバーへ送信済みなら true、オフライン保存なら false
    pub sent: bool,
    /// 保存されなかった理由（空なら保存済み）
    pub general_notifications: Vec<String>,
    pub field_notifications: Vec<FieldNotification>,
}

impl EntrySaveResult {
    fn saved(entry_id: EntryId, sent: bool) -> Self {
        Self {
            entry_id,
            sent,
            general_notifications: Vec::new(),
            field_notifications: Vec::new(),
        }
    }

    fn rejected(
        entry_id: EntryId,
        general_notifications: Vec<String>,
        field_notifications: Vec<FieldNotification>,
    ) -> Self {
        Self {
            entry_id,
            sent: false,
            general_notifications,
            field_notifications,
        }
    }

    pub fn is_saved(&self) -> bool {
        self.general_notifications.is_empty() && self.field_notifications.is_empty()
    }
}

/// 画面から呼ばれるエントリー操作。オンラインならサーバーへ、届かなければローカルへ保存する。
pub struct EntryService {
    store: Arc<dyn OfflineEntryStore>,
    gateway: Arc<dyn EntryGateway>,
    network: Arc<dyn NetworkStatus>,
    cache: Arc<dyn ReadCache>,
    helper: EntryMergeHelper,
    events: EntryEventBus,
}

impl EntryService {
    pub fn new(
        store: Arc<dyn OfflineEntryStore>,
        gateway: Arc<dyn EntryGateway>,
        network: Arc<dyn NetworkStatus>,
        cache: Arc<dyn ReadCache>,
        helper: EntryMergeHelper,
        events: EntryEventBus,
    ) -> Self {
        Self {
            store,
            gateway,
            network,
            cache,
            helper,
            events,
        }
    }

    fn should_send(&self, force_offline: bool) -> bool {
        !force_offline && self.network.is_online()
    }

    /// 必須項目などの通知を集める
    fn check_notifications(
        &self,
        fields: &[FieldDefinition],
        data: &[EntryFieldData],
    ) -> Vec<FieldNotification> {
        fields
            .iter()
            .filter_map(|field| {
                self.helper
                    .registry()
                    .handler_for(field)
                    .notifications(field, data)
                    .map(|notification| FieldNotification {
                        field_name: field.name.clone(),
                        notification,
                    })
            })
            .collect()
    }

    fn entry_changed(&self, database_id: i64, entry_id: EntryId) {
        self.events.emit(EntryEvent::EntryChanged {
            database_id,
            entry_id,
        });
    }

    async fn invalidate(&self, database_id: i64, entry_id: EntryId) {
        self.cache.invalidate_entries_data(database_id).await;
        self.cache.invalidate_entry_data(database_id, entry_id).await;
    }

    /// 仮IDはミリ秒時刻から作り、既存の仮IDと重ならないようにする
    async fn next_provisional_id(&self, database_id: i64) -> Result<EntryId, AppError> {
        let candidate = EntryId::provisional(Utc::now().timestamp_millis());
        let lowest = self
            .store
            .list_database_actions(database_id)
            .await?
            .into_iter()
            .map(|action| action.entry_id)
            .filter(|entry_id| entry_id.is_provisional())
            .min();

        Ok(match lowest {
            Some(lowest) if lowest <= candidate => EntryId::new(lowest.value() - 1),
            _ => candidate,
        })
    }

    pub async fn add_entry(
        &self,
        database: &DatabaseInfo,
        fields: &[FieldDefinition],
        input: &FormInput,
        group_id: Option<i64>,
        force_offline: bool,
    ) -> Result<EntrySaveResult, AppError> {
        let now = Utc::now().timestamp();
        let provisional = self.next_provisional_id(database.id).await?;

        if self.should_send(force_offline) {
            match self.add_entry_online(database, fields, input, group_id, provisional).await {
                Err(e) if e.is_network_error() => {
                    warn!(database_id = database.id, "Saving entry offline: {}", e);
                }
                other => return other,
            }
        }

        let data = self
            .helper
            .build_submission(input, fields, database.id, provisional, &EntryContents::new(), true)
            .await?;
        let notifications = self.check_notifications(fields, &data);
        if !notifications.is_empty() {
            return Ok(EntrySaveResult::rejected(provisional, Vec::new(), notifications));
        }

        self.store
            .save_action(
                PendingActionDraft::new(database.id, database.course_id, EntryAction::Add)
                    .with_entry(provisional)
                    .with_group(group_id)
                    .with_fields(data)
                    .at(now),
            )
            .await?;
        info!(database_id = database.id, entry_id = %provisional, "Entry stored offline");

        self.entry_changed(database.id, provisional);
        Ok(EntrySaveResult::saved(provisional, false))
    }

    async fn add_entry_online(
        &self,
        database: &DatabaseInfo,
        fields: &[FieldDefinition],
        input: &FormInput,
        group_id: Option<i64>,
        provisional: EntryId,
    ) -> Result<EntrySaveResult, AppError> {
        let data = self
            .helper
            .build_submission(input, fields, database.id, provisional, &EntryContents::new(), false)
            .await?;
        let response = self.gateway.add_entry(database.id, &data, group_id).await?;

        if response.new_entry_id <= 0 {
            return Ok(EntrySaveResult::rejected(
                provisional,
                response.general_notifications,
                response.field_notifications,
            ));
        }

        let entry_id = EntryId::new(response.new_entry_id);
        debug!(database_id = database.id, %entry_id, "Entry created on the site");
        self.cache.invalidate_fields_data(database.id).await;
        self.invalidate(database.id, entry_id).await;
        self.entry_changed(database.id, entry_id);
        Ok(EntrySaveResult::saved(entry_id, true))
    }

    /// 仮IDのエントリーは保留中の add を書き換える
    pub async fn edit_entry(
        &self,
        database: &DatabaseInfo,
        fields: &[FieldDefinition],
        entry_id: EntryId,
        input: &FormInput,
        original: &EntryContents,
        force_offline: bool,
    ) -> Result<EntrySaveResult, AppError> {
        if entry_id.is_remote() && self.should_send(force_offline) {
            // 保留中の古い編集が後の同期で送信内容を上書きしないように先に消す
            self.store
                .delete_action(database.id, entry_id, EntryAction::Edit)
                .await?;
            match self
                .edit_entry_online(database, fields, entry_id, input, original)
                .await
            {
                Err(e) if e.is_network_error() => {
                    warn!(database_id = database.id, %entry_id, "Saving edit offline: {}", e);
                }
                other => return other,
            }
        }

        let data = self
            .helper
            .build_submission(input, fields, database.id, entry_id, original, true)
            .await?;
        let notifications = self.check_notifications(fields, &data);
        if !notifications.is_empty() {
            return Ok(EntrySaveResult::rejected(entry_id, Vec::new(), notifications));
        }

        let draft = if entry_id.is_provisional() {
            let group_id = self
                .store
                .get_action(database.id, entry_id, EntryAction::Add)
                .await?
                .and_then(|action| action.group_id);
            PendingActionDraft::new(database.id, database.course_id, EntryAction::Add)
                .with_group(group_id)
        } else {
            PendingActionDraft::new(database.id, database.course_id, EntryAction::Edit)
        };
        self.store
            .save_action(
                draft
                    .with_entry(entry_id)
                    .with_fields(data)
                    .at(Utc::now().timestamp()),
            )
            .await?;
        info!(database_id = database.id, %entry_id, "Entry edit stored offline");

        self.entry_changed(database.id, entry_id);
        Ok(EntrySaveResult::saved(entry_id, false))
    }

    async fn edit_entry_online(
        &self,
        database: &DatabaseInfo,
        fields: &[FieldDefinition],
        entry_id: EntryId,
        input: &FormInput,
        original: &EntryContents,
    ) -> Result<EntrySaveResult, AppError> {
        let data = self
            .helper
            .build_submission(input, fields, database.id, entry_id, original, false)
            .await?;
        let response = self.gateway.edit_entry(entry_id.value(), &data).await?;

        if !response.updated {
            return Ok(EntrySaveResult::rejected(
                entry_id,
                response.general_notifications,
                response.field_notifications,
            ));
        }

        self.invalidate(database.id, entry_id).await;
        self.entry_changed(database.id, entry_id);
        Ok(EntrySaveResult::saved(entry_id, true))
    }

    /// 削除する。サーバーに送信したら true。
    pub async fn delete_entry(
        &self,
        database: &DatabaseInfo,
        entry_id: EntryId,
        force_offline: bool,
    ) -> Result<bool, AppError> {
        let pending_add = self
            .store
            .get_action(database.id, entry_id, EntryAction::Add)
            .await?;
        if pending_add.is_some() || entry_id.is_provisional() {
            // サーバーに届いていないので保留操作ごと消す
            self.store.delete_entry_actions(database.id, entry_id).await?;
            debug!(database_id = database.id, %entry_id, "Offline entry discarded");
            self.entry_changed(database.id, entry_id);
            return Ok(false);
        }

        if self.should_send(force_offline) {
            match self.gateway.delete_entry(entry_id.value()).await {
                Ok(()) => {
                    self.store.delete_entry_actions(database.id, entry_id).await?;
                    self.invalidate(database.id, entry_id).await;
                    self.entry_changed(database.id, entry_id);
                    return Ok(true);
                }
                Err(e) if e.is_service_error() => return Err(e.into()),
                Err(e) => warn!(database_id = database.id, %entry_id, "Saving delete offline: {}", e),
            }
        }

        self.store
            .save_action(
                PendingActionDraft::new(database.id, database.course_id, EntryAction::Delete)
                    .with_entry(entry_id),
            )
            .await?;
        self.entry_changed(database.id, entry_id);
        Ok(false)
    }

    /// 承認・承認取り消し。サーバーに送信したら true。
    pub async fn approve_entry(
        &self,
        database: &DatabaseInfo,
        entry_id: EntryId,
        approve: bool,
        force_offline: bool,
    ) -> Result<bool, AppError> {
        let action = EntryAction::approval(approve);

        if let Some(opposite) = action.opposite() {
            let pending = self.store.get_action(database.id, entry_id, opposite).await?;
            if pending.is_some() {
                // 逆の操作が保留中なら打ち消し合う
                self.store.delete_action(database.id, entry_id, opposite).await?;
                debug!(database_id = database.id, %entry_id, %action, "Pending approval cancelled");
                self.entry_changed(database.id, entry_id);
                return Ok(false);
            }
        }

        if entry_id.is_remote() && self.should_send(force_offline) {
            match self.gateway.approve_entry(entry_id.value(), approve).await {
                Ok(()) => {
                    self.invalidate(database.id, entry_id).await;
                    self.entry_changed(database.id, entry_id);
                    return Ok(true);
                }
                Err(e) if e.is_service_error() => return Err(e.into()),
                Err(e) => warn!(database_id = database.id, %entry_id, "Saving approval offline: {}", e),
            }
        }

        self.store
            .save_action(
                PendingActionDraft::new(database.id, database.course_id, action).with_entry(entry_id),
            )
            .await?;
        self.entry_changed(database.id, entry_id);
        Ok(false)
    }
}
