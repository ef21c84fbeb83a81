use super::core::group_by_entry;
use super::*;
use crate::application::ports::entry_gateway::{AddEntryResponse, EditEntryResponse, GatewayError};
use crate::application::ports::file_store::EntryFieldFolder;
use crate::application::ports::offline_store::{OfflineEntryStore, SyncTimeStore};
use crate::application::shared::tests::fixtures::{
    COURSE_ID, DATABASE_ID, FILE_FIELD_ID, TestContext, remote_entry, text_value,
};
use crate::application::shared::tests::mocks::GatewayCall;
use crate::domain::entities::{
    AttachedFile, AutoSyncedEvent, EntryEvent, EntryFieldData, FieldNotification, LocalFile,
    PendingActionDraft,
};
use crate::domain::value_objects::{EntryAction, EntryId};
use crate::shared::config::SyncConfig;
use crate::shared::error::AppError;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;

fn modified_warning() -> String {
    format!("Offline data from Database 'Field trips' has been deleted. {ENTRY_MODIFIED_MESSAGE}")
}

fn drain_auto_synced(rx: &mut Receiver<EntryEvent>) -> Vec<AutoSyncedEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let EntryEvent::AutoSynced(event) = event {
            events.push(event);
        }
    }
    events
}

#[tokio::test]
async fn test_sync_without_actions_records_sync_time() {
    let ctx = TestContext::new().await;

    let result = ctx.sync.sync_database(DATABASE_ID).await.unwrap();

    assert!(!result.updated);
    assert!(result.warnings.is_empty());
    assert!(ctx.gateway.calls().await.is_empty());
    assert!(ctx.store.sync_time(DATABASE_ID).await.unwrap() > 0);
}

#[tokio::test]
async fn test_sync_offline_fails_and_keeps_actions() {
    let ctx = TestContext::new().await;
    ctx.save(EntryAction::Add, -1000, 1000, vec![text_value("Hello")])
        .await;
    ctx.network.set_online(false);

    let err = ctx.sync.sync_database(DATABASE_ID).await.unwrap_err();

    assert!(err.is_network_error());
    assert_eq!(ctx.pending().await.len(), 1);
    assert!(ctx.gateway.calls().await.is_empty());
}

#[tokio::test]
async fn test_offline_add_is_created_and_announced() {
    let ctx = TestContext::new().await;
    let mut rx = ctx.sync.subscribe();
    ctx.save(EntryAction::Add, -1000, 1000, vec![text_value("Hello")])
        .await;

    let result = ctx.sync.sync_database(DATABASE_ID).await.unwrap();

    assert!(result.updated);
    assert!(result.warnings.is_empty());
    assert!(ctx.pending().await.is_empty());
    assert_eq!(
        ctx.gateway.mutation_calls().await,
        vec![GatewayCall::Add {
            database_id: DATABASE_ID,
            fields: vec![text_value("Hello")],
            group_id: None,
        }]
    );

    let events = drain_auto_synced(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].entry_id, Some(EntryId::new(77)));
    assert_eq!(events[0].offline_entry_id, Some(EntryId::new(-1000)));
    assert!(!events[0].deleted);

    let invalidated = ctx.cache.invalidated().await;
    assert!(invalidated.contains(&"entries:1".to_string()));
    assert!(invalidated.contains(&"fields:1".to_string()));
    assert!(invalidated.contains(&"entry:1:-1000".to_string()));
    assert!(invalidated.contains(&"entry:1:77".to_string()));
}

#[tokio::test]
async fn test_remote_newer_than_pending_discards_with_single_warning() {
    let ctx = TestContext::new().await;
    ctx.gateway.set_entry(remote_entry(5, 2000)).await;
    ctx.save(EntryAction::Edit, 5, 1500, vec![text_value("Mine")])
        .await;
    ctx.save(EntryAction::Approve, 5, 1600, vec![]).await;

    let result = ctx.sync.sync_database(DATABASE_ID).await.unwrap();

    assert!(result.updated);
    assert_eq!(result.warnings, vec![modified_warning()]);
    assert!(ctx.pending().await.is_empty());
    assert!(ctx.gateway.mutation_calls().await.is_empty());
    assert_eq!(ctx.sync.metrics().conflicts, 1);
    assert_eq!(ctx.sync.metrics().actions_discarded, 2);
}

#[tokio::test]
async fn test_entry_removed_on_site_discards_actions() {
    let ctx = TestContext::new().await;
    ctx.gateway
        .set_entry_error(5, GatewayError::service("Invalid record"))
        .await;
    ctx.save(EntryAction::Edit, 5, 1500, vec![text_value("Mine")])
        .await;

    let result = ctx.sync.sync_database(DATABASE_ID).await.unwrap();

    assert_eq!(result.warnings, vec![modified_warning()]);
    assert!(ctx.pending().await.is_empty());
    assert!(ctx.gateway.mutation_calls().await.is_empty());
}

#[tokio::test]
async fn test_orphan_provisional_actions_are_discarded() {
    let ctx = TestContext::new().await;
    ctx.save(EntryAction::Approve, -1000, 1100, vec![]).await;

    let result = ctx.sync.sync_database(DATABASE_ID).await.unwrap();

    assert_eq!(result.warnings, vec![modified_warning()]);
    assert!(ctx.pending().await.is_empty());
    assert!(ctx.gateway.calls().await.iter().all(|c| !c.is_mutation()));
}

#[tokio::test]
async fn test_delete_short_circuits_other_actions() {
    let ctx = TestContext::new().await;
    let mut rx = ctx.sync.subscribe();
    ctx.gateway.set_entry(remote_entry(5, 100)).await;
    ctx.save(EntryAction::Edit, 5, 200, vec![text_value("Mine")])
        .await;
    ctx.save(EntryAction::Approve, 5, 250, vec![]).await;
    ctx.save(EntryAction::Delete, 5, 300, vec![]).await;

    let result = ctx.sync.sync_database(DATABASE_ID).await.unwrap();

    assert!(result.updated);
    assert!(result.warnings.is_empty());
    assert_eq!(ctx.gateway.mutation_calls().await, vec![GatewayCall::Delete(5)]);
    assert!(ctx.pending().await.is_empty());

    let events = drain_auto_synced(&mut rx);
    assert!(events[0].deleted);
    assert_eq!(events[0].entry_id, Some(EntryId::new(5)));
}

#[tokio::test]
async fn test_delete_rejected_by_site_still_clears_entry() {
    let ctx = TestContext::new().await;
    ctx.gateway.set_entry(remote_entry(5, 100)).await;
    ctx.gateway
        .fail_delete(5, GatewayError::service("No permission"))
        .await;
    ctx.save(EntryAction::Delete, 5, 300, vec![]).await;

    let result = ctx.sync.sync_database(DATABASE_ID).await.unwrap();

    assert_eq!(
        result.warnings,
        vec!["Offline data from Database 'Field trips' has been deleted. No permission".to_string()]
    );
    assert!(ctx.pending().await.is_empty());
}

#[tokio::test]
async fn test_delete_of_offline_only_entry_never_reaches_site() {
    let ctx = TestContext::new().await;
    ctx.save(EntryAction::Add, -1000, 1000, vec![text_value("Draft")])
        .await;
    ctx.save(EntryAction::Delete, -1000, 1100, vec![]).await;

    let result = ctx.sync.sync_database(DATABASE_ID).await.unwrap();

    assert!(result.updated);
    assert!(result.warnings.is_empty());
    assert!(ctx.gateway.mutation_calls().await.is_empty());
    assert!(ctx.pending().await.is_empty());
}

#[tokio::test]
async fn test_connectivity_loss_aborts_and_keeps_remaining_actions() {
    let ctx = TestContext::new().await;
    ctx.gateway.set_entry(remote_entry(5, 100)).await;
    ctx.gateway.set_entry(remote_entry(6, 100)).await;
    ctx.gateway
        .fail_approve(6, GatewayError::Connectivity("timeout".to_string()))
        .await;
    ctx.save(EntryAction::Edit, 5, 200, vec![text_value("First")])
        .await;
    ctx.save(EntryAction::Approve, 6, 300, vec![]).await;

    let err = ctx.sync.sync_database(DATABASE_ID).await.unwrap_err();

    assert!(matches!(err, AppError::Network(_)));
    let pending = ctx.pending().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].entry_id, EntryId::new(6));
    assert_eq!(pending[0].action, EntryAction::Approve);
    // 送信済みの編集はキャッシュに反映される
    assert!(
        ctx.cache
            .invalidated()
            .await
            .contains(&"entry:1:5".to_string())
    );
    assert_eq!(ctx.store.sync_time(DATABASE_ID).await.unwrap(), 0);
    assert_eq!(ctx.sync.metrics().syncs_failed, 1);
}

#[tokio::test]
async fn test_service_error_discards_one_action_and_continues() {
    let ctx = TestContext::new().await;
    ctx.gateway.set_entry(remote_entry(5, 100)).await;
    ctx.gateway
        .fail_edit(5, GatewayError::service("Invalid field value"))
        .await;
    ctx.save(EntryAction::Edit, 5, 200, vec![text_value("Bad")])
        .await;
    ctx.save(EntryAction::Disapprove, 5, 300, vec![]).await;

    let result = ctx.sync.sync_database(DATABASE_ID).await.unwrap();

    assert!(result.updated);
    assert_eq!(
        result.warnings,
        vec!["Offline data from Database 'Field trips' has been deleted. Invalid field value".to_string()]
    );
    assert!(
        ctx.gateway
            .mutation_calls()
            .await
            .contains(&GatewayCall::Approve(5, false))
    );
    assert!(ctx.pending().await.is_empty());
}

#[tokio::test]
async fn test_edit_not_updated_uses_notifications_as_reason() {
    let ctx = TestContext::new().await;
    ctx.gateway.set_entry(remote_entry(5, 100)).await;
    ctx.gateway
        .reject_edit(
            5,
            EditEntryResponse {
                updated: false,
                general_notifications: vec![],
                field_notifications: vec![FieldNotification {
                    field_name: "Title".to_string(),
                    notification: "You must supply a value here.".to_string(),
                }],
            },
        )
        .await;
    ctx.save(EntryAction::Edit, 5, 200, vec![text_value("")]).await;

    let result = ctx.sync.sync_database(DATABASE_ID).await.unwrap();

    assert_eq!(
        result.warnings,
        vec![
            "Offline data from Database 'Field trips' has been deleted. You must supply a value here."
                .to_string()
        ]
    );
    assert!(ctx.pending().await.is_empty());
}

#[tokio::test]
async fn test_approval_follows_resolved_entry_id() {
    let ctx = TestContext::new().await;
    ctx.save(EntryAction::Add, -1000, 1000, vec![text_value("Hello")])
        .await;
    ctx.save(EntryAction::Approve, -1000, 1010, vec![]).await;

    let result = ctx.sync.sync_database(DATABASE_ID).await.unwrap();

    assert!(result.warnings.is_empty());
    let calls = ctx.gateway.mutation_calls().await;
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1], GatewayCall::Approve(77, true));
    assert!(ctx.pending().await.is_empty());
}

#[tokio::test]
async fn test_rejected_add_discards_dependent_approval() {
    let ctx = TestContext::new().await;
    ctx.gateway
        .push_add_response(Ok(AddEntryResponse {
            new_entry_id: 0,
            general_notifications: vec!["Maximum entries reached".to_string()],
            field_notifications: vec![],
        }))
        .await;
    ctx.save(EntryAction::Add, -1000, 1000, vec![text_value("Hello")])
        .await;
    ctx.save(EntryAction::Approve, -1000, 1010, vec![]).await;

    let result = ctx.sync.sync_database(DATABASE_ID).await.unwrap();

    assert_eq!(
        result.warnings,
        vec![
            "Offline data from Database 'Field trips' has been deleted. Maximum entries reached"
                .to_string(),
            format!(
                "Offline data from Database 'Field trips' has been deleted. {ENTRY_NOT_CREATED_MESSAGE}"
            ),
        ]
    );
    assert_eq!(ctx.gateway.mutation_calls().await.len(), 1);
    assert!(ctx.pending().await.is_empty());
}

#[tokio::test]
async fn test_blocked_database_is_not_touched() {
    let ctx = TestContext::new().await;
    ctx.save(EntryAction::Add, -1000, 1000, vec![text_value("Hello")])
        .await;
    ctx.sync.block_database(DATABASE_ID).await;

    let err = ctx.sync.sync_database(DATABASE_ID).await.unwrap_err();

    assert!(matches!(err, AppError::SyncBlocked(_)));
    assert_eq!(ctx.pending().await.len(), 1);
    assert!(ctx.gateway.calls().await.is_empty());

    ctx.sync.unblock_database(DATABASE_ID).await;
    assert!(!ctx.sync.is_blocked(DATABASE_ID).await);
    assert!(ctx.sync.sync_database(DATABASE_ID).await.unwrap().updated);
}

#[tokio::test]
async fn test_concurrent_syncs_share_one_run() {
    let ctx = TestContext::new().await;
    ctx.gateway.set_delay(Duration::from_millis(50)).await;
    ctx.save(EntryAction::Add, -1000, 1000, vec![text_value("Hello")])
        .await;

    let (first, second) = tokio::join!(
        ctx.sync.sync_database(DATABASE_ID),
        ctx.sync.sync_database(DATABASE_ID)
    );

    assert_eq!(first.unwrap(), second.unwrap());
    assert_eq!(ctx.gateway.mutation_calls().await.len(), 1);
    assert_eq!(ctx.sync.metrics().syncs_started, 1);
}

#[tokio::test]
async fn test_second_sync_after_drain_is_noop() {
    let ctx = TestContext::new().await;
    ctx.save(EntryAction::Add, -1000, 1000, vec![text_value("Hello")])
        .await;

    assert!(ctx.sync.sync_database(DATABASE_ID).await.unwrap().updated);
    let calls_after_first = ctx.gateway.calls().await.len();

    let second = ctx.sync.sync_database(DATABASE_ID).await.unwrap();
    assert!(!second.updated);
    assert_eq!(ctx.gateway.calls().await.len(), calls_after_first);
    assert!(!ctx.sync.has_data_to_sync(DATABASE_ID).await.unwrap());
}

#[tokio::test]
async fn test_sync_if_needed_respects_interval() {
    let ctx = TestContext::new().await;
    ctx.store.set_sync_time(DATABASE_ID, chrono::Utc::now().timestamp()).await.unwrap();
    ctx.save(EntryAction::Add, -1000, 1000, vec![text_value("Hello")])
        .await;

    assert!(
        ctx.sync
            .sync_database_if_needed(DATABASE_ID)
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(ctx.pending().await.len(), 1);

    let eager = TestContext::with_config(SyncConfig {
        sync_interval: 0,
        ..SyncConfig::default()
    })
    .await;
    eager
        .save(EntryAction::Add, -1000, 1000, vec![text_value("Hello")])
        .await;
    let result = eager.sync.sync_database_if_needed(DATABASE_ID).await.unwrap();
    assert!(result.is_some_and(|r| r.updated));
}

#[tokio::test]
async fn test_sync_all_isolates_failures() {
    let ctx = TestContext::new().await;
    let mut rx = ctx.sync.subscribe();
    ctx.save(EntryAction::Add, -1000, 1000, vec![text_value("Hello")])
        .await;
    ctx.store
        .save_action(
            PendingActionDraft::new(2, COURSE_ID, EntryAction::Edit)
                .with_entry(EntryId::new(8))
                .at(500),
        )
        .await
        .unwrap();
    ctx.gateway
        .set_entry_error(8, GatewayError::Connectivity("reset".to_string()))
        .await;

    let reports = ctx.sync.sync_all_databases(true).await.unwrap();

    assert_eq!(reports.len(), 2);
    let first = reports.iter().find(|r| r.database_id == DATABASE_ID).unwrap();
    assert!(matches!(&first.result, Ok(Some(result)) if result.updated));
    let second = reports.iter().find(|r| r.database_id == 2).unwrap();
    assert!(second.result.is_err());
    assert!(ctx.store.has_pending(2).await.unwrap());

    // エントリー単位とデータベース単位の通知
    let events = drain_auto_synced(&mut rx);
    assert!(events.iter().any(|e| e.database_id == DATABASE_ID && e.entry_id.is_none()));
    assert!(events.iter().all(|e| e.database_id != 2));
}

#[tokio::test]
async fn test_stored_files_are_uploaded_before_add() {
    let ctx = TestContext::new().await;
    let folder = EntryFieldFolder::new(DATABASE_ID, EntryId::new(-1000), FILE_FIELD_ID);
    ctx.files
        .put(folder, vec![LocalFile::from_path(PathBuf::from("/tmp/photo.jpg"))])
        .await;
    ctx.save(
        EntryAction::Add,
        -1000,
        1000,
        vec![
            text_value("Hello"),
            EntryFieldData::new(FILE_FIELD_ID, "file", r#"{"online":[],"offline":1}"#.to_string()),
        ],
    )
    .await;

    let result = ctx.sync.sync_database(DATABASE_ID).await.unwrap();

    assert!(result.warnings.is_empty());
    let uploads = ctx.uploader.uploads().await;
    assert_eq!(uploads.len(), 1);
    assert!(matches!(&uploads[0][0], AttachedFile::Local(file) if file.filename == "photo.jpg"));

    match &ctx.gateway.mutation_calls().await[0] {
        GatewayCall::Add { fields, .. } => assert_eq!(fields[1].value, "555"),
        other => panic!("unexpected call {other:?}"),
    }
    // 操作と一緒に保管フォルダも消える
    assert!(!ctx.files.contains(folder).await);
}

#[tokio::test]
async fn test_rejected_upload_discards_action() {
    let ctx = TestContext::new().await;
    ctx.uploader
        .fail_with(GatewayError::service("File too large"))
        .await;
    let folder = EntryFieldFolder::new(DATABASE_ID, EntryId::new(-1000), FILE_FIELD_ID);
    ctx.files
        .put(folder, vec![LocalFile::from_path(PathBuf::from("/tmp/big.mov"))])
        .await;
    ctx.save(
        EntryAction::Add,
        -1000,
        1000,
        vec![EntryFieldData::new(
            FILE_FIELD_ID,
            "file",
            r#"{"online":[],"offline":1}"#.to_string(),
        )],
    )
    .await;

    let result = ctx.sync.sync_database(DATABASE_ID).await.unwrap();

    assert_eq!(
        result.warnings,
        vec!["Offline data from Database 'Field trips' has been deleted. File too large".to_string()]
    );
    assert!(ctx.gateway.mutation_calls().await.is_empty());
    assert!(ctx.pending().await.is_empty());
}

#[tokio::test]
async fn test_group_by_entry_keeps_first_appearance_order() {
    let ctx = TestContext::new().await;
    ctx.save(EntryAction::Edit, 6, 100, vec![]).await;
    ctx.save(EntryAction::Edit, 5, 200, vec![]).await;
    ctx.save(EntryAction::Approve, 6, 300, vec![]).await;

    let groups = group_by_entry(ctx.pending().await);

    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0][0].entry_id, EntryId::new(6));
    assert_eq!(groups[0].len(), 2);
    assert_eq!(groups[1][0].entry_id, EntryId::new(5));
}
