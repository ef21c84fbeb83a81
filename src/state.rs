use crate::application::ports::entry_gateway::FileUploader;
use crate::application::ports::rpc::RpcClient;
use crate::application::services::{
    DatabaseSyncService, EntryMergeHelper, EntryService, FieldHandlerRegistry, SyncDependencies,
};
use crate::infrastructure::cache::EntryCacheService;
use crate::infrastructure::database::ConnectionPool;
use crate::infrastructure::event::EntryEventBus;
use crate::infrastructure::offline::SqliteOfflineStore;
use crate::infrastructure::remote::{NetworkMonitor, RpcEntryGateway};
use crate::infrastructure::storage::LocalOfflineFileStore;
use crate::shared::config::AppConfig;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// 同期まわりの依存をまとめた実行時の状態
#[derive(Clone)]
pub struct SyncRuntime {
    pub pool: ConnectionPool,
    pub store: Arc<SqliteOfflineStore>,
    pub files: Arc<LocalOfflineFileStore>,
    pub cache: Arc<EntryCacheService>,
    pub network: Arc<NetworkMonitor>,
    pub events: EntryEventBus,
    pub helper: EntryMergeHelper,
    pub sync_service: DatabaseSyncService,
    pub entry_service: Arc<EntryService>,
    pub periodic_sync: Option<Arc<JoinHandle<()>>>,
}

impl SyncRuntime {
    pub async fn initialize(
        config: AppConfig,
        rpc: Arc<dyn RpcClient>,
        uploader: Arc<dyn FileUploader>,
    ) -> anyhow::Result<Self> {
        config
            .validate()
            .map_err(anyhow::Error::msg)
            .context("Invalid configuration")?;

        // データディレクトリがなければ作成
        tokio::fs::create_dir_all(&config.storage.data_dir)
            .await
            .with_context(|| format!("Failed to create {}", config.storage.data_dir))?;

        let pool =
            ConnectionPool::with_max_connections(&config.database.url, config.database.max_connections)
                .await
                .context("Failed to open offline database")?;
        pool.migrate().await.context("Failed to run migrations")?;

        let files = Arc::new(LocalOfflineFileStore::new(
            config.storage.offline_files_root(),
        ));
        let store = Arc::new(
            SqliteOfflineStore::new(pool.get_pool().clone()).with_file_store(files.clone()),
        );
        let cache = Arc::new(EntryCacheService::new(config.storage.cache_ttl));
        let network = Arc::new(NetworkMonitor::default());
        let gateway = Arc::new(RpcEntryGateway::new(rpc));
        let events = EntryEventBus::new(config.sync.event_capacity);

        let helper = EntryMergeHelper::new(
            FieldHandlerRegistry::with_defaults(),
            files.clone(),
            uploader,
            gateway.clone(),
            store.clone(),
            cache.clone(),
        );
        let sync_service = DatabaseSyncService::new(
            SyncDependencies {
                store: store.clone(),
                sync_times: store.clone(),
                gateway: gateway.clone(),
                network: network.clone(),
                cache: cache.clone(),
            },
            helper.clone(),
            events.clone(),
            &config.sync,
        );
        let entry_service = Arc::new(EntryService::new(
            store.clone(),
            gateway,
            network.clone(),
            cache.clone(),
            helper.clone(),
            events.clone(),
        ));

        let periodic_sync = if config.sync.auto_sync {
            let interval = Duration::from_secs(config.sync.periodic_interval);
            info!(interval_secs = interval.as_secs(), "Starting periodic database sync");
            Some(Arc::new(sync_service.spawn_periodic_sync(interval)))
        } else {
            None
        };

        info!(database = %config.database.url, "Sync runtime initialized");

        Ok(Self {
            pool,
            store,
            files,
            cache,
            network,
            events,
            helper,
            sync_service,
            entry_service,
            periodic_sync,
        })
    }

    /// 定期同期を止めて接続を閉じる
    pub async fn shutdown(&self) {
        if let Some(handle) = &self.periodic_sync {
            handle.abort();
        }
        self.pool.close().await;
    }
}
