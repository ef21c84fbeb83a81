use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub auto_sync: bool,
    /// sync_database_if_needed が再同期を許可するまでの最小間隔（秒）
    pub sync_interval: u64,
    /// 定期同期ジョブの実行間隔（秒）
    pub periodic_interval: u64,
    /// イベントバスのバッファ容量
    pub event_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    pub cache_ttl: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite:data/recordsync.db?mode=rwc".to_string(),
                max_connections: 5,
            },
            sync: SyncConfig::default(),
            storage: StorageConfig {
                data_dir: default_data_dir(),
                cache_ttl: 3600, // 1 hour
            },
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync: true,
            sync_interval: 300, // 5 minutes
            periodic_interval: 600,
            event_capacity: 64,
        }
    }
}

impl StorageConfig {
    pub fn offline_files_root(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("offlinedatabase")
    }
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|dir| dir.join("recordsync"))
        .unwrap_or_else(|| PathBuf::from("./data"))
        .to_string_lossy()
        .into_owned()
}

impl AppConfig {
    pub fn from_env() -> Self {
        // 既定値
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("RECORDSYNC_DATABASE_URL") {
            if !v.trim().is_empty() {
                cfg.database.url = v.trim().to_string();
            }
        }
        if let Some(value) = env_u64("RECORDSYNC_DATABASE_MAX_CONNECTIONS") {
            cfg.database.max_connections = value.clamp(1, u32::MAX as u64) as u32;
        }

        // 同期設定の環境変数反映
        if let Ok(v) = std::env::var("RECORDSYNC_AUTO_SYNC") {
            cfg.sync.auto_sync = parse_bool(&v, cfg.sync.auto_sync);
        }
        if let Some(value) = env_u64("RECORDSYNC_SYNC_INTERVAL") {
            cfg.sync.sync_interval = value;
        }
        if let Some(value) = env_u64("RECORDSYNC_PERIODIC_INTERVAL") {
            cfg.sync.periodic_interval = value.max(1);
        }
        if let Some(value) = env_u64("RECORDSYNC_EVENT_CAPACITY") {
            cfg.sync.event_capacity = value.max(1) as usize;
        }

        if let Ok(v) = std::env::var("RECORDSYNC_DATA_DIR") {
            if !v.trim().is_empty() {
                cfg.storage.data_dir = v.trim().to_string();
            }
        }
        if let Some(value) = env_u64("RECORDSYNC_CACHE_TTL") {
            cfg.storage.cache_ttl = value;
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.url.trim().is_empty() {
            return Err("Database url must not be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.sync.auto_sync && self.sync.periodic_interval == 0 {
            return Err("Sync periodic_interval must be greater than 0".to_string());
        }
        if self.sync.event_capacity == 0 {
            return Err("Sync event_capacity must be greater than 0".to_string());
        }
        if self.storage.data_dir.trim().is_empty() {
            return Err("Storage data_dir must not be empty".to_string());
        }
        Ok(())
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| parse_u64(&v))
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}
