use super::rpc::RpcError;
use crate::domain::entities::{AttachedFile, DatabaseInfo, Entry, EntryFieldData, FieldNotification};
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// リモート操作の失敗分類
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// サーバーが操作を拒否した（検証エラー、エントリー不在、権限不足など）
    #[error("{message}")]
    Service {
        message: String,
        error_code: Option<String>,
    },
    /// サーバーに到達できなかった
    #[error("Connectivity error: {0}")]
    Connectivity(String),
}

impl GatewayError {
    pub fn service(message: impl Into<String>) -> Self {
        GatewayError::Service {
            message: message.into(),
            error_code: None,
        }
    }

    pub fn is_service_error(&self) -> bool {
        matches!(self, GatewayError::Service { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            GatewayError::Service { message, .. } => message,
            GatewayError::Connectivity(message) => message,
        }
    }
}

impl From<RpcError> for GatewayError {
    fn from(err: RpcError) -> Self {
        if err.is_web_service_error {
            GatewayError::Service {
                message: err.message,
                error_code: err.error_code,
            }
        } else {
            GatewayError::Connectivity(err.message)
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Service { message, .. } => AppError::WebService(message),
            GatewayError::Connectivity(message) => AppError::Network(message),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddEntryResponse {
    #[serde(rename = "newentryid")]
    pub new_entry_id: i64,
    #[serde(rename = "generalnotifications", default)]
    pub general_notifications: Vec<String>,
    #[serde(rename = "fieldnotifications", default)]
    pub field_notifications: Vec<FieldNotification>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EditEntryResponse {
    pub updated: bool,
    #[serde(rename = "generalnotifications", default)]
    pub general_notifications: Vec<String>,
    #[serde(rename = "fieldnotifications", default)]
    pub field_notifications: Vec<FieldNotification>,
}

/// 通知を1つのメッセージにまとめる
pub fn join_notifications(general: &[String], fields: &[FieldNotification]) -> String {
    general
        .iter()
        .cloned()
        .chain(fields.iter().map(|n| n.notification.clone()))
        .collect::<Vec<_>>()
        .join("\n")
}

impl AddEntryResponse {
    pub fn notifications(&self) -> String {
        join_notifications(&self.general_notifications, &self.field_notifications)
    }
}

impl EditEntryResponse {
    pub fn notifications(&self) -> String {
        join_notifications(&self.general_notifications, &self.field_notifications)
    }
}

/// エントリーのリモート操作（常にオンライン、キャッシュなし）
#[async_trait]
pub trait EntryGateway: Send + Sync {
    async fn add_entry(
        &self,
        database_id: i64,
        fields: &[EntryFieldData],
        group_id: Option<i64>,
    ) -> Result<AddEntryResponse, GatewayError>;

    async fn edit_entry(
        &self,
        entry_id: i64,
        fields: &[EntryFieldData],
    ) -> Result<EditEntryResponse, GatewayError>;

    async fn delete_entry(&self, entry_id: i64) -> Result<(), GatewayError>;

    async fn approve_entry(&self, entry_id: i64, approve: bool) -> Result<(), GatewayError>;

    /// サーバーからエントリーを取得
    async fn fetch_entry(&self, database_id: i64, entry_id: i64) -> Result<Entry, GatewayError>;

    /// データベース情報を取得（警告文の名前に使う）
    async fn fetch_database(
        &self,
        course_id: i64,
        database_id: i64,
    ) -> Result<DatabaseInfo, GatewayError>;
}

/// 添付ファイルのアップロード
#[async_trait]
pub trait FileUploader: Send + Sync {
    /// ファイルをドラフト領域にアップロードし、アイテムIDを返す
    async fn upload_files(
        &self,
        files: &[AttachedFile],
        item_id: Option<i64>,
    ) -> Result<i64, GatewayError>;
}
