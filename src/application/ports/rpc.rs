use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// RPC 呼び出しの失敗
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct RpcError {
    pub message: String,
    pub error_code: Option<String>,
    /// サーバーが応答した上で処理を拒否した場合 true
    pub is_web_service_error: bool,
}

impl RpcError {
    pub fn web_service(message: impl Into<String>, error_code: Option<&str>) -> Self {
        Self {
            message: message.into(),
            error_code: error_code.map(str::to_string),
            is_web_service_error: true,
        }
    }

    pub fn connectivity(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_code: None,
            is_web_service_error: false,
        }
    }
}

/// サイトへのRPCクライアント。通信と認証はこの実装側の責務。
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// 読み取り呼び出し
    async fn read(&self, method: &str, params: Value) -> Result<Value, RpcError>;

    /// 書き込み呼び出し
    async fn write(&self, method: &str, params: Value) -> Result<Value, RpcError>;
}
