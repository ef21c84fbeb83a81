/// ネットワーク接続状態
pub trait NetworkStatus: Send + Sync {
    fn is_online(&self) -> bool;
}
