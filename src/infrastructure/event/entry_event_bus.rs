use crate::domain::entities::EntryEvent;
use tokio::sync::broadcast;
use tracing::trace;

/// エントリー関連イベントの配信
#[derive(Clone)]
pub struct EntryEventBus {
    sender: broadcast::Sender<EntryEvent>,
}

impl EntryEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EntryEvent> {
        self.sender.subscribe()
    }

    /// 購読者がいなくてもエラーにしない
    pub fn emit(&self, event: EntryEvent) {
        match self.sender.send(event) {
            Ok(receivers) => trace!(receivers, "Entry event emitted"),
            Err(_) => trace!("Entry event dropped: no subscribers"),
        }
    }
}

impl Default for EntryEventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
