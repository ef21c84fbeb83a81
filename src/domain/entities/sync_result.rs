use serde::{Deserialize, Serialize};

/// 1回の同期の結果
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncResult {
    pub updated: bool,
    pub warnings: Vec<String>,
}

impl SyncResult {
    /// 重複する警告は追加しない
    pub fn add_warning(&mut self, warning: String) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    pub fn extend_warnings<I>(&mut self, warnings: I)
    where
        I: IntoIterator<Item = String>,
    {
        for warning in warnings {
            self.add_warning(warning);
        }
    }
}
