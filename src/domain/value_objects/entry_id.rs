use serde::{Deserialize, Serialize};
use std::fmt;

/// エントリーID。負の値はサーバー未作成のオフライン専用エントリー（仮ID）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(i64);

impl EntryId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// オフラインで作成したエントリーの仮IDを作成時刻から導出する
    pub fn provisional(time_modified: i64) -> Self {
        Self(-time_modified.abs())
    }

    pub const fn value(self) -> i64 {
        self.0
    }

    pub const fn is_provisional(self) -> bool {
        self.0 < 0
    }

    pub const fn is_remote(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for EntryId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<EntryId> for i64 {
    fn from(value: EntryId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisional_ids_are_negative() {
        let id = EntryId::provisional(1_000);
        assert_eq!(id.value(), -1_000);
        assert!(id.is_provisional());
        assert!(!id.is_remote());
        assert!(EntryId::new(77).is_remote());
    }
}
