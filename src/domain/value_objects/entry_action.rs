use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// エントリーに対する保留中の操作種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryAction {
    Add,
    Edit,
    Delete,
    Approve,
    Disapprove,
}

impl EntryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryAction::Add => "add",
            EntryAction::Edit => "edit",
            EntryAction::Delete => "delete",
            EntryAction::Approve => "approve",
            EntryAction::Disapprove => "disapprove",
        }
    }

    pub fn is_content_change(&self) -> bool {
        matches!(self, EntryAction::Add | EntryAction::Edit)
    }

    pub fn is_approval(&self) -> bool {
        matches!(self, EntryAction::Approve | EntryAction::Disapprove)
    }

    pub fn approval(approve: bool) -> Self {
        if approve {
            EntryAction::Approve
        } else {
            EntryAction::Disapprove
        }
    }

    /// approve と disapprove は互いに打ち消し合う
    pub fn opposite(&self) -> Option<Self> {
        match self {
            EntryAction::Approve => Some(EntryAction::Disapprove),
            EntryAction::Disapprove => Some(EntryAction::Approve),
            _ => None,
        }
    }
}

impl FromStr for EntryAction {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "add" => Ok(EntryAction::Add),
            "edit" => Ok(EntryAction::Edit),
            "delete" => Ok(EntryAction::Delete),
            "approve" => Ok(EntryAction::Approve),
            "disapprove" => Ok(EntryAction::Disapprove),
            other => Err(format!("Unknown entry action: {other}")),
        }
    }
}

impl fmt::Display for EntryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stored_action_names() {
        for action in [
            EntryAction::Add,
            EntryAction::Edit,
            EntryAction::Delete,
            EntryAction::Approve,
            EntryAction::Disapprove,
        ] {
            assert_eq!(action.as_str().parse::<EntryAction>().unwrap(), action);
        }
        assert!("publish".parse::<EntryAction>().is_err());
    }

    #[test]
    fn approval_actions_have_opposites() {
        assert_eq!(EntryAction::Approve.opposite(), Some(EntryAction::Disapprove));
        assert_eq!(EntryAction::approval(false), EntryAction::Disapprove);
        assert_eq!(EntryAction::Edit.opposite(), None);
    }
}
