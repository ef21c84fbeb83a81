use serde::{Deserialize, Serialize};

/// データベース活動の基本情報
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseInfo {
    pub id: i64,
    #[serde(rename = "course")]
    pub course_id: i64,
    #[serde(rename = "coursemodule", default)]
    pub course_module: i64,
    pub name: String,
    #[serde(default)]
    pub approval: bool,
    #[serde(rename = "manageapproved", default)]
    pub manage_approved: bool,
}
