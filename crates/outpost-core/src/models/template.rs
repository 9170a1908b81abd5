use serde::{Deserialize, Serialize};

/// A catalog template an environment can be provisioned from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "activeVersion")]
    pub active_version: Option<String>,
    #[serde(rename = "activeUserCount", default)]
    pub active_user_count: i64,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<String>,
}

impl Template {
    pub fn version_display(&self) -> &str {
        self.active_version.as_deref().unwrap_or("-")
    }
}
