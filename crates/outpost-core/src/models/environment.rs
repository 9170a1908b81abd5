use serde::{Deserialize, Serialize};

/// Lifecycle state of a provisioned environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentStatus {
    Pending,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl std::fmt::Display for EnvironmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvironmentStatus::Pending => write!(f, "pending"),
            EnvironmentStatus::Starting => write!(f, "starting"),
            EnvironmentStatus::Running => write!(f, "running"),
            EnvironmentStatus::Stopping => write!(f, "stopping"),
            EnvironmentStatus::Stopped => write!(f, "stopped"),
            EnvironmentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// An environment provisioned from a catalog template, owned by the
/// authenticated account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub id: String,
    pub name: String,
    #[serde(rename = "templateName")]
    pub template_name: Option<String>,
    pub status: EnvironmentStatus,
    #[serde(rename = "lastUsedAt")]
    pub last_used_at: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
}

impl Environment {
    pub fn is_running(&self) -> bool {
        self.status == EnvironmentStatus::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parses_wire_shape() {
        let json = r#"{"id":"env-7","name":"api-dev","templateName":"rust-nightly","status":"running","lastUsedAt":"2026-07-30T10:02:00Z","createdAt":"2026-06-01T09:00:00Z"}"#;
        let env: Environment = serde_json::from_str(json).expect("environment should parse");
        assert_eq!(env.name, "api-dev");
        assert!(env.is_running());
        assert_eq!(env.status.to_string(), "running");
    }
}
