use serde::{Deserialize, Serialize};

/// The authenticated account as reported by the service.
///
/// Present on a session if and only if the session is authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
}

impl Identity {
    /// Name to greet the user with: display name when set, email otherwise.
    pub fn greeting_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_name_prefers_display_name() {
        let id = Identity {
            id: "u-1".to_string(),
            email: "pat@example.com".to_string(),
            display_name: Some("Pat".to_string()),
        };
        assert_eq!(id.greeting_name(), "Pat");

        let id = Identity {
            id: "u-2".to_string(),
            email: "kim@example.com".to_string(),
            display_name: None,
        };
        assert_eq!(id.greeting_name(), "kim@example.com");
    }
}
