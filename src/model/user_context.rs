use serde::{Deserialize, Serialize};

/// Access-control context a reconciliation runs under.
///
/// The engine treats it as opaque apart from stamping `user_id` on the
/// variants and log entries it creates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_email: None,
            user_name: None,
        }
    }

    pub fn with_details(user_id: String, email: Option<String>, name: Option<String>) -> Self {
        Self {
            user_id,
            user_email: email,
            user_name: name,
        }
    }

    /// Context for hook- or queue-driven runs with no requesting user
    pub fn system() -> Self {
        Self {
            user_id: "system".to_string(),
            user_email: None,
            user_name: Some("System".to_string()),
        }
    }

    pub fn is_system(&self) -> bool {
        self.user_id == "system"
    }

    /// User id to stamp on created rows; system runs leave it empty
    pub fn audit_user(&self) -> Option<String> {
        if self.is_system() {
            None
        } else {
            Some(self.user_id.clone())
        }
    }
}
