//! Authenticated identity held in the session

use serde::{Deserialize, Serialize};

/// Profile of a user authenticated by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl Identity {
    /// Name to greet the user with, falling back to the email
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.email)
    }
}
