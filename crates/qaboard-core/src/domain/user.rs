//! Signed-in user identity and authentication status.

use serde::{Deserialize, Serialize};

/// Public profile of the signed-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub display_name: String,
    pub photo_url: String,
}

impl User {
    pub fn new(display_name: impl Into<String>, photo_url: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            photo_url: photo_url.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.display_name.is_empty() && self.photo_url.is_empty()
    }
}

/// Identity reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider-assigned account id.
    pub uid: String,
    pub user: User,
}

impl Identity {
    pub fn new(uid: impl Into<String>, user: User) -> Self {
        Self {
            uid: uid.into(),
            user,
        }
    }
}

/// Authentication status as last reported by the session listener.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    /// No listener event received yet.
    #[default]
    Unknown,
    SignedOut,
    SignedIn,
}

impl std::fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuthStatus::Unknown => "unknown",
            AuthStatus::SignedOut => "signed_out",
            AuthStatus::SignedIn => "signed_in",
        };
        write!(f, "{s}")
    }
}
