use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Authorization claim resolved once when a session is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Reader,
    Admin,
}

impl Role {
    /// Read the role out of free-form user metadata. Anything other than an
    /// explicit `"admin"` is a plain reader.
    pub fn from_metadata(metadata: &serde_json::Map<String, serde_json::Value>) -> Self {
        match metadata.get("role").and_then(|v| v.as_str()) {
            Some(role) if role.eq_ignore_ascii_case("admin") => Role::Admin,
            _ => Role::Reader,
        }
    }

    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl UserProfile {
    /// Username from metadata, else the local part of the email.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.username.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        self.email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .filter(|local| !local.is_empty())
            .unwrap_or(&self.id)
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: UserProfile,
    #[serde(default)]
    pub role: Role,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Token response of the identity provider.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: ProviderUser,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProviderUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Map<String, serde_json::Value>,
}

impl ProviderUser {
    pub fn into_profile(self) -> (UserProfile, Role) {
        let role = Role::from_metadata(&self.user_metadata);
        let username = self
            .user_metadata
            .get("username")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        (
            UserProfile {
                id: self.id,
                email: self.email,
                username,
            },
            role,
        )
    }
}

impl TokenResponse {
    pub fn into_session(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .or_else(|| {
                self.expires_in
                    .map(|secs| now + chrono::Duration::seconds(secs))
            });
        let (user, role) = self.user.into_profile();
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user,
            role,
        }
    }
}
