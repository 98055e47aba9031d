//! Session context for calls against the storefront API.
//!
//! A [`Session`] is produced by a successful login and consumed by logout.
//! Every authenticated call takes the session explicitly; nothing about the
//! logged-in user is kept in process-wide state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::errors::ServiceError;
use crate::models::LoginResponse;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Session {
    token: String,
    role: Role,
    user_id: String,
    started_at: DateTime<Utc>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("role", &self.role)
            .field("user_id", &self.user_id)
            .field("started_at", &self.started_at)
            .finish()
    }
}

impl Session {
    pub fn new(token: impl Into<String>, role: Role, user_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            role,
            user_id: user_id.into(),
            started_at: Utc::now(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Fails with `Forbidden` unless the session holds `role`.
    pub fn require_role(&self, role: Role) -> Result<(), ServiceError> {
        if self.role == role {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "{} access required, session has {}",
                role, self.role
            )))
        }
    }

    /// Ends the session. Taking `self` by value makes the token unusable afterwards.
    pub fn end(self) -> String {
        self.user_id
    }
}

impl TryFrom<LoginResponse> for Session {
    type Error = ServiceError;

    fn try_from(response: LoginResponse) -> Result<Self, Self::Error> {
        if response.token.trim().is_empty() {
            return Err(ServiceError::Unauthorized(
                "login response did not carry a token".into(),
            ));
        }
        Ok(Session::new(response.token, response.role, response.user_id))
    }
}
