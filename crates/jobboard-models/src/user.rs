//! User account models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

use crate::error::{collect_messages, ModelError, ModelResult};

/// Unique identifier for a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Employer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Employer => "employer",
            Role::Admin => "admin",
        }
    }

    /// Roles a visitor may pick at registration.
    pub fn from_registration(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "employer" => Some(Role::Employer),
            _ => None,
        }
    }

    /// Whether this role may publish listings.
    pub fn can_publish(&self) -> bool {
        matches!(self, Role::Employer | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: UserId,

    pub name: String,

    pub email: String,

    #[serde(default)]
    pub role: Role,

    /// bcrypt hash.
    pub password: String,

    pub created_at: DateTime<Utc>,

    /// SHA-256 hex digest of the outstanding reset token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_password_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_password_expire: Option<DateTime<Utc>>,

    #[serde(rename = "__v", default)]
    pub version: u64,
}

impl User {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
        password_hash: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            email: email.into(),
            role,
            password: password_hash.into(),
            created_at: now,
            reset_password_token: None,
            reset_password_expire: None,
            version: 0,
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }

    /// Whether `digest` names a reset token still valid at `now`.
    pub fn reset_token_matches(&self, digest: &str, now: DateTime<Utc>) -> bool {
        match (&self.reset_password_token, self.reset_password_expire) {
            (Some(stored), Some(expire)) => stored == digest && expire > now,
            _ => false,
        }
    }

    pub fn clear_reset_token(&mut self) {
        self.reset_password_token = None;
        self.reset_password_expire = None;
    }
}

/// User as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Registration request body.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RegisterUser {
    #[validate(required(message = "Please enter your name"))]
    pub name: Option<String>,

    #[validate(
        required(message = "Please enter your email address"),
        email(message = "Please enter a valid email address")
    )]
    pub email: Option<String>,

    #[validate(
        required(message = "Please enter the password for your account"),
        length(min = 8, message = "Your password must be at least 8 characters long")
    )]
    pub password: Option<String>,

    pub role: Option<String>,
}

/// Registration fields after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl RegisterUser {
    pub fn validated(self) -> ModelResult<Registration> {
        let mut messages = match self.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => collect_messages(&errors),
        };
        let role = match self.role.as_deref() {
            None => Some(Role::User),
            Some(text) => {
                let role = Role::from_registration(text);
                if role.is_none() {
                    messages.push("Please select correct role".to_string());
                }
                role
            }
        };

        match (self.name, self.email, self.password, role) {
            (Some(name), Some(email), Some(password), Some(role)) if messages.is_empty() => {
                Ok(Registration {
                    name,
                    email: email.trim().to_lowercase(),
                    password,
                    role,
                })
            }
            _ => Err(ModelError::Validation(messages)),
        }
    }
}

/// Profile update body.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProfile {
    pub name: Option<String>,

    #[validate(email(message = "Please enter a valid email address"))]
    pub email: Option<String>,
}

impl UpdateProfile {
    /// Apply to a user, validating first.
    pub fn apply_to(self, user: &mut User) -> ModelResult<()> {
        if let Err(errors) = self.validate() {
            return Err(ModelError::Validation(collect_messages(&errors)));
        }
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(email) = self.email {
            user.email = email.trim().to_lowercase();
        }
        Ok(())
    }
}

/// Password change body.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PasswordUpdate {
    #[validate(required(message = "Please enter your current password"))]
    pub current_password: Option<String>,

    #[validate(
        required(message = "Please enter the password for your account"),
        length(min = 8, message = "Your password must be at least 8 characters long")
    )]
    pub new_password: Option<String>,
}

impl PasswordUpdate {
    /// `(current, new)` after validation.
    pub fn validated(self) -> ModelResult<(String, String)> {
        if let Err(errors) = self.validate() {
            return Err(ModelError::Validation(collect_messages(&errors)));
        }
        match (self.current_password, self.new_password) {
            (Some(current), Some(new)) => Ok((current, new)),
            _ => Err(ModelError::validation("Please enter the password for your account")),
        }
    }
}

/// Password reset body.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PasswordReset {
    #[validate(
        required(message = "Please enter the password for your account"),
        length(min = 8, message = "Your password must be at least 8 characters long")
    )]
    pub password: Option<String>,
}

impl PasswordReset {
    pub fn validated(self) -> ModelResult<String> {
        if let Err(errors) = self.validate() {
            return Err(ModelError::Validation(collect_messages(&errors)));
        }
        self.password
            .ok_or_else(|| ModelError::validation("Please enter the password for your account"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_register_defaults_to_user_role() {
        let input = RegisterUser {
            name: Some("Jane".into()),
            email: Some("Jane@Example.com".into()),
            password: Some("password123".into()),
            role: None,
        };
        let registration = input.validated().unwrap();
        assert_eq!(registration.role, Role::User);
        assert_eq!(registration.email, "jane@example.com");
    }

    #[test]
    fn test_register_rejects_admin_and_short_password() {
        let input = RegisterUser {
            name: Some("Jane".into()),
            email: Some("jane@example.com".into()),
            password: Some("short".into()),
            role: Some("admin".into()),
        };
        let err = input.validated().unwrap_err();
        assert_eq!(
            err.messages(),
            &[
                "Your password must be at least 8 characters long".to_string(),
                "Please select correct role".to_string(),
            ]
        );
    }

    #[test]
    fn test_register_requires_fields() {
        let err = RegisterUser::default().validated().unwrap_err();
        assert_eq!(err.messages().len(), 3);
    }

    #[test]
    fn test_reset_token_expiry() {
        let now = Utc::now();
        let mut user = User::new("Jane", "jane@example.com", Role::User, "hash", now);
        user.reset_password_token = Some("abc".into());
        user.reset_password_expire = Some(now + Duration::minutes(30));
        assert!(user.reset_token_matches("abc", now));
        assert!(!user.reset_token_matches("abd", now));
        assert!(!user.reset_token_matches("abc", now + Duration::minutes(31)));

        user.clear_reset_token();
        assert!(!user.reset_token_matches("abc", now));
    }

    #[test]
    fn test_profile_hides_secrets() {
        let user = User::new("Jane", "jane@example.com", Role::Employer, "hash", Utc::now());
        let value = serde_json::to_value(user.profile()).unwrap();
        assert!(value.get("password").is_none());
        assert_eq!(value["role"], "employer");
    }

    #[test]
    fn test_update_profile_validates_email() {
        let mut user = User::new("Jane", "jane@example.com", Role::User, "hash", Utc::now());
        let bad = UpdateProfile {
            name: None,
            email: Some("nope".into()),
        };
        assert!(bad.apply_to(&mut user).is_err());

        let good = UpdateProfile {
            name: Some("Janet".into()),
            email: None,
        };
        good.apply_to(&mut user).unwrap();
        assert_eq!(user.name, "Janet");
        assert_eq!(user.email, "jane@example.com");
    }
}
