//! Account operations.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use jobboard_models::{
    PasswordReset, PasswordUpdate, RegisterUser, UpdateProfile, User, UserId,
};
use jobboard_query::{Document, QueryPlan, QueryRequest};
use jobboard_store::{UserRepository, USERS};

use crate::auth::{hash_password, verify_password};
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::services::jobs::JobService;
use crate::services::mailer::{Email, Mailer};

/// Random password reset token, hex encoded.
pub fn generate_reset_token() -> String {
    let bytes: [u8; 20] = rand::rng().random();
    hex(&bytes)
}

/// SHA-256 digest of a reset token, as stored.
pub fn reset_token_digest(token: &str) -> String {
    hex(&Sha256::digest(token.as_bytes()))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Service for user accounts.
#[derive(Clone)]
pub struct UserService {
    users: UserRepository,
    jobs: JobService,
    mailer: Arc<dyn Mailer>,
    bcrypt_cost: u32,
    reset_token_ttl: Duration,
}

impl UserService {
    pub fn new(
        users: UserRepository,
        jobs: JobService,
        mailer: Arc<dyn Mailer>,
        bcrypt_cost: u32,
        reset_token_ttl: Duration,
    ) -> Self {
        Self {
            users,
            jobs,
            mailer,
            bcrypt_cost,
            reset_token_ttl,
        }
    }

    pub fn repo(&self) -> &UserRepository {
        &self.users
    }

    pub async fn register(&self, input: RegisterUser) -> ApiResult<User> {
        let registration = input.validated()?;
        let hash = hash_password(registration.password, self.bcrypt_cost).await?;
        let user = User::new(
            registration.name,
            registration.email,
            registration.role,
            hash,
            Utc::now(),
        );

        let user = self.users.insert(&user).await?;
        metrics::record_user_registered(user.role.as_str());
        info!(user_id = %user.id, role = %user.role, "User registered");
        Ok(user)
    }

    pub async fn login(&self, email: Option<String>, password: Option<String>) -> ApiResult<User> {
        let (email, password) = match (email, password) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                (email, password)
            }
            _ => return Err(ApiError::bad_request("Please enter your credentials")),
        };

        let Some(user) = self.users.find_by_email(&email).await? else {
            metrics::record_login("failed");
            return Err(ApiError::unauthorized("Invalid credentials"));
        };
        if !verify_password(password, user.password.clone()).await? {
            metrics::record_login("failed");
            return Err(ApiError::unauthorized("Invalid credentials"));
        }

        metrics::record_login("success");
        Ok(user)
    }

    /// Store a reset token digest and email the link.
    ///
    /// `reset_base_url` is the URL the raw token is appended to.
    pub async fn forgot_password(&self, email: &str, reset_base_url: &str) -> ApiResult<User> {
        let mut user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| ApiError::not_found("No user found with this email."))?;

        let token = generate_reset_token();
        user.reset_password_token = Some(reset_token_digest(&token));
        user.reset_password_expire = Some(
            Utc::now()
                + chrono::Duration::from_std(self.reset_token_ttl)
                    .map_err(|e| ApiError::internal(format!("Invalid reset token lifetime: {}", e)))?,
        );
        let mut user = self.users.replace(&user).await?;

        let email = Email {
            to: user.email.clone(),
            subject: "Job Board Password Recovery".to_string(),
            text: format!(
                "Your password reset link is as follows:\n\n{}/{}\n\nIf you have not requested this, please ignore it.",
                reset_base_url.trim_end_matches('/'),
                token
            ),
        };

        if let Err(e) = self.mailer.send(email).await {
            warn!(user_id = %user.id, error = %e, "Reset email failed, clearing token");
            metrics::record_email("failed");
            user.clear_reset_token();
            self.users.replace(&user).await?;
            return Err(ApiError::internal("Email is not sent."));
        }

        metrics::record_email("sent");
        Ok(user)
    }

    pub async fn reset_password(&self, token: &str, input: PasswordReset) -> ApiResult<User> {
        let invalid = || ApiError::bad_request("Password Reset token is invalid or has been expired.");

        let digest = reset_token_digest(token);
        let mut user = self
            .users
            .find_by_reset_token(&digest)
            .await?
            .filter(|user| user.reset_token_matches(&digest, Utc::now()))
            .ok_or_else(invalid)?;

        let password = input.validated()?;
        user.password = hash_password(password, self.bcrypt_cost).await?;
        user.clear_reset_token();

        let user = self.users.replace(&user).await?;
        info!(user_id = %user.id, "Password reset");
        Ok(user)
    }

    pub async fn update_password(&self, user: &User, input: PasswordUpdate) -> ApiResult<User> {
        let (current, new) = input.validated()?;
        if !verify_password(current, user.password.clone()).await? {
            return Err(ApiError::unauthorized("Current password is incorrect"));
        }

        let mut user = user.clone();
        user.password = hash_password(new, self.bcrypt_cost).await?;
        Ok(self.users.replace(&user).await?)
    }

    pub async fn update_profile(&self, user: &User, input: UpdateProfile) -> ApiResult<User> {
        let mut user = user.clone();
        input.apply_to(&mut user)?;
        Ok(self.users.replace(&user).await?)
    }

    /// Delete an account with its listings and résumés.
    pub async fn delete_account(&self, user: &User) -> ApiResult<()> {
        self.jobs.delete_user_data(user).await?;
        self.users.delete(&user.id).await?;
        info!(user_id = %user.id, "User deleted");
        Ok(())
    }

    pub async fn delete_user(&self, id: &UserId) -> ApiResult<()> {
        let user = self
            .users
            .get(id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("User not found with id: {}", id)))?;
        self.delete_account(&user).await
    }

    /// Accounts for a client query string.
    pub async fn list(&self, request: &QueryRequest) -> ApiResult<Vec<Document>> {
        let plan = QueryPlan::from_request_with(request, &USERS.plan_defaults());
        Ok(self.users.find(plan).await?)
    }
}
