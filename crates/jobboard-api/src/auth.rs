//! JWT session authentication and role checks.

use std::time::Duration;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use jobboard_models::{Role, User, UserId};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Name of the session cookie.
pub const TOKEN_COOKIE: &str = "token";

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub id: String,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 keys and token lifetime.
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expires_in: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, expires_in: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expires_in,
        }
    }

    /// Sign a session token for `user`.
    pub fn issue(&self, user: &UserId) -> ApiResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            id: user.to_string(),
            iat: now,
            exp: now + self.expires_in.as_secs() as i64,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::internal(format!("Failed to sign token: {}", e)))
    }

    /// Verify signature and expiry.
    pub fn verify(&self, token: &str) -> ApiResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    ApiError::unauthorized("JSON Web token expired. Try again.")
                }
                _ => ApiError::unauthorized("JSON Web token is invalid. Try Again."),
            })
    }
}

/// `Set-Cookie` value carrying a session token.
pub fn session_cookie(token: &str, max_age: Duration, secure: bool) -> String {
    let cookie = Cookie::build((TOKEN_COOKIE, token.to_string()))
        .http_only(true)
        .secure(secure)
        .path("/")
        .build();
    format!("{}; Max-Age={}", cookie, max_age.as_secs())
}

/// `Set-Cookie` value that expires the session cookie.
pub fn expired_session_cookie() -> String {
    let cookie = Cookie::build((TOKEN_COOKIE, "none"))
        .http_only(true)
        .path("/")
        .build();
    format!("{}; Max-Age=0", cookie)
}

/// Bearer token from `Authorization`, falling back to the session cookie.
fn extract_token(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer"))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    bearer.or_else(|| {
        CookieJar::from_headers(&parts.headers)
            .get(TOKEN_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|t| !t.is_empty() && t != "none")
    })
}

/// Authenticated user loaded from the store.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn id(&self) -> &UserId {
        &self.0.id
    }

    pub fn role(&self) -> Role {
        self.0.role
    }

    /// Fail with 403 unless the user holds one of `roles`.
    pub fn require_role(&self, roles: &[Role]) -> ApiResult<()> {
        if roles.contains(&self.0.role) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "Role({}) is not allowed to access this resource.",
                self.0.role
            )))
        }
    }
}

/// Axum extractor for authenticated user.
#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts)
            .ok_or_else(|| ApiError::unauthorized("Login is required to access this resource."))?;
        let claims = state.jwt.verify(&token)?;

        let user = state
            .users
            .repo()
            .get(&UserId::from(claims.id.as_str()))
            .await?
            .ok_or_else(|| {
                debug!(user_id = %claims.id, "Token refers to a deleted user");
                ApiError::unauthorized("Login is required to access this resource.")
            })?;

        Ok(AuthUser(user))
    }
}

/// Declares an extractor admitting only authenticated users holding one of
/// the listed roles.
macro_rules! role_extractor {
    ($(#[$meta:meta])* $name:ident => [$($role:expr),+ $(,)?]) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name(pub User);

        #[axum::async_trait]
        impl FromRequestParts<AppState> for $name {
            type Rejection = ApiError;

            async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
                let auth = AuthUser::from_request_parts(parts, state).await?;
                auth.require_role(&[$($role),+])?;
                Ok(Self(auth.0))
            }
        }
    };
}

role_extractor!(
    /// Employer or admin, allowed to publish listings.
    Publisher => [Role::Employer, Role::Admin]
);

role_extractor!(
    /// Job seeker.
    Seeker => [Role::User]
);

role_extractor!(Administrator => [Role::Admin]);

/// Hash a password on the blocking pool.
pub async fn hash_password(password: String, cost: u32) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| ApiError::internal(format!("Password hashing task failed: {}", e)))?
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))
}

/// Check a password against its bcrypt hash on the blocking pool.
pub async fn verify_password(password: String, hash: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .map_err(|e| ApiError::internal(format!("Password check task failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: (&str, &str)) -> Parts {
        let (parts, _) = Request::builder()
            .header(header.0, header.1)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn test_issue_and_verify() {
        let keys = JwtKeys::new("secret", Duration::from_secs(60));
        let user = UserId::from("u1");
        let token = keys.issue(&user).unwrap();
        assert_eq!(keys.verify(&token).unwrap().id, "u1");

        let other = JwtKeys::new("other", Duration::from_secs(60));
        let err = other.verify(&token).unwrap_err();
        assert_eq!(err.to_string(), "JSON Web token is invalid. Try Again.");
    }

    #[test]
    fn test_expired_token() {
        let keys = JwtKeys::new("secret", Duration::from_secs(0));
        let now = Utc::now().timestamp();
        let claims = Claims {
            id: "u1".into(),
            iat: now - 120,
            exp: now - 60,
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).unwrap();
        let err = keys.verify(&token).unwrap_err();
        assert_eq!(err.to_string(), "JSON Web token expired. Try again.");
    }

    #[test]
    fn test_extract_token_sources() {
        assert_eq!(
            extract_token(&parts_with(("Authorization", "Bearer abc"))).as_deref(),
            Some("abc")
        );
        assert_eq!(
            extract_token(&parts_with(("Cookie", "token=xyz; other=1"))).as_deref(),
            Some("xyz")
        );
        assert_eq!(extract_token(&parts_with(("Cookie", "token=none"))), None);
        assert_eq!(extract_token(&parts_with(("Authorization", "Basic abc"))), None);
    }

    #[test]
    fn test_cookies() {
        let cookie = session_cookie("abc", Duration::from_secs(60), true);
        assert!(cookie.starts_with("token=abc"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.ends_with("Max-Age=60"));
        assert!(expired_session_cookie().ends_with("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_password_hashing() {
        let hash = hash_password("password123".into(), 4).await.unwrap();
        assert!(verify_password("password123".into(), hash.clone()).await.unwrap());
        assert!(!verify_password("wrong".into(), hash).await.unwrap());
    }

    #[test]
    fn test_require_role() {
        let user = User::new("Jane", "j@x.io", Role::User, "h", Utc::now());
        let auth = AuthUser(user);
        assert!(auth.require_role(&[Role::User]).is_ok());
        let err = auth.require_role(&[Role::Employer, Role::Admin]).unwrap_err();
        assert_eq!(err.to_string(), "Role(user) is not allowed to access this resource.");
    }
}
