//! Registration, login and password recovery handlers.

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use jobboard_models::{PasswordReset, RegisterUser, User};

use crate::auth::{expired_session_cookie, session_cookie, AuthUser};
use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::handlers::JsonBody;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

/// Token response that also sets the session cookie.
pub(crate) fn send_token(state: &AppState, user: &User, message: Option<&str>) -> ApiResult<Response> {
    let token = state.jwt.issue(&user.id)?;
    let cookie = session_cookie(
        &token,
        state.config.cookie_expires_in,
        state.config.is_production(),
    );

    let mut body = json!({ "success": true, "token": token });
    if let Some(message) = message {
        body["message"] = Value::from(message);
    }

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<RegisterUser>,
) -> ApiResult<Response> {
    let user = state.users.register(input).await?;
    send_token(&state, &user, Some("User registered successfully"))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<LoginRequest>,
) -> ApiResult<Response> {
    let user = state.users.login(input.email, input.password).await?;
    send_token(&state, &user, None)
}

/// Reset link base: the configured public origin, or outside production the
/// request's own host and scheme.
fn reset_base_url(config: &ApiConfig, headers: &HeaderMap) -> ApiResult<String> {
    const RESET_PATH: &str = "/api/v1/password/reset";

    if let Some(origin) = &config.public_url {
        return Ok(format!("{}{}", origin, RESET_PATH));
    }
    if config.is_production() {
        return Err(ApiError::internal("PUBLIC_URL is not configured"));
    }

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let scheme = headers
        .get("X-Forwarded-Proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    Ok(format!("{}://{}{}", scheme, host, RESET_PATH))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(input): JsonBody<ForgotPasswordRequest>,
) -> ApiResult<Json<Value>> {
    let email = input.email.unwrap_or_default();
    let base_url = reset_base_url(&state.config, &headers)?;
    let user = state.users.forgot_password(&email, &base_url).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Email sent successfully to: {}", user.email),
    })))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    JsonBody(input): JsonBody<PasswordReset>,
) -> ApiResult<Response> {
    let user = state.users.reset_password(&token, input).await?;
    send_token(&state, &user, None)
}

pub async fn logout(_user: AuthUser) -> impl IntoResponse {
    (
        [(header::SET_COOKIE, expired_session_cookie())],
        Json(json!({
            "success": true,
            "message": "Logged out successfully.",
        })),
    )
}
