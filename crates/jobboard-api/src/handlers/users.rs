//! Account handlers.

use axum::extract::{Path, RawQuery, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use jobboard_models::{PasswordUpdate, UpdateProfile, UserId};

use crate::auth::{expired_session_cookie, Administrator, AuthUser, Publisher, Seeker};
use crate::error::ApiResult;
use crate::handlers::auth::send_token;
use crate::handlers::jobs::public_list;
use crate::handlers::{query_request, JsonBody};
use crate::state::AppState;

pub async fn get_profile(AuthUser(user): AuthUser) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": user.profile(),
    }))
}

pub async fn update_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(input): JsonBody<PasswordUpdate>,
) -> ApiResult<Response> {
    let user = state.users.update_password(&user, input).await?;
    send_token(&state, &user, None)
}

pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(input): JsonBody<UpdateProfile>,
) -> ApiResult<Json<Value>> {
    let user = state.users.update_profile(&user, input).await?;
    Ok(Json(json!({
        "success": true,
        "data": user.profile(),
    })))
}

pub async fn delete_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Response> {
    state.users.delete_account(&user).await?;
    Ok((
        [(header::SET_COOKIE, expired_session_cookie())],
        Json(json!({
            "success": true,
            "message": "User deleted successfully",
        })),
    )
        .into_response())
}

pub async fn get_applied_jobs(
    State(state): State<AppState>,
    Seeker(user): Seeker,
) -> ApiResult<Json<Value>> {
    let jobs = state.jobs.applied_by(&user.id).await?;
    Ok(Json(public_list(&jobs)))
}

/// Listings of the caller, applicants included.
pub async fn get_published_jobs(
    State(state): State<AppState>,
    Publisher(user): Publisher,
) -> ApiResult<Json<Value>> {
    let jobs = state.jobs.published_by(&user.id).await?;
    Ok(Json(json!({
        "success": true,
        "results": jobs.len(),
        "data": jobs,
    })))
}

pub async fn get_users(
    State(state): State<AppState>,
    _admin: Administrator,
    RawQuery(query): RawQuery,
) -> ApiResult<Json<Value>> {
    let users = state.users.list(&query_request(query)).await?;
    Ok(Json(json!({
        "success": true,
        "results": users.len(),
        "data": users,
    })))
}

pub async fn delete_user(
    State(state): State<AppState>,
    _admin: Administrator,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.users.delete_user(&UserId::from(id)).await?;
    Ok(Json(json!({
        "success": true,
        "message": "User is deleted by Admin.",
    })))
}
