//! Job listing handlers.

use axum::extract::{Multipart, Path, RawQuery, State};
use axum::Json;
use serde_json::{json, Value};

use jobboard_models::{Job, JobDraft, JobId};

use crate::auth::{Publisher, Seeker};
use crate::error::{ApiError, ApiResult};
use crate::handlers::{query_request, JsonBody};
use crate::services::ResumeUpload;
use crate::state::AppState;

/// Multipart field carrying the résumé.
const RESUME_FIELD: &str = "file";

pub(crate) fn public_list(jobs: &[Job]) -> Value {
    json!({
        "success": true,
        "results": jobs.len(),
        "data": jobs.iter().map(Job::to_public_json).collect::<Vec<_>>(),
    })
}

/// List jobs, filtered, sorted, projected and paginated by the query string.
pub async fn get_jobs(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> ApiResult<Json<Value>> {
    let jobs = state.jobs.list(&query_request(query)).await?;
    Ok(Json(json!({
        "success": true,
        "results": jobs.len(),
        "data": jobs,
    })))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path((id, slug)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let job = state.jobs.get(&JobId::from(id.as_str()), &slug).await?;
    Ok(Json(json!({
        "success": true,
        "data": [job.to_public_json()],
    })))
}

/// Jobs within `distance` km of a zipcode.
pub async fn get_jobs_in_radius(
    State(state): State<AppState>,
    Path((zipcode, distance)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let distance: f64 = distance
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request("Please enter a valid distance"))?;
    let jobs = state.jobs.within(&zipcode, distance).await?;
    Ok(Json(public_list(&jobs)))
}

pub async fn job_stats(
    State(state): State<AppState>,
    Path(topic): Path<String>,
) -> ApiResult<Json<Value>> {
    let stats = state.jobs.stats(&topic).await?;
    if stats.is_empty() {
        return Ok(Json(json!({
            "success": false,
            "message": format!("No stats available for {}", topic),
        })));
    }
    Ok(Json(json!({
        "success": true,
        "data": stats,
    })))
}

pub async fn new_job(
    State(state): State<AppState>,
    Publisher(user): Publisher,
    JsonBody(draft): JsonBody<JobDraft>,
) -> ApiResult<Json<Value>> {
    let job = state.jobs.create(&user, draft).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Job created successfully",
        "data": job.to_public_json(),
    })))
}

pub async fn update_job(
    State(state): State<AppState>,
    Publisher(user): Publisher,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<JobDraft>,
) -> ApiResult<Json<Value>> {
    let job = state
        .jobs
        .update(&user, &JobId::from(id.as_str()), patch)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Job updated successfully",
        "data": job.to_public_json(),
    })))
}

pub async fn delete_job(
    State(state): State<AppState>,
    Publisher(user): Publisher,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.jobs.delete(&user, &JobId::from(id.as_str())).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Job deleted successfully",
    })))
}

/// Apply with a résumé sent as multipart field `file`.
pub async fn apply_job(
    State(state): State<AppState>,
    Seeker(user): Seeker,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(RESUME_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        upload = Some(ResumeUpload {
            file_name,
            bytes: bytes.to_vec(),
        });
    }

    let job = state
        .jobs
        .apply(&user, &JobId::from(id.as_str()), upload)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Applied to Job successfully.",
        "data": job.to_public_json(),
    })))
}
