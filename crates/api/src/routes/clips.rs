//! Clip capture and retrieval routes
//!
//! The extension posts already-extracted content; these handlers own quota
//! enforcement and usage accounting. Content arrives pre-cleaned, so no
//! DOM processing happens here.

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use pagestash_billing::{Plan, SubscriptionTier};

use crate::{auth::AuthUser, error::ApiError, state::AppState};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 100;

/// Request to capture a clip
#[derive(Debug, Deserialize)]
pub struct CreateClipRequest {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub html_content: Option<String>,
    #[serde(default)]
    pub screenshot_path: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Full clip, returned on create and single-fetch
#[derive(Debug, Serialize)]
pub struct ClipResponse {
    pub id: Uuid,
    pub url: String,
    pub title: String,
    pub text_content: Option<String>,
    pub html_content: Option<String>,
    pub screenshot_path: Option<String>,
    pub metadata: serde_json::Value,
    pub size_mb: f64,
    pub created_at: String,
}

/// Listing entry - content bodies are omitted to keep list payloads small
#[derive(Debug, Serialize)]
pub struct ClipSummary {
    pub id: Uuid,
    pub url: String,
    pub title: String,
    pub size_mb: f64,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct ClipListResponse {
    pub clips: Vec<ClipSummary>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Query params for the listing endpoint
#[derive(Debug, Deserialize)]
pub struct ListClipsQuery {
    /// Search term matched against title, url, and text content
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Approximate storage footprint of a capture in megabytes.
fn capture_size_mb(request: &CreateClipRequest) -> f64 {
    let bytes = request.text_content.as_deref().map_or(0, str::len)
        + request.html_content.as_deref().map_or(0, str::len);
    bytes as f64 / (1024.0 * 1024.0)
}

/// Capture a clip. Enforces the monthly clip quota and the storage quota
/// before writing anything.
pub async fn create_clip(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(request): Json<CreateClipRequest>,
) -> Result<Json<ClipResponse>, ApiError> {
    if request.url.trim().is_empty() {
        return Err(ApiError::BadRequest("url is required".to_string()));
    }

    let tier: Option<(String,)> =
        sqlx::query_as("SELECT subscription_tier FROM users WHERE id = $1")
            .bind(auth_user.user_id)
            .fetch_optional(&state.pool)
            .await?;
    let tier = tier
        .map(|(t,)| SubscriptionTier::from_db(&t))
        .ok_or(ApiError::NotFound)?;

    let plan = Plan::for_tier(tier);
    let usage = state.usage.current_usage(auth_user.user_id).await?;

    if usage.clips_this_month >= plan.clips_per_month {
        tracing::info!(
            user_id = %auth_user.user_id,
            clips_this_month = usage.clips_this_month,
            limit = plan.clips_per_month,
            "Clip quota reached"
        );
        return Err(ApiError::QuotaExceeded);
    }

    let size_mb = capture_size_mb(&request);
    if usage.storage_used_mb + size_mb > plan.storage_limit_mb {
        tracing::info!(
            user_id = %auth_user.user_id,
            storage_used_mb = usage.storage_used_mb,
            clip_size_mb = size_mb,
            limit_mb = plan.storage_limit_mb,
            "Storage quota reached"
        );
        return Err(ApiError::QuotaExceeded);
    }

    let clip_id = Uuid::new_v4();
    let title = request.title.clone().unwrap_or_default();
    let metadata = request.metadata.clone().unwrap_or_else(|| json!({}));

    let (created_at,): (OffsetDateTime,) = sqlx::query_as(
        r#"
        INSERT INTO clips (id, user_id, url, title, text_content, html_content,
                           screenshot_path, metadata, size_mb)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING created_at
        "#,
    )
    .bind(clip_id)
    .bind(auth_user.user_id)
    .bind(&request.url)
    .bind(&title)
    .bind(&request.text_content)
    .bind(&request.html_content)
    .bind(&request.screenshot_path)
    .bind(&metadata)
    .bind(size_mb)
    .fetch_one(&state.pool)
    .await?;

    state.usage.record_clip(auth_user.user_id, size_mb).await?;

    tracing::info!(
        user_id = %auth_user.user_id,
        clip_id = %clip_id,
        size_mb = size_mb,
        "Clip captured"
    );

    Ok(Json(ClipResponse {
        id: clip_id,
        url: request.url,
        title,
        text_content: request.text_content,
        html_content: request.html_content,
        screenshot_path: request.screenshot_path,
        metadata,
        size_mb,
        created_at: created_at.format(&Rfc3339).unwrap_or_default(),
    }))
}

/// List clips, newest first, optionally filtered by a search term.
pub async fn list_clips(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<ListClipsQuery>,
) -> Result<Json<ClipListResponse>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);
    let search = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{}%", q));

    let rows: Vec<(Uuid, String, String, f64, OffsetDateTime)> = sqlx::query_as(
        r#"
        SELECT id, url, title, size_mb, created_at
        FROM clips
        WHERE user_id = $1
          AND ($2::TEXT IS NULL
               OR title ILIKE $2 OR url ILIKE $2 OR text_content ILIKE $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(auth_user.user_id)
    .bind(&search)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let (total,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM clips
        WHERE user_id = $1
          AND ($2::TEXT IS NULL
               OR title ILIKE $2 OR url ILIKE $2 OR text_content ILIKE $2)
        "#,
    )
    .bind(auth_user.user_id)
    .bind(&search)
    .fetch_one(&state.pool)
    .await?;

    let clips = rows
        .into_iter()
        .map(|(id, url, title, size_mb, created_at)| ClipSummary {
            id,
            url,
            title,
            size_mb,
            created_at: created_at.format(&Rfc3339).unwrap_or_default(),
        })
        .collect();

    Ok(Json(ClipListResponse {
        clips,
        total,
        limit,
        offset,
    }))
}

/// Fetch a single clip with its content.
pub async fn get_clip(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(clip_id): Path<Uuid>,
) -> Result<Json<ClipResponse>, ApiError> {
    let row: Option<(
        String,
        String,
        Option<String>,
        Option<String>,
        Option<String>,
        serde_json::Value,
        f64,
        OffsetDateTime,
    )> = sqlx::query_as(
        r#"
        SELECT url, title, text_content, html_content, screenshot_path,
               metadata, size_mb, created_at
        FROM clips
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(clip_id)
    .bind(auth_user.user_id)
    .fetch_optional(&state.pool)
    .await?;

    let (url, title, text_content, html_content, screenshot_path, metadata, size_mb, created_at) =
        row.ok_or(ApiError::NotFound)?;

    Ok(Json(ClipResponse {
        id: clip_id,
        url,
        title,
        text_content,
        html_content,
        screenshot_path,
        metadata,
        size_mb,
        created_at: created_at.format(&Rfc3339).unwrap_or_default(),
    }))
}

/// Delete a clip and release its storage. The monthly clip counter is not
/// decremented - captures count against the month they happened in.
pub async fn delete_clip(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(clip_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted: Option<(f64,)> = sqlx::query_as(
        "DELETE FROM clips WHERE id = $1 AND user_id = $2 RETURNING size_mb",
    )
    .bind(clip_id)
    .bind(auth_user.user_id)
    .fetch_optional(&state.pool)
    .await?;

    let (size_mb,) = deleted.ok_or(ApiError::NotFound)?;

    state
        .usage
        .release_storage(auth_user.user_id, size_mb)
        .await?;

    tracing::info!(
        user_id = %auth_user.user_id,
        clip_id = %clip_id,
        size_mb = size_mb,
        "Clip deleted"
    );

    Ok(Json(json!({ "deleted": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_size_from_content_lengths() {
        let request = CreateClipRequest {
            url: "https://example.com".to_string(),
            title: None,
            text_content: Some("a".repeat(512 * 1024)),
            html_content: Some("b".repeat(512 * 1024)),
            screenshot_path: None,
            metadata: None,
        };
        let size = capture_size_mb(&request);
        assert!((size - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_capture_size_empty_content() {
        let request = CreateClipRequest {
            url: "https://example.com".to_string(),
            title: Some("title only".to_string()),
            text_content: None,
            html_content: None,
            screenshot_path: None,
            metadata: None,
        };
        assert_eq!(capture_size_mb(&request), 0.0);
    }
}
