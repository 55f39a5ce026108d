//! HTTP request handlers for the gift API
//!
//! Handlers only translate between HTTP and the gift service: they pull the
//! slug from the path and the edit key from `X-Edit-Key`, decode JSON bodies,
//! and map results to status codes. Every body they return is a public
//! projection; the stored record never reaches the wire.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::error;

use crate::error::{GiftError, GiftResult};
use crate::model::{
    CreateGiftRequest, RewriteRequest, RewriteResponse, SummariesRequest, UpdateGiftRequest,
    UploadUrlRequest,
};
use crate::route::AppState;

/// Header carrying the owner's secret for update and delete
pub const EDIT_KEY_HEADER: &str = "x-edit-key";

/// Unwraps a JSON body, reporting malformed input as a 400 instead of axum's
/// default 422.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> GiftResult<T> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        GiftError::validation(format!("Invalid request body: {}", rejection.body_text()))
    })
}

/// A header that is present but not UTF-8 still counts as a presented key;
/// it can never match a minted one.
fn edit_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(EDIT_KEY_HEADER)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).trim().to_string())
}

/// Creates a new gift
///
/// # Request Body
///
/// ```json
/// {
///   "slug": "for-mom",
///   "recipientName": "Mom",
///   "greeting": "Happy birthday!",
///   "message": "...",
///   "images": ["https://cdn.example.com/3f2a.jpg"]
/// }
/// ```
///
/// # Response
///
/// - **201 Created** - `{"slug": "...", "editKey": "..."}`
/// - **400 Bad Request** - Missing slug or recipient name
/// - **409 Conflict** - Slug already exists
pub async fn create_gift(
    State(state): State<AppState>,
    payload: Result<Json<CreateGiftRequest>, JsonRejection>,
) -> GiftResult<impl IntoResponse> {
    let request = json_body(payload)?;
    let created = state.gifts.create(request).await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// Reads a gift by slug
///
/// - **200 OK** - The gift without its edit key
/// - **404 Not Found** - No gift under that slug
pub async fn get_gift(
    Path(slug): Path<String>,
    State(state): State<AppState>,
) -> GiftResult<impl IntoResponse> {
    let gift = state.gifts.get(&slug).await?;
    Ok(Json(gift))
}

/// Updates a gift (owner only)
///
/// Only the fields present in the body change. When `images` is present,
/// images missing from the new list are removed from storage first.
///
/// # Response
///
/// - **200 OK** - The updated gift without its edit key
/// - **401 Unauthorized** - `X-Edit-Key` missing
/// - **403 Forbidden** - `X-Edit-Key` does not match
/// - **404 Not Found** - No gift under that slug
/// - **500 Internal Server Error** - Image cleanup failed; nothing was changed
pub async fn update_gift(
    Path(slug): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<UpdateGiftRequest>, JsonRejection>,
) -> GiftResult<impl IntoResponse> {
    let key = edit_key(&headers);
    if matches!(key.as_deref(), None | Some("")) {
        return Err(GiftError::Unauthenticated);
    }
    let update = json_body(payload)?;

    let gift = state.gifts.update(&slug, key.as_deref(), update).await?;
    Ok(Json(gift))
}

/// Deletes a gift and its images (owner only)
///
/// - **204 No Content** - Deleted, or already absent
/// - **401 Unauthorized** / **403 Forbidden** - as for update
/// - **500 Internal Server Error** - Image cleanup failed; the gift still exists
pub async fn delete_gift(
    Path(slug): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> GiftResult<impl IntoResponse> {
    let key = edit_key(&headers);
    state.gifts.delete(&slug, key.as_deref()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Lists summaries for the given slugs
///
/// Unknown slugs are silently left out.
///
/// ```json
/// { "slugs": ["for-mom", "for-dad"] }
/// ```
pub async fn list_summaries(
    State(state): State<AppState>,
    payload: Result<Json<SummariesRequest>, JsonRejection>,
) -> GiftResult<impl IntoResponse> {
    let request = json_body(payload).map_err(|_| {
        GiftError::validation("Request body must be an object with a \"slugs\" array.")
    })?;
    let summaries = state.gifts.summaries(request.slugs).await?;

    Ok(Json(summaries))
}

/// Issues a presigned URL for uploading one image straight to the blob store
///
/// - **200 OK** - `{"uploadUrl": "...", "publicUrl": "..."}`
/// - **400 Bad Request** - `filename` or `contentType` missing
pub async fn create_upload_url(
    State(state): State<AppState>,
    payload: Result<Json<UploadUrlRequest>, JsonRejection>,
) -> GiftResult<impl IntoResponse> {
    let request = json_body(payload)?;
    let upload = state
        .gifts
        .presign_upload(request.filename.as_deref(), request.content_type.as_deref())
        .await?;

    Ok(Json(upload))
}

/// Rewrites a gift message through the text-assist model
///
/// - **200 OK** - `{"rewrittenText": "..."}`
/// - **400 Bad Request** - `text` missing or blank
/// - **500 Internal Server Error** - Not configured, or the model call failed
pub async fn rewrite_message(
    State(state): State<AppState>,
    payload: Result<Json<RewriteRequest>, JsonRejection>,
) -> GiftResult<impl IntoResponse> {
    let request = json_body(payload)?;
    let text = request
        .text
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .ok_or_else(|| GiftError::validation("Text to rewrite is required."))?;

    let Some(rewriter) = state.rewriter.as_ref() else {
        return Err(GiftError::internal(
            "The writing assistant is not configured on the server.",
        ));
    };

    let rewritten_text = rewriter.rewrite(text).await.map_err(|err| {
        error!(error = %err, "text assist call failed");
        GiftError::internal("An internal server error occurred while contacting the AI assistant.")
    })?;

    Ok(Json(RewriteResponse { rewritten_text }))
}
