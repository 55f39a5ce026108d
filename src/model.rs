//! Data models for the gift page service
//!
//! This module defines the persisted gift record, the public projections that
//! are safe to hand to clients, and the request/response bodies of the API.
//! All JSON is camelCase to match what the browser client sends and reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents a gift record stored in the database
///
/// This is the only type that carries the edit key. It never leaves the
/// service directly; handlers return [`PublicGift`] or [`GiftSummary`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GiftRecord {
    /// Unique, URL-safe identifier of the gift page (primary key)
    pub slug: String,

    /// Who the gift is for; never empty
    pub recipient_name: String,

    #[serde(default)]
    pub greeting: String,

    #[serde(default)]
    pub message: String,

    /// Public blob URLs, in display order
    #[serde(default)]
    pub images: Vec<String>,

    /// Timestamp when the gift was created; never changes afterwards
    pub created_at: DateTime<Utc>,

    /// Secret capability proving ownership, minted once at creation
    pub edit_key: String,
}

impl GiftRecord {
    /// Projects the record to the view returned by read and update.
    pub fn to_public(&self) -> PublicGift {
        PublicGift {
            slug: self.slug.clone(),
            recipient_name: self.recipient_name.clone(),
            greeting: self.greeting.clone(),
            message: self.message.clone(),
            images: self.images.clone(),
            created_at: self.created_at,
        }
    }

    /// Projects the record to the list-view summary.
    pub fn to_summary(&self) -> GiftSummary {
        GiftSummary {
            slug: self.slug.clone(),
            recipient_name: self.recipient_name.clone(),
            created_at: self.created_at,
        }
    }
}

/// A gift as seen by anyone holding its slug (no edit key)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicGift {
    pub slug: String,
    pub recipient_name: String,
    pub greeting: String,
    pub message: String,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Read-only projection used by list views
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GiftSummary {
    pub slug: String,
    pub recipient_name: String,
    pub created_at: DateTime<Utc>,
}

/// Request payload for creating a new gift
///
/// # Example
/// ```json
/// {
///   "slug": "for-mom",
///   "recipientName": "Mom",
///   "greeting": "Happy birthday!",
///   "message": "Thank you for everything.",
///   "images": ["https://cdn.example.com/3f2a.jpg"]
/// }
/// ```
///
/// Any `editKey` or `createdAt` sent by the client is ignored; the service
/// mints both.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateGiftRequest {
    #[serde(default)]
    pub slug: Option<String>,

    #[serde(default)]
    pub recipient_name: Option<String>,

    #[serde(default)]
    pub greeting: Option<String>,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub images: Option<Vec<String>>,
}

/// Response returned after successfully creating a gift
///
/// The edit key is handed out exactly once, here. The client is expected to
/// keep it locally and present it in `X-Edit-Key` for later edits.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreatedGift {
    pub slug: String,
    pub edit_key: String,
}

/// Partial update of an existing gift
///
/// Absent fields keep their stored value. `images`, when present, replaces
/// the whole list.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGiftRequest {
    #[serde(default)]
    pub recipient_name: Option<String>,

    #[serde(default)]
    pub greeting: Option<String>,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub images: Option<Vec<String>>,
}

/// Body of `POST /api/gifts/list`
#[derive(Deserialize, Debug)]
pub struct SummariesRequest {
    pub slugs: Vec<String>,
}

/// Body of `POST /api/upload-url`
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlRequest {
    #[serde(default)]
    pub filename: Option<String>,

    #[serde(default)]
    pub content_type: Option<String>,
}

/// A presigned direct-upload target and where the object will be served from
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUpload {
    pub upload_url: String,
    pub public_url: String,
}

/// Body of `POST /api/rewrite-message`
#[derive(Deserialize, Debug, Default)]
pub struct RewriteRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RewriteResponse {
    pub rewritten_text: String,
}
