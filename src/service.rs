//! Gift service: ownership rules and the create/read/update/delete protocol
//!
//! Two stores back every gift: the redb record store holds the record, the
//! blob store holds its images. Neither can take part in a transaction with
//! the other, so mutations follow a fixed order:
//!
//! 1. Authorize against the stored edit key.
//! 2. Delete the blobs the mutation drops. Any refusal aborts here.
//! 3. Write (or remove) the record.
//!
//! A crash between 2 and 3 leaves the old record pointing at blobs that may
//! be gone for images it was about to drop anyway, never a new record
//! pointing at deleted blobs it still shows. Failed blob deletions are not
//! retried; the caller gets `Internal` and the record keeps its prior state.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use rand::{distr::Alphanumeric, Rng};
use subtle::ConstantTimeEq;
use tracing::{error, info, warn};

use crate::blob::{keys_for_urls, upload_key, BlobStore};
use crate::database::{GiftStore, StoreResult};
use crate::error::{GiftError, GiftResult};
use crate::model::{
    CreateGiftRequest, CreatedGift, GiftRecord, GiftSummary, PresignedUpload, PublicGift,
    UpdateGiftRequest,
};

const EDIT_KEY_LEN: usize = 32;
const MAX_SLUG_LEN: usize = 64;

#[derive(Clone)]
pub struct GiftService {
    store: GiftStore,
    blobs: Arc<dyn BlobStore>,
}

impl GiftService {
    pub fn new(store: GiftStore, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }

    /// Creates a gift and returns its slug together with the freshly minted
    /// edit key. This is the only time the key leaves the service.
    pub async fn create(&self, request: CreateGiftRequest) -> GiftResult<CreatedGift> {
        let slug = request
            .slug
            .as_deref()
            .map(str::trim)
            .filter(|slug| !slug.is_empty())
            .ok_or_else(|| GiftError::validation("Slug and Recipient Name are required."))?;
        let recipient_name = request
            .recipient_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| GiftError::validation("Slug and Recipient Name are required."))?;
        validate_slug(slug)?;

        let record = GiftRecord {
            slug: slug.to_string(),
            recipient_name: recipient_name.to_string(),
            greeting: request.greeting.unwrap_or_default(),
            message: request.message.unwrap_or_default(),
            images: request.images.unwrap_or_default(),
            created_at: Utc::now(),
            edit_key: mint_edit_key(),
        };

        let (inserted, record) = self
            .with_store(move |store| store.insert_new(&record).map(|ok| (ok, record)))
            .await?;
        if !inserted {
            return Err(GiftError::Conflict(record.slug));
        }

        info!(slug = %record.slug, images = record.images.len(), "gift created");

        Ok(CreatedGift {
            slug: record.slug,
            edit_key: record.edit_key,
        })
    }

    /// Reads a gift without its edit key.
    pub async fn get(&self, slug: &str) -> GiftResult<PublicGift> {
        self.load(slug)
            .await?
            .map(|record| record.to_public())
            .ok_or(GiftError::NotFound)
    }

    /// Best-effort batch read of list summaries.
    ///
    /// Lookups run concurrently on the blocking pool. Slugs that are absent,
    /// or whose lookup fails, are left out of the result. Output order is
    /// unspecified.
    pub async fn summaries(&self, slugs: Vec<String>) -> GiftResult<Vec<GiftSummary>> {
        if slugs.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let lookups = slugs
            .into_iter()
            .filter(|slug| seen.insert(slug.clone()))
            .map(|slug| async move {
                let result = self.load(&slug).await;
                (slug, result)
            });

        let summaries = join_all(lookups)
            .await
            .into_iter()
            .filter_map(|(slug, result)| match result {
                Ok(Some(record)) => Some(record.to_summary()),
                Ok(None) => None,
                Err(err) => {
                    warn!(slug = %slug, error = %err, "dropping summary after store failure");
                    None
                }
            })
            .collect();

        Ok(summaries)
    }

    /// Applies a partial update, deleting images the update drops before
    /// the record is rewritten.
    pub async fn update(
        &self,
        slug: &str,
        edit_key: Option<&str>,
        update: UpdateGiftRequest,
    ) -> GiftResult<PublicGift> {
        let edit_key = require_edit_key(edit_key)?;
        let existing = self.load(slug).await?.ok_or(GiftError::NotFound)?;
        authorize(&existing, edit_key)?;

        let recipient_name = match update.recipient_name {
            Some(name) => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(GiftError::validation("Recipient Name cannot be empty."));
                }
                name.to_string()
            }
            None => existing.recipient_name.clone(),
        };

        // Diff on object keys, not URLs: two URLs can name the same object.
        if let Some(new_images) = &update.images {
            let kept: HashSet<String> = keys_for_urls(new_images, slug).into_iter().collect();
            let dropped = keys_for_urls(&existing.images, slug)
                .into_iter()
                .filter(|key| !kept.contains(key))
                .collect();
            self.delete_blobs(slug, dropped, "update").await?;
        }

        let updated = GiftRecord {
            recipient_name,
            greeting: update.greeting.unwrap_or(existing.greeting),
            message: update.message.unwrap_or(existing.message),
            images: update.images.unwrap_or(existing.images),
            ..existing
        };

        let updated = self
            .with_store(move |store| store.put(&updated).map(|()| updated))
            .await?;
        info!(slug, images = updated.images.len(), "gift updated");

        Ok(updated.to_public())
    }

    /// Deletes a gift and its images. Deleting an absent gift succeeds.
    pub async fn delete(&self, slug: &str, edit_key: Option<&str>) -> GiftResult<()> {
        let edit_key = require_edit_key(edit_key)?;
        let Some(existing) = self.load(slug).await? else {
            info!(slug, "gift already absent, nothing to delete");
            return Ok(());
        };
        authorize(&existing, edit_key)?;

        let keys = keys_for_urls(&existing.images, slug);
        self.delete_blobs(slug, keys, "delete").await?;

        let owned_slug = slug.to_string();
        self.with_store(move |store| store.remove(&owned_slug))
            .await?;
        info!(slug, "gift deleted");

        Ok(())
    }

    /// Issues a presigned direct-upload URL for a new image.
    pub async fn presign_upload(
        &self,
        filename: Option<&str>,
        content_type: Option<&str>,
    ) -> GiftResult<PresignedUpload> {
        let (Some(filename), Some(content_type)) = (
            filename.filter(|f| !f.trim().is_empty()),
            content_type.filter(|c| !c.trim().is_empty()),
        ) else {
            return Err(GiftError::validation(
                "Filename and contentType are required",
            ));
        };

        let key = upload_key(filename);
        self.blobs
            .presign_upload(&key, content_type)
            .await
            .map_err(|err| {
                error!(key = %key, error = %err, "failed to presign upload");
                GiftError::internal(format!("Failed to create upload URL: {err}"))
            })
    }

    /// Runs a record store call on the blocking pool.
    async fn with_store<T, F>(&self, op: F) -> GiftResult<T>
    where
        F: FnOnce(GiftStore) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || op(store))
            .await
            .map_err(|err| GiftError::internal(format!("Record store task failed: {err}")))?
            .map_err(GiftError::from)
    }

    async fn load(&self, slug: &str) -> GiftResult<Option<GiftRecord>> {
        let slug = slug.to_string();
        self.with_store(move |store| store.get(&slug)).await
    }

    async fn delete_blobs(&self, slug: &str, keys: Vec<String>, operation: &str) -> GiftResult<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let report = self.blobs.delete_objects(keys).await.map_err(|err| {
            error!(slug, operation, error = %err, "blob deletion failed");
            GiftError::internal(format!("Failed to remove images from storage: {err}"))
        })?;

        if !report.is_complete() {
            let details = report
                .failed
                .iter()
                .map(|(key, reason)| format!("{key}: {reason}"))
                .collect::<Vec<_>>()
                .join(", ");
            error!(slug, operation, failed = %details, "blob store refused deletions");
            return Err(GiftError::internal(format!(
                "Failed to remove images from storage: {details}"
            )));
        }

        Ok(())
    }
}

fn require_edit_key(edit_key: Option<&str>) -> GiftResult<&str> {
    edit_key
        .filter(|key| !key.is_empty())
        .ok_or(GiftError::Unauthenticated)
}

fn authorize(record: &GiftRecord, presented: &str) -> GiftResult<()> {
    if bool::from(record.edit_key.as_bytes().ct_eq(presented.as_bytes())) {
        Ok(())
    } else {
        Err(GiftError::Forbidden)
    }
}

fn validate_slug(slug: &str) -> GiftResult<()> {
    let url_safe = slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !url_safe || slug.len() > MAX_SLUG_LEN {
        return Err(GiftError::validation(format!(
            "Slug must be 1-{MAX_SLUG_LEN} characters of letters, digits, '-' or '_'."
        )));
    }
    Ok(())
}

fn mint_edit_key() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(EDIT_KEY_LEN)
        .map(char::from)
        .collect()
}
