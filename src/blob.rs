//! Blob store adapter for gift images
//!
//! Images never pass through this service: the browser uploads them straight
//! to the object store through a presigned URL and the gift record keeps only
//! the resulting public URL. This module issues those URLs and batch-deletes
//! objects whose public URLs are dropped from a gift.
//!
//! Every backend implements [`BlobStore`]. [`S3BlobStore`] talks to any
//! S3-compatible service; [`MemoryBlobStore`] keeps keys in process memory and
//! can be told to fail specific deletions.

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::BlobConfig;
use crate::model::PresignedUpload;

pub type BlobFuture<'a, T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>;

/// Outcome of a batch deletion, per key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: Vec<String>,
    /// `(key, reason)` for every object the store refused to delete
    pub failed: Vec<(String, String)>,
}

impl DeleteReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Async object storage contract.
pub trait BlobStore: Send + Sync + 'static {
    /// Issues a short-lived URL allowing a client to `PUT` the object `key`
    /// with the given content type, together with the URL it will be served
    /// from afterwards.
    fn presign_upload(&self, key: &str, content_type: &str) -> BlobFuture<'_, PresignedUpload>;

    /// Deletes `keys` in one batch.
    ///
    /// `Err` means the batch could not be submitted at all; per-key refusals
    /// are reported in [`DeleteReport::failed`].
    fn delete_objects(&self, keys: Vec<String>) -> BlobFuture<'_, DeleteReport>;
}

/// Derives the object key from a public image URL: its path without the
/// leading `/`.
///
/// Returns `None` for anything that does not parse as an absolute URL or has
/// an empty path.
pub fn key_from_public_url(public_url: &str) -> Option<String> {
    let parsed = Url::parse(public_url).ok()?;
    let key = parsed.path().trim_start_matches('/');
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

/// Maps public URLs to a deduplicated, sorted set of object keys.
///
/// Malformed URLs are logged and skipped so they cannot block the cleanup of
/// well-formed ones.
pub fn keys_for_urls<'a, I>(urls: I, slug: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut keys = BTreeSet::new();
    for url in urls {
        match key_from_public_url(url) {
            Some(key) => {
                keys.insert(key);
            }
            None => warn!(slug, url = %url, "skipping image URL without a usable object key"),
        }
    }
    keys.into_iter().collect()
}

/// Builds a fresh object key for an upload: `<uuid>.<ext>`.
///
/// The extension is whatever follows the last `.` in `filename` (the whole
/// name when there is none), lower-cased and reduced to `[a-z0-9]`. An empty
/// result falls back to `jpg`.
pub fn upload_key(filename: &str) -> String {
    let raw_ext = filename.rsplit('.').next().unwrap_or_default();
    let ext: String = raw_ext
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();
    let ext = if ext.is_empty() { "jpg".to_string() } else { ext };

    format!("{}.{}", Uuid::new_v4(), ext)
}

/// Joins the public base URL and an object key.
pub fn public_url_for(public_base_url: &str, key: &str) -> String {
    format!("{}/{}", public_base_url.trim_end_matches('/'), key)
}

/// Backend for S3-compatible object stores (AWS S3, Cloudflare R2, MinIO, ...).
pub struct S3BlobStore {
    client: Client,
    bucket: String,
    public_base_url: String,
    upload_ttl: Duration,
}

impl S3BlobStore {
    /// Builds a client from explicit static credentials.
    pub fn new(config: &BlobConfig, upload_ttl: Duration) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None, // session_token
            None, // expiry
            "giftpage-config",
        );

        let s3_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        info!(
            "S3 blob store initialized: endpoint={} bucket={}",
            config.endpoint, config.bucket
        );

        Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            public_base_url: config.public_url.clone(),
            upload_ttl,
        }
    }

    fn map_sdk_error(context: &str, err: impl std::fmt::Display) -> anyhow::Error {
        anyhow::anyhow!("S3 {context}: {err}")
    }
}

impl BlobStore for S3BlobStore {
    fn presign_upload(&self, key: &str, content_type: &str) -> BlobFuture<'_, PresignedUpload> {
        let key = key.to_string();
        let content_type = content_type.to_string();
        Box::pin(async move {
            let presigning = PresigningConfig::expires_in(self.upload_ttl)
                .map_err(|e| Self::map_sdk_error("presigning config", e))?;

            let request = self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .content_type(&content_type)
                .presigned(presigning)
                .await
                .map_err(|e| Self::map_sdk_error("presign put_object", e))?;

            debug!("S3 presigned upload: bucket={} key={}", self.bucket, key);

            Ok(PresignedUpload {
                upload_url: request.uri().to_string(),
                public_url: public_url_for(&self.public_base_url, &key),
            })
        })
    }

    fn delete_objects(&self, keys: Vec<String>) -> BlobFuture<'_, DeleteReport> {
        Box::pin(async move {
            if keys.is_empty() {
                return Ok(DeleteReport::default());
            }

            let objects = keys
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| Self::map_sdk_error("delete_objects request", e))?;
            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|e| Self::map_sdk_error("delete_objects request", e))?;

            debug!("S3 delete_objects: bucket={} keys={:?}", self.bucket, keys);

            let output = self
                .client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("delete_objects", e))?;

            // Quiet mode only lists failures; everything else was deleted.
            let failed: Vec<(String, String)> = output
                .errors()
                .iter()
                .map(|err| {
                    (
                        err.key().unwrap_or_default().to_string(),
                        err.message()
                            .or(err.code())
                            .unwrap_or("unknown error")
                            .to_string(),
                    )
                })
                .collect();
            let deleted = keys
                .into_iter()
                .filter(|key| !failed.iter().any(|(failed_key, _)| failed_key == key))
                .collect();

            Ok(DeleteReport { deleted, failed })
        })
    }
}

#[derive(Default)]
struct MemoryState {
    objects: BTreeSet<String>,
    failing: BTreeSet<String>,
    unreachable: bool,
    delete_calls: Vec<Vec<String>>,
}

/// In-process backend for tests and local development.
///
/// Presigned URLs point at `memory://upload/<key>` and are not writable;
/// objects are registered with [`MemoryBlobStore::insert`].
pub struct MemoryBlobStore {
    public_base_url: String,
    state: Mutex<MemoryState>,
}

impl MemoryBlobStore {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self {
            public_base_url: public_base_url.into(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // A panicking test thread must not hide the store from the others.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers an object and returns its public URL.
    pub fn insert(&self, key: &str) -> String {
        self.state().objects.insert(key.to_string());
        public_url_for(&self.public_base_url, key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state().objects.contains(key)
    }

    /// Makes every later deletion of `key` fail.
    pub fn fail_deletes_of(&self, key: &str) {
        self.state().failing.insert(key.to_string());
    }

    /// Makes every later batch deletion fail as a whole.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// Key batches received by `delete_objects`, in call order.
    pub fn delete_calls(&self) -> Vec<Vec<String>> {
        self.state().delete_calls.clone()
    }
}

impl BlobStore for MemoryBlobStore {
    fn presign_upload(&self, key: &str, _content_type: &str) -> BlobFuture<'_, PresignedUpload> {
        let upload = PresignedUpload {
            upload_url: format!("memory://upload/{key}"),
            public_url: public_url_for(&self.public_base_url, key),
        };
        Box::pin(async move { Ok(upload) })
    }

    fn delete_objects(&self, keys: Vec<String>) -> BlobFuture<'_, DeleteReport> {
        let mut state = self.state();
        state.delete_calls.push(keys.clone());

        let result = if state.unreachable {
            Err(anyhow::anyhow!("blob store unreachable"))
        } else {
            let mut report = DeleteReport::default();
            for key in keys {
                if state.failing.contains(&key) {
                    report.failed.push((key, "AccessDenied".to_string()));
                } else {
                    state.objects.remove(&key);
                    report.deleted.push(key);
                }
            }
            Ok(report)
        };
        Box::pin(async move { result })
    }
}
