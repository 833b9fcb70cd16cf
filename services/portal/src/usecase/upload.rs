use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use portal_domain::id::UserId;

use crate::domain::repository::StoragePort;
use crate::error::PortalError;

/// Largest accepted image, in bytes (5 MiB).
pub const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

/// An image picked for upload.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ImageFile {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Which photo an upload is for. Each kind has its own bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Profile,
    Family,
}

#[derive(Debug, Clone)]
pub struct ImageBuckets {
    pub profile: String,
    pub family: String,
}

impl Default for ImageBuckets {
    fn default() -> Self {
        Self {
            profile: "employee-profiles".to_owned(),
            family: "family-profiles".to_owned(),
        }
    }
}

impl ImageBuckets {
    fn bucket(&self, kind: ImageKind) -> &str {
        match kind {
            ImageKind::Profile => &self.profile,
            ImageKind::Family => &self.family,
        }
    }
}

/// Local preconditions, checked before any remote call. Type is checked first.
pub fn check_image(content_type: &str, size: u64) -> Result<(), PortalError> {
    if !content_type.starts_with("image/") {
        return Err(PortalError::InvalidImageType {
            content_type: content_type.to_owned(),
        });
    }
    if size > MAX_IMAGE_BYTES {
        return Err(PortalError::ImageTooLarge { size });
    }
    Ok(())
}

/// `{owner}/{unix_millis}.{ext}`, where `ext` follows the last `.` of `file_name`.
pub fn object_path(owner: UserId, file_name: &str, now: DateTime<Utc>) -> String {
    let ext = file_name.rsplit('.').next().unwrap_or_default();
    format!("{owner}/{}.{ext}", now.timestamp_millis())
}

/// Object path (`{owner}/{file}`) from the last two segments of a public URL.
pub fn path_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let mut segments = path.rsplit('/');
    let file = segments.next().filter(|s| !s.is_empty())?;
    let owner = segments.next().filter(|s| !s.is_empty())?;
    Some(format!("{owner}/{file}"))
}

/// Uploads and removes profile and family photos.
pub struct ImageStore<S: StoragePort> {
    storage: S,
    buckets: ImageBuckets,
}

impl<S: StoragePort> ImageStore<S> {
    pub fn new(storage: S, buckets: ImageBuckets) -> Self {
        Self { storage, buckets }
    }

    /// Check, upload and return the public URL of the stored image.
    ///
    /// Profile photos overwrite an existing object at the same path; family
    /// photos do not.
    pub async fn upload(
        &self,
        kind: ImageKind,
        owner: UserId,
        file: &ImageFile,
    ) -> Result<String, PortalError> {
        check_image(&file.content_type, file.size())?;

        let bucket = self.buckets.bucket(kind);
        let path = object_path(owner, &file.name, Utc::now());
        let stored = self
            .storage
            .upload(
                bucket,
                &path,
                file.bytes.clone(),
                &file.content_type,
                kind == ImageKind::Profile,
            )
            .await?;
        debug!(bucket, path = %stored, size = file.size(), "image uploaded");
        Ok(self.storage.public_url(bucket, &stored))
    }

    /// Remove the object a public URL points at. `Ok(false)` when the URL
    /// does not name an object.
    pub async fn delete(&self, kind: ImageKind, url: &str) -> Result<bool, PortalError> {
        let Some(path) = path_from_url(url) else {
            warn!(url, "cannot derive object path from image url");
            return Ok(false);
        };
        let bucket = self.buckets.bucket(kind);
        self.storage.remove(bucket, &[path]).await?;
        Ok(true)
    }
}
