use anyhow::{anyhow, Result};
use bytes::Bytes;
use uuid::Uuid;

use crate::domain::post::{extension, MediaKind};
use crate::infra::storage::{content_type_for, ObjectStorage};

/// Where an upload is filed in the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFolder {
    Posts,
    Stories,
    Avatars,
    Attachments,
}

impl MediaFolder {
    fn prefix(&self) -> &'static str {
        match self {
            MediaFolder::Posts => "posts",
            MediaFolder::Stories => "stories",
            MediaFolder::Avatars => "avatars",
            MediaFolder::Attachments => "attachments",
        }
    }
}

/// A file received in a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::from_name(&self.file_name)
    }
}

#[derive(Clone)]
pub struct MediaService {
    storage: ObjectStorage,
}

impl MediaService {
    pub fn new(storage: ObjectStorage) -> Self {
        Self { storage }
    }

    /// Uploads `file` and returns its object key.
    pub async fn store(&self, folder: MediaFolder, owner_id: Uuid, file: &UploadedFile) -> Result<String> {
        if file.bytes.is_empty() {
            return Err(anyhow!("empty upload"));
        }
        let key = object_key(folder, owner_id, Uuid::new_v4(), &file.file_name);
        self.storage
            .put_object(&key, content_type_for(&file.file_name), file.bytes.clone())
            .await?;
        tracing::debug!(key = %key, bytes = file.bytes.len(), "stored upload");
        Ok(key)
    }

    /// Deletes a stored object, logging instead of failing.
    pub async fn remove(&self, key: &str) {
        if let Err(err) = self.storage.delete_object(key).await {
            tracing::warn!(error = ?err, key = %key, "failed to delete stored object");
        }
    }
}

fn object_key(folder: MediaFolder, owner_id: Uuid, object_id: Uuid, file_name: &str) -> String {
    let ext = extension(file_name).unwrap_or_else(|| "bin".to_string());
    format!("{}/{}/{}.{}", folder.prefix(), owner_id, object_id, ext)
}
