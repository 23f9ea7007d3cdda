//! Pluggable object storage seam (§6, §8 Non-goals). `ayb-server` exposes
//! the full bucket-scoped upload/list/download/delete surface; the actual
//! blob backend is out of scope for this core, so [`ObjectStore`] is the
//! trait a real deployment swaps in — mirrors the [`ayb_webhooks::SecretStore`]
//! seam one layer up.

use ayb_error::{ApiError, ApiResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, serde::Serialize)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub content_type: String,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, bucket: &str, key: &str, content_type: &str, body: Vec<u8>) -> ApiResult<ObjectMeta>;
    async fn get(&self, bucket: &str, key: &str) -> ApiResult<(ObjectMeta, Vec<u8>)>;
    async fn list(&self, bucket: &str, prefix: &str) -> ApiResult<Vec<ObjectMeta>>;
    async fn delete(&self, bucket: &str, key: &str) -> ApiResult<()>;
}

/// Reference implementation: one directory per bucket under `root`, one
/// file per object, a sidecar `.meta.json` for content-type/size/mtime.
/// No signed-URL support — downloads always go through this process.
pub struct LocalDiskStore {
    root: PathBuf,
}

impl LocalDiskStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> ApiResult<PathBuf> {
        if bucket.is_empty() || bucket.contains('/') || bucket.contains("..") {
            return Err(ApiError::invalid_request("invalid bucket name"));
        }
        if key.is_empty() || key.contains("..") {
            return Err(ApiError::invalid_request("invalid object key"));
        }
        Ok(self.root.join(bucket).join(key))
    }

    fn meta_path(object_path: &Path) -> PathBuf {
        let mut path = object_path.as_os_str().to_owned();
        path.push(".meta.json");
        PathBuf::from(path)
    }
}

#[async_trait]
impl ObjectStore for LocalDiskStore {
    async fn put(&self, bucket: &str, key: &str, content_type: &str, body: Vec<u8>) -> ApiResult<ObjectMeta> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| ApiError::internal(format!("create storage directory: {err}")))?;
        }

        let meta = ObjectMeta {
            key: key.to_string(),
            size: body.len() as u64,
            content_type: content_type.to_string(),
            updated_at: Utc::now(),
        };

        tokio::fs::write(&path, &body).await.map_err(|err| ApiError::internal(format!("write object: {err}")))?;
        let meta_json =
            serde_json::to_vec(&meta).map_err(|err| ApiError::internal(format!("encode object metadata: {err}")))?;
        tokio::fs::write(Self::meta_path(&path), meta_json)
            .await
            .map_err(|err| ApiError::internal(format!("write object metadata: {err}")))?;

        Ok(meta)
    }

    async fn get(&self, bucket: &str, key: &str) -> ApiResult<(ObjectMeta, Vec<u8>)> {
        let path = self.object_path(bucket, key)?;
        let body = tokio::fs::read(&path)
            .await
            .map_err(|_| ApiError::not_found("object not found"))?;
        let meta_bytes = tokio::fs::read(Self::meta_path(&path))
            .await
            .map_err(|_| ApiError::not_found("object metadata missing"))?;
        let meta: ObjectMeta =
            serde_json::from_slice(&meta_bytes).map_err(|err| ApiError::internal(format!("decode object metadata: {err}")))?;
        Ok((meta, body))
    }

    async fn list(&self, bucket: &str, prefix: &str) -> ApiResult<Vec<ObjectMeta>> {
        if bucket.is_empty() || bucket.contains('/') || bucket.contains("..") {
            return Err(ApiError::invalid_request("invalid bucket name"));
        }
        let bucket_dir = self.root.join(bucket);
        let mut entries = match tokio::fs::read_dir(&bucket_dir).await {
            Ok(entries) => entries,
            Err(_) => return Ok(Vec::new()),
        };

        let mut objects = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|err| ApiError::internal(format!("list objects: {err}")))? {
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            if name.ends_with(".meta.json") {
                continue;
            }
            if !name.starts_with(prefix) {
                continue;
            }
            let meta_bytes = match tokio::fs::read(Self::meta_path(&entry.path())).await {
                Ok(bytes) => bytes,
                Err(_) => continue,
            };
            if let Ok(meta) = serde_json::from_slice::<ObjectMeta>(&meta_bytes) {
                objects.push(meta);
            }
        }
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn delete(&self, bucket: &str, key: &str) -> ApiResult<()> {
        let path = self.object_path(bucket, key)?;
        let _ = tokio::fs::remove_file(Self::meta_path(&path)).await;
        tokio::fs::remove_file(&path).await.map_err(|_| ApiError::not_found("object not found"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips_body_and_content_type() {
        let dir = std::env::temp_dir().join(format!("ayb-storage-test-{}", uuid::Uuid::new_v4()));
        let store = LocalDiskStore::new(&dir);
        store.put("avatars", "a.png", "image/png", b"hello".to_vec()).await.unwrap();
        let (meta, body) = store.get("avatars", "a.png").await.unwrap();
        assert_eq!(body, b"hello");
        assert_eq!(meta.content_type, "image/png");
        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn rejects_path_traversal_in_key() {
        let dir = std::env::temp_dir().join(format!("ayb-storage-test-{}", uuid::Uuid::new_v4()));
        let store = LocalDiskStore::new(&dir);
        let result = store.put("avatars", "../etc/passwd", "text/plain", b"x".to_vec()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let dir = std::env::temp_dir().join(format!("ayb-storage-test-{}", uuid::Uuid::new_v4()));
        let store = LocalDiskStore::new(&dir);
        let result = store.get("avatars", "missing.png").await;
        assert!(result.is_err());
    }
}
