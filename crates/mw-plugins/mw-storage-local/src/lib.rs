//! # mw-storage-local
//!
//! Local filesystem implementation of `MediaStore`.
//! Blobs land at `{root}/{key}` and are served from `{url_prefix}/{key}`.

use anyhow::{bail, Context};
use async_trait::async_trait;
use bytes::Bytes;
use mw_core::traits::MediaStore;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

pub struct LocalMediaStore {
    /// Root directory for all uploads (e.g., "./data/media")
    root_path: PathBuf,
    /// Public URL prefix (e.g., "/media")
    url_prefix: String,
}

impl LocalMediaStore {
    pub fn new(root: PathBuf, url_prefix: String) -> Self {
        let url_prefix = url_prefix.trim_end_matches('/').to_string();
        Self { root_path: root, url_prefix }
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Maps a storage key to a path under the root. Keys are relative,
    /// `/`-separated, and may not climb out of the root.
    fn resolve(&self, key: &str) -> anyhow::Result<PathBuf> {
        if key.is_empty() || key.starts_with('/') || key.contains('\\') {
            bail!("invalid media key: {key:?}");
        }
        let mut path = self.root_path.clone();
        for segment in key.split('/') {
            match Path::new(segment).components().next() {
                Some(Component::Normal(part)) if part == segment => path.push(part),
                _ => bail!("invalid media key: {key:?}"),
            }
        }
        Ok(path)
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    /// Writes to a temporary sibling first so readers never see a partial file.
    async fn put_blob(&self, key: &str, data: Bytes, _content_type: &str) -> anyhow::Result<String> {
        let target_path = self.resolve(key)?;
        let parent = target_path
            .parent()
            .with_context(|| format!("media key has no parent directory: {key}"))?;
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;

        let temp_path = parent.join(format!(".{}.part", Uuid::new_v4().simple()));
        if let Err(e) = fs::write(&temp_path, &data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e).with_context(|| format!("Failed to write {}", temp_path.display()));
        }
        fs::rename(&temp_path, &target_path)
            .await
            .with_context(|| format!("Failed to move blob into {}", target_path.display()))?;

        debug!(key, bytes = data.len(), "media stored");
        Ok(format!("{}/{}", self.url_prefix, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("mw-storage-local-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn blob_is_written_under_root_and_addressed_by_prefix() {
        let root = temp_root();
        let store = LocalMediaStore::new(root.clone(), "/media/".into());

        let url = store
            .put_blob("guestbook/17-abcd-photo.jpg", Bytes::from_static(b"\xFF\xD8jpeg"), "image/jpeg")
            .await
            .unwrap();
        assert_eq!(url, "/media/guestbook/17-abcd-photo.jpg");

        let written = std::fs::read(root.join("guestbook").join("17-abcd-photo.jpg")).unwrap();
        assert_eq!(written, b"\xFF\xD8jpeg");

        // No temp files left behind.
        let names: Vec<_> = std::fs::read_dir(root.join("guestbook"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);

        std::fs::remove_dir_all(root).unwrap();
    }

    #[tokio::test]
    async fn escaping_keys_are_rejected() {
        let store = LocalMediaStore::new(temp_root(), "/media".into());
        for key in ["", "/etc/passwd", "../secret", "guestbook/../../x", "a//b", "a/./b", "a\\b"] {
            assert!(
                store.put_blob(key, Bytes::from_static(b"x"), "image/jpeg").await.is_err(),
                "{key:?} should be rejected"
            );
        }
    }
}
