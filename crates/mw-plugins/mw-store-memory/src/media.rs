use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use mw_core::traits::MediaStore;

pub const URL_SCHEME: &str = "memory://";

#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub data: Bytes,
    pub content_type: String,
}

#[derive(Default)]
pub struct MemoryMediaStore {
    blobs: DashMap<String, StoredBlob>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_blob(&self, key: &str) -> Option<StoredBlob> {
        self.blobs.get(key).map(|b| b.value().clone())
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn put_blob(&self, key: &str, data: Bytes, content_type: &str) -> anyhow::Result<String> {
        if key.is_empty() {
            anyhow::bail!("empty media key");
        }
        self.blobs.insert(
            key.to_string(),
            StoredBlob {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(format!("{URL_SCHEME}{key}"))
    }
}
