use crate::domain::ports::{ObjectMeta, ObjectStore};
use crate::utils::error::{LoaderError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

type Objects = BTreeMap<(String, String), (Vec<u8>, ObjectMeta)>;

/// Process-local object store. Clones share the same objects.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<Mutex<Objects>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn meta(&self, bucket: &str, key: &str) -> Option<ObjectMeta> {
        let objects = self.objects.lock().await;
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|(_, meta)| meta.clone())
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.lock().await.is_empty()
    }
}

impl ObjectStore for MemoryObjectStore {
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>, meta: &ObjectMeta) -> Result<()> {
        let mut objects = self.objects.lock().await;
        objects.insert((bucket.to_string(), key.to_string()), (body, meta.clone()));
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let objects = self.objects.lock().await;
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|(body, _)| body.clone())
            .ok_or_else(|| LoaderError::object_store(format!("s3://{}/{} not found", bucket, key)))
    }

    /// Keys come back in lexicographic order.
    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let objects = self.objects.lock().await;
        Ok(objects
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect())
    }
}
