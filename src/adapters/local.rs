use crate::domain::ports::{ObjectMeta, ObjectStore};
use crate::utils::error::{LoaderError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Object store laid out on the local filesystem as `{base}/{bucket}/{key}`.
///
/// Object metadata is not persisted.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    base_path: PathBuf,
}

impl LocalObjectStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        if key.split('/').any(|segment| segment == "..") {
            return Err(LoaderError::object_store(format!(
                "key {} escapes the bucket directory",
                key
            )));
        }
        Ok(self.base_path.join(bucket).join(key))
    }
}

impl ObjectStore for LocalObjectStore {
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>, _meta: &ObjectMeta) -> Result<()> {
        let full_path = self.object_path(bucket, key)?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(full_path, body)?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let full_path = self.object_path(bucket, key)?;
        let data = fs::read(full_path)?;
        Ok(data)
    }

    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let root = self.base_path.join(bucket);
        let mut keys = Vec::new();
        if root.is_dir() {
            collect_keys(&root, &root, &mut keys)?;
        }
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }
}

fn collect_keys(root: &Path, dir: &Path, keys: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_keys(root, &path, keys)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            let key: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            keys.push(key.join("/"));
        }
    }
    Ok(())
}
