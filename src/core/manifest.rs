use crate::core::format::FormatOptions;
use crate::core::objects::{part_prefix, put_dataset};
use crate::domain::model::{Dataset, StagingLocation, TableName};
use crate::domain::ports::ObjectStore;
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

/// Timestamp layout at the start of the object name, `yyyymmdd-HHMMSS`
/// followed by the microseconds.
pub const KEY_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S-%6f";

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Where one load operation staged its data and how it was encoded.
///
/// The same manifest value drives both the upload and the COPY statement, so
/// the key, format, compression, delimiter and quote always agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadManifest {
    pub bucket: String,
    pub key: String,
    pub format: FormatOptions,
}

impl LoadManifest {
    /// Manifest for a new operation: current time plus a process-wide sequence
    /// number, so no two operations in this process share a key.
    pub fn fresh(location: &StagingLocation, table: &TableName, format: &FormatOptions) -> Self {
        let sequence = NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self::derive(location, table, Utc::now(), sequence, format)
    }

    /// `{prefix}/{schema}/{table}/{yyyymmdd-HHMMSS-ffffff}-{sequence}.{ext}[.gz]`
    pub fn derive(
        location: &StagingLocation,
        table: &TableName,
        now: DateTime<Utc>,
        sequence: u64,
        format: &FormatOptions,
    ) -> Self {
        let file = format!(
            "{}-{}.{}",
            now.format(KEY_TIMESTAMP_FORMAT),
            sequence,
            format.suffix()
        );
        let key = if location.prefix.is_empty() {
            format!("{}/{}", table.key_path(), file)
        } else {
            format!("{}/{}/{}", location.prefix, table.key_path(), file)
        };
        Self {
            bucket: location.bucket.clone(),
            key,
            format: format.clone(),
        }
    }

    /// Key or key prefix the COPY statement reads from.
    pub fn copy_source(&self) -> String {
        if self.format.parts > 1 {
            part_prefix(&self.key)
        } else {
            self.key.clone()
        }
    }

    pub fn copy_url(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.copy_source())
    }

    /// Uploads `dataset` as described by this manifest.
    pub async fn write<S: ObjectStore>(&self, store: &S, dataset: &Dataset) -> Result<Vec<String>> {
        put_dataset(store, dataset, &self.bucket, &self.key, &self.format).await
    }
}
