//! Moving whole datasets in and out of an `ObjectStore`.

use crate::core::format::{FormatOptions, TableFormat};
use crate::domain::model::Dataset;
use crate::domain::ports::ObjectStore;
use crate::utils::error::{LoaderError, Result};

/// Object key of part `index` (1-based) when a dataset is split across objects.
///
/// `dir/20240101-120000.csv.gz` part 2 becomes
/// `dir/20240101-120000/20240101-120000.2.csv.gz`.
pub fn part_key(key: &str, index: usize) -> String {
    let (dir, file) = split_key(key);
    let (stem, rest) = match file.split_once('.') {
        Some((stem, rest)) => (stem, Some(rest)),
        None => (file, None),
    };
    let name = match rest {
        Some(rest) => format!("{}.{}.{}", stem, index, rest),
        None => format!("{}.{}", stem, index),
    };
    match dir {
        Some(dir) => format!("{}/{}/{}", dir, stem, name),
        None => format!("{}/{}", stem, name),
    }
}

/// Common key prefix shared by every part written for `key`.
pub fn part_prefix(key: &str) -> String {
    let (dir, file) = split_key(key);
    let stem = file.split_once('.').map(|(stem, _)| stem).unwrap_or(file);
    match dir {
        Some(dir) => format!("{}/{}/{}.", dir, stem, stem),
        None => format!("{}/{}.", stem, stem),
    }
}

fn split_key(key: &str) -> (Option<&str>, &str) {
    match key.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, key),
    }
}

/// Serializes `dataset` and uploads it, returning every key written.
pub async fn put_dataset<S: ObjectStore>(
    store: &S,
    dataset: &Dataset,
    bucket: &str,
    key: &str,
    options: &FormatOptions,
) -> Result<Vec<String>> {
    options.validate()?;
    let meta = options.object_meta();

    let chunks: Vec<(String, Dataset)> = if options.parts == 1 {
        vec![(key.to_string(), dataset.clone())]
    } else {
        dataset
            .split(options.parts)
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| (part_key(key, i + 1), chunk))
            .collect()
    };

    let mut written = Vec::with_capacity(chunks.len());
    for (object_key, chunk) in chunks {
        let body = options.encode(&chunk)?;
        tracing::debug!(
            "Uploading {} rows ({} bytes) to s3://{}/{}",
            chunk.len(),
            body.len(),
            bucket,
            object_key
        );
        store.put_object(bucket, &object_key, body, &meta).await?;
        written.push(object_key);
    }

    tracing::info!(
        "Uploaded {} object(s) using format {}, compression {:?}",
        written.len(),
        options.format,
        options.compression
    );
    Ok(written)
}

pub async fn get_dataset<S: ObjectStore>(
    store: &S,
    bucket: &str,
    key: &str,
    options: &FormatOptions,
) -> Result<Dataset> {
    let bytes = store.get_object(bucket, key).await?;
    options.decode(&bytes)
}

/// Reads and concatenates every object under `prefix` whose key ends with `suffix`.
///
/// With `options == None` each object's format is detected from its key suffix
/// and keys with an unknown suffix are skipped. Returns `None` when nothing matched.
pub async fn get_dataset_from_prefix<S: ObjectStore>(
    store: &S,
    bucket: &str,
    prefix: &str,
    suffix: &str,
    options: Option<&FormatOptions>,
) -> Result<Option<Dataset>> {
    let keys = store.list_keys(bucket, prefix).await?;
    if keys.is_empty() {
        tracing::info!("Nothing found under s3://{}/{}", bucket, prefix);
    }

    let mut datasets = Vec::new();
    for key in keys.iter().filter(|k| k.as_str() != prefix && k.ends_with(suffix)) {
        let detected;
        let options = match options {
            Some(options) => options,
            None => match TableFormat::detect(key) {
                Some((format, compression)) => {
                    detected = FormatOptions::new(format, compression);
                    &detected
                }
                None => {
                    tracing::warn!("No format matches key {}, skipping", key);
                    continue;
                }
            },
        };
        datasets.push(get_dataset(store, bucket, key, options).await?);
    }

    Dataset::concat(datasets).map_err(|e| match e {
        LoaderError::ValidationError { message } => LoaderError::serialization(format!(
            "objects under s3://{}/{} disagree on columns: {}",
            bucket, prefix, message
        )),
        other => other,
    })
}
