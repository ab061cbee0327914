use crate::domain::ports::{ObjectMeta, ObjectStore};
use crate::utils::error::{LoaderError, Result};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: S3Client,
}

impl S3ObjectStore {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }

    /// Builds a client from the default AWS credential chain, optionally pinned to `region`.
    pub async fn from_env(region: Option<String>) -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let mut builder = aws_sdk_s3::config::Builder::from(&config);
        if let Some(region) = region {
            builder = builder.region(Region::new(region));
        }
        Self::new(S3Client::from_conf(builder.build()))
    }
}

fn describe<E: ProvideErrorMetadata + std::fmt::Display>(err: &E) -> String {
    match (err.code(), err.message()) {
        (Some(code), Some(message)) => format!("{}: {}", code, message),
        (Some(code), None) => code.to_string(),
        _ => err.to_string(),
    }
}

impl ObjectStore for S3ObjectStore {
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>, meta: &ObjectMeta) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(&meta.content_type)
            .set_content_encoding(meta.content_encoding.clone())
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                LoaderError::object_store(format!(
                    "Failed to write s3://{}/{}: {}",
                    bucket,
                    key,
                    describe(&e.into_service_error())
                ))
            })?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                LoaderError::object_store(format!(
                    "Failed to read s3://{}/{}: {}",
                    bucket,
                    key,
                    describe(&e.into_service_error())
                ))
            })?;

        let data = resp.body.collect().await.map_err(|e| {
            LoaderError::object_store(format!("Failed to collect S3 data: {}", e))
        })?;

        Ok(data.into_bytes().to_vec())
    }

    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| {
                    LoaderError::object_store(format!(
                        "Failed to list s3://{}/{}: {}",
                        bucket,
                        prefix,
                        describe(&e.into_service_error())
                    ))
                })?;

            keys.extend(
                resp.contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            match (resp.is_truncated(), resp.next_continuation_token()) {
                (Some(true), Some(token)) => continuation = Some(token.to_string()),
                _ => break,
            }
        }

        tracing::debug!("Listed {} keys under s3://{}/{}", keys.len(), bucket, prefix);
        Ok(keys)
    }
}
