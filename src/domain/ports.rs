use crate::utils::error::Result;
use async_trait::async_trait;

/// Metadata attached to every stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub content_type: String,
    pub content_encoding: Option<String>,
}

pub trait ObjectStore: Send + Sync {
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        meta: &ObjectMeta,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    fn get_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;

    /// Every key under `prefix`, across all result pages.
    fn list_keys(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
}

/// A transactional SQL session against the warehouse.
///
/// The first `execute` after a `commit` or `rollback` implicitly opens a new
/// transaction; `begin` opens one explicitly.
#[async_trait]
pub trait WarehouseConnection: Send {
    async fn begin(&mut self) -> Result<()>;
    async fn execute(&mut self, statement: &str) -> Result<()>;
    async fn commit(&mut self) -> Result<()>;
    async fn rollback(&mut self) -> Result<()>;
}
