// Adapters layer: concrete implementations of the domain ports.

pub mod local;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod recording;
#[cfg(feature = "s3")]
pub mod s3;

pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresWarehouse;
pub use recording::RecordingWarehouse;
#[cfg(feature = "s3")]
pub use s3::S3ObjectStore;
