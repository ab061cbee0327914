pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;
pub use config::LoaderConfig;

pub use adapters::{LocalObjectStore, MemoryObjectStore, RecordingWarehouse};
#[cfg(feature = "postgres")]
pub use adapters::PostgresWarehouse;
#[cfg(feature = "s3")]
pub use adapters::S3ObjectStore;

pub use core::ddl::{DistStyle, TableSpec};
pub use core::format::{Compression, FormatOptions, TableFormat};
pub use core::reserved::ReservedWords;
pub use core::{LoadOptions, RedshiftLoader, UpsertOptions};
pub use domain::model::{Column, ColumnType, Dataset, StagingLocation, TableName, Value};
pub use domain::ports::{ObjectMeta, ObjectStore, WarehouseConnection};
pub use utils::error::{LoaderError, Result};
