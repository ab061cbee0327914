pub mod copy;
pub mod ddl;
pub mod format;
pub mod loader;
pub mod manifest;
pub mod objects;
pub mod reserved;
pub mod upsert;

pub use crate::domain::model::{Column, ColumnType, Dataset, StagingLocation, TableName, Value};
pub use crate::domain::ports::{ObjectMeta, ObjectStore, WarehouseConnection};
pub use crate::utils::error::Result;
pub use loader::{LoadOptions, RedshiftLoader};
pub use upsert::UpsertOptions;
