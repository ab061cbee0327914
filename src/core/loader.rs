use crate::core::copy::{copy_statement, Authorization, CopyOptions};
use crate::core::ddl::{create_table_statement, TableSpec};
use crate::core::format::FormatOptions;
use crate::core::manifest::LoadManifest;
use crate::core::reserved::ReservedWords;
use crate::domain::model::{Dataset, StagingLocation, TableName};
use crate::domain::ports::{ObjectStore, WarehouseConnection};
use crate::utils::error::{LoaderError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    pub table: TableSpec,
    pub copy: CopyOptions,
    pub format: FormatOptions,
    /// Drop the target (cascading to dependents) before recreating it.
    pub drop_table: bool,
}

/// Stages datasets in object storage and bulk-loads them into warehouse tables.
///
/// The loader borrows one connection exclusively and issues every statement
/// in sequence. Tables named without a schema land in `schema`.
///
/// If an operation future is dropped before it completes (for example by an
/// outer `tokio::time::timeout`), the connection may be left inside an open
/// transaction: do not reuse it afterwards.
pub struct RedshiftLoader<'a, C: WarehouseConnection, S: ObjectStore> {
    pub(super) connection: &'a mut C,
    pub(super) store: &'a S,
    schema: String,
    reserved_words: ReservedWords,
}

impl<'a, C: WarehouseConnection, S: ObjectStore> RedshiftLoader<'a, C, S> {
    pub fn new(connection: &'a mut C, store: &'a S, schema: impl Into<String>) -> Self {
        tracing::info!("Connected to Redshift");
        Self {
            connection,
            store,
            schema: schema.into(),
            reserved_words: ReservedWords::default(),
        }
    }

    pub fn with_reserved_words(mut self, reserved_words: ReservedWords) -> Self {
        self.reserved_words = reserved_words;
        self
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn reserved_words(&self) -> &ReservedWords {
        &self.reserved_words
    }

    /// Extends this loader's reserved words; other loaders are unaffected.
    pub fn add_reserved_words<I, W>(&mut self, words: I) -> Result<()>
    where
        I: IntoIterator<Item = W>,
        W: AsRef<str>,
    {
        self.reserved_words.add(words)
    }

    /// Returns a copy of `dataset` with normalized column names, or a
    /// validation error naming the first reserved column.
    pub fn normalize_dataset(&self, dataset: &Dataset) -> Result<Dataset> {
        let names = self
            .reserved_words
            .validate_columns(dataset.columns().iter().map(|c| c.name.as_str()))?;
        Ok(dataset.clone().renamed(names))
    }

    pub fn resolve_table(&self, name: &str) -> Result<TableName> {
        TableName::resolve(name, &self.schema)
    }

    /// Creates `table` shaped after `dataset` unless it already exists.
    pub async fn create_table(&mut self, dataset: &Dataset, table: &str, spec: &TableSpec) -> Result<()> {
        let dataset = self.normalize_dataset(dataset)?;
        let target = self.resolve_table(table)?;
        self.create_target(&dataset, &target, spec).await?;
        self.commit().await
    }

    /// Stages `dataset` under `location` and bulk-copies it into `table`,
    /// creating the table first when it is missing.
    pub async fn load_table(
        &mut self,
        dataset: &Dataset,
        table: &str,
        location: &StagingLocation,
        options: &LoadOptions,
    ) -> Result<LoadManifest> {
        tracing::info!("Uploading to Redshift");
        let dataset = self.normalize_dataset(dataset)?;
        let target = self.resolve_table(table)?;
        ensure_copy_loadable(&options.format)?;
        // Plan the DDL up front so an invalid table definition fails before anything is written.
        create_table_statement(&target, dataset.columns(), &options.table)?;

        let manifest = self
            .stage(&dataset, &target, location, &options.format)
            .await?;

        if options.drop_table {
            tracing::info!("Dropping table {}", target);
            self.run(&format!("DROP TABLE IF EXISTS {} CASCADE;", target))
                .await?;
        }
        self.create_target(&dataset, &target, &options.table).await?;
        self.commit().await?;

        self.copy_into(
            &target.to_string(),
            &dataset.column_names(),
            &manifest,
            &options.copy,
        )
        .await?;

        tracing::info!("Data loaded to Redshift table {} ({} rows)", target, dataset.len());
        Ok(manifest)
    }

    async fn create_target(
        &mut self,
        dataset: &Dataset,
        target: &TableName,
        spec: &TableSpec,
    ) -> Result<()> {
        let statement = create_table_statement(target, dataset.columns(), spec)?;
        tracing::info!("Creating table {} if missing", target);
        tracing::debug!("{}", statement);
        self.run(&statement).await
    }

    /// Serializes `dataset` to a fresh, timestamped key for `target`.
    pub(super) async fn stage(
        &self,
        dataset: &Dataset,
        target: &TableName,
        location: &StagingLocation,
        format: &FormatOptions,
    ) -> Result<LoadManifest> {
        let manifest = LoadManifest::fresh(location, target, format);
        let existing = self
            .store
            .list_keys(&manifest.bucket, &manifest.copy_source())
            .await?;
        if !existing.is_empty() {
            return Err(LoaderError::object_store(format!(
                "staging key {} is already in use",
                manifest.copy_url()
            )));
        }
        tracing::info!(
            "Staging {} rows for {} at s3://{}/{}",
            dataset.len(),
            target,
            manifest.bucket,
            manifest.key
        );
        manifest.write(self.store, dataset).await?;
        Ok(manifest)
    }

    /// Runs one COPY into `table` and commits it.
    pub(super) async fn copy_into(
        &mut self,
        table: &str,
        columns: &[String],
        manifest: &LoadManifest,
        options: &CopyOptions,
    ) -> Result<()> {
        let authorization = Authorization::from_env(options.iam_role.as_deref());
        if authorization == Authorization::Unauthenticated {
            tracing::warn!("No AWS authorization set for COPY into {}", table);
        }

        let statement = copy_statement(table, columns, manifest, options, &authorization)?;
        tracing::debug!("{}", statement.redacted);
        tracing::info!("Filling table {} from {}", table, manifest.copy_url());

        self.run(&statement.sql).await?;
        self.commit().await
    }

    /// Executes one statement; on failure rolls back the open transaction and
    /// returns the original error.
    pub(super) async fn run(&mut self, statement: &str) -> Result<()> {
        match self.connection.execute(statement).await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::error!("{}", err);
                self.rollback_after(&err).await;
                Err(err)
            }
        }
    }

    pub(super) async fn commit(&mut self) -> Result<()> {
        match self.connection.commit().await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::error!("Commit failed: {}", err);
                self.rollback_after(&err).await;
                Err(err)
            }
        }
    }

    pub(super) async fn rollback_after(&mut self, cause: &LoaderError) {
        if let Err(rollback_err) = self.connection.rollback().await {
            tracing::error!("Rollback after '{}' also failed: {}", cause, rollback_err);
        }
    }
}

pub(super) fn ensure_copy_loadable(format: &FormatOptions) -> Result<()> {
    format.validate()?;
    if !format.format.is_copy_loadable() {
        return Err(LoaderError::validation(format!(
            "{} objects cannot be bulk-copied, use csv or parquet",
            format.format
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryObjectStore, RecordingWarehouse};
    use crate::domain::model::{Column, ColumnType, Value};

    fn dataset(first_column: &str) -> Dataset {
        Dataset::new(
            vec![
                Column::new(first_column, ColumnType::Integer),
                Column::new("Full Name", ColumnType::String),
            ],
            vec![vec![Value::Integer(1), Value::String("a".into())]],
        )
        .unwrap()
    }

    fn options() -> LoadOptions {
        LoadOptions {
            copy: CopyOptions::default().with_iam_role("arn:aws:iam::1:role/load"),
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn test_load_statement_sequence() {
        let store = MemoryObjectStore::new();
        let mut warehouse = RecordingWarehouse::new();
        let location = StagingLocation::new("bucket", "loads");

        let mut loader = RedshiftLoader::new(&mut warehouse, &store, "public");
        let manifest = loader
            .load_table(&dataset("id"), "events", &location, &options())
            .await
            .unwrap();

        assert!(manifest.key.starts_with("loads/public/events/"));
        assert!(manifest.key.ends_with(".csv.gz"));
        assert_eq!(store.list_keys("bucket", "loads/").await.unwrap(), vec![manifest.key.clone()]);

        let statements = warehouse.statements();
        assert_eq!(statements[0], "BEGIN;");
        assert!(statements[1].starts_with("CREATE TABLE IF NOT EXISTS public.events (id INTEGER, full_name VARCHAR(256)"));
        assert_eq!(statements[2], "COMMIT;");
        assert_eq!(statements[3], "BEGIN;");
        assert!(statements[4].starts_with("COPY public.events (id, full_name)\nFROM 's3://bucket/loads/public/events/"));
        assert!(statements[4].contains("IAM_ROLE 'arn:aws:iam::1:role/load'"));
        assert_eq!(statements[5], "COMMIT;");
        assert_eq!(statements.len(), 6);
    }

    #[tokio::test]
    async fn test_drop_table_runs_with_create() {
        let store = MemoryObjectStore::new();
        let mut warehouse = RecordingWarehouse::new();
        let location = StagingLocation::new("bucket", "");
        let options = LoadOptions {
            drop_table: true,
            ..options()
        };

        let mut loader = RedshiftLoader::new(&mut warehouse, &store, "public");
        loader
            .load_table(&dataset("id"), "analytics.events", &location, &options)
            .await
            .unwrap();

        let statements = warehouse.statements();
        assert_eq!(statements[1], "DROP TABLE IF EXISTS analytics.events CASCADE;");
        assert!(statements[2].starts_with("CREATE TABLE IF NOT EXISTS analytics.events"));
        assert_eq!(statements[3], "COMMIT;");
    }

    #[tokio::test]
    async fn test_reserved_column_fails_before_any_io() {
        let store = MemoryObjectStore::new();
        let mut warehouse = RecordingWarehouse::new();
        let location = StagingLocation::new("bucket", "loads");

        let mut loader = RedshiftLoader::new(&mut warehouse, &store, "public");
        let err = loader
            .load_table(&dataset("Order"), "events", &location, &options())
            .await
            .unwrap_err();

        assert!(matches!(err, LoaderError::ValidationError { .. }));
        assert!(err.to_string().contains("order"));
        assert!(warehouse.statements().is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_copy_failure_rolls_back_and_keeps_diagnostic() {
        let store = MemoryObjectStore::new();
        let mut warehouse = RecordingWarehouse::failing_on("COPY");
        let location = StagingLocation::new("bucket", "loads");

        let mut loader = RedshiftLoader::new(&mut warehouse, &store, "public");
        let err = loader
            .load_table(&dataset("id"), "events", &location, &options())
            .await
            .unwrap_err();

        assert!(matches!(err, LoaderError::ExecutionError { .. }));
        assert!(err.to_string().contains("simulated failure on 'COPY'"));
        assert_eq!(warehouse.statements().last().unwrap(), "ROLLBACK;");
    }

    #[tokio::test]
    async fn test_invalid_format_rejected_before_staging() {
        let store = MemoryObjectStore::new();
        let mut warehouse = RecordingWarehouse::new();
        let location = StagingLocation::new("bucket", "loads");
        let options = LoadOptions {
            format: FormatOptions::new(
                crate::core::format::TableFormat::Binary,
                crate::core::format::Compression::None,
            ),
            ..options()
        };

        let mut loader = RedshiftLoader::new(&mut warehouse, &store, "public");
        assert!(loader
            .load_table(&dataset("id"), "events", &location, &options)
            .await
            .is_err());
        assert!(store.is_empty().await);
        assert!(warehouse.statements().is_empty());
    }

    #[tokio::test]
    async fn test_create_table_commits_once() {
        let store = MemoryObjectStore::new();
        let mut warehouse = RecordingWarehouse::new();
        let spec = TableSpec::default().with_distkey("id").with_sortkey(["id"], false);

        let mut loader = RedshiftLoader::new(&mut warehouse, &store, "public");
        loader.create_table(&dataset("id"), "events", &spec).await.unwrap();

        let statements = warehouse.statements();
        assert_eq!(statements.len(), 3);
        assert!(statements[1].contains("DISTSTYLE key DISTKEY(id) SORTKEY(id);"));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_reserved_words_are_per_loader() {
        let store = MemoryObjectStore::new();
        let mut first = RecordingWarehouse::new();
        let mut second = RecordingWarehouse::new();

        let mut extended = RedshiftLoader::new(&mut first, &store, "public");
        extended.add_reserved_words(["full_name"]).unwrap();
        assert!(extended.normalize_dataset(&dataset("id")).is_err());

        let plain = RedshiftLoader::new(&mut second, &store, "public");
        let normalized = plain.normalize_dataset(&dataset("id")).unwrap();
        assert_eq!(normalized.column_names(), vec!["id", "full_name"]);
    }
}
