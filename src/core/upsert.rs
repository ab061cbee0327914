//! Delete-then-insert reconciliation through a temporary staging table.

use crate::core::copy::CopyOptions;
use crate::core::ddl::AUDIT_COLUMN;
use crate::core::format::FormatOptions;
use crate::core::loader::{ensure_copy_loadable, RedshiftLoader};
use crate::core::manifest::LoadManifest;
use crate::core::reserved::normalize_column_name;
use crate::domain::model::{Dataset, StagingLocation, TableName};
use crate::domain::ports::{ObjectStore, WarehouseConnection};
use crate::utils::error::{LoaderError, Result};
use crate::utils::validation::validate_identifier;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpsertOptions {
    pub copy: CopyOptions,
    pub format: FormatOptions,
    /// Staging table name; defaults to `stage_{table}`. Concurrent upserts into
    /// the same target need distinct names.
    pub staging_table: Option<String>,
    /// Whether the target carries the audit column, which the staging table drops.
    pub audit_column: bool,
}

impl Default for UpsertOptions {
    fn default() -> Self {
        Self {
            copy: CopyOptions::default(),
            format: FormatOptions::default(),
            staging_table: None,
            audit_column: true,
        }
    }
}

impl UpsertOptions {
    pub fn with_staging_table(mut self, name: impl Into<String>) -> Self {
        self.staging_table = Some(name.into());
        self
    }
}

pub fn staging_table_name(target: &TableName, staging_override: Option<&str>) -> Result<String> {
    match staging_override.map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => {
            validate_identifier("staging_table", name)?;
            Ok(name.to_string())
        }
        None => Ok(format!("stage_{}", target.table)),
    }
}

/// Deletes every target row whose key columns all equal some staging row.
pub fn delete_statement(target: &str, staging: &str, keys: &[String]) -> String {
    let conditions: Vec<String> = keys
        .iter()
        .map(|k| format!("{t}.{k} = {s}.{k}", t = target, s = staging, k = k))
        .collect();
    format!(
        "DELETE FROM {} USING {} WHERE {};",
        target,
        staging,
        conditions.join(" AND ")
    )
}

pub fn insert_statement(target: &str, staging: &str, columns: &[String]) -> String {
    let columns = columns.join(", ");
    format!(
        "INSERT INTO {} ({}) SELECT {} FROM {};",
        target, columns, columns, staging
    )
}

impl<'a, C: WarehouseConnection, S: ObjectStore> RedshiftLoader<'a, C, S> {
    /// Replaces the target rows matching `comparison_key` with the rows of `dataset`.
    ///
    /// The delete and the insert share one transaction. Staging creation and
    /// the copy into staging commit earlier, so a failure in the final step
    /// leaves the target untouched but may leave the staging table behind;
    /// the next upsert (or [`cleanup_staging`](Self::cleanup_staging)) drops it.
    ///
    /// Duplicate keys in `dataset` are not rejected: every matching pair
    /// deletes, and every staged row is inserted.
    pub async fn upsert<K: AsRef<str>>(
        &mut self,
        dataset: &Dataset,
        table: &str,
        location: &StagingLocation,
        comparison_key: &[K],
        options: &UpsertOptions,
    ) -> Result<LoadManifest> {
        tracing::info!("Upserting into {}", table);
        let dataset = self.normalize_dataset(dataset)?;
        let target = self.resolve_table(table)?;
        let keys = comparison_columns(&dataset, comparison_key)?;
        let staging = staging_table_name(&target, options.staging_table.as_deref())?;
        ensure_copy_loadable(&options.format)?;

        let key_indexes: Vec<usize> = keys
            .iter()
            .filter_map(|k| dataset.column_index(k))
            .collect();
        let duplicates = dataset.duplicate_key_count(&key_indexes);
        if duplicates > 0 {
            tracing::warn!(
                "{} rows repeat a comparison key ({}) already present in the input",
                duplicates,
                keys.join(", ")
            );
        }

        let manifest = self
            .stage(&dataset, &target, location, &options.format)
            .await?;

        self.prepare_staging(&target, &staging, options.audit_column)
            .await?;

        let columns = dataset.column_names();
        self.copy_into(&staging, &columns, &manifest, &options.copy)
            .await?;

        let target_name = target.to_string();
        tracing::info!("Swapping staged rows into {}", target_name);
        if let Err(err) = self.connection.begin().await {
            self.rollback_after(&err).await;
            return Err(err);
        }
        self.run(&delete_statement(&target_name, &staging, &keys))
            .await?;
        self.run(&insert_statement(&target_name, &staging, &columns))
            .await?;
        self.run(&format!("DROP TABLE {};", staging)).await?;
        self.commit().await?;

        tracing::info!("Upserted {} rows into {}", dataset.len(), target_name);
        Ok(manifest)
    }

    /// Drops the staging table a failed upsert into `table` may have left behind.
    pub async fn cleanup_staging(&mut self, table: &str, staging_override: Option<&str>) -> Result<()> {
        let target = self.resolve_table(table)?;
        let staging = staging_table_name(&target, staging_override)?;
        tracing::info!("Dropping staging table {}", staging);
        self.run(&format!("DROP TABLE IF EXISTS {};", staging))
            .await?;
        self.commit().await
    }

    async fn prepare_staging(&mut self, target: &TableName, staging: &str, audit_column: bool) -> Result<()> {
        let drop = format!("DROP TABLE IF EXISTS {};", staging);
        if let Err(err) = self.connection.execute(&drop).await {
            tracing::warn!("Could not drop leftover staging table {}: {}", staging, err);
            self.rollback_after(&err).await;
        }

        tracing::info!("Creating staging table {} like {}", staging, target);
        self.run(&format!("CREATE TEMP TABLE {} (LIKE {});", staging, target))
            .await?;
        if audit_column {
            self.run(&format!(
                "ALTER TABLE {} DROP COLUMN {};",
                staging, AUDIT_COLUMN
            ))
            .await?;
        }
        self.commit().await
    }
}

fn comparison_columns<K: AsRef<str>>(dataset: &Dataset, comparison_key: &[K]) -> Result<Vec<String>> {
    if comparison_key.is_empty() {
        return Err(LoaderError::validation(
            "comparison key must name at least one column",
        ));
    }

    let mut keys: Vec<String> = Vec::with_capacity(comparison_key.len());
    for raw in comparison_key {
        let key = normalize_column_name(raw.as_ref());
        if key.is_empty() {
            return Err(LoaderError::validation("comparison key column cannot be empty"));
        }
        if dataset.column_index(&key).is_none() {
            return Err(LoaderError::validation(format!(
                "comparison key column {} is not a dataset column",
                key
            )));
        }
        if keys.contains(&key) {
            return Err(LoaderError::validation(format!(
                "comparison key column {} is listed twice",
                key
            )));
        }
        keys.push(key);
    }
    Ok(keys)
}
